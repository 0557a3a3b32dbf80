use crate::commands::{load_config, runtime, CommandFailure, CommandResult};
use affilink_db::{connect_with_config, migrations};

pub fn run() -> CommandResult {
    match apply() {
        Ok(()) => CommandResult::success("migrate", "applied pending migrations"),
        Err(failure) => failure.into_result("migrate"),
    }
}

fn apply() -> Result<(), CommandFailure> {
    let config = load_config()?;
    let runtime = runtime()?;

    runtime.block_on(async {
        let pool = connect_with_config(&config.database)
            .await
            .map_err(|error| CommandFailure::new("db_connectivity", error.to_string(), 4))?;
        migrations::run_pending(&pool)
            .await
            .map_err(|error| CommandFailure::new("migration", error.to_string(), 5))?;
        tracing::info!(event_name = "cli.migrate.applied", "pending migrations applied");
        pool.close().await;
        Ok(())
    })
}
