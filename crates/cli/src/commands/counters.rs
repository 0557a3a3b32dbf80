use std::future::Future;

use affilink_core::subids::{CounterScope, CounterState};
use affilink_db::{CounterRepository, SqlCounterRepository};

use crate::commands::{load_config, open_store, runtime, CommandFailure, CommandResult};

pub fn show() -> CommandResult {
    let loaded = with_counters(|repository| async move {
        Ok::<_, CommandFailure>(repository.load().await?)
    });
    match loaded {
        Ok(state) => CommandResult::success_with(
            "counters",
            format!("next global value {}", state.peek_global()),
            state,
        ),
        Err(failure) => failure.into_result("counters"),
    }
}

pub fn reset(scope: &str, sigla: Option<&str>) -> CommandResult {
    let scope = match CounterScope::parse(scope, sigla) {
        Ok(scope) => scope,
        Err(error) => return CommandFailure::from(error).into_result("counters"),
    };

    let reset_scope = scope.clone();
    let updated = with_counters(|repository| async move {
        let reset = repository
            .issue(|state: &CounterState| {
                let next = state.reset(&reset_scope);
                Ok((next.clone(), next))
            })
            .await?;
        Ok::<_, CommandFailure>(reset)
    });
    match updated {
        Ok(state) => {
            tracing::info!(event_name = "cli.counters.reset", scope = %scope, "counter reset");
            CommandResult::success_with("counters", format!("reset {scope} counter"), state)
        }
        Err(failure) => failure.into_result("counters"),
    }
}

/// Opens the store and runs `action` against its counter repository.
fn with_counters<F, Fut>(action: F) -> Result<CounterState, CommandFailure>
where
    F: FnOnce(SqlCounterRepository) -> Fut,
    Fut: Future<Output = Result<CounterState, CommandFailure>>,
{
    let config = load_config()?;
    let runtime = runtime()?;

    runtime.block_on(async {
        let pool = open_store(&config).await?;
        let result = action(SqlCounterRepository::new(pool.clone())).await;
        pool.close().await;
        result
    })
}
