use std::time::Duration;

use affilink_core::config::DatabaseConfig;
use sqlx::pool::PoolConnection;
use sqlx::sqlite::{SqliteConnection, SqlitePoolOptions};
use sqlx::Sqlite;

use crate::repositories::RepositoryError;

pub type DbPool = sqlx::SqlitePool;

pub async fn connect(database_url: &str) -> Result<DbPool, sqlx::Error> {
    connect_with_settings(database_url, 5, 30).await
}

pub async fn connect_with_config(config: &DatabaseConfig) -> Result<DbPool, sqlx::Error> {
    connect_with_settings(&config.url, config.max_connections, config.timeout_secs).await
}

pub async fn connect_with_settings(
    database_url: &str,
    max_connections: u32,
    timeout_secs: u64,
) -> Result<DbPool, sqlx::Error> {
    // Every connection to an in-memory database opens a separate database.
    let max_connections =
        if is_in_memory(database_url) { 1 } else { max_connections.max(1) };

    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(timeout_secs.max(1)))
        .after_connect(|conn, _meta| {
            Box::pin(async move {
                sqlx::query("PRAGMA foreign_keys = ON").execute(&mut *conn).await?;
                sqlx::query("PRAGMA journal_mode = WAL").execute(&mut *conn).await?;
                sqlx::query("PRAGMA busy_timeout = 5000").execute(&mut *conn).await?;
                Ok(())
            })
        })
        .connect(database_url)
        .await?;

    tracing::debug!(
        event_name = "db.pool.connected",
        max_connections,
        "database pool ready"
    );

    Ok(pool)
}

/// Opens a transaction that holds the database write lock from its first
/// statement. Other writers wait for it up to `busy_timeout`.
pub(crate) async fn begin_immediate(pool: &DbPool) -> Result<PoolConnection<Sqlite>, sqlx::Error> {
    let mut conn = pool.acquire().await?;
    sqlx::query("BEGIN IMMEDIATE").execute(&mut *conn).await?;
    Ok(conn)
}

/// Commits the transaction opened by [`begin_immediate`] when `result` is
/// `Ok`, and rolls it back otherwise.
pub(crate) async fn finish_immediate<T, E>(
    conn: &mut SqliteConnection,
    result: Result<T, E>,
) -> Result<T, E>
where
    E: From<RepositoryError>,
{
    match result {
        Ok(value) => match sqlx::query("COMMIT").execute(&mut *conn).await {
            Ok(_) => Ok(value),
            Err(error) => {
                rollback(conn).await;
                Err(RepositoryError::from(error).into())
            }
        },
        Err(error) => {
            rollback(conn).await;
            Err(error)
        }
    }
}

async fn rollback(conn: &mut SqliteConnection) {
    if let Err(error) = sqlx::query("ROLLBACK").execute(&mut *conn).await {
        tracing::warn!(
            event_name = "db.transaction.rollback_failed",
            error = %error,
            "transaction rollback failed"
        );
    }
}

fn is_in_memory(database_url: &str) -> bool {
    database_url.contains(":memory:") || database_url.contains("mode=memory")
}
