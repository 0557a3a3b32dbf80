use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::SqliteConnection;
use sqlx::Row;

use affilink_core::errors::{ApplicationError, DomainError};
use affilink_core::subids::{CounterScope, CounterState, FIRST_COUNTER_VALUE};

use super::{CounterRepository, RepositoryError};
use crate::connection::{begin_immediate, finish_immediate};
use crate::DbPool;

/// Counters stored one row per scope (`global`, `category:ELE`, ...).
pub struct SqlCounterRepository {
    pool: DbPool,
}

impl SqlCounterRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn to_i64(value: u64) -> Result<i64, RepositoryError> {
    i64::try_from(value)
        .map_err(|_| RepositoryError::Decode(format!("counter value {value} is out of range")))
}

pub(crate) async fn load_state(conn: &mut SqliteConnection) -> Result<CounterState, RepositoryError> {
    let rows = sqlx::query("SELECT scope, next_value FROM subid_counter")
        .fetch_all(&mut *conn)
        .await?;

    let mut state = CounterState::default();
    for row in rows {
        let scope: String = row.try_get("scope")?;
        let next_value: i64 = row.try_get("next_value")?;
        let next_value = u64::try_from(next_value)
            .map_err(|_| RepositoryError::Decode(format!("negative counter for scope `{scope}`")))?
            .max(FIRST_COUNTER_VALUE);

        match scope.parse::<CounterScope>() {
            Ok(CounterScope::Global) => state.global = next_value,
            Ok(CounterScope::Category(sigla)) => {
                state.categories.insert(sigla, next_value);
            }
            Err(error) => {
                return Err(RepositoryError::Decode(format!(
                    "invalid counter scope `{scope}`: {error}"
                )))
            }
        }
    }

    Ok(state)
}

/// Replaces every stored scope. Runs inside the caller's transaction.
pub(crate) async fn save_state(
    conn: &mut SqliteConnection,
    state: &CounterState,
) -> Result<(), RepositoryError> {
    let now = Utc::now().to_rfc3339();
    sqlx::query("DELETE FROM subid_counter").execute(&mut *conn).await?;

    let scopes = std::iter::once((CounterScope::Global, state.global)).chain(
        state.categories.iter().map(|(sigla, value)| (CounterScope::Category(sigla.clone()), *value)),
    );

    for (scope, value) in scopes {
        sqlx::query("INSERT INTO subid_counter (scope, next_value, updated_at) VALUES (?, ?, ?)")
            .bind(scope.to_string())
            .bind(to_i64(value.max(FIRST_COUNTER_VALUE))?)
            .bind(&now)
            .execute(&mut *conn)
            .await?;
    }

    tracing::debug!(
        event_name = "db.counters.saved",
        global = state.global,
        categories = state.categories.len(),
        "sub-id counters persisted"
    );

    Ok(())
}

async fn issue_within<T, F>(conn: &mut SqliteConnection, issue: F) -> Result<T, ApplicationError>
where
    F: FnOnce(&CounterState) -> Result<(T, CounterState), DomainError>,
{
    let current = load_state(conn).await?;
    let (issued, next) = issue(&current)?;
    save_state(conn, &next).await?;
    Ok(issued)
}

#[async_trait]
impl CounterRepository for SqlCounterRepository {
    async fn load(&self) -> Result<CounterState, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        load_state(&mut conn).await
    }

    async fn save(&self, state: &CounterState) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;
        save_state(&mut tx, state).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn issue<T, F>(&self, issue: F) -> Result<T, ApplicationError>
    where
        T: Send,
        F: FnOnce(&CounterState) -> Result<(T, CounterState), DomainError> + Send,
    {
        let mut conn = begin_immediate(&self.pool).await.map_err(RepositoryError::from)?;
        let result = issue_within(&mut conn, issue).await;
        finish_immediate(&mut conn, result).await
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use affilink_core::domain::category::CategoryInfo;
    use affilink_core::domain::product::Product;
    use affilink_core::errors::{ApplicationError, DomainError};
    use affilink_core::subids::{CounterScope, CounterState, SubIdEngine, SubIdTemplate};

    use super::SqlCounterRepository;
    use crate::repositories::CounterRepository;
    use crate::{connect, connect_with_settings, migrations};

    async fn repository() -> SqlCounterRepository {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        SqlCounterRepository::new(pool)
    }

    #[tokio::test]
    async fn empty_store_loads_initial_state() {
        let repo = repository().await;

        let state = repo.load().await.expect("load");

        assert_eq!(state, CounterState::default());
    }

    #[tokio::test]
    async fn saved_state_round_trips_and_replaces_previous_rows() {
        let repo = repository().await;
        let (_, state) = CounterState::default().next_global_counter();
        let (_, state) = state.next_category_counter("ELE");
        let (_, state) = state.next_category_counter("MFE");
        repo.save(&state).await.expect("save");

        let reset = state.reset(&CounterScope::Category("MFE".to_string()));
        let (_, reset) = reset.next_global_counter();
        repo.save(&reset).await.expect("save again");

        let loaded = repo.load().await.expect("load");
        assert_eq!(loaded, reset);
        assert_eq!(loaded.global, 3);
        assert_eq!(loaded.peek_category("ELE"), 2);
        assert_eq!(loaded.peek_category("MFE"), 1);
    }

    #[tokio::test]
    async fn rejected_issue_leaves_stored_counters_untouched() {
        let repo = repository().await;
        let (_, state) = CounterState::default().next_global_counter();
        repo.save(&state).await.expect("save");

        let error = repo
            .issue(|_: &CounterState| {
                Err::<((), CounterState), _>(DomainError::Validation {
                    errors: vec!["s5 is wrong".to_string()],
                })
            })
            .await
            .expect_err("rejected");

        assert!(matches!(error, ApplicationError::Domain(DomainError::Validation { .. })));
        assert_eq!(repo.load().await.expect("load"), state);
    }

    #[tokio::test]
    async fn two_repositories_on_one_database_never_issue_the_same_codes() {
        let dir = tempfile::tempdir().expect("temp dir");
        let url = format!("sqlite://{}?mode=rwc", dir.path().join("counters.db").display());
        let first_pool = connect(&url).await.expect("connect first");
        migrations::run_pending(&first_pool).await.expect("migrations");
        let second_pool = connect(&url).await.expect("connect second");

        let engine = SubIdEngine::new(SubIdTemplate::default()).expect("engine");
        let info = CategoryInfo::new("Eletrônicos", "ELE");
        let subject = Product {
            category_name: Some("Eletrônicos".to_string()),
            ..Product::default()
        };

        let mut tasks = Vec::new();
        for pool in [first_pool.clone(), second_pool.clone()] {
            for _ in 0..5 {
                let repo = SqlCounterRepository::new(pool.clone());
                let engine = engine.clone();
                let info = info.clone();
                let subject = subject.clone();
                tasks.push(tokio::spawn(async move {
                    repo.issue(|current: &CounterState| {
                        engine.generate_sub_ids(&subject, &info, current)
                    })
                    .await
                }));
            }
        }

        let mut product_codes = HashSet::new();
        let mut category_codes = HashSet::new();
        for task in tasks {
            let sub_ids = task.await.expect("join").expect("issue");
            assert!(product_codes.insert(sub_ids.s4.clone()), "duplicate {}", sub_ids.s4);
            assert!(category_codes.insert(sub_ids.s5.clone()), "duplicate {}", sub_ids.s5);
        }

        let stored = SqlCounterRepository::new(second_pool).load().await.expect("load");
        assert_eq!(stored.peek_global(), 11);
        assert_eq!(stored.peek_category("ELE"), 11);
        assert!(product_codes.contains("SM00010"));
    }
}
