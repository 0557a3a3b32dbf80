use async_trait::async_trait;
use thiserror::Error;

use affilink_core::domain::link::{AffiliateLink, AffiliateLinkId};
use affilink_core::domain::product::{Product, ProductId};
use affilink_core::errors::{ApplicationError, DomainError};
use affilink_core::subids::CounterState;

pub mod counters;
pub mod links;
pub mod memory;
pub mod product;

pub use counters::SqlCounterRepository;
pub use links::SqlLinkRepository;
pub use memory::{InMemoryCounterRepository, InMemoryLinkRepository, InMemoryProductRepository};
pub use product::SqlProductRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

impl From<RepositoryError> for ApplicationError {
    fn from(error: RepositoryError) -> Self {
        ApplicationError::Persistence(error.to_string())
    }
}

/// Durable home of the sub-id sequence counters.
#[async_trait]
pub trait CounterRepository: Send + Sync {
    /// Returns the stored state, or the initial state when nothing was saved yet.
    async fn load(&self) -> Result<CounterState, RepositoryError>;
    /// Replaces the stored state as a whole.
    async fn save(&self, state: &CounterState) -> Result<(), RepositoryError>;
    /// Runs `issue` against the stored state and stores the state it returns,
    /// with no other writer in between. Nothing is stored when `issue` fails.
    async fn issue<T, F>(&self, issue: F) -> Result<T, ApplicationError>
    where
        T: Send,
        F: FnOnce(&CounterState) -> Result<(T, CounterState), DomainError> + Send;
}

#[async_trait]
pub trait LinkRepository: Send + Sync {
    async fn find_by_id(
        &self,
        id: &AffiliateLinkId,
    ) -> Result<Option<AffiliateLink>, RepositoryError>;
    async fn save(&self, link: AffiliateLink) -> Result<(), RepositoryError>;
    /// Newest first.
    async fn list_recent(&self, limit: u32) -> Result<Vec<AffiliateLink>, RepositoryError>;
}

#[async_trait]
pub trait ProductRepository: Send + Sync {
    async fn find_by_id(&self, id: &ProductId) -> Result<Option<Product>, RepositoryError>;
    async fn save(&self, product: Product) -> Result<(), RepositoryError>;
    async fn list_all(&self) -> Result<Vec<Product>, RepositoryError>;
}
