pub mod connection;
pub mod migrations;
pub mod repositories;

pub use connection::{connect, connect_with_config, connect_with_settings, DbPool};
pub use repositories::{
    CounterRepository, InMemoryCounterRepository, InMemoryLinkRepository,
    InMemoryProductRepository, LinkRepository, ProductRepository, RepositoryError,
    SqlCounterRepository, SqlLinkRepository, SqlProductRepository,
};
