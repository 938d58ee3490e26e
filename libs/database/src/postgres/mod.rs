//! PostgreSQL connection management
//!
//! Descriptor parsing, the lazily opened [`PoolManager`], the retrying
//! [`RetryExecutor`] and health checks.

mod config;
mod connector;
mod executor;
mod health;
mod pool;
mod uri;

pub use config::PostgresConfig;
pub use connector::{PgConnector, PoolConnector, vector_extension_installed};
pub use executor::RetryExecutor;
pub use health::check_health;
pub use pool::{PoolManager, PoolStatus};
pub use uri::{ConnectionInfo, DEFAULT_PORT};

// Re-export SeaORM types for convenience
pub use sea_orm::{ConnectOptions, DatabaseConnection, DbErr};

/// Pool manager for the default SeaORM connector
pub type PgPoolManager = PoolManager<PgConnector>;

/// Build a pool manager for `config`. Nothing connects until first use.
pub fn pool_manager(config: PostgresConfig) -> PgPoolManager {
    PoolManager::new(PgConnector::new(config))
}
