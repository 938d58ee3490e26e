//! API key to identity lookup

use std::sync::Arc;

use async_trait::async_trait;
use core_config::{ConfigError, FromEnv, env_parse, env_required};
use database::postgres::{
    ConnectionInfo, DEFAULT_PORT, PgConnector, PoolConnector, PoolManager, PostgresConfig,
    RetryExecutor,
};
use database::{DatabaseError, RetryConfig};
use sea_orm::{DatabaseConnection, DbBackend, FromQueryResult, Statement};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::AuthResult;
use crate::identity::Identity;

/// Resolves an API key to the identity it belongs to.
///
/// `Ok(None)` means the key is unknown; errors mean the lookup itself failed.
#[cfg_attr(any(test, feature = "mocks"), mockall::automock)]
#[async_trait]
pub trait CredentialResolver: Send + Sync {
    async fn resolve(&self, api_key: &str) -> AuthResult<Option<Identity>>;
}

/// Connection settings of the main application database (the `sites` table)
///
/// Loaded from `MAIN_DB_HOST`, `MAIN_DB_NAME`, `MAIN_DB_USER`,
/// `MAIN_DB_PASSWORD` (all required) and `MAIN_DB_PORT` (default 5432).
#[derive(Clone)]
pub struct MainDbConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
    pub password: String,
}

impl std::fmt::Debug for MainDbConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MainDbConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"***")
            .finish()
    }
}

impl MainDbConfig {
    pub fn postgres_config(&self) -> PostgresConfig {
        PostgresConfig::from_connection(ConnectionInfo {
            host: self.host.clone(),
            port: self.port,
            database: self.database.clone(),
            username: Some(self.user.clone()),
            password: Some(self.password.clone()),
            params: None,
        })
    }
}

impl FromEnv for MainDbConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            host: env_required("MAIN_DB_HOST")?,
            port: env_parse("MAIN_DB_PORT", DEFAULT_PORT)?,
            database: env_required("MAIN_DB_NAME")?,
            user: env_required("MAIN_DB_USER")?,
            password: env_required("MAIN_DB_PASSWORD")?,
        })
    }
}

#[derive(Debug, FromQueryResult)]
struct SiteRow {
    site_id: Uuid,
}

/// Looks API keys up in the `sites` table
pub struct PgCredentialResolver<C = PgConnector>
where
    C: PoolConnector<Pool = DatabaseConnection>,
{
    executor: RetryExecutor<C>,
}

impl PgCredentialResolver<PgConnector> {
    /// Lazily connecting resolver for `config`
    pub fn connect_lazy(config: &MainDbConfig) -> Self {
        info!(host = %config.host, database = %config.database, "Creating main database pool");
        let pool = database::postgres::pool_manager(config.postgres_config());
        Self::new(Arc::new(pool), RetryConfig::default())
    }
}

impl<C> PgCredentialResolver<C>
where
    C: PoolConnector<Pool = DatabaseConnection>,
{
    pub fn new(pool: Arc<PoolManager<C>>, retry: RetryConfig) -> Self {
        Self {
            executor: RetryExecutor::new(pool, retry),
        }
    }

    pub async fn close(&self) -> AuthResult<()> {
        self.executor.pool_manager().close().await?;
        info!("Main database pool closed");
        Ok(())
    }
}

#[async_trait]
impl<C> CredentialResolver for PgCredentialResolver<C>
where
    C: PoolConnector<Pool = DatabaseConnection>,
{
    async fn resolve(&self, api_key: &str) -> AuthResult<Option<Identity>> {
        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            "SELECT site_id FROM sites WHERE api_key = $1",
            [api_key.into()],
        );

        let row = self
            .executor
            .run("resolve_api_key", |db| {
                let stmt = stmt.clone();
                async move {
                    SiteRow::find_by_statement(stmt)
                        .one(&db)
                        .await
                        .map_err(DatabaseError::from)
                }
            })
            .await?;

        if row.is_none() {
            debug!("API key did not match any site");
        }
        Ok(row.map(|r| Identity::new(r.site_id)))
    }
}
