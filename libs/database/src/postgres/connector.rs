use async_trait::async_trait;
use sea_orm::{
    ConnectionTrait, Database, DatabaseConnection, DbBackend, FromQueryResult, Statement,
};
use tracing::{info, warn};

use super::PostgresConfig;
use crate::common::{DatabaseError, DatabaseResult};

/// Performs the connection handshake for a [`PoolManager`](super::PoolManager).
///
/// `connect` must leave nothing behind on failure: the manager discards the
/// attempt and a later caller starts over from scratch.
#[async_trait]
pub trait PoolConnector: Send + Sync + 'static {
    type Pool: Clone + Send + Sync + 'static;

    /// Open a pool and verify server capabilities
    async fn connect(&self) -> DatabaseResult<Self::Pool>;

    /// Release every pooled connection
    async fn close(&self, pool: Self::Pool) -> DatabaseResult<()>;

    /// Human readable target for logs, never containing credentials
    fn describe(&self) -> String;
}

#[derive(Debug, FromQueryResult)]
struct ExtensionRow {
    installed: bool,
}

/// Check whether the `vector` extension is installed in the connected database
pub async fn vector_extension_installed(db: &DatabaseConnection) -> DatabaseResult<bool> {
    let row = ExtensionRow::find_by_statement(Statement::from_string(
        DbBackend::Postgres,
        "SELECT EXISTS (SELECT 1 FROM pg_extension WHERE extname = 'vector') AS installed",
    ))
    .one(db)
    .await?;

    Ok(row.map(|r| r.installed).unwrap_or(false))
}

/// SeaORM-backed connector for PostgreSQL with pgvector
#[derive(Clone, Debug)]
pub struct PgConnector {
    config: PostgresConfig,
}

impl PgConnector {
    pub fn new(config: PostgresConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PostgresConfig {
        &self.config
    }

    fn validate(&self) -> DatabaseResult<()> {
        let connection = &self.config.connection;
        if connection.username.is_none() {
            return Err(DatabaseError::ConfigError(
                "missing username in PostgreSQL configuration".to_string(),
            ));
        }
        if connection.password.is_none() {
            return Err(DatabaseError::ConfigError(
                "missing password in PostgreSQL configuration".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl PoolConnector for PgConnector {
    type Pool = DatabaseConnection;

    async fn connect(&self) -> DatabaseResult<DatabaseConnection> {
        self.validate()?;

        info!(
            target_db = %self.config.connection.redacted(),
            user = self.config.connection.username.as_deref().unwrap_or_default(),
            min = self.config.min_connections,
            max = self.config.max_connections,
            "Opening PostgreSQL connection pool"
        );

        let db = Database::connect(self.config.connect_options()).await?;

        match vector_extension_installed(&db).await {
            Ok(true) => {}
            Ok(false) => warn!("pgvector extension not found in the database"),
            Err(e) => {
                // Do not leak the freshly opened pool when the handshake fails.
                if let Err(close_err) = db.close().await {
                    warn!(error = %close_err, "Failed to close pool after handshake failure");
                }
                return Err(e);
            }
        }

        info!("PostgreSQL connection pool initialized");
        Ok(db)
    }

    async fn close(&self, pool: DatabaseConnection) -> DatabaseResult<()> {
        pool.close().await?;
        info!(target_db = %self.config.connection.redacted(), "PostgreSQL connection pool closed");
        Ok(())
    }

    fn describe(&self) -> String {
        self.config.connection.redacted()
    }
}
