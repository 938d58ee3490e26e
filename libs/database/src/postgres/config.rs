use sea_orm::ConnectOptions;
use std::time::Duration;
use tracing::log::LevelFilter;

#[cfg(feature = "config")]
use core_config::{env_optional, env_parse, env_required, ConfigError};

use super::uri::ConnectionInfo;
use crate::common::DatabaseResult;

/// PostgreSQL connection pool configuration
///
/// # Example
///
/// ```ignore
/// use database::postgres::PostgresConfig;
///
/// let config = PostgresConfig::new("postgresql://user:p@ss@localhost/db")?;
///
/// // From VECTOR_DB_URL, VECTOR_DB_MAX_CONNECTIONS, ... (requires `config` feature)
/// let config = PostgresConfig::from_env_with_prefix("VECTOR_DB")?;
/// ```
#[derive(Clone, Debug)]
pub struct PostgresConfig {
    pub connection: ConnectionInfo,

    /// Maximum number of connections in the pool
    pub max_connections: u32,

    /// Minimum number of connections in the pool
    pub min_connections: u32,

    /// Connection timeout in seconds
    pub connect_timeout_secs: u64,

    /// Connection acquire timeout in seconds
    pub acquire_timeout_secs: u64,

    /// Connection idle timeout in seconds
    pub idle_timeout_secs: u64,

    /// Connection max lifetime in seconds
    pub max_lifetime_secs: u64,

    /// Enable SQL statement logging
    pub sqlx_logging: bool,

    /// SQL logging level
    pub sqlx_logging_level: LevelFilter,
}

impl PostgresConfig {
    /// Parse `url` and apply the default pool settings (1..=10 connections)
    pub fn new(url: &str) -> DatabaseResult<Self> {
        Ok(Self::from_connection(ConnectionInfo::parse(url)?))
    }

    pub fn from_connection(connection: ConnectionInfo) -> Self {
        Self {
            connection,
            max_connections: 10,
            min_connections: 1,
            connect_timeout_secs: 8,
            acquire_timeout_secs: 8,
            idle_timeout_secs: 300,
            max_lifetime_secs: 1800,
            sqlx_logging: false,
            sqlx_logging_level: LevelFilter::Debug,
        }
    }

    pub fn with_pool_size(mut self, min_connections: u32, max_connections: u32) -> Self {
        self.min_connections = min_connections;
        self.max_connections = max_connections;
        self
    }

    /// Convert this config into SeaORM ConnectOptions
    pub fn connect_options(&self) -> ConnectOptions {
        let mut opt = ConnectOptions::new(self.connection.to_url());
        opt.max_connections(self.max_connections)
            .min_connections(self.min_connections)
            .connect_timeout(Duration::from_secs(self.connect_timeout_secs))
            .acquire_timeout(Duration::from_secs(self.acquire_timeout_secs))
            .idle_timeout(Duration::from_secs(self.idle_timeout_secs))
            .max_lifetime(Duration::from_secs(self.max_lifetime_secs))
            .sqlx_logging(self.sqlx_logging)
            .sqlx_logging_level(self.sqlx_logging_level);
        opt
    }

    /// Load the configuration from `{PREFIX}_*` environment variables
    ///
    /// - `{PREFIX}_URL` (required) - connection descriptor
    /// - `{PREFIX}_PASSWORD` (optional) - overrides the password in the URL
    /// - `{PREFIX}_MIN_CONNECTIONS` (default: 1)
    /// - `{PREFIX}_MAX_CONNECTIONS` (default: 10)
    /// - `{PREFIX}_CONNECT_TIMEOUT_SECS` (default: 8)
    /// - `{PREFIX}_ACQUIRE_TIMEOUT_SECS` (default: 8)
    /// - `{PREFIX}_IDLE_TIMEOUT_SECS` (default: 300)
    /// - `{PREFIX}_SQL_LOGGING` (default: false)
    #[cfg(feature = "config")]
    pub fn from_env_with_prefix(prefix: &str) -> Result<Self, ConfigError> {
        let url_key = format!("{prefix}_URL");
        let url = env_required(&url_key)?;

        let mut connection = ConnectionInfo::parse(&url).map_err(|e| ConfigError::Invalid {
            key: url_key.clone(),
            details: e.to_string(),
        })?;
        if let Some(password) = env_optional(&format!("{prefix}_PASSWORD")) {
            connection = connection.with_password(password);
        }

        let defaults = Self::from_connection(connection);
        let config = Self {
            min_connections: env_parse(&format!("{prefix}_MIN_CONNECTIONS"), defaults.min_connections)?,
            max_connections: env_parse(&format!("{prefix}_MAX_CONNECTIONS"), defaults.max_connections)?,
            connect_timeout_secs: env_parse(
                &format!("{prefix}_CONNECT_TIMEOUT_SECS"),
                defaults.connect_timeout_secs,
            )?,
            acquire_timeout_secs: env_parse(
                &format!("{prefix}_ACQUIRE_TIMEOUT_SECS"),
                defaults.acquire_timeout_secs,
            )?,
            idle_timeout_secs: env_parse(
                &format!("{prefix}_IDLE_TIMEOUT_SECS"),
                defaults.idle_timeout_secs,
            )?,
            sqlx_logging: env_parse(&format!("{prefix}_SQL_LOGGING"), defaults.sqlx_logging)?,
            ..defaults
        };

        if config.min_connections > config.max_connections {
            return Err(ConfigError::Invalid {
                key: format!("{prefix}_MIN_CONNECTIONS"),
                details: format!(
                    "min_connections ({}) exceeds max_connections ({})",
                    config.min_connections, config.max_connections
                ),
            });
        }

        Ok(config)
    }
}
