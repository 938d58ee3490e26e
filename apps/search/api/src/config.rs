use axum_helpers::AppInfo;
use core_config::{FromEnv, server::ServerConfig};
use database::redis::RedisConfig;
use domain_auth::MainDbConfig;

pub use core_config::Environment;

/// Application-specific configuration
///
/// The vector store and embedding provider read their own variables
/// (`VECTOR_DB_*`, `VECTOR_*`, `OPENAI_*`).
#[derive(Clone, Debug)]
pub struct Config {
    pub app: AppInfo,
    pub server: ServerConfig,
    pub environment: Environment,
    /// Database holding the `sites` table with API keys
    pub main_db: MainDbConfig,
    /// Shared ticket store; tickets live in process memory when unset
    pub redis: Option<RedisConfig>,
}

impl Config {
    pub fn from_env() -> eyre::Result<Self> {
        let environment = Environment::from_env();
        let server = ServerConfig::from_env()?; // HOST=0.0.0.0, PORT=8080
        let main_db = MainDbConfig::from_env()?; // Required

        Ok(Self {
            app: AppInfo::new(env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION")),
            server,
            environment,
            main_db,
            redis: RedisConfig::discover(),
        })
    }
}
