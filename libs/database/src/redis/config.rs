#[cfg(feature = "config")]
use core_config::{env_optional, ConfigError, FromEnv};

/// Redis connection settings
///
/// # Example
///
/// ```ignore
/// use database::redis::RedisConfig;
///
/// let config = RedisConfig::new("redis://127.0.0.1:6379");
///
/// // REDIS_URL, or LOCALSTACK_HOSTNAME for local stacks (requires `config` feature)
/// let config = RedisConfig::from_env()?;
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RedisConfig {
    pub url: String,
}

impl RedisConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    /// Redis inside a LocalStack-style sidecar on the default port
    pub fn for_local_host(hostname: &str) -> Self {
        Self::new(format!("redis://{hostname}:6379"))
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Resolve the endpoint from the environment, if one is configured.
    ///
    /// `REDIS_URL` wins; otherwise `LOCALSTACK_HOSTNAME` yields
    /// `redis://$LOCALSTACK_HOSTNAME:6379`.
    #[cfg(feature = "config")]
    pub fn discover() -> Option<Self> {
        env_optional("REDIS_URL")
            .map(Self::new)
            .or_else(|| env_optional("LOCALSTACK_HOSTNAME").map(|host| Self::for_local_host(&host)))
    }
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self::new("redis://127.0.0.1:6379")
    }
}

#[cfg(feature = "config")]
impl FromEnv for RedisConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Self::discover()
            .ok_or_else(|| ConfigError::MissingEnvVar("REDIS_URL or LOCALSTACK_HOSTNAME".to_string()))
    }
}
