use redis::Client;
use redis::aio::ConnectionManager;
use tracing::info;

use super::RedisConfig;
use crate::common::{RetryConfig, retry_if};

/// Connect to Redis and return a ConnectionManager
///
/// The ConnectionManager reconnects on its own after connection failures.
/// The initial connection is verified with `PING`.
pub async fn connect(url: &str) -> redis::RedisResult<ConnectionManager> {
    let client = Client::open(url)?;
    let manager = ConnectionManager::new(client).await?;

    let mut conn = manager.clone();
    let _: String = redis::cmd("PING").query_async(&mut conn).await?;

    info!("Successfully connected to Redis");
    Ok(manager)
}

/// Connect with exponential backoff (defaults to 3 retries from 100ms).
///
/// Only connectivity failures are retried; a malformed URL fails at once.
pub async fn connect_with_retry(
    config: &RedisConfig,
    retry_config: Option<RetryConfig>,
) -> redis::RedisResult<ConnectionManager> {
    let url = config.url.clone();
    retry_if(
        || connect(&url),
        retry_config.unwrap_or_default(),
        is_connectivity_error,
    )
    .await
}

fn is_connectivity_error(err: &redis::RedisError) -> bool {
    err.is_io_error() || err.is_timeout() || err.is_connection_refusal() || err.is_connection_dropped()
}
