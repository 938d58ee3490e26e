//! Redis connection helpers

mod config;
mod connector;
mod health;

pub use config::RedisConfig;
pub use connector::{connect, connect_with_retry};
pub use health::check_health;

// Re-export redis types for convenience
pub use redis::aio::ConnectionManager;
pub use redis::{AsyncCommands, Client, RedisResult};
