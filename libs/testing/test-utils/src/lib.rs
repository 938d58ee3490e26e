//! Shared test utilities for domain testing
//!
//! This crate provides reusable test infrastructure for the domain crates:
//! - `TestDatabase`: pgvector PostgreSQL container with the embeddings and
//!   `sites` tables created (feature: "postgres")
//! - `TestRedis`: Redis container with automatic cleanup (feature: "redis")
//! - `TestDataBuilder`: Deterministic test data generation (always available)
//!
//! # Features
//!
//! - `postgres` (default): Enables PostgreSQL test infrastructure
//! - `redis`: Enables Redis test infrastructure
//! - `all`: Enables all database test infrastructure
//!
//! # Usage
//!
//! ```rust,no_run
//! use test_utils::{TestDatabase, TestDataBuilder};
//!
//! #[tokio::test]
//! async fn my_postgres_test() {
//!     let db = TestDatabase::new().await;
//!     let builder = TestDataBuilder::from_test_name("my_test");
//!
//!     let site_id = builder.site_id("main");
//!     db.create_site(site_id, &builder.api_key("main")).await;
//! }
//! ```
//!
//! ## Redis Testing
//!
//! Add `features = ["redis"]` to your dev-dependencies:
//!
//! ```toml
//! [dev-dependencies]
//! test-utils = { workspace = true, features = ["redis"] }
//! ```

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use uuid::Uuid;

#[cfg(feature = "postgres")]
mod postgres;

#[cfg(feature = "redis")]
mod redis;

#[cfg(feature = "postgres")]
pub use postgres::{TEST_DIMENSION, TEST_TABLE, TestDatabase};

#[cfg(feature = "redis")]
pub use redis::TestRedis;

/// Builder for test data with deterministic randomization
///
/// This ensures tests are reproducible by using seeded random data.
pub struct TestDataBuilder {
    seed: u64,
}

impl TestDataBuilder {
    /// Create a new builder with a seed (for deterministic tests)
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }

    /// Create from test name (generates seed from test name hash)
    ///
    /// This is the recommended way to create a builder for consistent test data.
    ///
    /// # Example
    ///
    /// ```
    /// use test_utils::TestDataBuilder;
    ///
    /// let builder = TestDataBuilder::from_test_name("test_create_resource");
    /// ```
    pub fn from_test_name(name: &str) -> Self {
        let mut hasher = DefaultHasher::new();
        name.hash(&mut hasher);
        Self::new(hasher.finish())
    }

    /// Deterministic site id; different `suffix`es give different sites
    pub fn site_id(&self, suffix: &str) -> Uuid {
        let mut hasher = DefaultHasher::new();
        (self.seed, suffix).hash(&mut hasher);
        let low = hasher.finish();
        let mut uuid_bytes = [0u8; 16];
        uuid_bytes[..8].copy_from_slice(&self.seed.to_le_bytes());
        uuid_bytes[8..16].copy_from_slice(&low.to_le_bytes());
        Uuid::from_bytes(uuid_bytes)
    }

    /// API key for the site created with the same `suffix`
    pub fn api_key(&self, suffix: &str) -> String {
        format!("test-key-{}-{}", self.seed, suffix)
    }

    /// Generate a unique name for testing
    ///
    /// # Example
    ///
    /// ```
    /// use test_utils::TestDataBuilder;
    ///
    /// let builder = TestDataBuilder::from_test_name("my_test");
    /// let name = builder.name("doc", "main");
    /// // Returns: "test-doc-12345-main"
    /// ```
    pub fn name(&self, prefix: &str, suffix: &str) -> String {
        format!("test-{}-{}-{}", prefix, self.seed, suffix)
    }

    /// Unit-length embedding pointing along `axis` (modulo `dimension`)
    pub fn axis_embedding(&self, axis: usize, dimension: usize) -> Vec<f32> {
        let mut embedding = vec![0.0; dimension];
        embedding[axis % dimension] = 1.0;
        embedding
    }
}
