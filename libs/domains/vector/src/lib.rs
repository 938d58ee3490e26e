//! Vector Domain Library
//!
//! Site-scoped document storage and similarity search on PostgreSQL with the
//! `pgvector` extension.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────┐
//! │ VectorStoreClient │  ← facade used by handlers and binaries
//! └─────────┬─────────┘
//!           │
//! ┌─────────▼─────────┐     ┌────────────────────────┐
//! │ BatchUpsertEngine │     │ SimilaritySearchEngine │──► EmbeddingProvider
//! └─────────┬─────────┘     └───────────┬────────────┘
//!           └──────────┬────────────────┘
//!            ┌─────────▼─────────┐
//!            │   RetryExecutor   │  (database crate)
//!            └─────────┬─────────┘
//!            ┌─────────▼─────────┐
//!            │    PoolManager    │
//!            └───────────────────┘
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use domain_vector::{OpenAIProvider, SiteScope, VectorStoreClient};
//!
//! let provider = Arc::new(OpenAIProvider::from_env()?);
//! let client = VectorStoreClient::from_env(provider)?;
//!
//! let results = client.search("apple pie recipe", SiteScope::All).await?;
//! for result in results {
//!     println!("{} ({:.3})", result.name, result.distance);
//! }
//! ```

pub mod client;
pub mod config;
pub mod diagnostics;
pub mod embedding;
pub mod error;
pub mod handlers;
pub mod models;
pub mod search;
pub mod upsert;

#[cfg(test)]
mod testing;

pub use client::{ENV_PREFIX, VectorStoreClient};
pub use config::VectorStoreConfig;
pub use diagnostics::{ConnectionDiagnostics, ConnectionSummary, SchemaReport};
pub use embedding::{EmbeddingProvider, OpenAIConfig, OpenAIProvider};
pub use error::{VectorError, VectorResult};
pub use handlers::{VectorApiDoc, router};
pub use models::{
    DistanceMetric, Document, DocumentInput, DocumentMatch, SimilarityResult, SiteScope,
};
pub use search::SimilaritySearchEngine;
pub use upsert::BatchUpsertEngine;
