use async_trait::async_trait;

use crate::error::VectorResult;

/// Turns query text into an embedding vector
///
/// The vector store never computes embeddings itself; searches await this
/// before touching the database.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Model identifier, for logs
    fn model(&self) -> &str;

    /// Generate embedding for a single text
    async fn embed(&self, text: &str) -> VectorResult<Vec<f32>>;
}
