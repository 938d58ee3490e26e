use async_trait::async_trait;
use core_config::{ConfigError, FromEnv, env_optional, env_parse_optional, env_required};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::EmbeddingProvider;
use crate::error::{VectorError, VectorResult};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "text-embedding-3-small";

/// OpenAI-compatible embedding endpoint configuration
#[derive(Clone)]
pub struct OpenAIConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    /// Requested output size for models that support shortening
    pub dimensions: Option<u32>,
}

impl std::fmt::Debug for OpenAIConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAIConfig")
            .field("api_key", &"***")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("dimensions", &self.dimensions)
            .finish()
    }
}

impl OpenAIConfig {
    pub fn new(api_key: String) -> Self {
        Self {
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            dimensions: None,
        }
    }

    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_model(mut self, model: String) -> Self {
        self.model = model;
        self
    }

    pub fn with_dimensions(mut self, dimensions: u32) -> Self {
        self.dimensions = Some(dimensions);
        self
    }
}

impl FromEnv for OpenAIConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::new(env_required("OPENAI_API_KEY")?);

        if let Some(base_url) = env_optional("OPENAI_BASE_URL") {
            config = config.with_base_url(base_url);
        }
        if let Some(model) = env_optional("EMBEDDING_MODEL") {
            config = config.with_model(model);
        }
        config.dimensions = env_parse_optional("EMBEDDING_DIMENSIONS")?;

        Ok(config)
    }
}

/// OpenAI embeddings provider
pub struct OpenAIProvider {
    client: Client,
    config: OpenAIConfig,
}

impl OpenAIProvider {
    pub fn new(config: OpenAIConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    pub fn from_env() -> VectorResult<Self> {
        Ok(Self::new(OpenAIConfig::from_env()?))
    }

    fn request<'a>(&'a self, text: &'a str) -> EmbeddingRequest<'a> {
        EmbeddingRequest {
            model: &self.config.model,
            input: vec![text],
            dimensions: self.config.dimensions,
        }
    }
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: Vec<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}

impl EmbeddingResponse {
    /// First embedding by index; providers may return entries out of order
    fn into_first(self) -> VectorResult<Vec<f32>> {
        self.data
            .into_iter()
            .min_by_key(|d| d.index)
            .map(|d| d.embedding)
            .filter(|e| !e.is_empty())
            .ok_or_else(|| VectorError::Embedding("No embedding returned".to_string()))
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAIProvider {
    fn model(&self) -> &str {
        &self.config.model
    }

    async fn embed(&self, text: &str) -> VectorResult<Vec<f32>> {
        let response = self
            .client
            .post(format!("{}/embeddings", self.config.base_url))
            .bearer_auth(&self.config.api_key)
            .json(&self.request(text))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(VectorError::Embedding(format!(
                "OpenAI API error ({}): {}",
                status, error_text
            )));
        }

        let embedding = response.json::<EmbeddingResponse>().await?.into_first()?;
        debug!(model = %self.config.model, dimension = embedding.len(), "Generated embedding");
        Ok(embedding)
    }
}
