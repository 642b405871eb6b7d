//! OpenAI-compatible embedding API.
//!
//! Requires the `api` feature.

use crate::{Embedder, EmbeddingError, EmbeddingResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

const OPENAI_EMBEDDINGS_URL: &str = "https://api.openai.com/v1/embeddings";

/// Configuration for API-based embeddings.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// API key.
    pub api_key: String,
    /// Model name.
    pub model: String,
    /// API endpoint.
    pub endpoint: String,
    /// Embedding dimension.
    pub dimensions: usize,
    /// Maximum number of inputs per request.
    pub batch_size: usize,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl ApiConfig {
    /// Create config for OpenAI embeddings (`text-embedding-3-small`).
    pub fn openai(api_key: &str) -> Self {
        Self {
            api_key: api_key.to_string(),
            model: "text-embedding-3-small".to_string(),
            endpoint: OPENAI_EMBEDDINGS_URL.to_string(),
            dimensions: 1536,
            batch_size: 256,
            timeout_secs: 30,
        }
    }

    /// Create config for a custom OpenAI-compatible endpoint.
    pub fn custom(endpoint: &str, api_key: &str, model: &str, dimensions: usize) -> Self {
        Self {
            api_key: api_key.to_string(),
            model: model.to_string(),
            endpoint: endpoint.to_string(),
            dimensions,
            batch_size: 256,
            timeout_secs: 30,
        }
    }

    /// Set the model.
    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }

    /// Set dimensions (for models that support dimension reduction).
    pub fn with_dimensions(mut self, dimensions: usize) -> Self {
        self.dimensions = dimensions;
        self
    }

    /// Set timeout.
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// Set the per-request batch size.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [&'a str],
    dimensions: usize,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}

/// API-based embedder for OpenAI-compatible embedding services.
///
/// # Example
///
/// ```rust,ignore
/// use grappler_embeddings::{ApiConfig, ApiEmbedder, Embedder};
///
/// let embedder = ApiEmbedder::new(ApiConfig::openai("sk-..."))?;
/// let vec = embedder.embed("hip escape").await?;
/// ```
pub struct ApiEmbedder {
    config: ApiConfig,
    client: reqwest::Client,
}

impl ApiEmbedder {
    /// Create a new API embedder with the given config.
    pub fn new(config: ApiConfig) -> EmbeddingResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| EmbeddingError::ApiError(e.to_string()))?;

        Ok(Self { config, client })
    }

    /// Create from the `OPENAI_API_KEY` environment variable.
    pub fn from_env() -> EmbeddingResult<Self> {
        let api_key = std::env::var("OPENAI_API_KEY").map_err(|_| {
            EmbeddingError::ApiError("OPENAI_API_KEY is not set".to_string())
        })?;
        Self::new(ApiConfig::openai(&api_key))
    }

    async fn request(&self, texts: &[&str]) -> EmbeddingResult<Vec<Vec<f32>>> {
        let request = EmbeddingRequest {
            model: &self.config.model,
            input: texts,
            dimensions: self.config.dimensions,
        };

        let response = self
            .client
            .post(&self.config.endpoint)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    EmbeddingError::ConnectionFailed(self.config.endpoint.clone())
                } else if e.is_timeout() {
                    EmbeddingError::Timeout(self.config.timeout_secs)
                } else {
                    EmbeddingError::ApiError(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(EmbeddingError::ApiError(format!(
                "Embedding API error {}: {}",
                status, body
            )));
        }

        let mut resp: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| EmbeddingError::ApiError(e.to_string()))?;

        if resp.data.len() != texts.len() {
            return Err(EmbeddingError::CountMismatch {
                sent: texts.len(),
                received: resp.data.len(),
            });
        }

        resp.data.sort_by_key(|d| d.index);
        let vectors: Vec<Vec<f32>> = resp.data.into_iter().map(|d| d.embedding).collect();
        for vector in &vectors {
            self.check_dimension(vector)?;
        }
        Ok(vectors)
    }
}

#[async_trait]
impl Embedder for ApiEmbedder {
    async fn embed(&self, text: &str) -> EmbeddingResult<Vec<f32>> {
        let results = self.embed_batch(&[text]).await?;
        results
            .into_iter()
            .next()
            .ok_or_else(|| EmbeddingError::ApiError("No embedding returned".to_string()))
    }

    async fn embed_batch(&self, texts: &[&str]) -> EmbeddingResult<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.config.batch_size) {
            tracing::debug!(batch = batch.len(), model = %self.config.model, "embedding batch");
            vectors.extend(self.request(batch).await?);
        }
        Ok(vectors)
    }

    fn dimension(&self) -> usize {
        self.config.dimensions
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}
