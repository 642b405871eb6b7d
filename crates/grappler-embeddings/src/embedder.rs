//! Core embedder trait and types.

use async_trait::async_trait;
use thiserror::Error;

/// Embedding error types.
///
/// Every variant is a transient, per-call failure of the embedding service.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("API error: {0}")]
    ApiError(String),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("Embedding count mismatch: sent {sent} texts, received {received} vectors")]
    CountMismatch { sent: usize, received: usize },

    #[error("Timeout after {0} seconds")]
    Timeout(u64),
}

/// Result type for embedding operations.
pub type EmbeddingResult<T> = Result<T, EmbeddingError>;

/// Core trait for embedding providers.
///
/// Implementors convert text to dense vectors of a fixed dimension. For a
/// given model version the mapping must be deterministic, otherwise a
/// persisted index and the query vectors drift apart.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a single text string.
    async fn embed(&self, text: &str) -> EmbeddingResult<Vec<f32>>;

    /// Embed multiple texts in a batch.
    ///
    /// The returned vectors are in the same order as `texts`.
    async fn embed_batch(&self, texts: &[&str]) -> EmbeddingResult<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(texts.len());
        for text in texts {
            vectors.push(self.embed(text).await?);
        }
        Ok(vectors)
    }

    /// Get the embedding dimension.
    fn dimension(&self) -> usize;

    /// Get the model name/identifier.
    fn model_name(&self) -> &str;

    /// Check that a vector produced elsewhere matches this embedder.
    fn check_dimension(&self, vector: &[f32]) -> EmbeddingResult<()> {
        if vector.len() != self.dimension() {
            return Err(EmbeddingError::DimensionMismatch {
                expected: self.dimension(),
                got: vector.len(),
            });
        }
        Ok(())
    }
}
