//! Feature-hashing embedder (no external service).
//!
//! Words are hashed into a fixed-dimension space with FNV so that the same
//! text maps to the same vector on every platform and every run. It carries
//! no real semantics beyond shared vocabulary, which makes it the embedder of
//! choice for offline use and tests.

use crate::{Embedder, EmbeddingError, EmbeddingResult};
use async_trait::async_trait;
use fnv::FnvHasher;
use std::hash::{Hash, Hasher};

/// Simple hash-based embedder.
///
/// # Example
///
/// ```rust
/// use grappler_embeddings::{Embedder, SimpleEmbedder};
///
/// # async fn demo() {
/// let embedder = SimpleEmbedder::new(128);
/// let vec = embedder.embed("hip escape from mount").await.unwrap();
/// assert_eq!(vec.len(), 128);
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct SimpleEmbedder {
    dimension: usize,
    num_hashes: usize,
}

impl SimpleEmbedder {
    /// Create a new simple embedder with specified dimension.
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
            num_hashes: 4,
        }
    }

    /// Create with default dimension (256).
    pub fn default_dimension() -> Self {
        Self::new(256)
    }

    fn tokenize(&self, text: &str) -> Vec<String> {
        text.to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|s| s.len() > 1)
            .map(|s| s.to_string())
            .collect()
    }

    fn hash_with_seed(&self, word: &str, seed: u64) -> u64 {
        let mut hasher = FnvHasher::default();
        seed.hash(&mut hasher);
        word.hash(&mut hasher);
        hasher.finish()
    }

    fn vectorize(&self, text: &str) -> Vec<f32> {
        let tokens = self.tokenize(text);
        let mut vector = vec![0.0f32; self.dimension];
        if tokens.is_empty() {
            return vector;
        }

        for token in &tokens {
            for seed in 0..self.num_hashes as u64 {
                let idx = (self.hash_with_seed(token, seed) % self.dimension as u64) as usize;
                let sign = if self.hash_with_seed(token, seed + 1000) % 2 == 0 {
                    1.0
                } else {
                    -1.0
                };
                vector[idx] += sign;
            }
        }

        crate::normalize_l2(&mut vector);
        vector
    }
}

impl Default for SimpleEmbedder {
    fn default() -> Self {
        Self::default_dimension()
    }
}

#[async_trait]
impl Embedder for SimpleEmbedder {
    async fn embed(&self, text: &str) -> EmbeddingResult<Vec<f32>> {
        if text.is_empty() {
            return Err(EmbeddingError::InvalidInput("Empty text".to_string()));
        }
        Ok(self.vectorize(text))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        "simple-hash"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cosine_similarity;

    #[tokio::test]
    async fn test_simple_embedder_is_deterministic() {
        let embedder = SimpleEmbedder::new(128);

        let v1 = embedder.embed("hello world").await.unwrap();
        let v2 = embedder.embed("hello world").await.unwrap();
        let v3 = embedder.embed("goodbye universe").await.unwrap();

        assert_eq!(v1.len(), 128);
        assert_eq!(v1, v2);
        assert!(cosine_similarity(&v1, &v3) < 0.9);
    }

    #[tokio::test]
    async fn test_shared_vocabulary_scores_higher() {
        let embedder = SimpleEmbedder::new(256);

        let v1 = embedder.embed("escape the mount position").await.unwrap();
        let v2 = embedder.embed("mount escape with a bridge").await.unwrap();
        let v3 = embedder.embed("capital city of france").await.unwrap();

        assert!(cosine_similarity(&v1, &v2) > cosine_similarity(&v1, &v3));
    }

    #[tokio::test]
    async fn test_empty_text_rejected() {
        let embedder = SimpleEmbedder::new(16);
        assert!(matches!(
            embedder.embed("").await,
            Err(EmbeddingError::InvalidInput(_))
        ));

        // Punctuation only: valid input, zero vector
        let v = embedder.embed("?!").await.unwrap();
        assert!(v.iter().all(|x| *x == 0.0));
    }
}
