//! # Grappler Index
//!
//! Passage storage and similarity search for the grappler pipeline.
//!
//! Passages are embedded once at build time and kept in an immutable
//! [`IndexSnapshot`]. A [`SharedIndex`] serves searches from the current
//! snapshot and swaps in a fresh one when the corpus is rebuilt, so readers
//! never observe a half-built index.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use grappler_index::{IndexSnapshot, Passage, SharedIndex, SimilarityMetric};
//! use grappler_embeddings::SimpleEmbedder;
//! use std::sync::Arc;
//!
//! let embedder = Arc::new(SimpleEmbedder::new(256));
//! let passages = vec![Passage::new("Frame on the hip to escape side control.", 0)];
//!
//! let snapshot = IndexSnapshot::build(passages, embedder.as_ref(), SimilarityMetric::Cosine).await?;
//! snapshot.persist(".grappler/index", "transcripts")?;
//!
//! let index = SharedIndex::new(snapshot, embedder);
//! let results = index.search("side control escape", 5).await?;
//! for hit in results.iter() {
//!     println!("{:.3} {}", hit.score, hit.passage.text);
//! }
//! ```

mod corpus;
mod persist;
mod shared;
mod snapshot;

pub use corpus::{chunk_documents, load_corpus, Document};
pub use persist::{collection_path, IndexManifest, FORMAT_VERSION};
pub use shared::SharedIndex;
pub use snapshot::IndexSnapshot;

use async_trait::async_trait;
use grappler_embeddings::EmbeddingError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use thiserror::Error;

/// Hard cap on passages returned by a single search.
///
/// Bounds the context block handed to the prompt assembler regardless of
/// the configured `k`.
pub const MAX_TOP_K: usize = 50;

/// Errors that can occur when building, loading or searching an index.
#[derive(Error, Debug)]
pub enum IndexError {
    #[error("Embedding service error: {0}")]
    EmbeddingService(#[from] EmbeddingError),

    #[error("Index not found at {path}: {reason}")]
    NotFound { path: PathBuf, reason: String },

    #[error("Invalid vector dimension: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Corpus error at {path}: {reason}")]
    Corpus { path: PathBuf, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Index lock poisoned: {0}")]
    Lock(String),
}

/// Result type for index operations.
pub type IndexResult<T> = Result<T, IndexError>;

/// Similarity metric used to rank passages.
///
/// Every metric is oriented so that a higher score means a closer match.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SimilarityMetric {
    /// Cosine similarity (normalized dot product).
    #[default]
    Cosine,
    /// Dot product (inner product).
    DotProduct,
    /// Euclidean distance, mapped to `1 / (1 + d)`.
    Euclidean,
}

impl SimilarityMetric {
    /// Score two vectors of equal dimension.
    pub fn score(&self, a: &[f32], b: &[f32]) -> f32 {
        let score = match self {
            SimilarityMetric::Cosine => grappler_embeddings::cosine_similarity(a, b),
            SimilarityMetric::DotProduct => grappler_embeddings::dot_product(a, b),
            SimilarityMetric::Euclidean => {
                1.0 / (1.0 + grappler_embeddings::euclidean_distance(a, b))
            }
        };
        // NaN would sort ahead of every real score.
        if score.is_nan() {
            f32::NEG_INFINITY
        } else {
            score
        }
    }
}

impl std::fmt::Display for SimilarityMetric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SimilarityMetric::Cosine => "cosine",
            SimilarityMetric::DotProduct => "dot_product",
            SimilarityMetric::Euclidean => "euclidean",
        };
        f.write_str(name)
    }
}

/// A bounded slice of source text indexed for retrieval.
///
/// Passages are immutable once created; rebuilding the index replaces them
/// wholesale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Passage {
    /// The passage text.
    pub text: String,
    /// Character offset of the passage within its source document.
    pub source_offset: usize,
    /// Free-form metadata (`source`, `chunk_index`, ...).
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl Passage {
    /// Create a passage with no metadata.
    pub fn new(text: impl Into<String>, source_offset: usize) -> Self {
        Self {
            text: text.into(),
            source_offset,
            metadata: BTreeMap::new(),
        }
    }

    /// Add metadata to the passage.
    pub fn with_metadata(
        mut self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// The `source` metadata entry, if it is a string.
    pub fn source(&self) -> Option<&str> {
        self.metadata.get("source").and_then(|v| v.as_str())
    }
}

/// A passage paired with its similarity to the query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredPassage {
    /// The matched passage.
    pub passage: Passage,
    /// Similarity score (higher is more similar).
    pub score: f32,
    /// Position of the passage in ingestion order.
    pub ordinal: usize,
}

/// Ordered search hits, best match first.
///
/// Scores are non-increasing and equal scores keep ingestion order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RetrievalResult {
    hits: Vec<ScoredPassage>,
}

impl RetrievalResult {
    /// Wrap already-ranked hits.
    pub fn new(hits: Vec<ScoredPassage>) -> Self {
        Self { hits }
    }

    /// Number of hits.
    pub fn len(&self) -> usize {
        self.hits.len()
    }

    /// Whether nothing matched.
    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    /// Iterate hits in rank order.
    pub fn iter(&self) -> std::slice::Iter<'_, ScoredPassage> {
        self.hits.iter()
    }

    /// Passage texts in rank order.
    pub fn texts(&self) -> Vec<&str> {
        self.hits.iter().map(|h| h.passage.text.as_str()).collect()
    }

    /// Consume into the underlying hits.
    pub fn into_hits(self) -> Vec<ScoredPassage> {
        self.hits
    }
}

impl IntoIterator for RetrievalResult {
    type Item = ScoredPassage;
    type IntoIter = std::vec::IntoIter<ScoredPassage>;

    fn into_iter(self) -> Self::IntoIter {
        self.hits.into_iter()
    }
}

/// Abstract interface for passage retrieval.
///
/// The orchestrator only sees this trait, which keeps the index swappable
/// and lets tests count retrieval calls.
#[async_trait]
pub trait Retriever: Send + Sync {
    /// Return at most `k` passages ranked by similarity to `query`.
    async fn retrieve(&self, query: &str, k: usize) -> IndexResult<RetrievalResult>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_scores() {
        let a = [1.0, 0.0];
        let b = [1.0, 0.0];
        let c = [0.0, 1.0];

        assert!((SimilarityMetric::Cosine.score(&a, &b) - 1.0).abs() < 1e-6);
        assert!(SimilarityMetric::Cosine.score(&a, &c).abs() < 1e-6);
        assert!((SimilarityMetric::Euclidean.score(&a, &b) - 1.0).abs() < 1e-6);
        assert!(SimilarityMetric::Euclidean.score(&a, &c) < 1.0);
        assert!((SimilarityMetric::DotProduct.score(&a, &b) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_nan_score_sinks() {
        let a = [f32::NAN, 0.0];
        let b = [1.0, 0.0];
        assert_eq!(SimilarityMetric::DotProduct.score(&a, &b), f32::NEG_INFINITY);
    }

    #[test]
    fn test_metric_serde_names() {
        let metric: SimilarityMetric = serde_json::from_str("\"dot_product\"").unwrap();
        assert_eq!(metric, SimilarityMetric::DotProduct);
        assert_eq!(metric.to_string(), "dot_product");
    }

    #[test]
    fn test_passage_metadata() {
        let passage = Passage::new("Underhook, then come up on the elbow.", 120)
            .with_metadata("source", "half_guard.txt")
            .with_metadata("chunk_index", 3);

        assert_eq!(passage.source(), Some("half_guard.txt"));
        assert_eq!(passage.metadata["chunk_index"], 3);
        assert_eq!(passage.source_offset, 120);
    }
}
