//! Immutable, fully embedded index snapshot with brute-force search.

use crate::{IndexError, IndexResult, Passage, RetrievalResult, ScoredPassage, SimilarityMetric};
use grappler_embeddings::{Embedder, EmbeddingError};
use serde::{Deserialize, Serialize};

/// Passages embedded per `embed_batch` call during a build.
const BUILD_BATCH_SIZE: usize = 64;

/// A passage and its embedding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct IndexEntry {
    pub(crate) passage: Passage,
    pub(crate) vector: Vec<f32>,
}

/// An immutable set of embedded passages.
///
/// Snapshots are built completely before anyone can search them; there is no
/// way to add or remove a single passage. Entries keep ingestion order, which
/// is also the tie-break order for equal scores.
///
/// # Example
///
/// ```rust
/// use grappler_embeddings::SimpleEmbedder;
/// use grappler_index::{IndexSnapshot, Passage, SimilarityMetric};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let embedder = SimpleEmbedder::new(64);
///     let passages = vec![
///         Passage::new("hip escape from mount", 0),
///         Passage::new("kimura from closed guard", 40),
///     ];
///
///     let snapshot = IndexSnapshot::build(passages, &embedder, SimilarityMetric::Cosine).await?;
///     let query = grappler_embeddings::Embedder::embed(&embedder, "kimura").await?;
///     let results = snapshot.search_vector(&query, 1)?;
///     assert_eq!(results.len(), 1);
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct IndexSnapshot {
    pub(crate) entries: Vec<IndexEntry>,
    pub(crate) dimension: usize,
    pub(crate) metric: SimilarityMetric,
    pub(crate) model: String,
}

impl IndexSnapshot {
    /// An index with no passages.
    pub fn empty(dimension: usize, metric: SimilarityMetric, model: impl Into<String>) -> Self {
        Self {
            entries: Vec::new(),
            dimension,
            metric,
            model: model.into(),
        }
    }

    /// Embed every passage and build a snapshot.
    ///
    /// All-or-nothing: if any embedding call fails, or returns the wrong
    /// number of vectors or a vector of the wrong dimension, the error is
    /// returned and no snapshot exists.
    pub async fn build(
        passages: Vec<Passage>,
        embedder: &dyn Embedder,
        metric: SimilarityMetric,
    ) -> IndexResult<Self> {
        let dimension = embedder.dimension();
        let mut entries = Vec::with_capacity(passages.len());

        for batch in passages.chunks(BUILD_BATCH_SIZE) {
            let texts: Vec<&str> = batch.iter().map(|p| p.text.as_str()).collect();
            let vectors = embedder.embed_batch(&texts).await?;

            if vectors.len() != batch.len() {
                return Err(EmbeddingError::CountMismatch {
                    sent: batch.len(),
                    received: vectors.len(),
                }
                .into());
            }

            for (passage, vector) in batch.iter().zip(vectors) {
                if vector.len() != dimension {
                    return Err(IndexError::DimensionMismatch {
                        expected: dimension,
                        actual: vector.len(),
                    });
                }
                entries.push(IndexEntry {
                    passage: passage.clone(),
                    vector,
                });
            }

            tracing::debug!(embedded = entries.len(), total = passages.len(), "embedding passages");
        }

        tracing::info!(
            passages = entries.len(),
            dimension,
            model = embedder.model_name(),
            "index built"
        );

        Ok(Self {
            entries,
            dimension,
            metric,
            model: embedder.model_name().to_string(),
        })
    }

    /// Number of passages.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the index holds no passages.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Vector dimension.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Similarity metric used for ranking.
    pub fn metric(&self) -> SimilarityMetric {
        self.metric
    }

    /// Rank with `metric` from now on. Vectors do not depend on the metric.
    pub fn with_metric(mut self, metric: SimilarityMetric) -> Self {
        self.metric = metric;
        self
    }

    /// Name of the embedding model the vectors came from.
    pub fn model_name(&self) -> &str {
        &self.model
    }

    /// Passages in ingestion order.
    pub fn passages(&self) -> impl Iterator<Item = &Passage> {
        self.entries.iter().map(|e| &e.passage)
    }

    /// Rank passages against an already embedded query.
    ///
    /// Returns at most `min(k, MAX_TOP_K)` hits, scores non-increasing, equal
    /// scores in ingestion order.
    pub fn search_vector(&self, query: &[f32], k: usize) -> IndexResult<RetrievalResult> {
        if query.len() != self.dimension {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimension,
                actual: query.len(),
            });
        }

        let k = k.min(crate::MAX_TOP_K);
        if k == 0 {
            return Ok(RetrievalResult::default());
        }

        let mut scored: Vec<(usize, f32)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(ordinal, entry)| (ordinal, self.metric.score(query, &entry.vector)))
            .collect();

        scored.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));

        let hits = scored
            .into_iter()
            .take(k)
            .map(|(ordinal, score)| ScoredPassage {
                passage: self.entries[ordinal].passage.clone(),
                score,
                ordinal,
            })
            .collect();

        Ok(RetrievalResult::new(hits))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use grappler_embeddings::{EmbeddingResult, SimpleEmbedder};

    /// Maps a passage to a fixed 2-d vector chosen by its first word.
    struct AxisEmbedder;

    #[async_trait]
    impl Embedder for AxisEmbedder {
        async fn embed(&self, text: &str) -> EmbeddingResult<Vec<f32>> {
            Ok(match text.split_whitespace().next() {
                Some("x") => vec![1.0, 0.0],
                Some("y") => vec![0.0, 1.0],
                Some("xy") => vec![0.7, 0.7],
                _ => vec![0.0, 0.0],
            })
        }

        fn dimension(&self) -> usize {
            2
        }

        fn model_name(&self) -> &str {
            "axis"
        }
    }

    /// Fails once `limit` texts have been embedded.
    struct FlakyEmbedder {
        limit: usize,
        seen: std::sync::atomic::AtomicUsize,
    }

    #[async_trait]
    impl Embedder for FlakyEmbedder {
        async fn embed(&self, _text: &str) -> EmbeddingResult<Vec<f32>> {
            let n = self.seen.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            if n >= self.limit {
                return Err(EmbeddingError::ConnectionFailed("embedding service down".into()));
            }
            Ok(vec![1.0, 0.0])
        }

        fn dimension(&self) -> usize {
            2
        }

        fn model_name(&self) -> &str {
            "flaky"
        }
    }

    fn passages(texts: &[&str]) -> Vec<Passage> {
        texts
            .iter()
            .enumerate()
            .map(|(i, t)| Passage::new(*t, i * 10))
            .collect()
    }

    #[tokio::test]
    async fn test_search_ranks_by_similarity() {
        let snapshot = IndexSnapshot::build(
            passages(&["y guard", "x mount", "xy back"]),
            &AxisEmbedder,
            SimilarityMetric::Cosine,
        )
        .await
        .unwrap();

        let results = snapshot.search_vector(&[1.0, 0.0], 3).unwrap();
        assert_eq!(results.texts(), vec!["x mount", "xy back", "y guard"]);
        assert_eq!(results.iter().next().unwrap().ordinal, 1);
    }

    #[tokio::test]
    async fn test_ties_keep_ingestion_order() {
        let snapshot = IndexSnapshot::build(
            passages(&["x first", "y other", "x second", "x third"]),
            &AxisEmbedder,
            SimilarityMetric::DotProduct,
        )
        .await
        .unwrap();

        let results = snapshot.search_vector(&[1.0, 0.0], 3).unwrap();
        assert_eq!(results.texts(), vec!["x first", "x second", "x third"]);
    }

    #[tokio::test]
    async fn test_k_limits() {
        let texts: Vec<String> = (0..60).map(|i| format!("x passage {}", i)).collect();
        let refs: Vec<&str> = texts.iter().map(|s| s.as_str()).collect();
        let snapshot = IndexSnapshot::build(passages(&refs), &AxisEmbedder, SimilarityMetric::Cosine)
            .await
            .unwrap();

        assert_eq!(snapshot.search_vector(&[1.0, 0.0], 5).unwrap().len(), 5);
        assert_eq!(snapshot.search_vector(&[1.0, 0.0], 0).unwrap().len(), 0);
        assert_eq!(
            snapshot.search_vector(&[1.0, 0.0], 500).unwrap().len(),
            crate::MAX_TOP_K
        );
    }

    #[tokio::test]
    async fn test_build_is_all_or_nothing() {
        let embedder = FlakyEmbedder {
            limit: 2,
            seen: Default::default(),
        };
        let result = IndexSnapshot::build(
            passages(&["a", "b", "c"]),
            &embedder,
            SimilarityMetric::Cosine,
        )
        .await;

        assert!(matches!(result, Err(IndexError::EmbeddingService(_))));
    }

    #[tokio::test]
    async fn test_dimension_checked() {
        let snapshot = IndexSnapshot::build(passages(&["x"]), &AxisEmbedder, SimilarityMetric::Cosine)
            .await
            .unwrap();
        let err = snapshot.search_vector(&[1.0, 0.0, 0.0], 1).unwrap_err();
        assert!(matches!(err, IndexError::DimensionMismatch { expected: 2, actual: 3 }));
    }

    #[tokio::test]
    async fn test_rebuild_is_functionally_equivalent() {
        let embedder = SimpleEmbedder::new(64);
        let input = passages(&["shrimp out of mount", "frame on the neck", "bridge and roll"]);

        let a = IndexSnapshot::build(input.clone(), &embedder, SimilarityMetric::Cosine)
            .await
            .unwrap();
        let b = IndexSnapshot::build(input, &embedder, SimilarityMetric::Cosine)
            .await
            .unwrap();

        let query = embedder.embed("escape the mount").await.unwrap();
        assert_eq!(
            a.search_vector(&query, 3).unwrap(),
            b.search_vector(&query, 3).unwrap()
        );
    }

    #[test]
    fn test_empty_snapshot() {
        let snapshot = IndexSnapshot::empty(4, SimilarityMetric::Cosine, "none");
        assert!(snapshot.is_empty());
        assert!(snapshot.search_vector(&[0.0; 4], 10).unwrap().is_empty());
    }
}
