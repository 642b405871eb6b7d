//! Live index handle: concurrent searches, swap-on-rebuild.

use crate::{IndexError, IndexResult, IndexSnapshot, Passage, RetrievalResult, Retriever};
use async_trait::async_trait;
use grappler_embeddings::{Embedder, EmbeddingError};
use std::sync::{Arc, RwLock};
use std::time::Duration;

/// A searchable index shared across requests.
///
/// Searches clone the current snapshot `Arc` and rank without holding the
/// lock. A rebuild embeds into a new snapshot off to the side and swaps it in
/// only once it is complete.
pub struct SharedIndex {
    snapshot: RwLock<Arc<IndexSnapshot>>,
    embedder: Arc<dyn Embedder>,
    embed_timeout: Duration,
}

impl SharedIndex {
    /// Serve `snapshot`, embedding queries with `embedder`.
    pub fn new(snapshot: IndexSnapshot, embedder: Arc<dyn Embedder>) -> Self {
        Self {
            snapshot: RwLock::new(Arc::new(snapshot)),
            embedder,
            embed_timeout: Duration::from_secs(30),
        }
    }

    /// Set the per-call timeout for query embedding.
    pub fn with_embed_timeout(mut self, timeout: Duration) -> Self {
        self.embed_timeout = timeout;
        self
    }

    /// The snapshot currently being served.
    pub fn snapshot(&self) -> IndexResult<Arc<IndexSnapshot>> {
        self.snapshot
            .read()
            .map(|s| Arc::clone(&s))
            .map_err(|e| IndexError::Lock(e.to_string()))
    }

    /// Replace the served snapshot, returning the previous one.
    ///
    /// In-flight searches finish against the snapshot they started with.
    pub fn swap(&self, snapshot: IndexSnapshot) -> IndexResult<Arc<IndexSnapshot>> {
        let mut current = self
            .snapshot
            .write()
            .map_err(|e| IndexError::Lock(e.to_string()))?;
        Ok(std::mem::replace(&mut *current, Arc::new(snapshot)))
    }

    /// Rebuild from `passages` and swap the result in.
    ///
    /// On failure the current snapshot keeps serving.
    pub async fn rebuild(&self, passages: Vec<Passage>) -> IndexResult<()> {
        let metric = self.snapshot()?.metric();
        let fresh = IndexSnapshot::build(passages, self.embedder.as_ref(), metric).await?;
        self.swap(fresh)?;
        Ok(())
    }

    /// Embed `query` and return at most `k` ranked passages.
    pub async fn search(&self, query: &str, k: usize) -> IndexResult<RetrievalResult> {
        let snapshot = self.snapshot()?;
        if snapshot.is_empty() || k == 0 {
            return Ok(RetrievalResult::default());
        }

        let vector = self.embed_query(query).await?;
        let results = snapshot.search_vector(&vector, k)?;

        tracing::debug!(k, hits = results.len(), "index search");
        Ok(results)
    }

    /// Query embedding with a timeout, retried once since it is a pure read.
    async fn embed_query(&self, query: &str) -> IndexResult<Vec<f32>> {
        match self.try_embed(query).await {
            Ok(vector) => Ok(vector),
            Err(first) => {
                tracing::warn!(error = %first, "query embedding failed, retrying once");
                Ok(self.try_embed(query).await?)
            }
        }
    }

    async fn try_embed(&self, query: &str) -> Result<Vec<f32>, EmbeddingError> {
        match tokio::time::timeout(self.embed_timeout, self.embedder.embed(query)).await {
            Ok(result) => result,
            Err(_) => Err(EmbeddingError::Timeout(self.embed_timeout.as_secs())),
        }
    }
}

#[async_trait]
impl Retriever for SharedIndex {
    async fn retrieve(&self, query: &str, k: usize) -> IndexResult<RetrievalResult> {
        self.search(query, k).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SimilarityMetric;
    use grappler_embeddings::{EmbeddingResult, SimpleEmbedder};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Fails the first `failures` calls, then delegates.
    struct StutteringEmbedder {
        inner: SimpleEmbedder,
        failures: usize,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Embedder for StutteringEmbedder {
        async fn embed(&self, text: &str) -> EmbeddingResult<Vec<f32>> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                return Err(EmbeddingError::ConnectionFailed("reset by peer".into()));
            }
            self.inner.embed(text).await
        }

        fn dimension(&self) -> usize {
            self.inner.dimension()
        }

        fn model_name(&self) -> &str {
            self.inner.model_name()
        }
    }

    async fn index_with(embedder: Arc<dyn Embedder>) -> SharedIndex {
        let passages = vec![
            Passage::new("Posture up inside closed guard.", 0),
            Passage::new("Stand to open the guard.", 32),
        ];
        let snapshot = IndexSnapshot::build(passages, embedder.as_ref(), SimilarityMetric::Cosine)
            .await
            .unwrap();
        SharedIndex::new(snapshot, embedder)
    }

    #[tokio::test]
    async fn test_query_embedding_retried_once() {
        let inner = SimpleEmbedder::new(32);
        let index = index_with(Arc::new(inner.clone())).await;
        let snapshot = index.snapshot().unwrap();

        let flaky = Arc::new(StutteringEmbedder {
            inner,
            failures: 1,
            calls: AtomicUsize::new(0),
        });
        let index = SharedIndex::new((*snapshot).clone(), flaky.clone());

        let results = index.search("closed guard posture", 2).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(flaky.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_query_embedding_gives_up_after_retry() {
        let inner = SimpleEmbedder::new(32);
        let index = index_with(Arc::new(inner.clone())).await;
        let snapshot = index.snapshot().unwrap();

        let broken = Arc::new(StutteringEmbedder {
            inner,
            failures: usize::MAX,
            calls: AtomicUsize::new(0),
        });
        let index = SharedIndex::new((*snapshot).clone(), broken.clone());

        let err = index.search("closed guard", 2).await.unwrap_err();
        assert!(matches!(err, IndexError::EmbeddingService(_)));
        assert_eq!(broken.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_rebuild_swaps_snapshot() {
        let index = index_with(Arc::new(SimpleEmbedder::new(32))).await;
        let before = index.snapshot().unwrap();
        assert_eq!(before.len(), 2);

        index
            .rebuild(vec![Passage::new("Only passage left.", 0)])
            .await
            .unwrap();

        // The old Arc is still valid for readers that held it.
        assert_eq!(before.len(), 2);
        assert_eq!(index.snapshot().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_empty_index_skips_embedding() {
        let embedder = Arc::new(StutteringEmbedder {
            inner: SimpleEmbedder::new(8),
            failures: usize::MAX,
            calls: AtomicUsize::new(0),
        });
        let index = SharedIndex::new(
            IndexSnapshot::empty(8, SimilarityMetric::Cosine, "simple"),
            embedder.clone(),
        );

        let results = index.retrieve("anything", 5).await.unwrap();
        assert!(results.is_empty());
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
    }
}
