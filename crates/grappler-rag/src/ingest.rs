//! Startup ingestion: corpus → passages → embedded, persisted index.

use crate::config::PipelineConfig;
use crate::error::IngestionError;
use grappler_embeddings::{ChunkConfig, Chunker, Embedder};
use grappler_index::{
    chunk_documents, load_corpus, IndexError, IndexSnapshot, Passage, SharedIndex,
};
use std::path::Path;
use std::sync::Arc;

/// What [`IngestPipeline::load_or_build`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    /// A persisted collection was loaded as-is.
    Loaded { passages: usize },
    /// The corpus was chunked, embedded and persisted.
    Built { documents: usize, passages: usize },
}

/// Builds and loads the passage index.
pub struct IngestPipeline {
    config: PipelineConfig,
    embedder: Arc<dyn Embedder>,
}

impl IngestPipeline {
    pub fn new(config: PipelineConfig, embedder: Arc<dyn Embedder>) -> Self {
        Self { config, embedder }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Chunker for the configured size and overlap.
    pub fn chunker(&self) -> Result<Chunker, IngestionError> {
        let chunking = &self.config.chunking;
        Ok(Chunker::new(ChunkConfig::new(chunking.chunk_size, chunking.overlap))?)
    }

    /// Load and chunk the corpus at `corpus`.
    pub fn passages(&self, corpus: &Path) -> Result<(usize, Vec<Passage>), IngestionError> {
        let chunker = self.chunker()?;
        let documents = load_corpus(corpus).map_err(IngestionError::Corpus)?;
        let passages = chunk_documents(&documents, &chunker);
        if passages.is_empty() {
            return Err(IngestionError::EmptyCorpus(corpus.to_path_buf()));
        }
        tracing::info!(documents = documents.len(), passages = passages.len(), "corpus chunked");
        Ok((documents.len(), passages))
    }

    /// Chunk, embed and persist the corpus, replacing any existing collection.
    pub async fn build(&self, corpus: &Path) -> Result<(IndexSnapshot, IngestOutcome), IngestionError> {
        let (documents, passages) = self.passages(corpus)?;
        let snapshot = IndexSnapshot::build(passages, self.embedder.as_ref(), self.config.index.metric)
            .await
            .map_err(IngestionError::Build)?;

        let index = &self.config.index;
        snapshot
            .persist(&index.dir, &index.collection)
            .map_err(IngestionError::Persist)?;

        let outcome = IngestOutcome::Built {
            documents,
            passages: snapshot.len(),
        };
        Ok((snapshot, outcome))
    }

    /// Load the persisted collection, or build it from `corpus`.
    ///
    /// A collection that is corrupt or was embedded with a different model
    /// or dimension is rebuilt.
    pub async fn load_or_build(&self, corpus: &Path) -> Result<(SharedIndex, IngestOutcome), IngestionError> {
        let index = &self.config.index;

        let loaded = match IndexSnapshot::load(&index.dir, &index.collection) {
            Ok(snapshot) if self.compatible(&snapshot) => Some(snapshot),
            Ok(snapshot) => {
                tracing::warn!(
                    stored_model = snapshot.model_name(),
                    stored_dimension = snapshot.dimension(),
                    model = self.embedder.model_name(),
                    dimension = self.embedder.dimension(),
                    "persisted index was built with a different embedder, rebuilding"
                );
                None
            }
            Err(IndexError::NotFound { path, reason }) => {
                tracing::info!(path = %path.display(), %reason, "no usable index, building");
                None
            }
            Err(e) => return Err(IngestionError::Build(e)),
        };

        let (snapshot, outcome) = match loaded {
            Some(snapshot) => {
                let passages = snapshot.len();
                let metric = self.config.index.metric;
                let snapshot = if snapshot.metric() == metric {
                    snapshot
                } else {
                    tracing::info!(
                        stored_metric = %snapshot.metric(),
                        %metric,
                        "serving persisted index with the configured metric"
                    );
                    snapshot.with_metric(metric)
                };
                (snapshot, IngestOutcome::Loaded { passages })
            }
            None => self.build(corpus).await?,
        };

        let shared = SharedIndex::new(snapshot, Arc::clone(&self.embedder))
            .with_embed_timeout(self.config.timeouts.embedding());
        Ok((shared, outcome))
    }

    fn compatible(&self, snapshot: &IndexSnapshot) -> bool {
        snapshot.dimension() == self.embedder.dimension()
            && snapshot.model_name() == self.embedder.model_name()
    }
}
