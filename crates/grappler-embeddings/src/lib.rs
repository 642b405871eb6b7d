//! # Grappler Embeddings
//!
//! Embedding backends and text chunking for the grappler retrieval pipeline.
//!
//! - Text → vector conversion behind the async [`Embedder`] trait
//! - Similarity functions used by the index
//! - Recursive, overlap-preserving chunking of transcripts
//!
//! ## Features
//!
//! - `api`: OpenAI-compatible embedding API
//! - `full`: all backends
//!
//! ## Usage
//!
//! ```rust,ignore
//! use grappler_embeddings::{Chunker, ChunkConfig, Embedder, SimpleEmbedder};
//!
//! let chunker = Chunker::new(ChunkConfig::new(1500, 500))?;
//! let chunks = chunker.chunk(&transcript);
//!
//! let embedder = SimpleEmbedder::new(256);
//! let vector = embedder.embed(&chunks[0].text).await?;
//! ```

mod chunker;
mod embedder;
mod normalize;
mod simple;

pub use chunker::{ChunkConfig, ChunkError, Chunk, Chunker, DEFAULT_SEPARATORS};
pub use embedder::{Embedder, EmbeddingError, EmbeddingResult};
pub use normalize::{cosine_similarity, dot_product, euclidean_distance, normalize_l2};
pub use simple::SimpleEmbedder;

#[cfg(feature = "api")]
mod api;
#[cfg(feature = "api")]
pub use api::{ApiConfig, ApiEmbedder};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::{cosine_similarity, normalize_l2};
    pub use crate::{ChunkConfig, Chunker, SimpleEmbedder};
    pub use crate::{Embedder, EmbeddingError, EmbeddingResult};

    #[cfg(feature = "api")]
    pub use crate::{ApiConfig, ApiEmbedder};
}
