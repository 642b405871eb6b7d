//! # Grappler
//!
//! A retrieval-augmented grappling coach. Questions are checked for
//! relevance, answered from a corpus of instructional transcripts and
//! remembered per conversation.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use grappler::prelude::*;
//!
//! let config = PipelineConfig::default();
//! let embedder = Arc::new(SimpleEmbedder::new(256));
//! let llm = Arc::new(OllamaBackend::localhost()?);
//!
//! // Load the persisted index, or chunk + embed the transcripts.
//! let (index, _) = IngestPipeline::new(config.clone(), embedder)
//!     .load_or_build(Path::new("transcripts/"))
//!     .await?;
//!
//! let coach = QueryOrchestrator::new(&config, Arc::new(index), llm)?;
//! let reply = coach.process_query(QueryRequest::new("How do I escape mount?")).await;
//! println!("{}", reply.response_text);
//! ```
//!
//! ## Architecture
//!
//! - [`grappler_embeddings`] - Embedder trait and backends, recursive chunker
//! - [`grappler_index`] - Passages, index snapshots, persistence, corpus loading
//! - [`grappler_llm`] - LLM backends, classifier and summary prompts
//! - [`grappler_rag`] - Relevance gate, prompt assembly, session memory, orchestrator
//!
//! ## Request flow
//!
//! | Step | What happens |
//! |------|--------------|
//! | 1 | Resolve or mint the session |
//! | 2 | Relevance gate (LLM verdict, keyword fallback) |
//! | 3 | Top-k passage retrieval |
//! | 4 | Persona + history + passages → prompt, truncated to budget |
//! | 5 | Generation (apology on failure) |
//! | 6 | Append the exchange to the session |
//!
//! ## Features
//!
//! - `api`: OpenAI embeddings and chat completions
//! - `local`: Ollama generation
//! - `full`: everything

// Re-export all subcrates
pub use grappler_embeddings as embeddings;
pub use grappler_index as index;
pub use grappler_llm as llm;
pub use grappler_rag as rag;

/// Prelude module for convenient imports.
///
/// ```rust
/// use grappler::prelude::*;
/// ```
pub mod prelude {
    // Embeddings and chunking
    pub use grappler_embeddings::{
        ChunkConfig, Chunker, Embedder, EmbeddingError, EmbeddingResult, SimpleEmbedder,
    };

    // Index
    pub use grappler_index::{
        load_corpus, Document, IndexError, IndexSnapshot, Passage, RetrievalResult, Retriever,
        SharedIndex, SimilarityMetric,
    };

    // LLM
    pub use grappler_llm::{
        GenerationRequest, LlmBackend, LlmConfig, LlmError, LlmResult, MockBackend, ModelParams,
    };

    #[cfg(feature = "api")]
    pub use grappler_embeddings::{ApiConfig, ApiEmbedder};

    #[cfg(feature = "api")]
    pub use grappler_llm::OpenAiBackend;

    #[cfg(feature = "local")]
    pub use grappler_llm::OllamaBackend;

    // Pipeline
    pub use grappler_rag::{
        GateStrategy, IngestOutcome, IngestPipeline, IngestionError, MemoryMode, PersonaTemplate,
        PipelineConfig, PromptAssembler, QueryOrchestrator, QueryRequest, QueryResponse,
        RelevanceDecision, RelevanceGate, Role, SessionId, SessionStore, TemplateError, Turn,
    };

    pub use std::path::Path;
    pub use std::sync::Arc;
}

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
