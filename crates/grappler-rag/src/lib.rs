//! # Grappler RAG
//!
//! Retrieval-augmented question answering for grappling instruction.
//!
//! A question flows through a fixed pipeline:
//!
//! | Stage | Component | On failure |
//! |-------|-----------|------------|
//! | Session | [`SessionStore`] | unknown ids start a new session |
//! | Relevance | [`RelevanceGate`] | fail-open (configurable) |
//! | Retrieval | [`grappler_index::Retriever`] | apology |
//! | Prompt | [`PromptAssembler`] | n/a (template validated at startup) |
//! | Generation | [`grappler_llm::LlmBackend`] | apology |
//!
//! [`QueryOrchestrator::process_query`] is the single entry point for a
//! transport layer and never returns an error.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use grappler_rag::prelude::*;
//!
//! let config = PipelineConfig::default();
//! let (index, _) = IngestPipeline::new(config.clone(), embedder).load_or_build(corpus).await?;
//! let orchestrator = QueryOrchestrator::new(&config, Arc::new(index), llm)?;
//!
//! let reply = orchestrator.process_query(QueryRequest::new("How do I escape mount?")).await;
//! let follow_up = orchestrator
//!     .process_query(QueryRequest::new("And if they post?").with_session(reply.session_id.to_string()))
//!     .await;
//! ```

pub mod config;
pub mod error;
pub mod gate;
pub mod ingest;
pub mod memory;
pub mod orchestrator;
pub mod prelude;
pub mod prompt;

pub use config::{
    GateStrategy, MemoryMode, PipelineConfig, DEFAULT_APOLOGY, DEFAULT_PERSONA, DEFAULT_REFUSAL,
};
pub use error::{GateError, IngestionError, TemplateError};
pub use gate::{
    build_gate, Evidence, HybridGate, KeywordGate, LlmGate, RelevanceDecision, RelevanceGate,
};
pub use ingest::{IngestOutcome, IngestPipeline};
pub use memory::{
    EvictionPolicy, Role, Session, SessionHandle, SessionId, SessionStore, Summarizer, Turn,
};
pub use orchestrator::{QueryOrchestrator, QueryRequest, QueryResponse};
pub use prompt::{PersonaTemplate, PromptAssembler, Slot};
