//! Grappler RAG Prelude: convenient imports for common usage.
//!
//! ```rust
//! use grappler_rag::prelude::*;
//! ```

pub use crate::config::{GateStrategy, MemoryMode, PipelineConfig};
pub use crate::error::{IngestionError, TemplateError};
pub use crate::gate::{RelevanceDecision, RelevanceGate};
pub use crate::ingest::{IngestOutcome, IngestPipeline};
pub use crate::memory::{Role, SessionId, SessionStore, Turn};
pub use crate::orchestrator::{QueryOrchestrator, QueryRequest, QueryResponse};
pub use crate::prompt::{PersonaTemplate, PromptAssembler};

pub use grappler_embeddings::Embedder;
pub use grappler_index::{Retriever, SharedIndex};
pub use grappler_llm::LlmBackend;
pub use std::sync::Arc;
