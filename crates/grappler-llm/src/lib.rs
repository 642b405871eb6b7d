//! # Grappler LLM
//!
//! LLM integration for the grappler pipeline: answer generation, the
//! relevance classifier and conversation summarisation all go through the
//! same [`LlmBackend`] trait.
//!
//! ## Features
//!
//! - `api`: Cloud API backends (OpenAI)
//! - `local`: Local backends (Ollama)
//! - `full`: All backends
//!
//! ## Usage
//!
//! ```rust,ignore
//! use grappler_llm::{LlmBackend, OllamaBackend};
//!
//! let backend = OllamaBackend::localhost()?;
//! let answer = backend.complete("How do I break closed guard?").await?;
//! ```

mod backend;
mod prompt;
mod types;

pub use backend::{LlmBackend, LlmConfig, LlmError, LlmResult, MockBackend};
pub use prompt::{parse_verdict, PromptTemplate, RelevancePrompt, SummaryPrompt};
pub use types::{GenerationRequest, ModelParams};

#[cfg(feature = "local")]
mod ollama;
#[cfg(feature = "local")]
pub use ollama::OllamaBackend;

#[cfg(feature = "api")]
mod openai;
#[cfg(feature = "api")]
pub use openai::OpenAiBackend;

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::{GenerationRequest, LlmBackend, LlmConfig, LlmError, LlmResult, ModelParams};
    pub use crate::{PromptTemplate, RelevancePrompt, SummaryPrompt};

    #[cfg(feature = "local")]
    pub use crate::OllamaBackend;

    #[cfg(feature = "api")]
    pub use crate::OpenAiBackend;
}
