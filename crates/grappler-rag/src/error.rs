//! Error types for the pipeline components.
//!
//! Only [`IngestionError`] and [`TemplateError`] ever reach a caller: the
//! first at startup, the second when a persona is configured. Gate and
//! summary failures are resolved inside their components and logged.

use grappler_embeddings::ChunkError;
use grappler_index::IndexError;
use grappler_llm::LlmError;
use std::path::PathBuf;
use thiserror::Error;

/// Corpus ingestion failed. Fatal at startup.
#[derive(Debug, Error)]
pub enum IngestionError {
    #[error("Invalid chunking parameters: {0}")]
    Chunking(#[from] ChunkError),

    #[error("Failed to read corpus: {0}")]
    Corpus(#[source] IndexError),

    #[error("Corpus at {} produced no passages", .0.display())]
    EmptyCorpus(PathBuf),

    #[error("Failed to build index: {0}")]
    Build(#[source] IndexError),

    #[error("Failed to persist index: {0}")]
    Persist(#[source] IndexError),
}

/// The relevance classifier could not produce a verdict.
#[derive(Debug, Error)]
pub enum GateError {
    #[error("Classifier call failed: {0}")]
    Classifier(#[from] LlmError),

    #[error("Classifier timed out after {0:?}")]
    Timeout(std::time::Duration),
}

/// A persona template is malformed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    #[error("Template is missing required slot {{{0}}}")]
    MissingSlot(&'static str),

    #[error("Template uses slot {{{0}}} more than once")]
    DuplicateSlot(&'static str),

    #[error("Template names unknown slot {{{0}}}")]
    UnknownSlot(String),

    #[error("Unclosed '{{' at character {0}")]
    Unclosed(usize),

    #[error("Unmatched '}}' at character {0}")]
    Unmatched(usize),
}
