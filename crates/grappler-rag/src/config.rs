//! Pipeline configuration.
//!
//! Every field has a default, so an empty TOML table (or no file at all)
//! yields a working pipeline.

use grappler_index::{SimilarityMetric, MAX_TOP_K};
use grappler_llm::ModelParams;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Refusal returned for out-of-domain questions.
pub const DEFAULT_REFUSAL: &str = "I'm sorry, but that question isn't relevant to making you a better grappler. Can you ask a more relevant question?";

/// Apology returned when retrieval or generation fails.
pub const DEFAULT_APOLOGY: &str =
    "Sorry, I couldn't put an answer together right now. Please try asking again in a moment.";

/// Default coaching persona.
pub const DEFAULT_PERSONA: &str = "\
You are an experienced grappling coach helping a student improve at Brazilian jiu-jitsu and submission grappling.
Answer using the instructional transcript excerpts below. If they do not cover the question, say so instead of guessing.
Keep answers practical: positions, grips, the order of the steps and the common mistakes.

Conversation so far:
{history}

Transcript excerpts:
{context}

Question: {question}
Answer:";

/// Top-level pipeline configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub gate: GateConfig,
    #[serde(default)]
    pub memory: MemoryConfig,
    #[serde(default)]
    pub prompt: PromptConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub timeouts: TimeoutConfig,
    #[serde(default)]
    pub responses: ResponseConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_overlap")]
    pub overlap: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexConfig {
    #[serde(default = "default_index_dir")]
    pub dir: PathBuf,
    #[serde(default = "default_collection")]
    pub collection: String,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default)]
    pub metric: SimilarityMetric,
}

/// Which relevance gate to run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateStrategy {
    /// Static keyword sets only; no LLM call.
    Keyword,
    /// LLM classifier only.
    Llm,
    /// LLM classifier first, keyword sets as fallback.
    #[default]
    Hybrid,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateConfig {
    #[serde(default)]
    pub strategy: GateStrategy,
    #[serde(default = "default_topic")]
    pub topic: String,
    #[serde(default = "default_true")]
    pub fail_open: bool,
    /// Extra domain-identity terms, added to the built-in set.
    #[serde(default)]
    pub identity_terms: Vec<String>,
    /// Extra technique terms, added to the built-in set.
    #[serde(default)]
    pub technique_terms: Vec<String>,
}

/// How session history is kept.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryMode {
    /// Keep every turn.
    #[default]
    Buffer,
    /// Fold older turns into an LLM-written summary.
    Summary,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryConfig {
    #[serde(default)]
    pub mode: MemoryMode,
    /// Summary mode: compact once history exceeds this many turns.
    #[serde(default = "default_max_turns")]
    pub max_turns: usize,
    /// Summary mode: turns kept verbatim after compaction.
    #[serde(default = "default_keep_recent")]
    pub keep_recent: usize,
    /// Evict sessions idle for longer than this. Absent means never.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idle_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptConfig {
    #[serde(default = "default_persona")]
    pub persona: String,
    #[serde(default = "default_max_prompt_chars")]
    pub max_prompt_chars: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationConfig {
    #[serde(default)]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeoutConfig {
    #[serde(default = "default_embedding_secs")]
    pub embedding_secs: u64,
    #[serde(default = "default_classification_secs")]
    pub classification_secs: u64,
    #[serde(default = "default_generation_secs")]
    pub generation_secs: u64,
    #[serde(default = "default_summary_secs")]
    pub summary_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseConfig {
    #[serde(default = "default_refusal")]
    pub refusal: String,
    #[serde(default = "default_apology")]
    pub apology: String,
}

// Default value functions
fn default_chunk_size() -> usize { 1500 }
fn default_overlap() -> usize { 500 }
fn default_index_dir() -> PathBuf { PathBuf::from(".grappler/index") }
fn default_collection() -> String { "transcripts".to_string() }
fn default_top_k() -> usize { 20 }
fn default_topic() -> String { "Brazilian jiu-jitsu, grappling and martial arts technique".to_string() }
fn default_true() -> bool { true }
fn default_max_turns() -> usize { 12 }
fn default_keep_recent() -> usize { 4 }
fn default_persona() -> String { DEFAULT_PERSONA.to_string() }
fn default_max_prompt_chars() -> usize { 24_000 }
fn default_max_tokens() -> u32 { 1024 }
fn default_embedding_secs() -> u64 { 30 }
fn default_classification_secs() -> u64 { 15 }
fn default_generation_secs() -> u64 { 60 }
fn default_summary_secs() -> u64 { 30 }
fn default_refusal() -> String { DEFAULT_REFUSAL.to_string() }
fn default_apology() -> String { DEFAULT_APOLOGY.to_string() }

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            overlap: default_overlap(),
        }
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            dir: default_index_dir(),
            collection: default_collection(),
            top_k: default_top_k(),
            metric: SimilarityMetric::default(),
        }
    }
}

impl IndexConfig {
    /// Configured `top_k`, clamped to the index's hard cap.
    pub fn effective_top_k(&self) -> usize {
        self.top_k.min(MAX_TOP_K)
    }
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            strategy: GateStrategy::default(),
            topic: default_topic(),
            fail_open: default_true(),
            identity_terms: Vec::new(),
            technique_terms: Vec::new(),
        }
    }
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            mode: MemoryMode::default(),
            max_turns: default_max_turns(),
            keep_recent: default_keep_recent(),
            idle_timeout_secs: None,
        }
    }
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            persona: default_persona(),
            max_prompt_chars: default_max_prompt_chars(),
        }
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            temperature: 0.0,
            max_tokens: default_max_tokens(),
        }
    }
}

impl GenerationConfig {
    /// Sampling parameters for answer generation.
    pub fn params(&self) -> ModelParams {
        ModelParams::default()
            .with_temperature(self.temperature)
            .with_max_tokens(self.max_tokens)
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            embedding_secs: default_embedding_secs(),
            classification_secs: default_classification_secs(),
            generation_secs: default_generation_secs(),
            summary_secs: default_summary_secs(),
        }
    }
}

impl TimeoutConfig {
    pub fn embedding(&self) -> Duration {
        Duration::from_secs(self.embedding_secs)
    }

    pub fn classification(&self) -> Duration {
        Duration::from_secs(self.classification_secs)
    }

    pub fn generation(&self) -> Duration {
        Duration::from_secs(self.generation_secs)
    }

    pub fn summary(&self) -> Duration {
        Duration::from_secs(self.summary_secs)
    }
}

impl Default for ResponseConfig {
    fn default() -> Self {
        Self {
            refusal: default_refusal(),
            apology: default_apology(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_toml_gives_defaults() {
        let config: PipelineConfig = toml::from_str("").unwrap();
        assert_eq!(config, PipelineConfig::default());
        assert_eq!(config.chunking.chunk_size, 1500);
        assert_eq!(config.chunking.overlap, 500);
        assert_eq!(config.index.top_k, 20);
        assert_eq!(config.gate.strategy, GateStrategy::Hybrid);
        assert!(config.gate.fail_open);
        assert_eq!(config.responses.refusal, DEFAULT_REFUSAL);
    }

    #[test]
    fn test_partial_sections() {
        let config: PipelineConfig = toml::from_str(
            r#"
            [index]
            top_k = 80
            metric = "dot_product"

            [gate]
            strategy = "keyword"
            fail_open = false
            technique_terms = ["worm guard"]

            [memory]
            mode = "summary"
            idle_timeout_secs = 3600
            "#,
        )
        .unwrap();

        assert_eq!(config.index.metric, SimilarityMetric::DotProduct);
        assert_eq!(config.index.effective_top_k(), MAX_TOP_K);
        assert_eq!(config.index.collection, "transcripts");
        assert_eq!(config.gate.strategy, GateStrategy::Keyword);
        assert!(!config.gate.fail_open);
        assert_eq!(config.gate.technique_terms, vec!["worm guard"]);
        assert_eq!(config.memory.mode, MemoryMode::Summary);
        assert_eq!(config.memory.idle_timeout_secs, Some(3600));
        assert_eq!(config.memory.keep_recent, 4);
    }

    #[test]
    fn test_generation_params() {
        let config = GenerationConfig {
            temperature: 0.3,
            max_tokens: 200,
        };
        let params = config.params();
        assert_eq!(params.max_tokens, 200);
        assert!((params.temperature - 0.3).abs() < f32::EPSILON);
    }

    #[test]
    fn test_default_persona_round_trips_through_toml() {
        let config = PipelineConfig::default();
        let text = toml::to_string_pretty(&config).unwrap();
        let back: PipelineConfig = toml::from_str(&text).unwrap();
        assert_eq!(back.prompt.persona, DEFAULT_PERSONA);
    }
}
