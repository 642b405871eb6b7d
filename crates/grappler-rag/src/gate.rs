//! Relevance gate: decides whether a question is in-domain before any
//! retrieval or generation budget is spent.
//!
//! Three strategies share the [`RelevanceGate`] trait:
//! - [`KeywordGate`] scans the query for domain terms.
//! - [`LlmGate`] asks a classifier for a strict Yes/No verdict.
//! - [`HybridGate`] asks the classifier first and falls back to keywords
//!   when the verdict is negative or the call fails.
//!
//! A classifier failure is inconclusive, not negative. With `fail_open` set
//! (the default) an inconclusive check admits the query.

use crate::config::{GateConfig, GateStrategy};
use crate::error::GateError;
use async_trait::async_trait;
use grappler_llm::{parse_verdict, LlmBackend, PromptTemplate, RelevancePrompt};
use std::sync::Arc;
use std::time::Duration;

/// Terms naming the domain itself.
pub const IDENTITY_TERMS: &[&str] = &[
    "jiu-jitsu", "jiu jitsu", "jiujitsu", "jujitsu", "ju-jitsu", "bjj", "grappling",
    "grappler", "wrestling", "wrestler", "judo", "sambo", "no-gi", "gi", "martial arts",
    "martial art", "mma", "submission grappling", "rolling", "sparring", "black belt",
    "blue belt", "purple belt", "brown belt", "white belt",
];

/// Positions, submissions and movements.
pub const TECHNIQUE_TERMS: &[&str] = &[
    "guard", "closed guard", "open guard", "half guard", "butterfly guard", "spider guard",
    "de la riva", "x guard", "guard pass", "guard passing", "mount", "side control",
    "knee on belly", "north south", "back control", "back take", "turtle", "armbar",
    "arm bar", "kimura", "americana", "omoplata", "triangle", "guillotine", "rear naked",
    "darce", "anaconda", "ezekiel", "choke", "strangle", "heel hook", "kneebar", "toe hold",
    "leg lock", "wrist lock", "submission", "sweep", "takedown", "single leg", "double leg",
    "sprawl", "underhook", "overhook", "hip escape", "shrimp", "shrimping", "berimbolo",
    "lapel", "collar choke", "seatbelt", "clinch", "tap out",
];

/// Why the gate decided the way it did. Logged, never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Evidence {
    /// The classifier answered; the trimmed answer is kept.
    Verdict(String),
    /// A domain term matched.
    Keyword(String),
    /// The classifier failed and no keyword matched; admitted anyway.
    FailOpen(String),
    /// Nothing supported relevance.
    NoMatch {
        verdict: Option<String>,
        error: Option<String>,
    },
}

/// The outcome of a relevance check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelevanceDecision {
    pub relevant: bool,
    pub evidence: Evidence,
}

impl RelevanceDecision {
    fn admit(evidence: Evidence) -> Self {
        Self {
            relevant: true,
            evidence,
        }
    }

    fn reject(evidence: Evidence) -> Self {
        Self {
            relevant: false,
            evidence,
        }
    }
}

/// Decides whether a query belongs to the assistant's domain.
///
/// A gate depends only on the query and its own configuration; it never
/// touches sessions or the index.
#[async_trait]
pub trait RelevanceGate: Send + Sync {
    /// Strategy name, for logs.
    fn name(&self) -> &str;

    async fn check(&self, query: &str) -> RelevanceDecision;
}

/// Lowercase and split on anything that is not a letter or digit.
fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_string)
        .collect()
}

/// Query token `word` matches term token `term`, allowing a plural suffix.
fn word_matches(word: &str, term: &str) -> bool {
    match word.strip_prefix(term) {
        Some("") | Some("s") | Some("es") => true,
        _ => false,
    }
}

/// Keyword-set gate.
///
/// Terms match on whole words, so "gi" matches "no gi" but not "register".
/// Multi-word terms must appear as a contiguous word sequence.
#[derive(Debug, Clone)]
pub struct KeywordGate {
    terms: Vec<(String, Vec<String>)>,
}

impl KeywordGate {
    /// The built-in identity and technique sets.
    pub fn new() -> Self {
        Self::with_terms(IDENTITY_TERMS.iter().chain(TECHNIQUE_TERMS).copied())
    }

    /// Only the given terms.
    pub fn with_terms<S: AsRef<str>>(terms: impl IntoIterator<Item = S>) -> Self {
        let terms = terms
            .into_iter()
            .map(|t| (t.as_ref().to_lowercase(), tokenize(t.as_ref())))
            .filter(|(_, tokens)| !tokens.is_empty())
            .collect();
        Self { terms }
    }

    /// Built-in sets plus extra identity and technique terms from config.
    pub fn from_config(config: &GateConfig) -> Self {
        let extras = config
            .identity_terms
            .iter()
            .chain(&config.technique_terms)
            .map(String::as_str);
        Self::with_terms(
            IDENTITY_TERMS
                .iter()
                .chain(TECHNIQUE_TERMS)
                .copied()
                .chain(extras),
        )
    }

    /// The first term found in `query`, if any.
    pub fn find_match(&self, query: &str) -> Option<&str> {
        let words = tokenize(query);
        self.terms
            .iter()
            .find(|(_, term)| {
                words.len() >= term.len()
                    && words
                        .windows(term.len())
                        .any(|w| w.iter().zip(term).all(|(a, b)| word_matches(a, b)))
            })
            .map(|(raw, _)| raw.as_str())
    }
}

impl Default for KeywordGate {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RelevanceGate for KeywordGate {
    fn name(&self) -> &str {
        "keyword"
    }

    async fn check(&self, query: &str) -> RelevanceDecision {
        match self.find_match(query) {
            Some(term) => RelevanceDecision::admit(Evidence::Keyword(term.to_string())),
            None => RelevanceDecision::reject(Evidence::NoMatch {
                verdict: None,
                error: None,
            }),
        }
    }
}

/// LLM classifier gate.
pub struct LlmGate {
    llm: Arc<dyn LlmBackend>,
    topic: String,
    timeout: Duration,
    fail_open: bool,
}

impl LlmGate {
    pub fn new(llm: Arc<dyn LlmBackend>, topic: impl Into<String>) -> Self {
        Self {
            llm,
            topic: topic.into(),
            timeout: Duration::from_secs(15),
            fail_open: true,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_fail_open(mut self, fail_open: bool) -> Self {
        self.fail_open = fail_open;
        self
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Ask the classifier; returns the trimmed raw answer.
    pub async fn classify(&self, query: &str) -> Result<String, GateError> {
        let request = RelevancePrompt::new(query, self.topic.as_str()).to_request();
        match tokio::time::timeout(self.timeout, self.llm.generate(&request)).await {
            Ok(Ok(answer)) => Ok(answer.trim().to_string()),
            Ok(Err(e)) => Err(GateError::Classifier(e)),
            Err(_) => Err(GateError::Timeout(self.timeout)),
        }
    }
}

#[async_trait]
impl RelevanceGate for LlmGate {
    fn name(&self) -> &str {
        "llm"
    }

    async fn check(&self, query: &str) -> RelevanceDecision {
        match self.classify(query).await {
            Ok(answer) if parse_verdict(&answer) => {
                RelevanceDecision::admit(Evidence::Verdict(answer))
            }
            Ok(answer) => RelevanceDecision::reject(Evidence::NoMatch {
                verdict: Some(answer),
                error: None,
            }),
            Err(e) if self.fail_open => {
                tracing::warn!(error = %e, "relevance check failed, admitting query");
                RelevanceDecision::admit(Evidence::FailOpen(e.to_string()))
            }
            Err(e) => {
                tracing::warn!(error = %e, "relevance check failed, rejecting query");
                RelevanceDecision::reject(Evidence::NoMatch {
                    verdict: None,
                    error: Some(e.to_string()),
                })
            }
        }
    }
}

/// Classifier first, keywords as fallback.
pub struct HybridGate {
    classifier: LlmGate,
    keywords: KeywordGate,
}

impl HybridGate {
    pub fn new(classifier: LlmGate, keywords: KeywordGate) -> Self {
        Self {
            classifier,
            keywords,
        }
    }
}

#[async_trait]
impl RelevanceGate for HybridGate {
    fn name(&self) -> &str {
        "hybrid"
    }

    async fn check(&self, query: &str) -> RelevanceDecision {
        let (verdict, error) = match self.classifier.classify(query).await {
            Ok(answer) if parse_verdict(&answer) => {
                return RelevanceDecision::admit(Evidence::Verdict(answer));
            }
            Ok(answer) => (Some(answer), None),
            Err(e) => {
                tracing::warn!(error = %e, "relevance classifier failed, falling back to keywords");
                (None, Some(e))
            }
        };

        if let Some(term) = self.keywords.find_match(query) {
            return RelevanceDecision::admit(Evidence::Keyword(term.to_string()));
        }

        match error {
            Some(e) if self.classifier.fail_open => {
                tracing::warn!(error = %e, "no keyword match, admitting query (fail-open)");
                RelevanceDecision::admit(Evidence::FailOpen(e.to_string()))
            }
            error => RelevanceDecision::reject(Evidence::NoMatch {
                verdict,
                error: error.map(|e| e.to_string()),
            }),
        }
    }
}

/// Build the configured gate.
pub fn build_gate(
    config: &GateConfig,
    llm: Arc<dyn LlmBackend>,
    timeout: Duration,
) -> Arc<dyn RelevanceGate> {
    let classifier = || {
        LlmGate::new(Arc::clone(&llm), config.topic.as_str())
            .with_timeout(timeout)
            .with_fail_open(config.fail_open)
    };

    match config.strategy {
        GateStrategy::Keyword => Arc::new(KeywordGate::from_config(config)),
        GateStrategy::Llm => Arc::new(classifier()),
        GateStrategy::Hybrid => Arc::new(HybridGate::new(
            classifier(),
            KeywordGate::from_config(config),
        )),
    }
}
