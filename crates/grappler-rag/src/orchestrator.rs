//! The query orchestrator: one request/response cycle over injected
//! collaborators.
//!
//! 1. Resolve the session (create if absent or unknown).
//! 2. Relevance gate. Off-topic queries get the refusal, with no retrieval
//!    and no generation.
//! 3. Retrieve the top-k passages.
//! 4. Assemble the prompt from persona, history and passages.
//! 5. Generate. Any failure becomes the apology string.
//! 6. Append the user and assistant turns.
//! 7. Return the response text and the session id.
//!
//! The orchestrator holds no conversation state of its own; sessions live in
//! the [`SessionStore`].

use crate::config::PipelineConfig;
use crate::error::TemplateError;
use crate::gate::{build_gate, RelevanceGate};
use crate::memory::{EvictionPolicy, SessionId, SessionStore, Summarizer, Turn};
use crate::prompt::PromptAssembler;
use grappler_index::Retriever;
use grappler_llm::{LlmBackend, LlmError};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::Instrument;

/// Input to [`QueryOrchestrator::process_query`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryRequest {
    pub query: String,
    /// Session to continue. Absent or unknown ids start a new session.
    #[serde(default)]
    pub session_id: Option<String>,
    /// History supplied by the caller. When present it is used for the
    /// prompt instead of the stored session history.
    #[serde(default)]
    pub history: Option<Vec<Turn>>,
}

impl QueryRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Self::default()
        }
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn with_history(mut self, history: Vec<Turn>) -> Self {
        self.history = Some(history);
        self
    }
}

/// Output of [`QueryOrchestrator::process_query`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResponse {
    pub response_text: String,
    pub session_id: SessionId,
}

/// How a request ended, for logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Answered,
    Refused,
    RetrievalFailed,
    GenerationFailed,
}

/// Coordinates gate, retrieval, prompt assembly, generation and memory.
pub struct QueryOrchestrator {
    gate: Arc<dyn RelevanceGate>,
    retriever: Arc<dyn Retriever>,
    llm: Arc<dyn LlmBackend>,
    assembler: PromptAssembler,
    sessions: Arc<SessionStore>,
    summarizer: Option<Summarizer>,
    top_k: usize,
    generation_timeout: Duration,
    refusal: String,
    apology: String,
}

impl QueryOrchestrator {
    /// Wire up a pipeline from config.
    ///
    /// Fails only if the persona template is malformed.
    pub fn new(
        config: &PipelineConfig,
        retriever: Arc<dyn Retriever>,
        llm: Arc<dyn LlmBackend>,
    ) -> Result<Self, TemplateError> {
        let assembler =
            PromptAssembler::from_config(&config.prompt)?.with_params(config.generation.params());
        let gate = build_gate(
            &config.gate,
            Arc::clone(&llm),
            config.timeouts.classification(),
        );
        let sessions = Arc::new(SessionStore::with_policy(EvictionPolicy::from_config(
            &config.memory,
        )));
        let summarizer =
            Summarizer::from_config(&config.memory, Arc::clone(&llm), config.timeouts.summary());

        Ok(Self {
            gate,
            retriever,
            llm,
            assembler,
            sessions,
            summarizer,
            top_k: config.index.effective_top_k(),
            generation_timeout: config.timeouts.generation(),
            refusal: config.responses.refusal.clone(),
            apology: config.responses.apology.clone(),
        })
    }

    /// Replace the relevance gate.
    pub fn with_gate(mut self, gate: Arc<dyn RelevanceGate>) -> Self {
        self.gate = gate;
        self
    }

    /// Share a session store with other components.
    pub fn with_sessions(mut self, sessions: Arc<SessionStore>) -> Self {
        self.sessions = sessions;
        self
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    /// Answer one question.
    ///
    /// Never fails: gate rejections return the refusal and retrieval or
    /// generation failures return the apology.
    pub async fn process_query(&self, request: QueryRequest) -> QueryResponse {
        self.sessions.sweep();
        let (session_id, handle) = self.sessions.get_or_create(request.session_id.as_deref());

        let span = tracing::info_span!("process_query", session = %session_id);
        async move {
            // Held for the whole cycle: same-session requests run one at a time.
            let mut session = handle.lock().await;
            session.touch();

            let (response_text, outcome) = self.answer(&request, &session.history).await;

            if outcome == Outcome::Answered {
                session.push(Turn::user(request.query.as_str()));
                session.push(Turn::assistant(response_text.as_str()));

                if let Some(summarizer) = &self.summarizer {
                    if let Err(e) = summarizer.compact(&mut session).await {
                        tracing::warn!(error = %e, "history compaction failed");
                    }
                }
            }

            tracing::info!(?outcome, turns = session.len(), "query processed");
            QueryResponse {
                response_text,
                session_id,
            }
        }
        .instrument(span)
        .await
    }

    async fn answer(&self, request: &QueryRequest, stored: &[Turn]) -> (String, Outcome) {
        let decision = self.gate.check(&request.query).await;
        tracing::debug!(gate = self.gate.name(), relevant = decision.relevant, evidence = ?decision.evidence, "relevance decision");
        if !decision.relevant {
            return (self.refusal.clone(), Outcome::Refused);
        }

        let passages = match self.retriever.retrieve(&request.query, self.top_k).await {
            Ok(passages) => passages,
            Err(e) => {
                tracing::warn!(error = %e, "retrieval failed");
                return (self.apology.clone(), Outcome::RetrievalFailed);
            }
        };

        let history = request.history.as_deref().unwrap_or(stored);
        let generation = self.assembler.assemble(history, &passages, &request.query);
        tracing::debug!(
            passages = passages.len(),
            history = history.len(),
            prompt_chars = generation.char_len(),
            "prompt assembled"
        );

        match self.generate(&generation).await {
            Ok(text) => (text, Outcome::Answered),
            Err(e) => {
                tracing::warn!(error = %e, backend = self.llm.name(), "generation failed");
                (self.apology.clone(), Outcome::GenerationFailed)
            }
        }
    }

    async fn generate(&self, request: &grappler_llm::GenerationRequest) -> Result<String, LlmError> {
        match tokio::time::timeout(self.generation_timeout, self.llm.generate(request)).await {
            Ok(result) => result,
            Err(_) => Err(LlmError::Timeout(self.generation_timeout.as_secs())),
        }
    }
}
