//! Session memory: per-conversation history keyed by session id.
//!
//! The store is process-wide and in-memory only; sessions are lost on
//! restart. Each session sits behind its own async mutex so requests for the
//! same conversation are serialised while different conversations proceed
//! in parallel. The map lock is only held long enough to look up or insert a
//! handle.

use crate::config::{MemoryConfig, MemoryMode};
use chrono::{DateTime, Utc};
use grappler_llm::{LlmBackend, LlmError, PromptTemplate, SummaryPrompt};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use uuid::Uuid;

/// Who produced a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    /// Synthesised summary of compacted turns.
    Summary,
}

impl Role {
    /// Label used when rendering history into a prompt.
    pub fn label(&self) -> &'static str {
        match self {
            Role::User => "User",
            Role::Assistant => "Assistant",
            Role::Summary => "Summary of earlier conversation",
        }
    }
}

/// One message in a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    pub fn summary(content: impl Into<String>) -> Self {
        Self::new(Role::Summary, content)
    }

    /// `"<Role>: <content>"`.
    pub fn render(&self) -> String {
        format!("{}: {}", self.role.label(), self.content)
    }
}

/// Opaque conversation identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Mint a fresh random id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse a caller-supplied id. Anything that is not a UUID is `None`.
    pub fn parse(s: &str) -> Option<Self> {
        Uuid::parse_str(s.trim()).ok().map(Self)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl FromStr for SessionId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim()).map(Self)
    }
}

/// A conversation: ordered turns plus bookkeeping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub history: Vec<Turn>,
    pub created_at: DateTime<Utc>,
    pub last_active: DateTime<Utc>,
}

impl Session {
    fn new(id: SessionId) -> Self {
        let now = Utc::now();
        Self {
            id,
            history: Vec::new(),
            created_at: now,
            last_active: now,
        }
    }

    /// Append a turn in chronological order.
    pub fn push(&mut self, turn: Turn) {
        self.history.push(turn);
        self.last_active = Utc::now();
    }

    /// Record activity without changing history.
    pub fn touch(&mut self) {
        self.last_active = Utc::now();
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }
}

/// Shared handle to one session.
pub type SessionHandle = Arc<tokio::sync::Mutex<Session>>;

/// When idle sessions are dropped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EvictionPolicy {
    /// Sessions live until the process exits.
    #[default]
    NeverExpire,
    /// Sessions idle for longer than the timeout are evicted on sweep.
    IdleTimeout(Duration),
}

impl EvictionPolicy {
    pub fn from_config(config: &MemoryConfig) -> Self {
        match config.idle_timeout_secs {
            Some(secs) => EvictionPolicy::IdleTimeout(Duration::from_secs(secs)),
            None => EvictionPolicy::NeverExpire,
        }
    }

    /// Whether a session last active at `last_active` is expired at `now`.
    pub fn is_expired(&self, last_active: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        match self {
            EvictionPolicy::NeverExpire => false,
            EvictionPolicy::IdleTimeout(timeout) => {
                let idle = now.signed_duration_since(last_active);
                chrono::Duration::from_std(*timeout).map_or(false, |t| idle > t)
            }
        }
    }
}

/// Process-wide table of sessions.
///
/// Unknown or absent ids are never an error: they mint a new session.
#[derive(Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<SessionId, SessionHandle>>,
    policy: EvictionPolicy,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_policy(policy: EvictionPolicy) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            policy,
        }
    }

    pub fn policy(&self) -> EvictionPolicy {
        self.policy
    }

    /// Resolve `id` to an existing session, or create a new one.
    ///
    /// Ids that do not parse, or that are not in the table, get a freshly
    /// minted id and an empty history.
    pub fn get_or_create(&self, id: Option<&str>) -> (SessionId, SessionHandle) {
        if let Some(id) = id.and_then(SessionId::parse) {
            let sessions = self.sessions.read().unwrap_or_else(|e| e.into_inner());
            if let Some(handle) = sessions.get(&id) {
                return (id, Arc::clone(handle));
            }
        }

        let mut sessions = self.sessions.write().unwrap_or_else(|e| e.into_inner());
        let id = loop {
            let candidate = SessionId::new();
            if !sessions.contains_key(&candidate) {
                break candidate;
            }
        };
        let handle = Arc::new(tokio::sync::Mutex::new(Session::new(id)));
        sessions.insert(id, Arc::clone(&handle));
        tracing::debug!(session = %id, "session created");
        (id, handle)
    }

    /// Look up a session without creating one.
    pub fn get(&self, id: &SessionId) -> Option<SessionHandle> {
        let sessions = self.sessions.read().unwrap_or_else(|e| e.into_inner());
        sessions.get(id).cloned()
    }

    /// Append a turn to an existing session.
    ///
    /// Returns `false` if the session is unknown.
    pub async fn append(&self, id: &SessionId, turn: Turn) -> bool {
        match self.get(id) {
            Some(handle) => {
                handle.lock().await.push(turn);
                true
            }
            None => false,
        }
    }

    /// Copy of a session's history.
    pub async fn history(&self, id: &SessionId) -> Option<Vec<Turn>> {
        let handle = self.get(id)?;
        let session = handle.lock().await;
        Some(session.history.clone())
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        self.sessions.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Evict expired sessions now.
    pub fn sweep(&self) -> usize {
        self.sweep_at(Utc::now())
    }

    /// Evict sessions expired as of `now`.
    ///
    /// A session whose handle is held outside the table is in use, even if
    /// its holder has not locked it yet, and is skipped. Handles are only
    /// handed out under the table lock, so the count cannot change here.
    pub fn sweep_at(&self, now: DateTime<Utc>) -> usize {
        if self.policy == EvictionPolicy::NeverExpire {
            return 0;
        }

        let mut sessions = self.sessions.write().unwrap_or_else(|e| e.into_inner());
        let before = sessions.len();
        sessions.retain(|_, handle| {
            if Arc::strong_count(handle) > 1 {
                return true;
            }
            match handle.try_lock() {
                Ok(session) => !self.policy.is_expired(session.last_active, now),
                Err(_) => true,
            }
        });
        let evicted = before - sessions.len();
        if evicted > 0 {
            tracing::debug!(evicted, remaining = sessions.len(), "sessions evicted");
        }
        evicted
    }
}

/// Progressive summarisation of long histories.
///
/// Once a history grows past `max_turns`, every turn except the most recent
/// `keep_recent` is folded into a single [`Role::Summary`] turn. Compaction
/// is irreversible.
pub struct Summarizer {
    llm: Arc<dyn LlmBackend>,
    max_turns: usize,
    keep_recent: usize,
    timeout: Duration,
}

impl Summarizer {
    pub fn new(llm: Arc<dyn LlmBackend>, max_turns: usize, keep_recent: usize) -> Self {
        let max_turns = max_turns.max(1);
        Self {
            llm,
            max_turns,
            keep_recent: keep_recent.min(max_turns - 1),
            timeout: Duration::from_secs(30),
        }
    }

    /// Build from config; `None` unless summary mode is selected.
    pub fn from_config(
        config: &MemoryConfig,
        llm: Arc<dyn LlmBackend>,
        timeout: Duration,
    ) -> Option<Self> {
        match config.mode {
            MemoryMode::Buffer => None,
            MemoryMode::Summary => {
                Some(Self::new(llm, config.max_turns, config.keep_recent).with_timeout(timeout))
            }
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Compact `session` if it is over the limit.
    ///
    /// Returns whether compaction happened. On failure the history is left
    /// untouched and compaction is retried after the next exchange.
    pub async fn compact(&self, session: &mut Session) -> Result<bool, LlmError> {
        if session.history.len() <= self.max_turns {
            return Ok(false);
        }

        let split = session.history.len() - self.keep_recent;
        let (older, _) = session.history.split_at(split);

        let (summary, folded) = match older.first() {
            Some(first) if first.role == Role::Summary => (first.content.as_str(), &older[1..]),
            _ => ("", older),
        };
        let new_lines = folded
            .iter()
            .map(Turn::render)
            .collect::<Vec<_>>()
            .join("\n");

        let request = SummaryPrompt::new(summary, new_lines).to_request();
        let text = match tokio::time::timeout(self.timeout, self.llm.generate(&request)).await {
            Ok(result) => result?,
            Err(_) => return Err(LlmError::Timeout(self.timeout.as_secs())),
        };

        let recent = session.history.split_off(split);
        session.history = std::iter::once(Turn::summary(text.trim()))
            .chain(recent)
            .collect();

        tracing::debug!(session = %session.id, turns = session.history.len(), "history compacted");
        Ok(true)
    }
}
