//! Session state store
//!
//! One [`ConversationState`] per browser session: the transcript, the
//! running word count, the pending input and the lazily built conversation
//! handle. Nothing here performs I/O.

use crate::answerer::{Answerer, ConversationContext};
use crate::config::ChatConfig;
use crate::llm::LlmError;
use crate::system_prompt::COACH_PERSONA;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Which party produced a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    Human,
    Ai,
}

/// One entry of the transcript; immutable once created
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Message {
    origin: Origin,
    text: String,
}

impl Message {
    pub fn human(text: impl Into<String>) -> Self {
        Self {
            origin: Origin::Human,
            text: text.into(),
        }
    }

    pub fn ai(text: impl Into<String>) -> Self {
        Self {
            origin: Origin::Ai,
            text: text.into(),
        }
    }

    #[allow(dead_code)] // Read through serde by the page; Rust callers are tests
    pub fn origin(&self) -> Origin {
        self.origin
    }

    #[allow(dead_code)] // Read through serde by the page; Rust callers are tests
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Whitespace-delimited token count
    pub fn word_count(&self) -> u64 {
        word_count(&self.text)
    }
}

pub fn word_count(text: &str) -> u64 {
    text.split_whitespace().count() as u64
}

/// Initialization failures
#[derive(Debug, Error)]
pub enum InitError {
    #[error("Gemini API key not found. Set GOOGLE_API_KEY in the environment or .env file.")]
    MissingCredential,
    #[error("Failed to create the conversation: {0}")]
    Client(#[source] LlmError),
}

/// The answerer created for a session plus the context it maintains
pub struct Conversation {
    answerer: Arc<dyn Answerer>,
    context: ConversationContext,
    request_timeout: Duration,
}

impl Conversation {
    pub fn answerer(&self) -> &Arc<dyn Answerer> {
        &self.answerer
    }

    pub fn context(&self) -> &ConversationContext {
        &self.context
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }
}

impl fmt::Debug for Conversation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Conversation")
            .field("model", &self.answerer.model_id())
            .field("context", &self.context)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

/// Session lifecycle
///
/// `Initializing` only exists inside [`ConversationState::ensure_initialized`],
/// so it is never observable at rest.
#[derive(Debug, Default)]
pub enum SessionPhase {
    #[default]
    Uninitialized,
    Ready(Conversation),
}

/// Phase label exposed to the presentation layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseKind {
    Uninitialized,
    Ready,
}

/// Read-only view of a session for rendering
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSnapshot {
    pub phase: PhaseKind,
    pub history: Vec<Message>,
    pub word_count: u64,
    pub pending_input: String,
    /// Blocking initialization error, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

/// Per-session conversation state
#[derive(Debug, Default)]
pub struct ConversationState {
    history: Vec<Message>,
    word_count: u64,
    phase: SessionPhase,
    pending_input: String,
    init_error: Option<String>,
}

impl ConversationState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the conversation handle if it does not exist yet.
    ///
    /// Idempotent: once `Ready`, neither the config nor `build` is consulted
    /// again and the existing answerer is kept. A failure leaves the session
    /// `Uninitialized` with the error recorded for display.
    pub fn ensure_initialized<F>(&mut self, config: &ChatConfig, build: F) -> Result<(), InitError>
    where
        F: FnOnce(&ChatConfig, &str) -> Result<Arc<dyn Answerer>, LlmError>,
    {
        if self.is_ready() {
            return Ok(());
        }

        let result = match config.api_key() {
            None => Err(InitError::MissingCredential),
            Some(api_key) => build(config, api_key).map_err(InitError::Client),
        };

        match result {
            Ok(answerer) => {
                tracing::info!(model = %answerer.model_id(), "Conversation initialized");
                self.phase = SessionPhase::Ready(Conversation {
                    answerer,
                    context: ConversationContext::seeded(COACH_PERSONA),
                    request_timeout: config.request_timeout,
                });
                self.init_error = None;
                Ok(())
            }
            Err(e) => {
                tracing::warn!(error = %e, "Conversation initialization failed");
                self.init_error = Some(e.to_string());
                Err(e)
            }
        }
    }

    pub fn append(&mut self, message: Message) {
        self.history.push(message);
    }

    pub fn increment_word_count(&mut self, n: u64) {
        self.word_count = self.word_count.saturating_add(n);
    }

    /// Replace the conversation context after a completed exchange
    pub(super) fn commit_context(&mut self, context: ConversationContext) {
        if let SessionPhase::Ready(conversation) = &mut self.phase {
            conversation.context = context;
        }
    }

    pub fn set_pending_input(&mut self, text: impl Into<String>) {
        self.pending_input = text.into();
    }

    pub fn clear_pending_input(&mut self) {
        self.pending_input.clear();
    }

    pub fn history(&self) -> &[Message] {
        &self.history
    }

    pub fn word_count(&self) -> u64 {
        self.word_count
    }

    pub fn pending_input(&self) -> &str {
        &self.pending_input
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.phase, SessionPhase::Ready(_))
    }

    pub fn conversation(&self) -> Option<&Conversation> {
        match &self.phase {
            SessionPhase::Ready(conversation) => Some(conversation),
            SessionPhase::Uninitialized => None,
        }
    }

    pub fn init_error(&self) -> Option<&str> {
        self.init_error.as_deref()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            phase: if self.is_ready() {
                PhaseKind::Ready
            } else {
                PhaseKind::Uninitialized
            },
            history: self.history.clone(),
            word_count: self.word_count,
            pending_input: self.pending_input().to_string(),
            error: self.init_error().map(str::to_string),
            model: self
                .conversation()
                .map(|c| c.answerer().model_id().to_string()),
        }
    }
}
