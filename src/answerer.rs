//! The answering capability behind a chat session
//!
//! An [`Answerer`] turns one user utterance plus the session's
//! [`ConversationContext`] into a reply and the next context. It never
//! mutates the context it is handed; the caller commits the returned one
//! only when the whole exchange succeeded.

mod summary;

pub use summary::SummaryAnswerer;

use crate::config::ChatConfig;
use crate::llm::{GeminiService, LlmError, LlmService, LoggingService};
use async_trait::async_trait;
use std::sync::Arc;

/// Running, summarized memory of prior turns
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationContext {
    system_instruction: String,
    summary: String,
    turns: u64,
}

impl ConversationContext {
    /// Fresh context carrying only the persona instruction
    pub fn seeded(system_instruction: impl Into<String>) -> Self {
        Self {
            system_instruction: system_instruction.into(),
            summary: String::new(),
            turns: 0,
        }
    }

    pub fn system_instruction(&self) -> &str {
        &self.system_instruction
    }

    pub fn summary(&self) -> &str {
        &self.summary
    }

    /// Number of exchanges folded into the summary
    pub fn turns(&self) -> u64 {
        self.turns
    }

    /// Context after one more exchange, summarized as `summary`
    #[must_use]
    pub fn advanced(&self, summary: impl Into<String>) -> Self {
        Self {
            system_instruction: self.system_instruction.clone(),
            summary: summary.into(),
            turns: self.turns + 1,
        }
    }
}

/// A reply together with the context that follows it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Answer {
    pub reply: String,
    pub context: ConversationContext,
}

/// Produces replies for a conversation
#[async_trait]
pub trait Answerer: Send + Sync {
    async fn respond(
        &self,
        utterance: &str,
        context: &ConversationContext,
    ) -> Result<Answer, LlmError>;

    /// Model backing this answerer, for display
    fn model_id(&self) -> &str;
}

/// Builds an answerer from configuration and a validated API key
pub type AnswererFactory =
    Arc<dyn Fn(&ChatConfig, &str) -> Result<Arc<dyn Answerer>, LlmError> + Send + Sync>;

/// Production factory: Gemini behind request logging, with summary memory
pub fn gemini_factory() -> AnswererFactory {
    Arc::new(|config, api_key| {
        let service = GeminiService::new(api_key.to_string(), config)?;
        let llm: Arc<dyn LlmService> = Arc::new(LoggingService::new(Arc::new(service)));
        Ok(Arc::new(SummaryAnswerer::new(llm)) as Arc<dyn Answerer>)
    })
}
