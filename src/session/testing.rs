//! Mock answerers for testing
//!
//! These mocks let the session layer run without a model behind it.

use crate::answerer::{Answer, Answerer, AnswererFactory, ConversationContext};
use crate::config::ChatConfig;
use crate::llm::LlmError;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Config with a credential present
pub fn test_config() -> ChatConfig {
    ChatConfig::default().with_api_key("test-key")
}

/// Mock answerer that returns queued replies
///
/// Each successful reply advances the context with the utterance appended
/// to the summary, so tests can see what was threaded through.
pub struct MockAnswerer {
    replies: Mutex<VecDeque<Result<String, LlmError>>>,
    calls: Mutex<Vec<(String, ConversationContext)>>,
}

impl MockAnswerer {
    pub fn new() -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Queue a successful reply
    pub fn queue_reply(&self, reply: impl Into<String>) {
        self.replies.lock().unwrap().push_back(Ok(reply.into()));
    }

    /// Queue a failure
    pub fn queue_error(&self, error: LlmError) {
        self.replies.lock().unwrap().push_back(Err(error));
    }

    /// Every `(utterance, context)` the answerer was called with
    pub fn recorded_calls(&self) -> Vec<(String, ConversationContext)> {
        self.calls.lock().unwrap().clone()
    }
}

impl Default for MockAnswerer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Answerer for MockAnswerer {
    async fn respond(
        &self,
        utterance: &str,
        context: &ConversationContext,
    ) -> Result<Answer, LlmError> {
        self.calls
            .lock()
            .unwrap()
            .push((utterance.to_string(), context.clone()));

        let reply = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(LlmError::network("No mock reply queued")))?;

        let summary = format!("{} | {utterance}", context.summary());
        Ok(Answer {
            reply,
            context: context.advanced(summary),
        })
    }

    fn model_id(&self) -> &str {
        "mock-model"
    }
}

/// Answerer that sleeps before replying (for timeout testing)
pub struct SlowAnswerer {
    delay: Duration,
    reply: String,
}

impl SlowAnswerer {
    pub fn new(delay: Duration, reply: impl Into<String>) -> Self {
        Self {
            delay,
            reply: reply.into(),
        }
    }
}

#[async_trait]
impl Answerer for SlowAnswerer {
    async fn respond(
        &self,
        _utterance: &str,
        context: &ConversationContext,
    ) -> Result<Answer, LlmError> {
        tokio::time::sleep(self.delay).await;
        Ok(Answer {
            reply: self.reply.clone(),
            context: context.advanced(context.summary()),
        })
    }

    fn model_id(&self) -> &str {
        "slow-model"
    }
}

/// Factory handing every session the same shared answerer
pub fn shared_factory(answerer: Arc<dyn Answerer>) -> AnswererFactory {
    Arc::new(move |_, _| Ok(Arc::clone(&answerer)))
}
