//! Answerer with running summary memory
//!
//! Each exchange costs two model calls: one for the reply, with the persona
//! and the current summary as system content, and one to fold the exchange
//! into a new summary. Either failing fails the whole exchange.

use super::{Answer, Answerer, ConversationContext};
use crate::llm::{LlmError, LlmRequest, LlmService};
use crate::system_prompt::{reply_system, summary_prompt, summary_system};
use async_trait::async_trait;
use std::sync::Arc;

/// Cap on the summary update; the summary is re-sent with every reply
const SUMMARY_MAX_TOKENS: u32 = 512;

pub struct SummaryAnswerer {
    llm: Arc<dyn LlmService>,
}

impl SummaryAnswerer {
    pub fn new(llm: Arc<dyn LlmService>) -> Self {
        Self { llm }
    }

    async fn reply(&self, utterance: &str, context: &ConversationContext) -> Result<String, LlmError> {
        let mut request = LlmRequest::new(utterance);
        for text in reply_system(context.system_instruction(), context.summary()) {
            request = request.with_system(text);
        }

        let response = self.llm.complete(&request).await?;
        if !response.end_turn {
            tracing::warn!(turns = context.turns(), "Reply ended before the model finished");
        }
        Ok(response.text().trim().to_string())
    }

    async fn summarize(
        &self,
        context: &ConversationContext,
        utterance: &str,
        reply: &str,
    ) -> Result<String, LlmError> {
        let request = LlmRequest::new(summary_prompt(context.summary(), utterance, reply))
            .with_system(summary_system())
            .with_max_tokens(SUMMARY_MAX_TOKENS);

        let response = self.llm.complete(&request).await?;
        let summary = response.text().trim().to_string();
        if summary.is_empty() {
            tracing::warn!(turns = context.turns(), "Empty summary update, keeping previous summary");
            return Ok(context.summary().to_string());
        }
        Ok(summary)
    }
}

#[async_trait]
impl Answerer for SummaryAnswerer {
    async fn respond(
        &self,
        utterance: &str,
        context: &ConversationContext,
    ) -> Result<Answer, LlmError> {
        let reply = self.reply(utterance, context).await?;
        let summary = self.summarize(context, utterance, &reply).await?;

        tracing::debug!(
            turns = context.turns() + 1,
            summary_chars = summary.len(),
            "Conversation summary updated"
        );

        Ok(Answer {
            reply,
            context: context.advanced(summary),
        })
    }

    fn model_id(&self) -> &str {
        self.llm.model_id()
    }
}
