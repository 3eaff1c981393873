//! Conversation orchestrator
//!
//! Runs one exchange against a session: ask the answerer, then record both
//! sides. History is only touched after the answer is complete, so a failed
//! call leaves the session exactly as it was.

use super::state::{ConversationState, Message};
use crate::llm::LlmError;
use std::sync::Arc;
use thiserror::Error;

/// Submission failures
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("Conversation not initialized. Please reload the app or fix the configuration.")]
    NotInitialized,
    #[error("The coach could not answer: {cause}")]
    AnswerFailure {
        #[source]
        cause: LlmError,
    },
}

/// What a successful submission did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Empty or whitespace-only input; nothing was sent
    Skipped,
    /// One exchange recorded; `words` were added to the running count
    Answered { words: u64 },
}

/// Send `utterance` to the session's answerer and record the exchange
pub async fn handle_submit(
    state: &mut ConversationState,
    utterance: &str,
) -> Result<SubmitOutcome, OrchestratorError> {
    let Some(conversation) = state.conversation() else {
        return Err(OrchestratorError::NotInitialized);
    };

    if utterance.trim().is_empty() {
        tracing::debug!("Skipping empty submission");
        return Ok(SubmitOutcome::Skipped);
    }

    let answerer = Arc::clone(conversation.answerer());
    let deadline = conversation.request_timeout();
    let context = conversation.context().clone();

    let answer = match tokio::time::timeout(deadline, answerer.respond(utterance, &context)).await {
        Ok(Ok(answer)) => answer,
        Ok(Err(cause)) => {
            tracing::warn!(error = %cause, kind = ?cause.kind, "Answer failed");
            return Err(OrchestratorError::AnswerFailure { cause });
        }
        Err(_) => {
            tracing::warn!(timeout_secs = deadline.as_secs(), "Answer timed out");
            return Err(OrchestratorError::AnswerFailure {
                cause: LlmError::timeout(deadline),
            });
        }
    };

    let reply = Message::ai(answer.reply);
    let words = reply.word_count();

    state.append(Message::human(utterance));
    state.append(reply);
    state.increment_word_count(words);
    state.commit_context(answer.context);
    state.clear_pending_input();

    tracing::info!(
        words,
        total_words = state.word_count(),
        messages = state.history().len(),
        "Exchange recorded"
    );

    Ok(SubmitOutcome::Answered { words })
}
