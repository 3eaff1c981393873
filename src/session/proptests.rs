//! Property-based tests for the session core
//!
//! Drive a ready session with arbitrary submissions and answerer outcomes
//! and check the transcript invariants after every step:
//! - history length stays even
//! - each successful exchange ends with (human utterance, ai reply)
//! - word count equals the words of all ai messages
//! - failures and blank input leave history and count untouched

use super::orchestrator::{handle_submit, OrchestratorError, SubmitOutcome};
use super::state::{word_count, ConversationState, Origin};
use super::testing::{test_config, MockAnswerer};
use crate::answerer::Answerer;
use crate::llm::LlmError;
use proptest::prelude::*;
use std::sync::Arc;

// ============================================================================
// Strategies
// ============================================================================

#[derive(Debug, Clone)]
enum Step {
    /// Non-blank utterance answered with `reply`
    Answered { utterance: String, reply: String },
    /// Non-blank utterance whose answer fails
    Failed { utterance: String },
    /// Whitespace-only input
    Blank(String),
}

fn arb_utterance() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9?!.,]{1,10}( [a-zA-Z0-9?!.,]{1,10}){0,6}"
}

fn arb_reply() -> impl Strategy<Value = String> {
    "[ \t\n]{0,2}[a-zA-Z0-9.]{1,8}([ \t\n]{1,3}[a-zA-Z0-9.]{1,8}){0,12}[ \n]{0,2}"
}

fn arb_step() -> impl Strategy<Value = Step> {
    prop_oneof![
        4 => (arb_utterance(), arb_reply())
            .prop_map(|(utterance, reply)| Step::Answered { utterance, reply }),
        1 => arb_utterance().prop_map(|utterance| Step::Failed { utterance }),
        1 => "[ \t\n]{0,5}".prop_map(Step::Blank),
    ]
}

fn ready_state(answerer: Arc<MockAnswerer>) -> ConversationState {
    let mut state = ConversationState::new();
    state
        .ensure_initialized(&test_config(), |_, _| Ok(answerer as Arc<dyn Answerer>))
        .unwrap();
    state
}

fn ai_word_total(state: &ConversationState) -> u64 {
    state
        .history()
        .iter()
        .filter(|m| m.origin() == Origin::Ai)
        .map(|m| word_count(m.text()))
        .sum()
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn transcript_invariants_hold(steps in proptest::collection::vec(arb_step(), 0..20)) {
        let rt = runtime();
        let answerer = Arc::new(MockAnswerer::new());
        let mut state = ready_state(answerer.clone());

        for step in steps {
            let len_before = state.history().len();
            let count_before = state.word_count();

            match step {
                Step::Answered { utterance, reply } => {
                    answerer.queue_reply(reply.clone());
                    let outcome = rt.block_on(handle_submit(&mut state, &utterance)).unwrap();

                    let history = state.history();
                    prop_assert_eq!(history.len(), len_before + 2);
                    prop_assert_eq!(history[history.len() - 2].origin(), Origin::Human);
                    prop_assert_eq!(history[history.len() - 2].text(), utterance.as_str());
                    prop_assert_eq!(history[history.len() - 1].origin(), Origin::Ai);
                    prop_assert_eq!(outcome, SubmitOutcome::Answered { words: word_count(&reply) });
                    prop_assert_eq!(state.word_count(), count_before + word_count(&reply));
                }
                Step::Failed { utterance } => {
                    answerer.queue_error(LlmError::server_error("boom"));
                    let result = rt.block_on(handle_submit(&mut state, &utterance));

                    let is_answer_failure = matches!(result, Err(OrchestratorError::AnswerFailure { .. }));
                    prop_assert!(is_answer_failure);
                    prop_assert_eq!(state.history().len(), len_before);
                    prop_assert_eq!(state.word_count(), count_before);
                    prop_assert!(state.is_ready());
                }
                Step::Blank(input) => {
                    let outcome = rt.block_on(handle_submit(&mut state, &input)).unwrap();

                    prop_assert_eq!(outcome, SubmitOutcome::Skipped);
                    prop_assert_eq!(state.history().len(), len_before);
                    prop_assert_eq!(state.word_count(), count_before);
                }
            }

            prop_assert_eq!(state.history().len() % 2, 0);
            prop_assert!(state.word_count() >= count_before);
            prop_assert_eq!(state.word_count(), ai_word_total(&state));
        }
    }

    #[test]
    fn uninitialized_session_never_mutates(inputs in proptest::collection::vec("[ a-z]{0,12}", 1..10)) {
        let rt = runtime();
        let mut state = ConversationState::new();

        for input in inputs {
            let result = rt.block_on(handle_submit(&mut state, &input));
            let not_initialized = matches!(result, Err(OrchestratorError::NotInitialized));
            prop_assert!(not_initialized);
            prop_assert!(state.history().is_empty());
            prop_assert_eq!(state.word_count(), 0);
        }
    }
}
