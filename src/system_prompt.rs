//! Fixed prompts for the fitness coach
//!
//! The persona seeds every session's conversation context; the summary
//! prompt drives the running memory update after each exchange.

use std::fmt::Write;

/// Persona establishing the assistant as the app's personal trainer
pub const COACH_PERSONA: &str = "You are a chatbot embedded in a web app that uses AI to classify home exercises and count their repetitions. Act as an expert in fitness and answer the user as their personal AI trainer.";

/// Instruction for folding one exchange into the running summary
const SUMMARY_INSTRUCTION: &str = "You maintain a running summary of a conversation between a user and their AI fitness trainer. Given the current summary and the newest exchange, return an updated summary that keeps every fact the trainer may need later: exercises, repetition counts, goals, injuries and preferences. Reply with the summary text only.";

/// Header placed before the summary inside the reply request
const SUMMARY_HEADER: &str = "Summary of the conversation so far:";

/// System content for answering the next message
pub fn reply_system(persona: &str, summary: &str) -> Vec<String> {
    let mut system = vec![persona.to_string()];
    if !summary.trim().is_empty() {
        system.push(format!("{SUMMARY_HEADER}\n{summary}"));
    }
    system
}

/// System content for the summary update request
pub fn summary_system() -> &'static str {
    SUMMARY_INSTRUCTION
}

/// Prompt asking the model to extend `summary` with one exchange
pub fn summary_prompt(summary: &str, human: &str, ai: &str) -> String {
    let mut prompt = String::new();
    let current = if summary.trim().is_empty() {
        "(empty)"
    } else {
        summary
    };
    let _ = writeln!(prompt, "Current summary:\n{current}\n");
    let _ = writeln!(prompt, "New exchange:\nUser: {human}\nTrainer: {ai}\n");
    prompt.push_str("Updated summary:");
    prompt
}
