//! Chat sessions
//!
//! A session moves `Uninitialized -> Ready` once its answerer exists and
//! then loops `Ready -> Ready` on every submission, successful or not.

mod manager;
pub mod orchestrator;
pub mod state;

#[cfg(test)]
mod proptests;
#[cfg(test)]
pub mod testing;

pub use manager::{SessionError, SessionManager};
pub use orchestrator::{OrchestratorError, SubmitOutcome};
pub use state::{InitError, SessionSnapshot};
