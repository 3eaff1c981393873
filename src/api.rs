//! HTTP API for the fitness coach chat

mod assets;
mod handlers;
mod sse;
mod types;

pub use handlers::create_router;

use crate::config::ChatConfig;
use crate::session::SessionManager;
use std::sync::Arc;

/// Produces a fresh config when a session retries initialization
pub type ConfigLoader = Arc<dyn Fn() -> ChatConfig + Send + Sync>;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<SessionManager>,
    pub load_config: ConfigLoader,
}

impl AppState {
    pub fn new(sessions: Arc<SessionManager>, load_config: ConfigLoader) -> Self {
        Self {
            sessions,
            load_config,
        }
    }
}
