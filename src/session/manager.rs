//! Registry of live chat sessions
//!
//! Each session owns its [`ConversationState`] behind an async mutex. The
//! mutex is held for the whole of a submission, which is what keeps a
//! session to one in-flight answer at a time. Readers never take that
//! mutex: every mutation publishes a snapshot on a `watch` channel and
//! reads are served from there.

use super::orchestrator::{handle_submit, OrchestratorError, SubmitOutcome};
use super::state::{ConversationState, InitError, SessionSnapshot};
use crate::answerer::AnswererFactory;
use crate::config::ChatConfig;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{watch, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Shortest pause between idle sweeps
const MIN_SWEEP_INTERVAL: Duration = Duration::from_secs(1);

/// Errors from session-level operations
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Session not found: {0}")]
    NotFound(String),
    #[error(transparent)]
    Init(#[from] InitError),
    #[error(transparent)]
    Submit(#[from] OrchestratorError),
}

/// A live session and its observers
struct SessionEntry {
    state: Mutex<ConversationState>,
    view: watch::Sender<SessionSnapshot>,
    last_active: std::sync::Mutex<Instant>,
}

impl SessionEntry {
    fn new(state: ConversationState) -> Self {
        let (view, _) = watch::channel(state.snapshot());
        Self {
            state: Mutex::new(state),
            view,
            last_active: std::sync::Mutex::new(Instant::now()),
        }
    }

    fn publish(&self, snapshot: SessionSnapshot) {
        // Stored even with no receivers so later reads see it
        self.view.send_replace(snapshot);
    }

    fn touch(&self) {
        *self
            .last_active
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Instant::now();
    }

    /// Nobody is watching, nothing is in flight and the last use is older
    /// than `max_idle`
    fn is_idle(&self, now: Instant, max_idle: Duration) -> bool {
        let last_active = *self
            .last_active
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        self.view.receiver_count() == 0
            && now.saturating_duration_since(last_active) >= max_idle
            && self.state.try_lock().is_ok()
    }
}

/// Manager for all chat sessions in this process
pub struct SessionManager {
    sessions: RwLock<HashMap<String, Arc<SessionEntry>>>,
    config: RwLock<ChatConfig>,
    factory: AnswererFactory,
}

impl SessionManager {
    pub fn new(config: ChatConfig, factory: AnswererFactory) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            config: RwLock::new(config),
            factory,
        }
    }

    /// Replace the config used by future initializations
    pub async fn reconfigure(&self, config: ChatConfig) {
        *self.config.write().await = config;
    }

    async fn entry(&self, id: &str) -> Result<Arc<SessionEntry>, SessionError> {
        let entry = self
            .sessions
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| SessionError::NotFound(id.to_string()))?;
        entry.touch();
        Ok(entry)
    }

    async fn initialize_state(&self, state: &mut ConversationState) -> Result<(), InitError> {
        let config = self.config.read().await.clone();
        state.ensure_initialized(&config, |config, api_key| (self.factory)(config, api_key))
    }

    /// Start a session and try to initialize it right away.
    ///
    /// A missing credential does not prevent the session from existing; the
    /// returned snapshot carries the error for display instead.
    pub async fn create_session(&self) -> (String, SessionSnapshot) {
        let id = uuid::Uuid::new_v4().to_string();

        let mut state = ConversationState::new();
        // Failure is recorded in the state and shown through the snapshot
        let _ = self.initialize_state(&mut state).await;
        let snapshot = state.snapshot();

        self.sessions
            .write()
            .await
            .insert(id.clone(), Arc::new(SessionEntry::new(state)));
        tracing::info!(session_id = %id, phase = ?snapshot.phase, "Session started");

        (id, snapshot)
    }

    /// Latest published view; does not wait for an in-flight answer
    pub async fn snapshot(&self, id: &str) -> Result<SessionSnapshot, SessionError> {
        let entry = self.entry(id).await?;
        let snapshot = entry.view.borrow().clone();
        Ok(snapshot)
    }

    /// Re-run initialization for an existing session
    pub async fn initialize(&self, id: &str) -> Result<SessionSnapshot, SessionError> {
        let entry = self.entry(id).await?;
        let mut state = entry.state.lock().await;

        let result = self.initialize_state(&mut state).await;
        let snapshot = state.snapshot();
        entry.publish(snapshot.clone());

        result?;
        Ok(snapshot)
    }

    /// Submit user input to a session
    pub async fn submit(
        &self,
        id: &str,
        text: &str,
    ) -> Result<(SubmitOutcome, SessionSnapshot), SessionError> {
        let entry = self.entry(id).await?;
        let mut state = entry.state.lock().await;

        if state.is_ready() && !text.trim().is_empty() {
            state.set_pending_input(text);
            entry.publish(state.snapshot());
        }

        let result = handle_submit(&mut state, text).await;
        let snapshot = state.snapshot();
        entry.publish(snapshot.clone());
        entry.touch();

        match result {
            Ok(outcome) => Ok((outcome, snapshot)),
            Err(e) => {
                tracing::warn!(session_id = %id, error = %e, "Submission failed");
                Err(e.into())
            }
        }
    }

    /// Receiver holding the current snapshot and every later one.
    ///
    /// A session is never evicted while a receiver is alive.
    pub async fn subscribe(
        &self,
        id: &str,
    ) -> Result<watch::Receiver<SessionSnapshot>, SessionError> {
        let entry = self.entry(id).await?;
        Ok(entry.view.subscribe())
    }

    /// Drop a session and all its state
    pub async fn end_session(&self, id: &str) -> bool {
        let removed = self.sessions.write().await.remove(id).is_some();
        if removed {
            tracing::info!(session_id = %id, "Session ended");
        }
        removed
    }

    /// Drop every session idle for longer than the configured limit.
    ///
    /// Returns how many were removed.
    pub async fn evict_idle(&self) -> usize {
        let max_idle = self.config.read().await.session_idle;
        let now = Instant::now();

        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|id, entry| {
            let idle = entry.is_idle(now, max_idle);
            if idle {
                tracing::info!(session_id = %id, "Evicting idle session");
            }
            !idle
        });
        before - sessions.len()
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Periodically evict idle sessions for the life of the process
    pub fn spawn_reaper(self: &Arc<Self>) -> JoinHandle<()> {
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            let max_idle = manager.config.read().await.session_idle;
            let mut interval = tokio::time::interval((max_idle / 2).max(MIN_SWEEP_INTERVAL));
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                interval.tick().await;
                let evicted = manager.evict_idle().await;
                if evicted > 0 {
                    let remaining = manager.session_count().await;
                    tracing::info!(
                        evicted,
                        remaining,
                        "Idle sessions evicted"
                    );
                }
            }
        })
    }
}
