//! FitCoach Chat - conversational fitness coach
//!
//! Serves a single chat page backed by per-session conversation state and
//! a Gemini-powered answerer.

mod answerer;
mod api;
mod config;
mod llm;
mod session;
mod system_prompt;

use answerer::gemini_factory;
use api::{create_router, AppState};
use config::ChatConfig;
use session::SessionManager;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fitcoach_chat=info,tower_http=debug".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    // Configuration
    config::load_dotenv();
    let chat_config = ChatConfig::from_env();
    let port = chat_config.port;

    if chat_config.api_key().is_some() {
        tracing::info!(config = ?chat_config, "Chat configuration loaded");
    } else {
        tracing::warn!(
            "No Gemini API key configured. Set {} to enable the coach.",
            config::API_KEY_VAR
        );
    }

    // Create application state
    let sessions = Arc::new(SessionManager::new(chat_config, gemini_factory()));
    let _reaper = sessions.spawn_reaper();
    let load_config: api::ConfigLoader =
        Arc::new(|| ChatConfig::reload(Path::new(config::ENV_FILE)));
    let state = AppState::new(sessions, load_config);

    // Create router
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let compression = CompressionLayer::new()
        .gzip(true)
        .br(true)
        .deflate(true)
        .zstd(true);

    let app = create_router(state)
        .layer(cors)
        .layer(compression)
        .layer(TraceLayer::new_for_http());

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("FitCoach chat listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
