//! HTTP request handlers

use super::assets::{serve_index, serve_static};
use super::sse::sse_stream;
use super::types::{
    ChatRequest, ChatResponse, ErrorResponse, SessionCreatedResponse, SessionResponse,
    SuccessResponse,
};
use super::AppState;
use crate::session::{InitError, OrchestratorError, SessionError, SubmitOutcome};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Chat page
        .route("/", get(serve_index))
        .route("/assets/*path", get(serve_static))
        // Session lifecycle
        .route("/api/sessions", post(create_session))
        .route("/api/sessions/:id", get(get_session).delete(end_session))
        .route("/api/sessions/:id/init", post(initialize_session))
        // User actions
        .route("/api/sessions/:id/chat", post(send_chat))
        // SSE streaming
        .route("/api/sessions/:id/stream", get(stream_session))
        .route("/version", get(get_version))
        .with_state(state)
}

// ============================================================
// Session Lifecycle
// ============================================================

async fn create_session(State(state): State<AppState>) -> Json<SessionCreatedResponse> {
    let (id, session) = state.sessions.create_session().await;
    Json(SessionCreatedResponse { id, session })
}

async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SessionResponse>, AppError> {
    let session = state.sessions.snapshot(&id).await?;
    Ok(Json(SessionResponse { session }))
}

/// Retry initialization with configuration loaded fresh from the environment
async fn initialize_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SessionResponse>, AppError> {
    state.sessions.reconfigure((state.load_config)()).await;
    let session = state.sessions.initialize(&id).await?;
    Ok(Json(SessionResponse { session }))
}

async fn end_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SuccessResponse>, AppError> {
    if state.sessions.end_session(&id).await {
        Ok(Json(SuccessResponse { success: true }))
    } else {
        Err(AppError::from(SessionError::NotFound(id)))
    }
}

// ============================================================
// User Actions
// ============================================================

async fn send_chat(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, AppError> {
    let (outcome, session) = state.sessions.submit(&id, &req.text).await?;

    let (answered, words_added) = match outcome {
        SubmitOutcome::Skipped => (false, 0),
        SubmitOutcome::Answered { words } => (true, words),
    };

    Ok(Json(ChatResponse {
        answered,
        words_added,
        session,
    }))
}

async fn stream_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let updates = state.sessions.subscribe(&id).await?;
    Ok(sse_stream(updates))
}

async fn get_version() -> &'static str {
    concat!("fitcoach-chat ", env!("CARGO_PKG_VERSION"))
}

// ============================================================
// Error Handling
// ============================================================

#[derive(Debug)]
pub(super) struct AppError(SessionError);

impl From<SessionError> for AppError {
    fn from(e: SessionError) -> Self {
        Self(e)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let message = self.0.to_string();
        let (status, body) = match &self.0 {
            SessionError::NotFound(_) => {
                (StatusCode::NOT_FOUND, ErrorResponse::new("not_found", message))
            }
            SessionError::Init(InitError::MissingCredential) => (
                StatusCode::SERVICE_UNAVAILABLE,
                ErrorResponse::new("missing_credential", message),
            ),
            SessionError::Init(InitError::Client(_)) => (
                StatusCode::BAD_GATEWAY,
                ErrorResponse::new("init_failed", message),
            ),
            SessionError::Submit(OrchestratorError::NotInitialized) => (
                StatusCode::CONFLICT,
                ErrorResponse::new("not_initialized", message),
            ),
            SessionError::Submit(OrchestratorError::AnswerFailure { cause }) => {
                let mut body = ErrorResponse::new("answer_failed", message);
                body.retry_after_secs = cause.retry_after.map(|d| d.as_secs());
                (StatusCode::BAD_GATEWAY, body)
            }
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::answerer::Answerer;
    use crate::config::ChatConfig;
    use crate::llm::LlmError;
    use crate::session::testing::{shared_factory, test_config, MockAnswerer};
    use crate::session::SessionManager;
    use axum::body::Body;
    use axum::http::{header, Method, Request};
    use serde_json::{json, Value};
    use std::sync::Arc;
    use std::time::Duration;
    use tower::ServiceExt;

    fn app_with(config: ChatConfig, answerer: &Arc<MockAnswerer>) -> Router {
        let sessions = Arc::new(SessionManager::new(
            config,
            shared_factory(answerer.clone() as Arc<dyn Answerer>),
        ));
        create_router(AppState::new(sessions, Arc::new(test_config)))
    }

    async fn call(
        app: &Router,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let request = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => request
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => request.body(Body::empty()),
        }
        .unwrap();

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }

    async fn start_session(app: &Router) -> String {
        let (status, body) = call(app, Method::POST, "/api/sessions", None).await;
        assert_eq!(status, StatusCode::OK);
        body["id"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_chat_round_trip() {
        let answerer = Arc::new(MockAnswerer::new());
        answerer.queue_reply("Great job on the push-ups!");
        let app = app_with(test_config(), &answerer);
        let id = start_session(&app).await;

        let (status, body) = call(
            &app,
            Method::POST,
            &format!("/api/sessions/{id}/chat"),
            Some(json!({"text": "I did 20 push-ups"})),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["answered"], true);
        assert_eq!(body["words_added"], 5);
        assert_eq!(body["session"]["word_count"], 5);
        assert_eq!(body["session"]["history"][0]["origin"], "human");
        assert_eq!(body["session"]["history"][0]["text"], "I did 20 push-ups");
        assert_eq!(body["session"]["history"][1]["origin"], "ai");
        assert_eq!(body["session"]["pending_input"], "");
    }

    #[tokio::test]
    async fn test_blank_chat_is_skipped() {
        let answerer = Arc::new(MockAnswerer::new());
        let app = app_with(test_config(), &answerer);
        let id = start_session(&app).await;

        let (status, body) = call(
            &app,
            Method::POST,
            &format!("/api/sessions/{id}/chat"),
            Some(json!({"text": "   "})),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["answered"], false);
        assert_eq!(body["session"]["history"], json!([]));
        assert!(answerer.recorded_calls().is_empty());
    }

    #[tokio::test]
    async fn test_missing_key_then_init() {
        let answerer = Arc::new(MockAnswerer::new());
        let app = app_with(ChatConfig::default(), &answerer);

        let (status, body) = call(&app, Method::POST, "/api/sessions", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["session"]["phase"], "uninitialized");
        assert!(body["session"]["error"]
            .as_str()
            .unwrap()
            .contains("GOOGLE_API_KEY"));
        let id = body["id"].as_str().unwrap().to_string();

        let (status, body) = call(
            &app,
            Method::POST,
            &format!("/api/sessions/{id}/chat"),
            Some(json!({"text": "hello"})),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["code"], "not_initialized");

        // The loader hands out a config with a key
        let (status, body) =
            call(&app, Method::POST, &format!("/api/sessions/{id}/init"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["session"]["phase"], "ready");
        assert!(body["session"].get("error").is_none());
    }

    #[tokio::test]
    async fn test_init_without_key_is_unavailable() {
        let answerer = Arc::new(MockAnswerer::new());
        let sessions = Arc::new(SessionManager::new(
            ChatConfig::default(),
            shared_factory(answerer.clone() as Arc<dyn Answerer>),
        ));
        let app = create_router(AppState::new(sessions, Arc::new(ChatConfig::default)));
        let id = start_session(&app).await;

        let (status, body) =
            call(&app, Method::POST, &format!("/api/sessions/{id}/init"), None).await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["code"], "missing_credential");
    }

    #[tokio::test]
    async fn test_answer_failure_is_bad_gateway() {
        let answerer = Arc::new(MockAnswerer::new());
        answerer.queue_error(
            LlmError::rate_limit("Quota exceeded").with_retry_after(Duration::from_secs(30)),
        );
        let app = app_with(test_config(), &answerer);
        let id = start_session(&app).await;

        let (status, body) = call(
            &app,
            Method::POST,
            &format!("/api/sessions/{id}/chat"),
            Some(json!({"text": "plan my week"})),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["code"], "answer_failed");
        assert_eq!(body["retry_after_secs"], 30);

        let (_, body) = call(&app, Method::GET, &format!("/api/sessions/{id}"), None).await;
        assert_eq!(body["session"]["history"], json!([]));
        assert_eq!(body["session"]["pending_input"], "plan my week");
    }

    #[tokio::test]
    async fn test_unknown_session_is_not_found() {
        let answerer = Arc::new(MockAnswerer::new());
        let app = app_with(test_config(), &answerer);

        let (status, body) = call(&app, Method::GET, "/api/sessions/missing", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "not_found");

        let (status, _) = call(&app, Method::DELETE, "/api/sessions/missing", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_end_session() {
        let answerer = Arc::new(MockAnswerer::new());
        let app = app_with(test_config(), &answerer);
        let id = start_session(&app).await;

        let (status, body) =
            call(&app, Method::DELETE, &format!("/api/sessions/{id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);

        let (status, _) = call(&app, Method::GET, &format!("/api/sessions/{id}"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_index_served() {
        let answerer = Arc::new(MockAnswerer::new());
        let app = app_with(test_config(), &answerer);

        let response = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let html = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(html.contains("Ask me anything about Fitness"));
    }

    #[tokio::test]
    async fn test_static_asset_mime() {
        let answerer = Arc::new(MockAnswerer::new());
        let app = app_with(test_config(), &answerer);

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/assets/chat.css")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/css");

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/assets/missing.js")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_stream_opens_for_known_session() {
        let answerer = Arc::new(MockAnswerer::new());
        let app = app_with(test_config(), &answerer);
        let id = start_session(&app).await;

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri(format!("/api/sessions/{id}/stream"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/event-stream"
        );

        let (status, _) = call(&app, Method::GET, "/api/sessions/missing/stream", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
