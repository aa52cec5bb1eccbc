//! HTTP request handlers

use super::types::{
    ErrorResponse, HealthResponse, SendMessageRequest, SendMessageResponse, TranscriptResponse,
};
use super::AppState;
use crate::conversation::{ConversationStore, Transcript};
use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

/// Header carrying the session key
pub const SESSION_HEADER: &str = "x-session-id";
const MAX_SESSION_ID_LEN: usize = 128;

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/chat", get(get_chat))
        .route("/api/chat/messages", post(send_message))
        .route("/api/chat/clear", post(clear_chat))
        .route("/api/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ============================================================
// Chat
// ============================================================

/// Load the session's transcript, creating the greeting on first visit
async fn get_chat(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<TranscriptResponse>, AppError> {
    let session_id = session_id(&headers)?;
    let lock = state.locks.lock_for(&session_id);
    let _guard = lock.lock().await;

    tracing::info!(session = %session_id, "Loading chat");
    let transcript = load_or_greet(&state, &session_id);

    Ok(Json(TranscriptResponse {
        session_id,
        messages: transcript.messages().to_vec(),
    }))
}

async fn send_message(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<SendMessageRequest>,
) -> Result<Json<SendMessageResponse>, AppError> {
    let session_id = session_id(&headers)?;
    let lock = state.locks.lock_for(&session_id);
    let _guard = lock.lock().await;

    let transcript = load_or_greet(&state, &session_id);
    let exchange = state.chat.handle_message(transcript, &request.message).await;
    state
        .sessions
        .set(&session_id, ConversationStore::encode(&exchange.transcript));

    Ok(Json(SendMessageResponse {
        session_id,
        reply: exchange.reply,
        messages: exchange.transcript.messages().to_vec(),
    }))
}

async fn clear_chat(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<TranscriptResponse>, AppError> {
    let session_id = session_id(&headers)?;
    let lock = state.locks.lock_for(&session_id);
    let _guard = lock.lock().await;

    let transcript = state.chat.reset_conversation();
    state
        .sessions
        .set(&session_id, ConversationStore::encode(&transcript));

    Ok(Json(TranscriptResponse {
        session_id,
        messages: transcript.messages().to_vec(),
    }))
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        mode: state.chat.provider_name().to_string(),
    })
}

/// Stored transcript for the session, or a freshly stored greeting
fn load_or_greet(state: &AppState, session_id: &str) -> Transcript {
    if let Some(raw) = state.sessions.get(session_id) {
        return ConversationStore::decode(&raw);
    }
    let transcript = state.chat.greeting_transcript();
    state
        .sessions
        .set(session_id, ConversationStore::encode(&transcript));
    transcript
}

/// Session key from the request, or a new one when absent
fn session_id(headers: &HeaderMap) -> Result<String, AppError> {
    let Some(value) = headers.get(SESSION_HEADER) else {
        return Ok(Uuid::new_v4().to_string());
    };

    let id = value
        .to_str()
        .map_err(|_| AppError::BadRequest("Session id must be visible ASCII".to_string()))?
        .trim();

    if id.is_empty() || id.len() > MAX_SESSION_ID_LEN {
        return Err(AppError::BadRequest(format!(
            "Session id must be 1 to {MAX_SESSION_ID_LEN} characters"
        )));
    }
    Ok(id.to_string())
}

// ============================================================
// Errors
// ============================================================

#[derive(Debug)]
pub enum AppError {
    BadRequest(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
        };

        let body = Json(ErrorResponse::new(message));
        (status, body).into_response()
    }
}
