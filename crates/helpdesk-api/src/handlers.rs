//! Route handler functions for all API endpoints.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use helpdesk_chat::TurnFailure;
use helpdesk_core::types::ChatMessage;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::AppState;

/// Longest accepted session id.
const MAX_SESSION_ID_LEN: usize = 128;

// =============================================================================
// Request / response types
// =============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    pub corpus_chunks: u64,
    pub active_sessions: u64,
}

/// Request body for POST /chat.
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    /// Omitted or blank ids start a new session.
    pub session_id: Option<String>,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TurnError {
    pub kind: String,
    pub message: String,
}

impl From<&TurnFailure> for TurnError {
    fn from(failure: &TurnFailure) -> Self {
        Self {
            kind: failure.kind().to_string(),
            message: failure.to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    pub session_id: String,
    pub reply: String,
    pub state: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<TurnError>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HistoryResponse {
    pub session_id: String,
    pub messages: Vec<ChatMessage>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StateResponse {
    pub session_id: String,
    pub state: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

fn validate_session_id(session_id: &str) -> Result<(), ApiError> {
    if session_id.len() > MAX_SESSION_ID_LEN {
        return Err(ApiError::BadRequest(format!(
            "session_id exceeds maximum length of {} bytes",
            MAX_SESSION_ID_LEN
        )));
    }
    if session_id.chars().any(char::is_control) {
        return Err(ApiError::BadRequest(
            "session_id contains control characters".to_string(),
        ));
    }
    Ok(())
}

// =============================================================================
// Handler functions
// =============================================================================

/// GET /health
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        corpus_chunks: state.controller.index().len() as u64,
        active_sessions: state.controller.active_sessions() as u64,
    })
}

/// POST /chat - process one customer message.
///
/// Turn failures still answer 200 with the apology reply and an `error`
/// field.
pub async fn chat(
    State(state): State<AppState>,
    body: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, ApiError> {
    let Json(req) = body?;

    let max_chars = state.config.chat.max_message_chars;
    if req.message.chars().count() > max_chars {
        return Err(ApiError::BadRequest(format!(
            "message exceeds maximum length of {} characters",
            max_chars
        )));
    }

    let session_id = match req.session_id {
        Some(id) if !id.trim().is_empty() => {
            validate_session_id(&id)?;
            id
        }
        _ => {
            let id = Uuid::new_v4().to_string();
            debug!(session_id = %id, "Starting new session");
            id
        }
    };

    let outcome = state.controller.process_turn(&session_id, &req.message).await;
    Ok(Json(ChatResponse {
        session_id,
        reply: outcome.reply,
        state: outcome.state.name().to_string(),
        error: outcome.error.as_ref().map(TurnError::from),
    }))
}

/// GET /sessions/{id}/history
pub async fn session_history(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<HistoryResponse>, ApiError> {
    validate_session_id(&session_id)?;
    let messages = state.controller.history(&session_id);
    Ok(Json(HistoryResponse {
        session_id,
        messages,
    }))
}

/// GET /sessions/{id}/state
pub async fn session_state(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<StateResponse>, ApiError> {
    validate_session_id(&session_id)?;
    let support = state.controller.support_state(&session_id);
    Ok(Json(StateResponse {
        session_id,
        state: support.name().to_string(),
        email: support.email().map(str::to_string),
    }))
}

/// DELETE /sessions/{id} - clear history and reset the support state.
pub async fn delete_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    validate_session_id(&session_id)?;
    state.controller.clear_session(&session_id).await;
    Ok(StatusCode::NO_CONTENT)
}
