use super::state::AppState;
use crate::analyze::Annotation;
use crate::audio::{AudioArtifact, AudioEncoding};
use crate::db::{GatewayError, NewNote};
use crate::identity::AllocateError;
use crate::transcribe::TranscribeError;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use base64::Engine;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct TranscribeRequest {
    /// Base64-encoded audio artifact.
    pub audio_b64: String,

    /// Declared MIME type of the artifact; unknown types fall back to the
    /// most permissive encoding.
    pub mime_type: String,
}

#[derive(Debug, Serialize)]
pub struct TranscribeResponse {
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateNoteRequest {
    pub owner_id: String,
    pub content: String,
    pub summary: Option<String>,
    pub thought: Option<String>,
    pub emotions: Option<Vec<String>>,
    pub core_needs: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
pub struct ListNotesQuery {
    pub owner_id: String,
}

#[derive(Debug, Serialize)]
pub struct IdentityResponse {
    pub owner_id: String,
    pub label: String,
    pub number: String,
}

#[derive(Debug, Serialize)]
pub struct IdentityStatsResponse {
    pub used: u64,
    pub total: u64,
    pub available: u64,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> axum::response::Response {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
        .into_response()
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /transcribe
/// Turn an uploaded artifact into text. The dispatch mode (sync vs
/// long-running) is server configuration, not caller choice.
pub async fn transcribe(
    State(state): State<AppState>,
    Json(req): Json<TranscribeRequest>,
) -> impl IntoResponse {
    let bytes = match base64::engine::general_purpose::STANDARD.decode(&req.audio_b64) {
        Ok(bytes) => bytes,
        Err(e) => {
            return error_response(
                StatusCode::BAD_REQUEST,
                format!("invalid base64 audio: {}", e),
            );
        }
    };

    let artifact = AudioArtifact {
        encoding: AudioEncoding::from_mime(&req.mime_type),
        fragment_count: 1,
        duration_ms: 0,
        bytes,
    };

    if artifact.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "audio payload is empty");
    }

    info!(
        bytes = artifact.bytes.len(),
        mime = %req.mime_type,
        mode = ?state.dispatcher.mode(),
        "transcription requested"
    );

    match state.dispatcher.transcribe(&artifact).await {
        Ok(text) => (StatusCode::OK, Json(TranscribeResponse { text })).into_response(),
        Err(e) => {
            error!("transcription failed: {}", e);
            let status = match e {
                TranscribeError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
                _ => StatusCode::BAD_GATEWAY,
            };
            error_response(status, "transcription failed")
        }
    }
}

/// POST /notes
/// Persist a note with optional annotation fields.
pub async fn create_note(
    State(state): State<AppState>,
    Json(req): Json<CreateNoteRequest>,
) -> impl IntoResponse {
    if req.content.trim().is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "content cannot be empty");
    }

    let has_annotation = req.summary.is_some()
        || req.thought.is_some()
        || req.emotions.is_some()
        || req.core_needs.is_some();
    let annotation = has_annotation.then(|| Annotation {
        summary: req.summary.unwrap_or_default(),
        thought: req.thought.unwrap_or_default(),
        emotions: req.emotions.unwrap_or_default(),
        core_needs: req.core_needs.unwrap_or_default(),
        placeholder: false,
    });

    let note = NewNote {
        owner_id: req.owner_id,
        content: req.content,
        annotation,
    };

    match state.notes.insert(note).await {
        Ok(record) => (StatusCode::OK, Json(record)).into_response(),
        Err(GatewayError::EmptyContent) => {
            error_response(StatusCode::BAD_REQUEST, "content cannot be empty")
        }
        Err(e) => {
            // Full detail stays server-side; the client sees a generic error.
            error!("failed to save note: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "failed to save note")
        }
    }
}

/// GET /notes?owner_id=
pub async fn list_notes(
    State(state): State<AppState>,
    Query(query): Query<ListNotesQuery>,
) -> impl IntoResponse {
    match state.notes.list_for_owner(&query.owner_id).await {
        Ok(records) => (StatusCode::OK, Json(records)).into_response(),
        Err(e) => {
            error!("failed to list notes: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "failed to list notes")
        }
    }
}

/// POST /identity
/// Allocate a new owner identity from the sequence pool.
pub async fn allocate_identity(State(state): State<AppState>) -> impl IntoResponse {
    match state.allocator.allocate().await {
        Ok(identity) => (
            StatusCode::OK,
            Json(IdentityResponse {
                owner_id: identity.token(),
                label: identity.label,
                number: identity.number,
            }),
        )
            .into_response(),
        Err(AllocateError::Exhausted) => {
            // Capacity, not a transient fault: no retry suggested.
            error_response(StatusCode::SERVICE_UNAVAILABLE, "service at capacity")
        }
        Err(e) => {
            error!("identity allocation failed: {}", e);
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "failed to allocate identity",
            )
        }
    }
}

/// GET /identity/stats
pub async fn identity_stats(State(state): State<AppState>) -> impl IntoResponse {
    match state.allocator.stats().await {
        Ok(stats) => (
            StatusCode::OK,
            Json(IdentityStatsResponse {
                used: stats.used,
                total: stats.total,
                available: stats.available(),
            }),
        )
            .into_response(),
        Err(e) => {
            error!("failed to read pool stats: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "failed to read stats")
        }
    }
}

/// GET /health
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
