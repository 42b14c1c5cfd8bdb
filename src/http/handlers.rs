use super::state::AppState;
use crate::error::RecorderError;
use crate::persist::RecoveryAction;
use crate::session::SessionMetadata;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct StartRecordingRequest {
    pub patient_name: String,
    pub patient_id: Option<String>,
    pub center_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StartRecordingResponse {
    pub session_id: String,
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct RetryResponse {
    pub requeued: u32,
}

#[derive(Debug, Serialize)]
pub struct RecoveryResponse {
    pub action: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recorded_duration_secs: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    /// True when the session survives the error and the caller may retry or
    /// choose recovery (e.g. microphone unavailable during restore)
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub recoverable: bool,
}

fn error_response(e: RecorderError) -> axum::response::Response {
    let (status, recoverable) = match &e {
        RecorderError::AlreadyActive | RecorderError::InvalidState { .. } => {
            (StatusCode::CONFLICT, false)
        }
        RecorderError::InvalidInput(_) => (StatusCode::UNPROCESSABLE_ENTITY, false),
        RecorderError::PermissionDenied | RecorderError::DeviceUnavailable => {
            (StatusCode::SERVICE_UNAVAILABLE, true)
        }
        RecorderError::PermanentUploadFailure { .. } => (StatusCode::BAD_GATEWAY, true),
        RecorderError::Backend(_) => (StatusCode::INTERNAL_SERVER_ERROR, false),
    };

    (
        status,
        Json(ErrorResponse {
            error: e.to_string(),
            recoverable,
        }),
    )
        .into_response()
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /calls/record/start
/// Start a new recording session
pub async fn start_recording(
    State(state): State<AppState>,
    Json(req): Json<StartRecordingRequest>,
) -> impl IntoResponse {
    let metadata = SessionMetadata {
        patient_name: req.patient_name,
        patient_id: req.patient_id,
        center_id: req.center_id,
    };

    match state.manager.start(metadata).await {
        Ok(session_id) => {
            info!("Recording started: {}", session_id);
            (
                StatusCode::OK,
                Json(StartRecordingResponse {
                    session_id,
                    status: "recording".to_string(),
                }),
            )
                .into_response()
        }
        Err(e) => {
            error!("Failed to start recording: {}", e);
            error_response(e)
        }
    }
}

/// POST /calls/record/pause
pub async fn pause_recording(State(state): State<AppState>) -> impl IntoResponse {
    match state.manager.pause().await {
        Ok(()) => StatusCode::OK.into_response(),
        Err(e) => error_response(e),
    }
}

/// POST /calls/record/resume
pub async fn resume_recording(State(state): State<AppState>) -> impl IntoResponse {
    match state.manager.resume().await {
        Ok(()) => StatusCode::OK.into_response(),
        Err(e) => error_response(e),
    }
}

/// POST /calls/record/stop
/// Stop the active recording; triggers transcription once all chunks are up.
pub async fn stop_recording(State(state): State<AppState>) -> impl IntoResponse {
    match state.manager.stop().await {
        Ok(summary) => {
            // The engine only reports completion; transcription is this
            // layer's call, and only on full coverage.
            if !summary.degraded && summary.chunks_failed == 0 {
                if let Some(client) = &state.transcription {
                    if let Err(e) = client
                        .request_transcription(&summary.session_id, summary.total_chunks)
                        .await
                    {
                        warn!("Failed to request transcription: {}", e);
                    }
                }
            }
            (StatusCode::OK, Json(summary)).into_response()
        }
        Err(e) => {
            error!("Failed to stop recording: {}", e);
            error_response(e)
        }
    }
}

/// POST /calls/record/retry
/// Re-queue permanently failed chunk uploads
pub async fn retry_failed(State(state): State<AppState>) -> impl IntoResponse {
    match state.manager.retry_failed_chunks() {
        Ok(requeued) => (StatusCode::OK, Json(RetryResponse { requeued })).into_response(),
        Err(e) => error_response(e),
    }
}

/// DELETE /calls/record
/// Purge the recording and its call record. Destructive; the UI confirms
/// before calling.
pub async fn delete_recording(State(state): State<AppState>) -> impl IntoResponse {
    match state.manager.delete_recording().await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => {
            error!("Failed to delete recording: {}", e);
            error_response(e)
        }
    }
}

/// GET /calls/record/progress
pub async fn get_progress(State(state): State<AppState>) -> impl IntoResponse {
    (StatusCode::OK, Json(state.manager.progress())).into_response()
}

/// GET /calls/record/recovery
/// Reconcile persisted state against the live session
pub async fn get_recovery(State(state): State<AppState>) -> impl IntoResponse {
    let action = state.manager.reconcile_persisted();
    let snapshot = state.manager.load_recoverable();

    let response = RecoveryResponse {
        action: match action {
            RecoveryAction::NoOp => "none",
            RecoveryAction::ResumeSilently => "resume_silently",
            RecoveryAction::OfferRecovery => "offer_recovery",
        }
        .to_string(),
        session_id: snapshot.as_ref().map(|s| s.session_id.clone()),
        recorded_duration_secs: snapshot.as_ref().map(|s| s.total_duration_secs),
    };

    (StatusCode::OK, Json(response)).into_response()
}

/// POST /calls/record/recovery/resume
/// Resume the persisted session after a reload
pub async fn resume_from_recovery(State(state): State<AppState>) -> impl IntoResponse {
    let snapshot = match state.manager.load_recoverable() {
        Some(snapshot) => snapshot,
        None => {
            return (
                StatusCode::NOT_FOUND,
                Json(ErrorResponse {
                    error: "no recoverable recording".to_string(),
                    recoverable: false,
                }),
            )
                .into_response();
        }
    };

    match state.manager.restore_from_persisted(&snapshot).await {
        Ok(()) => StatusCode::OK.into_response(),
        Err(e) => {
            error!("Failed to restore recording: {}", e);
            error_response(e)
        }
    }
}

/// DELETE /calls/record/recovery
/// Discard the persisted session (user declined to resume)
pub async fn discard_recovery(State(state): State<AppState>) -> impl IntoResponse {
    state.manager.discard_persisted();
    StatusCode::NO_CONTENT.into_response()
}

/// GET /health
/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
