use super::state::AppState;
use crate::audio::{AudioSource, AudioStreamSource};
use crate::control::ControlCommand;
use crate::session::{RecordingSession, SessionConfig, SessionStats};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct StartRecordingRequest {
    /// Replay a file instead of live capture (testing/batch use)
    pub input_file: Option<String>,

    /// Skip the microphone stream for this session
    #[serde(default)]
    pub system_only: bool,
}

#[derive(Debug, Serialize)]
pub struct StartRecordingResponse {
    pub recording_id: String,
    pub status: String,
    pub output_path: String,
}

#[derive(Debug, Serialize)]
pub struct StopRecordingResponse {
    pub recording_id: String,
    pub status: String,
    pub stats: SessionStats,
}

#[derive(Debug, Serialize)]
pub struct TranscriptResponse {
    pub recording_id: String,
    pub transcript: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn error_response(status: StatusCode, error: String) -> axum::response::Response {
    (status, Json(ErrorResponse { error })).into_response()
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /record/start
/// Start a new recording session
pub async fn start_recording(
    State(state): State<AppState>,
    Json(req): Json<StartRecordingRequest>,
) -> impl IntoResponse {
    let sources = match &req.input_file {
        Some(path) => vec![AudioSource::File(
            PathBuf::from(path),
            AudioStreamSource::System,
        )],
        None if req.system_only => vec![AudioSource::System],
        None => vec![
            AudioSource::System,
            AudioSource::Microphone(state.settings.microphone.clone()),
        ],
    };

    let config = SessionConfig::from_settings(&state.settings, sources);
    let recording_id = config.recording_id.clone();

    info!("Starting recording: {}", recording_id);

    let session = match RecordingSession::new(config) {
        Ok(s) => Arc::new(s),
        Err(e) => {
            error!("Failed to create session: {:#}", e);
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to create session: {}", e),
            );
        }
    };

    if let Err(e) = session.start().await {
        error!("Failed to start recording: {:#}", e);
        return error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to start recording: {}", e),
        );
    }

    let output_path = session.output_path().display().to_string();

    {
        let mut sessions = state.sessions.write().await;
        sessions.insert(recording_id.clone(), session);
    }

    info!("Recording started: {}", recording_id);

    (
        StatusCode::OK,
        Json(StartRecordingResponse {
            recording_id,
            status: "recording".to_string(),
            output_path,
        }),
    )
        .into_response()
}

/// POST /record/stop/:recording_id
/// Stop a recording session (awaits transcription queue drain)
pub async fn stop_recording(
    State(state): State<AppState>,
    Path(recording_id): Path<String>,
) -> impl IntoResponse {
    info!("Stopping recording: {}", recording_id);

    let session = {
        let mut sessions = state.sessions.write().await;
        sessions.remove(&recording_id)
    };

    match session {
        Some(session) => match session.stop().await {
            Ok(stats) => (
                StatusCode::OK,
                Json(StopRecordingResponse {
                    recording_id,
                    status: "stopped".to_string(),
                    stats,
                }),
            )
                .into_response(),
            Err(e) => {
                error!("Failed to stop recording: {:#}", e);
                error_response(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    format!("Failed to stop recording: {}", e),
                )
            }
        },
        None => error_response(
            StatusCode::NOT_FOUND,
            format!("Recording {} not found", recording_id),
        ),
    }
}

/// POST /record/:recording_id/control
/// Relay a fire-and-forget control command to a session
pub async fn control_command(
    State(state): State<AppState>,
    Path(recording_id): Path<String>,
    Json(command): Json<ControlCommand>,
) -> impl IntoResponse {
    // Stop removes the session like the dedicated stop route does
    if command == ControlCommand::Stop {
        return stop_recording(State(state), Path(recording_id))
            .await
            .into_response();
    }

    let session = {
        let sessions = state.sessions.read().await;
        sessions.get(&recording_id).cloned()
    };

    match session {
        Some(session) => match session.apply(command).await {
            Ok(()) => (StatusCode::ACCEPTED, Json(serde_json::json!({"status": "ok"})))
                .into_response(),
            Err(e) => {
                error!("Control command failed: {:#}", e);
                error_response(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    format!("Control command failed: {}", e),
                )
            }
        },
        None => error_response(
            StatusCode::NOT_FOUND,
            format!("Recording {} not found", recording_id),
        ),
    }
}

/// GET /record/:recording_id/status
pub async fn get_recording_status(
    State(state): State<AppState>,
    Path(recording_id): Path<String>,
) -> impl IntoResponse {
    let sessions = state.sessions.read().await;

    match sessions.get(&recording_id) {
        Some(session) => (StatusCode::OK, Json(session.get_stats())).into_response(),
        None => error_response(
            StatusCode::NOT_FOUND,
            format!("Recording {} not found", recording_id),
        ),
    }
}

/// GET /record/:recording_id/transcript
/// Transcript accumulated so far
pub async fn get_recording_transcript(
    State(state): State<AppState>,
    Path(recording_id): Path<String>,
) -> impl IntoResponse {
    let session = {
        let sessions = state.sessions.read().await;
        sessions.get(&recording_id).cloned()
    };

    match session {
        Some(session) => {
            let transcript = session.transcript().await;
            (
                StatusCode::OK,
                Json(TranscriptResponse {
                    recording_id,
                    transcript,
                }),
            )
                .into_response()
        }
        None => error_response(
            StatusCode::NOT_FOUND,
            format!("Recording {} not found", recording_id),
        ),
    }
}

/// GET /health
/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
