use super::state::AppState;
use crate::session::{RecorderSession, SessionConfig, SessionStats};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct StartCaptureRequest {
    /// Optional session ID (if not provided, generate UUID)
    pub session_id: Option<String>,

    /// Optional preferred input-device id
    pub preferred_device: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StartCaptureResponse {
    pub session_id: String,
    pub status: String,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct StopCaptureResponse {
    pub session_id: String,
    pub status: String,
    pub transcript: String,
    pub stats: SessionStats,
}

#[derive(Debug, Serialize)]
pub struct TranscriptResponse {
    pub session_id: String,
    pub transcript: String,
}

#[derive(Debug, Serialize)]
pub struct DeviceEntry {
    pub id: String,
    pub label: String,
    pub selected: bool,
}

#[derive(Debug, Deserialize)]
pub struct SelectDeviceRequest {
    pub device_id: String,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub reply: Option<String>,
    pub typing: bool,
}

#[derive(Debug, Deserialize)]
pub struct VoiceModeRequest {
    pub enabled: bool,
}

#[derive(Debug, Deserialize)]
pub struct VoiceUpdateRequest {
    /// Finalized-so-far recognition text
    pub finalized: String,
    /// Current interim (unconfirmed) text
    #[serde(default)]
    pub interim: String,
}

#[derive(Debug, Deserialize)]
pub struct PlayRequest {
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct SeekRequest {
    pub segment: usize,
}

#[derive(Debug, Serialize)]
pub struct PlaybackStatusResponse {
    pub playing: bool,
    pub segment_count: usize,
    pub position: usize,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

// ============================================================================
// Capture Handlers
// ============================================================================

/// POST /capture/start
/// Acquire the microphone and begin a capture session
pub async fn start_capture(
    State(state): State<AppState>,
    Json(req): Json<StartCaptureRequest>,
) -> impl IntoResponse {
    let session_id = req
        .session_id
        .unwrap_or_else(|| format!("capture-{}", uuid::Uuid::new_v4()));

    info!("Starting capture for session: {}", session_id);

    // Check if already capturing
    {
        let sessions = state.sessions.read().await;
        if sessions.contains_key(&session_id) {
            return (
                StatusCode::CONFLICT,
                Json(ErrorResponse {
                    error: format!("Session {} is already capturing", session_id),
                }),
            )
                .into_response();
        }
    }

    // A selected inventory device is the default preference; an explicit
    // request value overrides it
    let preferred = match req.preferred_device {
        Some(id) => Some(id),
        None => state
            .inventory
            .lock()
            .await
            .selected()
            .map(|id| id.to_string()),
    };

    let config = SessionConfig {
        session_id: session_id.clone(),
        preferred_device: preferred,
        tuning: state.config.capture.clone(),
        level: state.config.level.clone(),
    };

    let session = Arc::new(RecorderSession::new(
        config,
        state.platform.clone(),
        state.api.clone(),
    ));

    if let Err(e) = session.start().await {
        error!("Failed to start capture: {}", e);
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                error: format!("Failed to start capture: {}", e),
            }),
        )
            .into_response();
    }

    {
        let mut sessions = state.sessions.write().await;
        sessions.insert(session_id.clone(), session);
    }

    info!("Capture started for session: {}", session_id);

    (
        StatusCode::OK,
        Json(StartCaptureResponse {
            session_id: session_id.clone(),
            status: "capturing".to_string(),
            message: format!("Capture started for session {}", session_id),
        }),
    )
        .into_response()
}

/// POST /capture/stop/:session_id
/// Stop capturing and resolve the final transcript
pub async fn stop_capture(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> impl IntoResponse {
    info!("Stopping capture for session: {}", session_id);

    let session = {
        let mut sessions = state.sessions.write().await;
        sessions.remove(&session_id)
    };

    match session {
        Some(session) => match session.stop().await {
            Ok(stats) => {
                let transcript = session.transcript().await;
                (
                    StatusCode::OK,
                    Json(StopCaptureResponse {
                        session_id,
                        status: format!("{:?}", stats.state).to_lowercase(),
                        transcript,
                        stats,
                    }),
                )
                    .into_response()
            }
            Err(e) => {
                error!("Failed to stop capture: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ErrorResponse {
                        error: format!("Failed to stop capture: {}", e),
                    }),
                )
                    .into_response()
            }
        },
        None => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: format!("Session {} not found", session_id),
            }),
        )
            .into_response(),
    }
}

/// GET /capture/:session_id/status
/// Snapshot of state, strategy, meter level, and quota
pub async fn get_capture_status(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> impl IntoResponse {
    let sessions = state.sessions.read().await;

    match sessions.get(&session_id) {
        Some(session) => (StatusCode::OK, Json(session.stats().await)).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: format!("Session {} not found", session_id),
            }),
        )
            .into_response(),
    }
}

/// GET /capture/:session_id/transcript
/// Transcript accumulated so far (live preview while recording)
pub async fn get_capture_transcript(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> impl IntoResponse {
    let sessions = state.sessions.read().await;

    match sessions.get(&session_id) {
        Some(session) => (
            StatusCode::OK,
            Json(TranscriptResponse {
                session_id,
                transcript: session.transcript().await,
            }),
        )
            .into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: format!("Session {} not found", session_id),
            }),
        )
            .into_response(),
    }
}

// ============================================================================
// Device Handlers
// ============================================================================

/// GET /devices
/// Refresh and list available audio-input devices
pub async fn list_devices(State(state): State<AppState>) -> impl IntoResponse {
    let mut inventory = state.inventory.lock().await;

    if let Err(e) = inventory.refresh(&*state.platform.devices).await {
        error!("Device enumeration failed: {}", e);
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                error: format!("Device enumeration failed: {}", e),
            }),
        )
            .into_response();
    }

    let selected = inventory.selected().map(|id| id.to_string());
    let devices: Vec<DeviceEntry> = inventory
        .devices()
        .iter()
        .map(|d| DeviceEntry {
            id: d.id.clone(),
            label: d.label.clone(),
            selected: selected.as_deref() == Some(d.id.as_str()),
        })
        .collect();

    (StatusCode::OK, Json(devices)).into_response()
}

/// POST /devices/select
/// Choose the preferred input device for future captures
pub async fn select_device(
    State(state): State<AppState>,
    Json(req): Json<SelectDeviceRequest>,
) -> impl IntoResponse {
    let mut inventory = state.inventory.lock().await;
    inventory.select(&req.device_id);

    match inventory.selected() {
        Some(id) if id == req.device_id => StatusCode::OK.into_response(),
        _ => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: format!("Unknown device {}", req.device_id),
            }),
        )
            .into_response(),
    }
}

// ============================================================================
// Chat and Playback Handlers
// ============================================================================

/// POST /chat
/// Send one conversational turn through the pipeline
pub async fn send_chat(
    State(state): State<AppState>,
    Json(req): Json<ChatRequest>,
) -> impl IntoResponse {
    let mut chat = state.chat.lock().await;
    let reply = chat.send(&req.message).await;

    (
        StatusCode::OK,
        Json(ChatResponse {
            reply,
            typing: chat.is_typing(),
        }),
    )
        .into_response()
}

/// GET /chat/history
pub async fn get_chat_history(State(state): State<AppState>) -> impl IntoResponse {
    let chat = state.chat.lock().await;
    (StatusCode::OK, Json(chat.history().to_vec())).into_response()
}

/// POST /chat/voice_mode
pub async fn set_voice_mode(
    State(state): State<AppState>,
    Json(req): Json<VoiceModeRequest>,
) -> impl IntoResponse {
    state.chat.lock().await.set_voice_mode(req.enabled);
    StatusCode::OK.into_response()
}

/// POST /chat/voice/update
/// Feed a recognition update into the silence-triggered auto-submit
pub async fn voice_update(
    State(state): State<AppState>,
    Json(req): Json<VoiceUpdateRequest>,
) -> impl IntoResponse {
    state.voice.on_update(&req.finalized, &req.interim).await;
    StatusCode::OK.into_response()
}

/// POST /chat/voice/stop
/// Cancel any pending auto-submit and clear the accumulated text
pub async fn voice_stop(State(state): State<AppState>) -> impl IntoResponse {
    state.voice.stop().await;
    StatusCode::OK.into_response()
}

/// POST /playback/play
pub async fn playback_play(
    State(state): State<AppState>,
    Json(req): Json<PlayRequest>,
) -> impl IntoResponse {
    state.player.lock().await.play(&req.text).await;
    StatusCode::OK.into_response()
}

/// POST /playback/seek
pub async fn playback_seek(
    State(state): State<AppState>,
    Json(req): Json<SeekRequest>,
) -> impl IntoResponse {
    state.player.lock().await.seek_to_segment(req.segment).await;
    StatusCode::OK.into_response()
}

/// POST /playback/pause
pub async fn playback_pause(State(state): State<AppState>) -> impl IntoResponse {
    state.player.lock().await.pause().await;
    StatusCode::OK.into_response()
}

/// POST /playback/resume
pub async fn playback_resume(State(state): State<AppState>) -> impl IntoResponse {
    state.player.lock().await.resume().await;
    StatusCode::OK.into_response()
}

/// POST /playback/stop
pub async fn playback_stop(State(state): State<AppState>) -> impl IntoResponse {
    state.player.lock().await.stop().await;
    StatusCode::OK.into_response()
}

/// GET /playback/status
pub async fn playback_status(State(state): State<AppState>) -> impl IntoResponse {
    let player = state.player.lock().await;
    (
        StatusCode::OK,
        Json(PlaybackStatusResponse {
            playing: player.is_playing(),
            segment_count: player.segment_count(),
            position: player.position(),
        }),
    )
        .into_response()
}

/// GET /health
/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
