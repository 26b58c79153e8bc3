use super::handlers;
use super::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

/// Create the HTTP router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Capture control
        .route("/capture/start", post(handlers::start_capture))
        .route("/capture/stop/:session_id", post(handlers::stop_capture))
        // Capture queries
        .route(
            "/capture/:session_id/status",
            get(handlers::get_capture_status),
        )
        .route(
            "/capture/:session_id/transcript",
            get(handlers::get_capture_transcript),
        )
        // Input devices
        .route("/devices", get(handlers::list_devices))
        .route("/devices/select", post(handlers::select_device))
        // Conversation
        .route("/chat", post(handlers::send_chat))
        .route("/chat/history", get(handlers::get_chat_history))
        .route("/chat/voice_mode", post(handlers::set_voice_mode))
        .route("/chat/voice/update", post(handlers::voice_update))
        .route("/chat/voice/stop", post(handlers::voice_stop))
        // Speech playback
        .route("/playback/play", post(handlers::playback_play))
        .route("/playback/seek", post(handlers::playback_seek))
        .route("/playback/pause", post(handlers::playback_pause))
        .route("/playback/resume", post(handlers::playback_resume))
        .route("/playback/stop", post(handlers::playback_stop))
        .route("/playback/status", get(handlers::playback_status))
        // Add tracing middleware for request logging
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
