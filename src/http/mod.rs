//! HTTP API server for external control (web client, desktop shell)
//!
//! This module provides a REST API for driving voice sessions:
//! - POST /capture/start - Acquire the microphone and begin capturing
//! - POST /capture/stop/:id - Stop and resolve the transcript
//! - GET /capture/:id/status - Query capture state, level, and quota
//! - GET /capture/:id/transcript - Get the transcript so far
//! - GET /devices, POST /devices/select - Input-device inventory
//! - POST /chat, GET /chat/history - Conversational turns
//! - /playback/* - Speech playback control
//! - GET /health - Health check

mod handlers;
mod routes;
mod state;

pub use routes::create_router;
pub use state::AppState;
