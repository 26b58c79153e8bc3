//! HTTP client for the DeepSpeak backend (chat, transcription, TTS,
//! session submission). The backend contract is opaque here: requests go
//! out, typed responses come back, failures are classified.

mod client;

pub use client::{ApiClient, ApiError, TranscriptionOutcome};
