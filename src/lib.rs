//! Voice capture and transcription orchestration for the DeepSpeak
//! conversation practice backend.
//!
//! The crate ties together microphone acquisition, live level metering,
//! strategy-selected transcription (continuous on-device recognition or
//! buffered remote submission with permanent fallback), silence-triggered
//! conversational turns, and speech playback, behind an HTTP control
//! surface. All platform runtimes are injected through the `platform`
//! ports.

pub mod api;
pub mod capture;
pub mod chat;
pub mod config;
pub mod http;
pub mod level;
pub mod platform;
pub mod playback;
pub mod session;
pub mod transcribe;

pub use api::ApiClient;
pub use config::Config;
pub use platform::Platform;
pub use session::{RecorderSession, SessionConfig, SessionStats};
