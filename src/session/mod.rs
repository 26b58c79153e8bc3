//! Recorder-variant orchestration
//!
//! Ties the capture controller, level monitor, strategy selector, and the
//! active transcription driver together for one structured practice
//! session: start, speak, stop, get the finalized transcript.

mod config;
mod recorder;
mod stats;

pub use config::SessionConfig;
pub use recorder::{RecorderSession, TranscribeApi};
pub use stats::SessionStats;
