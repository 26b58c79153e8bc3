//! Transcription strategy core
//!
//! Two mutually exclusive strategies per capture: continuous on-device
//! recognition (incremental) or chunked buffered recording submitted whole
//! to the backend. The selector defaults to remote transcription and
//! downgrades permanently to on-device recognition on capability, quota, or
//! network failure.

mod buffer;
mod on_device;
mod remote;
mod state;
mod strategy;

pub use buffer::TranscriptBuffer;
pub use on_device::{OnDeviceEvent, OnDeviceSession};
pub use remote::{pick_format, RecordedUtterance, RemoteCapture};
pub use state::{CaptureState, CaptureStateMachine, StateError};
pub use strategy::{DowngradeReason, Strategy, StrategySelector};

/// Why a finished buffered recording could not be turned into a payload.
/// These are client-side rejections; no network call has happened yet.
#[derive(Debug, thiserror::Error)]
pub enum TranscribeError {
    #[error("recording too short ({secs:.2}s); speak for at least {min:.1}s")]
    TooShort { secs: f64, min: f64 },

    #[error("recording too small ({bytes} bytes, minimum {min}); speak a little longer")]
    TooSmall { bytes: usize, min: usize },

    #[error("failed to encode recording: {0}")]
    Encode(String),
}
