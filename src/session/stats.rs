use crate::transcribe::{CaptureState, Strategy};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Point-in-time snapshot of one capture session, shaped for the status
/// endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStats {
    pub session_id: String,
    pub state: CaptureState,
    /// Strategy chosen for the most recent capture, if one has started
    pub strategy: Option<Strategy>,
    pub started_at: Option<DateTime<Utc>>,
    /// Seconds since capture started (or total length once stopped)
    pub duration_seconds: Option<f64>,
    /// Current meter level in [0, 100]
    pub level: f32,
    pub low_signal: bool,
    /// Remote transcription minutes left, when the backend has reported it
    pub remaining_minutes: Option<f64>,
    /// Latest user-facing status line (errors, downgrade notices)
    pub status: String,
}
