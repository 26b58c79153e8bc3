use crate::config::{CaptureTuning, LevelTuning};
use serde::{Deserialize, Serialize};

/// Configuration for one capture session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Session identifier; remote transcription is billed per session
    pub session_id: String,

    /// Preferred input device id (a hint, not a constraint)
    pub preferred_device: Option<String>,

    #[serde(default)]
    pub tuning: CaptureTuning,

    #[serde(default)]
    pub level: LevelTuning,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            session_id: format!("capture-{}", uuid::Uuid::new_v4()),
            preferred_device: None,
            tuning: CaptureTuning::default(),
            level: LevelTuning::default(),
        }
    }
}
