/// Capture failure classes. Each maps to a distinct user-facing status
/// message; raw platform errors never reach the UI layer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CaptureError {
    /// `blocked` distinguishes a hard site/OS block from a dismissed prompt
    #[error("microphone permission denied (blocked: {blocked})")]
    PermissionDenied { blocked: bool },

    #[error("no audio input device found")]
    NoDevice,

    #[error("audio input device is busy")]
    DeviceBusy,

    #[error("audio capture unsupported on this platform")]
    Unsupported,

    #[error("audio capture failed: {0}")]
    Unknown(String),
}

impl CaptureError {
    /// Classify a DOMException-style platform error name
    pub fn from_platform_name(name: &str) -> Self {
        match name {
            "NotAllowedError" | "PermissionDeniedError" => {
                CaptureError::PermissionDenied { blocked: false }
            }
            "NotFoundError" | "DevicesNotFoundError" => CaptureError::NoDevice,
            "NotReadableError" | "TrackStartError" => CaptureError::DeviceBusy,
            other => CaptureError::Unknown(other.to_string()),
        }
    }

    /// Short user-facing status string with remediation guidance
    pub fn status_message(&self) -> String {
        match self {
            CaptureError::PermissionDenied { blocked: true } => {
                "Microphone access is blocked. Allow the microphone in your \
                 site settings, then reload."
                    .to_string()
            }
            CaptureError::PermissionDenied { blocked: false } => {
                "Microphone access was denied. Allow the microphone in your \
                 site settings."
                    .to_string()
            }
            CaptureError::NoDevice => {
                "No microphone found. Check your device's audio settings.".to_string()
            }
            CaptureError::DeviceBusy => {
                "The microphone could not be started (another app may be using it).".to_string()
            }
            CaptureError::Unsupported => {
                "This platform does not support microphone capture.".to_string()
            }
            CaptureError::Unknown(_) => "Microphone access error.".to_string(),
        }
    }
}
