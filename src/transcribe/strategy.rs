use crate::api::ApiError;
use crate::platform::Capabilities;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Transcription strategy for one capture. The two are mutually exclusive
/// per recording.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Continuous incremental recognition by the local engine
    OnDeviceRecognition,
    /// Buffered audio submitted whole to the backend (quota-billed)
    RemoteTranscription,
}

/// Why remote transcription was abandoned. All reasons are permanent for
/// the component lifetime: network-class submission failures downgrade just
/// like quota exhaustion (an explicit policy choice, not an accident).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DowngradeReason {
    /// Recorder could not be constructed (unsupported format, init failure)
    RecorderInitFailed,
    /// Backend reported the transcription quota as exhausted
    QuotaExhausted,
    /// A submission failed with a network-class error
    NetworkFailure,
}

/// Chooses the strategy for each capture and tracks the one-way downgrade.
///
/// Remote transcription is the default when chunked recording is supported
/// and a billing session id is present. Once downgraded, remote is never
/// re-attempted; only a fresh process resets the preference.
#[derive(Debug)]
pub struct StrategySelector {
    capabilities: Capabilities,
    downgraded: Option<DowngradeReason>,
    remaining_minutes: Option<f64>,
    notice_pending: bool,
}

impl StrategySelector {
    pub fn new(capabilities: Capabilities) -> Self {
        Self {
            capabilities,
            downgraded: None,
            remaining_minutes: None,
            notice_pending: false,
        }
    }

    pub fn select(&self, session_id: Option<&str>) -> Strategy {
        if self.downgraded.is_none()
            && self.capabilities.has_chunked_recording
            && session_id.is_some()
        {
            Strategy::RemoteTranscription
        } else {
            Strategy::OnDeviceRecognition
        }
    }

    /// Permanently switch to on-device recognition
    pub fn downgrade(&mut self, reason: DowngradeReason) {
        if self.downgraded.is_some() {
            return;
        }
        warn!("remote transcription downgraded: {:?}", reason);
        self.downgraded = Some(reason);
        self.notice_pending = true;
        if reason == DowngradeReason::QuotaExhausted {
            self.remaining_minutes = Some(0.0);
        }
    }

    pub fn downgraded(&self) -> Option<DowngradeReason> {
        self.downgraded
    }

    /// Record the quota counter reported with a successful submission.
    /// The counter is monotonically non-increasing within a billing window;
    /// reaching zero downgrades.
    pub fn record_quota(&mut self, remaining_minutes: Option<f64>) {
        if let Some(minutes) = remaining_minutes {
            info!("transcription quota remaining: {:.1} min", minutes);
            self.remaining_minutes = Some(minutes);
            if minutes <= 0.0 {
                self.downgrade(DowngradeReason::QuotaExhausted);
            }
        }
    }

    /// Classify a failed remote submission into the downgrade policy
    pub fn record_submission_failure(&mut self, err: &ApiError) {
        match err {
            ApiError::QuotaExhausted => self.downgrade(DowngradeReason::QuotaExhausted),
            ApiError::Network(_) => self.downgrade(DowngradeReason::NetworkFailure),
            ApiError::Http { .. } | ApiError::Decode(_) => {
                self.downgrade(DowngradeReason::NetworkFailure)
            }
        }
    }

    pub fn remaining_minutes(&self) -> Option<f64> {
        self.remaining_minutes
    }

    /// One-time user notice for a downgrade, emitted at most once
    pub fn take_notice(&mut self) -> Option<String> {
        if !self.notice_pending {
            return None;
        }
        self.notice_pending = false;
        let message = match self.downgraded? {
            DowngradeReason::RecorderInitFailed => {
                "High-accuracy transcription is unavailable on this device; \
                 switched to on-device recognition."
            }
            DowngradeReason::QuotaExhausted => {
                "Transcription minutes used up; switched to on-device recognition."
            }
            DowngradeReason::NetworkFailure => {
                "Transcription service unreachable; switched to on-device recognition."
            }
        };
        Some(message.to_string())
    }
}
