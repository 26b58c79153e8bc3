use super::error::CaptureError;
use crate::platform::{MediaDevices, MediaStreamHandle, PermissionState};
use std::sync::Arc;
use tracing::{debug, info};

/// Owns the acquired microphone stream for one capture at a time.
///
/// A new acquisition always releases the prior stream first, and `release`
/// is idempotent: the stream is taken out of the controller before its
/// tracks are stopped, so a second call is a no-op.
pub struct CaptureController {
    devices: Arc<dyn MediaDevices>,
    stream: Option<Arc<dyn MediaStreamHandle>>,
}

impl CaptureController {
    pub fn new(devices: Arc<dyn MediaDevices>) -> Self {
        Self {
            devices,
            stream: None,
        }
    }

    /// Request microphone access. `preferred` is a device-id hint; the
    /// adapter falls back to the default device when it is unavailable.
    ///
    /// `PermissionDenied` failures are refined with the permission-state
    /// probe (where available) to distinguish "blocked" from "not yet
    /// asked".
    pub async fn acquire(&mut self, preferred: Option<&str>) -> Result<(), CaptureError> {
        // Exclusive ownership: no overlap with a prior session's stream
        self.release();

        match self.devices.acquire(preferred).await {
            Ok(stream) => {
                info!("microphone acquired: {}", stream.id());
                self.stream = Some(Arc::from(stream));
                Ok(())
            }
            Err(CaptureError::PermissionDenied { .. }) => {
                let blocked = matches!(
                    self.devices.permission_state().await,
                    Some(PermissionState::Denied)
                );
                Err(CaptureError::PermissionDenied { blocked })
            }
            Err(e) => Err(e),
        }
    }

    pub fn stream(&self) -> Option<Arc<dyn MediaStreamHandle>> {
        self.stream.clone()
    }

    pub fn is_acquired(&self) -> bool {
        self.stream.is_some()
    }

    /// Stop all tracks and drop the stream. Safe to call when already
    /// released.
    pub fn release(&mut self) {
        if let Some(stream) = self.stream.take() {
            debug!("releasing microphone stream: {}", stream.id());
            stream.stop_tracks();
        }
    }
}

impl Drop for CaptureController {
    fn drop(&mut self) {
        self.release();
    }
}
