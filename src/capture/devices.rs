use super::error::CaptureError;
use crate::platform::{AudioInputDevice, MediaDevices};
use tracing::debug;

/// Shared read-only snapshot of available audio-input devices.
///
/// Refreshed on demand and at acquisition time; captures read the selected
/// id as a preference when acquiring.
#[derive(Debug, Default)]
pub struct DeviceInventory {
    devices: Vec<AudioInputDevice>,
    selected: Option<String>,
}

impl DeviceInventory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn refresh(&mut self, port: &dyn MediaDevices) -> Result<(), CaptureError> {
        self.devices = port.enumerate().await?;
        debug!("device inventory refreshed: {} inputs", self.devices.len());

        // Keep the selection valid; default to the first input
        let still_present = self
            .selected
            .as_ref()
            .is_some_and(|id| self.devices.iter().any(|d| &d.id == id));
        if !still_present {
            self.selected = self.devices.first().map(|d| d.id.clone());
        }

        Ok(())
    }

    pub fn devices(&self) -> &[AudioInputDevice] {
        &self.devices
    }

    pub fn select(&mut self, id: &str) {
        if self.devices.iter().any(|d| d.id == id) {
            self.selected = Some(id.to_string());
        }
    }

    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }
}
