//! Device capture: microphone acquisition, release, and failure
//! classification. Acquisition only ever happens on an explicit user action;
//! nothing requests the microphone at construction time.

mod controller;
mod devices;
mod error;

pub use controller::CaptureController;
pub use devices::DeviceInventory;
pub use error::CaptureError;
