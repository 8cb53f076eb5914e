//! [`InputBackend`] – the seam between the driver and a physical device.

use gcs_types::GcsError;

/// What a device reports about itself when opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub name: String,
    pub num_axes: usize,
    pub num_buttons: usize,
}

/// A polled input device source.
///
/// Backends are created on, and only used from, the driver's own thread, so
/// they need not be `Send`.
pub trait InputBackend {
    /// Rescan and return how many devices are present.
    fn device_count(&mut self) -> usize;

    /// Select device `index` for subsequent reads.
    fn open(&mut self, index: usize) -> Result<DeviceInfo, GcsError>;

    /// Refresh input state.  An error means the device is gone.
    fn pump(&mut self) -> Result<(), GcsError>;

    /// Axis position in `[-1.0, 1.0]`.  Unknown axes read as `0.0`.
    fn axis(&self, index: usize) -> f64;

    fn button(&self, index: usize) -> bool;

    /// Release the selected device.
    fn close(&mut self) {}
}
