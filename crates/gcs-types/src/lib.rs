//! `gcs-types` – shared vocabulary of the ground-control station.
//!
//! - [`field`] – [`FieldValue`] / [`FieldMap`], the transport-agnostic form
//!   of a decoded wire update, and the [`FieldMerge`] whitelist trait.
//! - [`model`] – the value records held by the state store.
//! - [`GcsError`] – the error type shared by every crate in the workspace.
//! - [`saturating_duration`] – config seconds to `Duration` without panics.

pub mod field;
pub mod model;

use std::time::Duration;

use thiserror::Error;

pub use field::{FieldMap, FieldMerge, FieldValue, field_map};
pub use model::{
    ActiveSource, Alert, AlertLevel, BridgeFlag, ControlState, DiskPartition, DriveMode,
    EStopStatus, GpuEntry, HunterStatus, LinkStatus, MuxFlag, MuxStatus, NetInterface,
    NetworkStatus, SystemResources, TwistValues,
};

/// Error type spanning transport failures, malformed frames, configuration
/// problems and rejected operator commands.
///
/// None of these are fatal to the process; callers degrade or report.
#[derive(Error, Debug)]
pub enum GcsError {
    #[error("Transport Error: {0}")]
    Transport(String),

    #[error("Codec Error: {0}")]
    Codec(String),

    #[error("invalid mode: {0}")]
    InvalidMode(i64),

    #[error("Configuration Error: {0}")]
    Config(String),

    #[error("Input Device Error: {0}")]
    Device(String),

    #[error("Channel Error: {0}")]
    Channel(String),

    #[error("Serialization Error: {0}")]
    Serialization(String),
}

impl From<std::io::Error> for GcsError {
    fn from(e: std::io::Error) -> Self {
        GcsError::Transport(e.to_string())
    }
}

/// Convert configured seconds to a [`Duration`].
///
/// Values too large to represent (including `inf`) saturate to
/// [`Duration::MAX`]; negative values and NaN become zero.
pub fn saturating_duration(secs: f64) -> Duration {
    Duration::try_from_secs_f64(secs).unwrap_or(if secs > 0.0 {
        Duration::MAX
    } else {
        Duration::ZERO
    })
}
