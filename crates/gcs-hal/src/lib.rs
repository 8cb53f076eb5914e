//! `gcs-hal` – operator input device handling.
//!
//! - [`InputBackend`] – device seam; [`GilrsBackend`] behind the `gamepad`
//!   feature.
//! - [`JoystickConfig`] and [`resolve_layout`] – mapping and the
//!   once-per-connection validation pass.
//! - [`apply_deadzone`] – axis normalisation.
//! - [`InputDriver`] – connection state machine, run on its own thread by
//!   [`spawn`].

pub mod backend;
pub mod config;
pub mod driver;
#[cfg(feature = "gamepad")]
pub mod gamepad;
pub mod layout;
pub mod normalize;

pub use backend::{DeviceInfo, InputBackend};
pub use config::JoystickConfig;
pub use driver::{InputDriver, InputHandle, TickOutcome, spawn};
#[cfg(feature = "gamepad")]
pub use gamepad::GilrsBackend;
pub use layout::{AxisLayout, ConfigIssue, IssueLevel, resolve_layout};
pub use normalize::apply_deadzone;
