//! `[joystick]` configuration.

use serde::{Deserialize, Serialize};

/// Axis / button mapping and scaling for the operator input device.
///
/// Indices follow the backend's axis and button numbering.  Out-of-range
/// indices are handled on connect, see [`resolve_layout`](crate::resolve_layout).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoystickConfig {
    /// Axis driving `linear_x`.
    #[serde(default = "default_axis_speed")]
    pub axis_speed: usize,
    /// Axis driving the steering angle.
    #[serde(default = "default_axis_steer")]
    pub axis_steer: usize,
    /// Display-only axis reported as `raw_speed`.
    #[serde(default = "default_axis_raw_speed")]
    pub axis_raw_speed: usize,
    /// Display-only axis reported as `raw_steer`.
    #[serde(default = "default_axis_raw_steer")]
    pub axis_raw_steer: usize,
    /// Button toggling the local e-stop on press.
    #[serde(default = "default_btn_estop")]
    pub btn_estop: usize,
    /// m/s at full deflection.
    #[serde(default = "default_max_speed")]
    pub max_speed: f64,
    /// Steering angle at full deflection, in degrees.
    #[serde(default = "default_max_steer_deg")]
    pub max_steer_deg: f64,
    #[serde(default = "default_deadzone")]
    pub deadzone: f64,
    #[serde(default = "default_invert_speed")]
    pub invert_speed: bool,
    #[serde(default = "default_poll_rate_hz")]
    pub poll_rate_hz: f64,
    #[serde(default = "default_broadcast_rate_hz")]
    pub broadcast_rate_hz: f64,
    #[serde(default = "default_reconnect_interval_secs")]
    pub reconnect_interval_secs: f64,
}

fn default_axis_speed() -> usize {
    1
}
fn default_axis_steer() -> usize {
    3
}
fn default_axis_raw_speed() -> usize {
    4
}
fn default_axis_raw_steer() -> usize {
    0
}
fn default_btn_estop() -> usize {
    4
}
fn default_max_speed() -> f64 {
    1.0
}
fn default_max_steer_deg() -> f64 {
    27.0
}
fn default_deadzone() -> f64 {
    0.05
}
fn default_invert_speed() -> bool {
    true
}
fn default_poll_rate_hz() -> f64 {
    50.0
}
fn default_broadcast_rate_hz() -> f64 {
    20.0
}
fn default_reconnect_interval_secs() -> f64 {
    1.0
}

impl Default for JoystickConfig {
    fn default() -> Self {
        Self {
            axis_speed: default_axis_speed(),
            axis_steer: default_axis_steer(),
            axis_raw_speed: default_axis_raw_speed(),
            axis_raw_steer: default_axis_raw_steer(),
            btn_estop: default_btn_estop(),
            max_speed: default_max_speed(),
            max_steer_deg: default_max_steer_deg(),
            deadzone: default_deadzone(),
            invert_speed: default_invert_speed(),
            poll_rate_hz: default_poll_rate_hz(),
            broadcast_rate_hz: default_broadcast_rate_hz(),
            reconnect_interval_secs: default_reconnect_interval_secs(),
        }
    }
}

impl JoystickConfig {
    pub fn max_steer_rad(&self) -> f64 {
        self.max_steer_deg.to_radians()
    }
}
