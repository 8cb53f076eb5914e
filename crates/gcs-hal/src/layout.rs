//! Per-connection validation of the configured axis / button indices.
//!
//! | Index | Out of range on the device |
//! |---|---|
//! | `axis_speed`, `axis_steer` | clamped to axis 0, error |
//! | `axis_raw_speed`, `axis_raw_steer` | that display value disabled, warning |
//! | `btn_estop` | e-stop-by-button disabled, warning |
//!
//! The configuration itself is never modified; every connection resolves a
//! fresh [`AxisLayout`] from it.

use tracing::{error, warn};

use crate::backend::DeviceInfo;
use crate::config::JoystickConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueLevel {
    Warn,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigIssue {
    pub level: IssueLevel,
    pub message: String,
}

impl ConfigIssue {
    fn error(message: String) -> Self {
        Self {
            level: IssueLevel::Error,
            message,
        }
    }

    fn warn(message: String) -> Self {
        Self {
            level: IssueLevel::Warn,
            message,
        }
    }

    /// Emit through `tracing` at the issue's level.
    pub fn log(&self) {
        match self.level {
            IssueLevel::Error => error!(issue = %self.message, "joystick config"),
            IssueLevel::Warn => warn!(issue = %self.message, "joystick config"),
        }
    }
}

/// Indices actually used for one connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AxisLayout {
    pub speed: usize,
    pub steer: usize,
    pub raw_speed: Option<usize>,
    pub raw_steer: Option<usize>,
    pub estop_button: Option<usize>,
}

/// Resolve `config` against `device`.
pub fn resolve_layout(config: &JoystickConfig, device: &DeviceInfo) -> (AxisLayout, Vec<ConfigIssue>) {
    let mut issues = Vec::new();
    let axes = device.num_axes;

    let mut control_axis = |name: &str, index: usize| {
        if index < axes {
            index
        } else {
            issues.push(ConfigIssue::error(format!(
                "{name}={index} out of range (device has {axes} axes), clamped to 0"
            )));
            0
        }
    };
    let speed = control_axis("axis_speed", config.axis_speed);
    let steer = control_axis("axis_steer", config.axis_steer);

    let mut display_axis = |name: &str, index: usize| {
        if index < axes {
            Some(index)
        } else {
            issues.push(ConfigIssue::warn(format!(
                "{name}={index} out of range (device has {axes} axes), display disabled"
            )));
            None
        }
    };
    let raw_speed = display_axis("axis_raw_speed", config.axis_raw_speed);
    let raw_steer = display_axis("axis_raw_steer", config.axis_raw_steer);

    let estop_button = if config.btn_estop < device.num_buttons {
        Some(config.btn_estop)
    } else {
        issues.push(ConfigIssue::warn(format!(
            "btn_estop={} out of range (device has {} buttons), e-stop button disabled",
            config.btn_estop, device.num_buttons
        )));
        None
    };

    (
        AxisLayout {
            speed,
            steer,
            raw_speed,
            raw_steer,
            estop_button,
        },
        issues,
    )
}
