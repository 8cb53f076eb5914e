//! [`Validator`] – operator-visible safety conditions.
//!
//! Every validation pass evaluates each registered [`Rule`] against a
//! read-only [`VehicleView`] and *replaces* the store's alert list with the
//! result.  Alerts carry no state of their own: the same view always yields
//! the same alerts.
//!
//! Built-in rules:
//!
//! | Rule | Level | Condition |
//! |---|---|---|
//! | [`EstopMotionRule`] | error | vehicle-confirmed e-stop while final twist exceeds the motion threshold |
//! | [`EstopConfirmationRule`] | warn | local e-stop requested but not yet confirmed by the vehicle |
//! | [`RemoteWithoutTeleopRule`] | warn | mux requests remote and has it enabled, yet no teleop is active |
//! | [`StaleTelemetryRule`] | error | no vehicle data within the staleness window |
//!
//! Alerts never halt or alter the control loop.

use std::time::Duration;

use gcs_types::{
    Alert, ControlState, DriveMode, EStopStatus, MuxStatus, TwistValues, saturating_duration,
};
use serde::{Deserialize, Serialize};
use tracing::trace;

// ────────────────────────────────────────────────────────────────────────────
// Configuration
// ────────────────────────────────────────────────────────────────────────────

/// Thresholds used by the built-in rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationConfig {
    /// Seconds without vehicle data before telemetry is considered stale.
    #[serde(default = "default_stale_after_secs")]
    pub stale_after_secs: f64,
    /// Twist magnitude above which the vehicle counts as moving.
    #[serde(default = "default_motion_threshold")]
    pub motion_threshold: f64,
}

fn default_stale_after_secs() -> f64 {
    3.0
}
fn default_motion_threshold() -> f64 {
    0.05
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            stale_after_secs: default_stale_after_secs(),
            motion_threshold: default_motion_threshold(),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Rule trait
// ────────────────────────────────────────────────────────────────────────────

/// Borrowed view of the state a validation pass looks at.
pub struct VehicleView<'a> {
    pub mux: &'a MuxStatus,
    pub twist: &'a TwistValues,
    pub estop: &'a EStopStatus,
    pub control: &'a ControlState,
    /// Time since the last vehicle receipt; `None` when nothing has arrived.
    pub vehicle_age: Option<Duration>,
}

/// A single safety condition.
pub trait Rule: Send + Sync {
    /// Human-readable name, used in logs.
    fn name(&self) -> &str;

    /// Return the alert this rule raises for `view`, if any.
    fn evaluate(&self, view: &VehicleView<'_>) -> Option<Alert>;
}

// ────────────────────────────────────────────────────────────────────────────
// Validator
// ────────────────────────────────────────────────────────────────────────────

/// Ordered set of [`Rule`]s.
#[derive(Default)]
pub struct Validator {
    rules: Vec<Box<dyn Rule>>,
}

impl Validator {
    /// An empty validator that never raises alerts.
    pub fn new() -> Self {
        Self::default()
    }

    /// A validator carrying all built-in rules, configured by `config`.
    pub fn with_builtin_rules(config: &ValidationConfig) -> Self {
        let mut v = Self::new();
        v.add_rule(Box::new(EstopMotionRule {
            threshold: config.motion_threshold,
        }));
        v.add_rule(Box::new(EstopConfirmationRule));
        v.add_rule(Box::new(RemoteWithoutTeleopRule));
        v.add_rule(Box::new(StaleTelemetryRule {
            max_age: saturating_duration(config.stale_after_secs),
        }));
        v
    }

    /// Register a rule.  Alerts come out in registration order.
    pub fn add_rule(&mut self, rule: Box<dyn Rule>) {
        self.rules.push(rule);
    }

    /// Evaluate every rule and collect the raised alerts.
    pub fn evaluate(&self, view: &VehicleView<'_>) -> Vec<Alert> {
        self.rules
            .iter()
            .filter_map(|r| {
                let alert = r.evaluate(view)?;
                trace!(rule = r.name(), level = ?alert.level, "alert raised");
                Some(alert)
            })
            .collect()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Built-in rules
// ────────────────────────────────────────────────────────────────────────────

/// E-stop confirmed by the vehicle while the final twist is still non-zero.
pub struct EstopMotionRule {
    pub threshold: f64,
}

impl Rule for EstopMotionRule {
    fn name(&self) -> &str {
        "estop_motion"
    }

    fn evaluate(&self, view: &VehicleView<'_>) -> Option<Alert> {
        let moving = view.twist.final_lx.abs() > self.threshold
            || view.twist.final_az.abs() > self.threshold;
        (view.estop.is_estop && moving)
            .then(|| Alert::error("E-STOP active but vehicle is moving!"))
    }
}

/// Locally requested e-stop not yet echoed back by the vehicle.
pub struct EstopConfirmationRule;

impl Rule for EstopConfirmationRule {
    fn name(&self) -> &str {
        "estop_confirmation"
    }

    fn evaluate(&self, view: &VehicleView<'_>) -> Option<Alert> {
        (view.control.estop && !view.estop.is_estop)
            .then(|| Alert::warn("E-stop sent, waiting for vehicle confirmation"))
    }
}

pub struct RemoteWithoutTeleopRule;

impl Rule for RemoteWithoutTeleopRule {
    fn name(&self) -> &str {
        "remote_without_teleop"
    }

    fn evaluate(&self, view: &VehicleView<'_>) -> Option<Alert> {
        let mux = view.mux;
        (mux.requested_mode == DriveMode::Remote && mux.remote_enabled && !mux.teleop_active)
            .then(|| Alert::warn("Remote mode active but no teleop commands received"))
    }
}

/// No vehicle data for longer than `max_age`.  Silent until the first
/// receipt.
pub struct StaleTelemetryRule {
    pub max_age: Duration,
}

impl Rule for StaleTelemetryRule {
    fn name(&self) -> &str {
        "stale_telemetry"
    }

    fn evaluate(&self, view: &VehicleView<'_>) -> Option<Alert> {
        let age = view.vehicle_age?;
        (age > self.max_age)
            .then(|| Alert::error(format!("No vehicle data for {:.1}s", age.as_secs_f64())))
    }
}
