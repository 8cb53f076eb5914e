//! [`Dispatcher`] – timer-driven outbound traffic and state refresh.
//!
//! Three independent gates are checked on every tick of the owner loop:
//!
//! | Gate | Default | Effect |
//! |---|---|---|
//! | heartbeat | 5 Hz | [`CommandLink::send_heartbeat`] |
//! | teleop | 20 Hz | [`CommandLink::send_teleop`], only in remote mode without local e-stop |
//! | state push | 0.5 s | `validate()` + `broadcast()` |
//!
//! Gates compare a monotonic `now` against their last firing, so a slow
//! tick delays a send but never makes the cadence drift into a burst.

use std::sync::Arc;
use std::time::{Duration, Instant};

use gcs_kernel::SharedState;
use gcs_middleware::CommandLink;
use gcs_types::{DriveMode, saturating_duration};
use serde::{Deserialize, Serialize};
use tracing::trace;

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    #[serde(default = "default_heartbeat_rate")]
    pub heartbeat_rate: f64,
    #[serde(default = "default_teleop_rate")]
    pub teleop_rate: f64,
    /// Seconds between forced revalidate-and-broadcast passes.
    #[serde(default = "default_state_push_interval")]
    pub state_push_interval: f64,
    /// Granularity of the owner loop's timer check.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
}

fn default_heartbeat_rate() -> f64 {
    5.0
}

fn default_teleop_rate() -> f64 {
    20.0
}

fn default_state_push_interval() -> f64 {
    0.5
}

fn default_tick_interval_ms() -> u64 {
    10
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            heartbeat_rate: default_heartbeat_rate(),
            teleop_rate: default_teleop_rate(),
            state_push_interval: default_state_push_interval(),
            tick_interval_ms: default_tick_interval_ms(),
        }
    }
}

impl DispatchConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// RateGate
// ─────────────────────────────────────────────────────────────────────────────

/// Fires at most once per `period`.  A gate built from a non-positive rate
/// never fires.
#[derive(Debug, Clone)]
struct RateGate {
    period: Option<Duration>,
    last: Option<Instant>,
}

impl RateGate {
    fn from_rate(hz: f64) -> Self {
        Self::from_interval(if hz > 0.0 { 1.0 / hz } else { 0.0 })
    }

    fn from_interval(secs: f64) -> Self {
        let period = (secs.is_finite() && secs > 0.0).then(|| saturating_duration(secs));
        Self { period, last: None }
    }

    fn ready(&mut self, now: Instant) -> bool {
        let Some(period) = self.period else {
            return false;
        };
        let due = self
            .last
            .is_none_or(|last| now.saturating_duration_since(last) >= period);
        if due {
            self.last = Some(now);
        }
        due
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Dispatcher
// ─────────────────────────────────────────────────────────────────────────────

/// What one [`Dispatcher::tick`] did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    pub heartbeat: bool,
    /// The teleop gate fired.
    pub teleop_due: bool,
    /// A teleop command was actually transmitted.
    pub teleop_sent: bool,
    pub state_pushed: bool,
}

pub struct Dispatcher {
    link: Arc<dyn CommandLink>,
    heartbeat: RateGate,
    teleop: RateGate,
    push: RateGate,
}

impl Dispatcher {
    pub fn new(config: &DispatchConfig, link: Arc<dyn CommandLink>) -> Self {
        Self {
            link,
            heartbeat: RateGate::from_rate(config.heartbeat_rate),
            teleop: RateGate::from_rate(config.teleop_rate),
            push: RateGate::from_interval(config.state_push_interval),
        }
    }

    /// Check every gate against `now`.  Runs on the store's owning context.
    pub fn tick(&mut self, now: Instant, state: &mut SharedState) -> TickReport {
        let mut report = TickReport::default();

        if self.heartbeat.ready(now) {
            self.link.send_heartbeat();
            report.heartbeat = true;
        }

        if self.teleop.ready(now) {
            report.teleop_due = true;
            let control = &state.control;
            if control.mode == DriveMode::Remote && !control.estop {
                self.link.send_teleop(control.linear_x, control.angular_z);
                report.teleop_sent = true;
            } else {
                trace!(mode = ?control.mode, estop = control.estop, "teleop gated");
            }
        }

        if self.push.ready(now) {
            state.validate_at(now);
            state.broadcast();
            report.state_pushed = true;
        }

        report
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Mutex;

    use gcs_middleware::CommandLink;

    #[derive(Debug, Clone, PartialEq)]
    pub enum Sent {
        Heartbeat,
        Teleop(f64, f64),
        Estop(bool),
        CmdMode(i8),
    }

    /// Link double that records every command.
    #[derive(Default)]
    pub struct RecordingLink {
        pub sent: Mutex<Vec<Sent>>,
    }

    impl RecordingLink {
        pub fn count(&self, pred: impl Fn(&Sent) -> bool) -> usize {
            self.sent.lock().unwrap().iter().filter(|s| pred(s)).count()
        }
    }

    impl CommandLink for RecordingLink {
        fn send_heartbeat(&self) {
            self.sent.lock().unwrap().push(Sent::Heartbeat);
        }

        fn send_teleop(&self, linear_x: f64, angular_z: f64) {
            self.sent.lock().unwrap().push(Sent::Teleop(linear_x, angular_z));
        }

        fn send_estop(&self, active: bool) {
            self.sent.lock().unwrap().push(Sent::Estop(active));
        }

        fn send_cmd_mode(&self, mode: i8) {
            self.sent.lock().unwrap().push(Sent::CmdMode(mode));
        }
    }
}
