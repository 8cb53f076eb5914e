//! [`InputDriver`] – polls the operator device on its own thread.
//!
//! ```text
//!   Disconnected ──(device found, opened)──▶ Connected
//!        ▲                                       │
//!        └──────(pump error / count drops to 0)──┘
//! ```
//!
//! Every effect on shared state is a job posted through the
//! [`StoreHandle`]; the driver thread never touches the store.  The e-stop
//! toggle is posted too, so the flip reads the owner's current flag and the
//! transmit happens right after it, on the same context.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use gcs_kernel::StoreHandle;
use gcs_middleware::{CommandLink, join_with_timeout};
use gcs_types::{GcsError, saturating_duration};
use tracing::{error, info, warn};

use crate::backend::InputBackend;
use crate::config::JoystickConfig;
use crate::layout::{AxisLayout, ConfigIssue, resolve_layout};
use crate::normalize::apply_deadzone;

/// Longest single sleep while waiting; bounds shutdown latency.
const SLEEP_SLICE: Duration = Duration::from_millis(50);

/// What one [`InputDriver::tick`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// No device present, or opening it failed.
    NoDevice,
    Connected,
    Polled,
    Disconnected,
}

enum Link {
    Disconnected,
    Connected {
        layout: AxisLayout,
        estop_was_pressed: bool,
    },
}

pub struct InputDriver<B: InputBackend> {
    backend: B,
    config: JoystickConfig,
    store: StoreHandle,
    link: Arc<dyn CommandLink>,
    state: Link,
    last_broadcast: Option<Instant>,
    connections: u32,
    last_issues: Vec<ConfigIssue>,
}

impl<B: InputBackend> InputDriver<B> {
    pub fn new(backend: B, config: JoystickConfig, store: StoreHandle, link: Arc<dyn CommandLink>) -> Self {
        Self {
            backend,
            config,
            store,
            link,
            state: Link::Disconnected,
            last_broadcast: None,
            connections: 0,
            last_issues: Vec::new(),
        }
    }

    pub fn is_connected(&self) -> bool {
        matches!(self.state, Link::Connected { .. })
    }

    /// Number of connection events so far.
    pub fn connections(&self) -> u32 {
        self.connections
    }

    /// Issues found when the current (or last) device was connected.
    pub fn last_issues(&self) -> &[ConfigIssue] {
        &self.last_issues
    }

    pub fn layout(&self) -> Option<&AxisLayout> {
        match &self.state {
            Link::Connected { layout, .. } => Some(layout),
            Link::Disconnected => None,
        }
    }

    /// Run one poll step at `now`.
    pub fn tick(&mut self, now: Instant) -> TickOutcome {
        let outcome = match self.state {
            Link::Disconnected => self.try_connect(),
            Link::Connected { .. } => self.poll(),
        };
        self.maybe_broadcast(now);
        outcome
    }

    fn try_connect(&mut self) -> TickOutcome {
        if self.backend.device_count() == 0 {
            return TickOutcome::NoDevice;
        }
        let info = match self.backend.open(0) {
            Ok(info) => info,
            Err(e) => {
                warn!(error = %e, "failed to open joystick");
                return TickOutcome::NoDevice;
            }
        };
        info!(
            name = %info.name,
            axes = info.num_axes,
            buttons = info.num_buttons,
            "joystick connected"
        );

        let (layout, issues) = resolve_layout(&self.config, &info);
        for issue in &issues {
            issue.log();
        }
        self.last_issues = issues;
        self.connections += 1;
        self.state = Link::Connected {
            layout,
            estop_was_pressed: false,
        };
        self.store.post(|s| s.control.joystick_connected = true);
        TickOutcome::Connected
    }

    fn poll(&mut self) -> TickOutcome {
        if let Err(e) = self.backend.pump() {
            warn!(error = %e, "joystick disconnected");
            return self.disconnect();
        }
        if self.backend.device_count() == 0 {
            warn!("joystick disconnected");
            return self.disconnect();
        }

        let Link::Connected {
            layout,
            estop_was_pressed,
        } = &mut self.state
        else {
            return TickOutcome::NoDevice;
        };
        let cfg = &self.config;
        let backend = &self.backend;

        let mut speed = apply_deadzone(backend.axis(layout.speed), cfg.deadzone);
        if cfg.invert_speed {
            speed = -speed;
        }
        let linear_x = speed * cfg.max_speed;
        let steer = apply_deadzone(backend.axis(layout.steer), cfg.deadzone);
        let angular_z = -steer * cfg.max_steer_rad();
        let raw_speed = layout.raw_speed.map_or(0.0, |i| backend.axis(i));
        let raw_steer = layout.raw_steer.map_or(0.0, |i| backend.axis(i));

        self.store.post(move |s| {
            s.control.linear_x = linear_x;
            s.control.angular_z = angular_z;
            s.control.raw_speed = raw_speed;
            s.control.raw_steer = raw_steer;
        });

        if let Some(button) = layout.estop_button {
            let pressed = backend.button(button);
            if pressed && !*estop_was_pressed {
                let link = Arc::clone(&self.link);
                self.store.post(move |s| {
                    let active = !s.control.estop;
                    s.control.estop = active;
                    link.send_estop(active);
                    info!(active, "joystick e-stop toggled");
                    s.validate();
                    s.broadcast();
                });
            }
            *estop_was_pressed = pressed;
        }
        TickOutcome::Polled
    }

    fn disconnect(&mut self) -> TickOutcome {
        self.state = Link::Disconnected;
        self.backend.close();
        self.store.post(|s| s.control.reset_outputs());
        self.store.request_broadcast();
        TickOutcome::Disconnected
    }

    fn maybe_broadcast(&mut self, now: Instant) {
        let hz = self.config.broadcast_rate_hz;
        if hz.is_nan() || hz <= 0.0 {
            return;
        }
        let period = saturating_duration(1.0 / hz);
        let due = self
            .last_broadcast
            .is_none_or(|last| now.saturating_duration_since(last) >= period);
        if due {
            self.store.request_broadcast();
            self.last_broadcast = Some(now);
        }
    }

    fn pause_after(&self, outcome: TickOutcome) -> Duration {
        match outcome {
            TickOutcome::NoDevice | TickOutcome::Disconnected => {
                saturating_duration(self.config.reconnect_interval_secs)
            }
            TickOutcome::Connected | TickOutcome::Polled => {
                saturating_duration(1.0 / self.config.poll_rate_hz.max(1.0))
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Worker thread
// ────────────────────────────────────────────────────────────────────────────

/// Handle to a running driver thread.
pub struct InputHandle {
    running: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

/// Start the driver on a dedicated thread.
///
/// `factory` runs on that thread, so backends that are not `Send` work.
/// If it fails the thread logs the error and exits; the rest of the
/// station keeps running without operator input.
pub fn spawn<B, F>(
    factory: F,
    config: JoystickConfig,
    store: StoreHandle,
    link: Arc<dyn CommandLink>,
) -> Result<InputHandle, GcsError>
where
    B: InputBackend,
    F: FnOnce() -> Result<B, GcsError> + Send + 'static,
{
    let running = Arc::new(AtomicBool::new(true));
    let flag = Arc::clone(&running);
    let thread = std::thread::Builder::new()
        .name("gcs-input".to_string())
        .spawn(move || {
            let backend = match factory() {
                Ok(b) => b,
                Err(e) => {
                    error!(error = %e, "input backend unavailable, joystick disabled");
                    return;
                }
            };
            let mut driver = InputDriver::new(backend, config, store, link);
            while flag.load(Ordering::Acquire) {
                let outcome = driver.tick(Instant::now());
                sleep_while_running(&flag, driver.pause_after(outcome));
            }
            if driver.is_connected() {
                driver.disconnect();
            }
            info!("input driver stopped");
        })?;
    Ok(InputHandle {
        running,
        thread: Some(thread),
    })
}

fn sleep_while_running(running: &AtomicBool, total: Duration) {
    let started = Instant::now();
    while running.load(Ordering::Acquire) {
        let elapsed = started.elapsed();
        if elapsed >= total {
            break;
        }
        std::thread::sleep((total - elapsed).min(SLEEP_SLICE));
    }
}

impl InputHandle {
    /// Clear the running flag and join with a bounded wait.  Idempotent.
    pub fn stop(&mut self, timeout: Duration) {
        self.running.store(false, Ordering::Release);
        if let Some(thread) = self.thread.take()
            && !join_with_timeout(thread, timeout)
        {
            warn!("input driver did not stop in time");
        }
    }
}

impl Drop for InputHandle {
    fn drop(&mut self) {
        self.stop(Duration::from_secs(2));
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::backend::DeviceInfo;
    use crate::layout::IssueLevel;
    use gcs_kernel::{LocalStore, SharedState, job_queue};

    #[derive(Default)]
    struct ScriptedBackend {
        devices: usize,
        num_axes: usize,
        num_buttons: usize,
        axes: Vec<f64>,
        buttons: Vec<bool>,
        fail_pump: bool,
    }

    impl ScriptedBackend {
        fn pad(num_axes: usize, num_buttons: usize) -> Self {
            Self {
                devices: 1,
                num_axes,
                num_buttons,
                axes: vec![0.0; num_axes],
                buttons: vec![false; num_buttons],
                fail_pump: false,
            }
        }
    }

    impl InputBackend for ScriptedBackend {
        fn device_count(&mut self) -> usize {
            self.devices
        }

        fn open(&mut self, _index: usize) -> Result<DeviceInfo, GcsError> {
            Ok(DeviceInfo {
                name: "scripted".to_string(),
                num_axes: self.num_axes,
                num_buttons: self.num_buttons,
            })
        }

        fn pump(&mut self) -> Result<(), GcsError> {
            if self.fail_pump {
                Err(GcsError::Device("unplugged".to_string()))
            } else {
                Ok(())
            }
        }

        fn axis(&self, index: usize) -> f64 {
            self.axes.get(index).copied().unwrap_or(0.0)
        }

        fn button(&self, index: usize) -> bool {
            self.buttons.get(index).copied().unwrap_or(false)
        }
    }

    #[derive(Default)]
    struct RecordingLink {
        estops: Mutex<Vec<bool>>,
    }

    impl CommandLink for RecordingLink {
        fn send_heartbeat(&self) {}
        fn send_teleop(&self, _linear_x: f64, _angular_z: f64) {}
        fn send_estop(&self, active: bool) {
            self.estops.lock().unwrap().push(active);
        }
        fn send_cmd_mode(&self, _mode: i8) {}
    }

    fn rig(
        backend: ScriptedBackend,
        config: JoystickConfig,
    ) -> (InputDriver<ScriptedBackend>, LocalStore, Arc<RecordingLink>) {
        let (handle, inbox) = job_queue();
        let link = Arc::new(RecordingLink::default());
        let driver = InputDriver::new(backend, config, handle, link.clone());
        let store = LocalStore {
            state: SharedState::default(),
            inbox,
        };
        (driver, store, link)
    }

    #[test]
    fn connects_then_writes_scaled_axes() {
        let (mut driver, mut store, _) = rig(ScriptedBackend::pad(6, 12), JoystickConfig::default());
        let t = Instant::now();
        assert_eq!(driver.tick(t), TickOutcome::Connected);
        store.drain();
        assert!(store.state.control.joystick_connected);

        driver.backend_mut().axes[1] = 1.0;
        driver.backend_mut().axes[3] = -1.0;
        driver.backend_mut().axes[4] = 0.3;
        assert_eq!(driver.tick(t), TickOutcome::Polled);
        store.drain();

        let ctrl = &store.state.control;
        assert!((ctrl.linear_x + 1.0).abs() < 1e-9, "speed is inverted by default");
        assert!((ctrl.angular_z - 27.0_f64.to_radians()).abs() < 1e-9);
        assert!((ctrl.raw_speed - 0.3).abs() < 1e-9);
    }

    #[test]
    fn clamp_is_reported_once_per_connection() {
        let cfg = JoystickConfig {
            axis_speed: 7,
            ..Default::default()
        };
        let (mut driver, mut store, _) = rig(ScriptedBackend::pad(4, 12), cfg);
        let t = Instant::now();

        driver.tick(t);
        assert_eq!(driver.layout().map(|l| l.speed), Some(0));
        let errors = |d: &InputDriver<ScriptedBackend>| {
            d.last_issues().iter().filter(|i| i.level == IssueLevel::Error).count()
        };
        assert_eq!(errors(&driver), 1);

        for _ in 0..5 {
            assert_eq!(driver.tick(t), TickOutcome::Polled);
        }
        assert_eq!(driver.connections(), 1);

        driver.backend_mut().fail_pump = true;
        assert_eq!(driver.tick(t), TickOutcome::Disconnected);
        driver.backend_mut().fail_pump = false;
        assert_eq!(driver.tick(t), TickOutcome::Connected);
        assert_eq!(driver.connections(), 2);
        assert_eq!(errors(&driver), 1);
        store.drain();
    }

    #[test]
    fn disconnect_zeroes_outputs() {
        let (mut driver, mut store, _) = rig(ScriptedBackend::pad(6, 12), JoystickConfig::default());
        let t = Instant::now();
        driver.tick(t);
        driver.backend_mut().axes[1] = -0.8;
        driver.tick(t);
        store.drain();
        assert!(store.state.control.linear_x > 0.0);

        driver.backend_mut().devices = 0;
        assert_eq!(driver.tick(t), TickOutcome::Disconnected);
        store.drain();
        let ctrl = &store.state.control;
        assert_eq!(ctrl.linear_x, 0.0);
        assert_eq!(ctrl.angular_z, 0.0);
        assert!(!ctrl.joystick_connected);
        assert_eq!(driver.tick(t), TickOutcome::NoDevice);
    }

    #[test]
    fn estop_toggles_on_rising_edge_only() {
        let (mut driver, mut store, link) = rig(ScriptedBackend::pad(6, 12), JoystickConfig::default());
        let t = Instant::now();
        driver.tick(t);

        driver.backend_mut().buttons[4] = true;
        driver.tick(t);
        driver.tick(t);
        store.drain();
        assert!(store.state.control.estop);

        driver.backend_mut().buttons[4] = false;
        driver.tick(t);
        driver.backend_mut().buttons[4] = true;
        driver.tick(t);
        store.drain();
        assert!(!store.state.control.estop);
        assert_eq!(*link.estops.lock().unwrap(), vec![true, false]);
    }

    #[test]
    fn estop_toggle_raises_confirmation_alert_immediately() {
        let (mut driver, mut store, _) = rig(ScriptedBackend::pad(6, 12), JoystickConfig::default());
        let (_id, mut rx) = driver.store.subscribe(8);
        let t = Instant::now();
        driver.tick(t);
        store.drain();
        while rx.try_recv().is_ok() {}

        driver.backend_mut().buttons[4] = true;
        driver.tick(t);
        store.drain();

        let alerts = store.state.alerts();
        assert_eq!(alerts.len(), 1);
        assert!(alerts[0].message.contains("waiting for vehicle confirmation"));
        let mut last = None;
        while let Ok(snapshot) = rx.try_recv() {
            last = Some(snapshot);
        }
        let last = last.expect("toggle broadcasts");
        assert!(last.contains("waiting for vehicle confirmation"));
    }

    #[test]
    fn extreme_rates_do_not_panic() {
        let cfg = JoystickConfig {
            broadcast_rate_hz: 1e-310,
            reconnect_interval_secs: f64::INFINITY,
            poll_rate_hz: f64::NAN,
            ..Default::default()
        };
        let (mut driver, mut store, _) = rig(ScriptedBackend::default(), cfg);
        let t = Instant::now();
        assert_eq!(driver.tick(t), TickOutcome::NoDevice);
        assert_eq!(driver.pause_after(TickOutcome::NoDevice), Duration::MAX);
        assert_eq!(driver.pause_after(TickOutcome::Polled), Duration::from_secs(1));
        driver.tick(t + Duration::from_secs(3600));
        store.drain();
    }

    #[test]
    fn unbounded_reconnect_wait_still_stops_promptly() {
        let (handle, _inbox) = job_queue();
        let link: Arc<dyn CommandLink> = Arc::new(RecordingLink::default());
        let cfg = JoystickConfig {
            reconnect_interval_secs: f64::INFINITY,
            ..Default::default()
        };
        let mut input = spawn(|| Ok(ScriptedBackend::default()), cfg, handle, link).unwrap();
        std::thread::sleep(Duration::from_millis(20));
        let started = Instant::now();
        input.stop(Duration::from_secs(2));
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn estop_button_out_of_range_is_ignored() {
        let (mut driver, mut store, link) = rig(ScriptedBackend::pad(6, 3), JoystickConfig::default());
        let t = Instant::now();
        driver.tick(t);
        driver.tick(t);
        store.drain();
        assert!(!store.state.control.estop);
        assert!(link.estops.lock().unwrap().is_empty());
    }

    #[test]
    fn broadcasts_are_throttled() {
        let (mut driver, mut store, _) = rig(ScriptedBackend::default(), JoystickConfig::default());
        let (_id, mut rx) = driver.store.subscribe(64);
        let t = Instant::now();
        driver.tick(t);
        driver.tick(t + Duration::from_millis(10));
        driver.tick(t + Duration::from_millis(60));
        store.drain();
        let mut received = 0;
        while rx.try_recv().is_ok() {
            received += 1;
        }
        assert_eq!(received, 2);
    }

    #[test]
    fn spawned_driver_stops_promptly() {
        let (handle, _inbox) = job_queue();
        let link: Arc<dyn CommandLink> = Arc::new(RecordingLink::default());
        let mut input = spawn(
            || Ok(ScriptedBackend::default()),
            JoystickConfig::default(),
            handle,
            link,
        )
        .unwrap();
        let started = Instant::now();
        input.stop(Duration::from_secs(2));
        assert!(started.elapsed() < Duration::from_secs(1));
        input.stop(Duration::from_secs(2));
    }
}
