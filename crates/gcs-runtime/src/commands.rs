//! [`OperatorCommands`] – the calls an operator surface makes into the core.
//!
//! Mode and e-stop changes are posted to the store's owner, which updates
//! the local control state and transmits the command in the same job.  A
//! mode outside `{-1, 0, 1, 2}` is rejected before anything is posted.

use std::sync::Arc;
use std::time::Duration;

use gcs_kernel::{SharedState, SnapshotStream, StoreHandle};
use gcs_middleware::CommandLink;
use gcs_types::{DriveMode, GcsError};
use tracing::{info, warn};

#[derive(Clone)]
pub struct OperatorCommands {
    store: StoreHandle,
    link: Arc<dyn CommandLink>,
}

impl OperatorCommands {
    pub fn new(store: StoreHandle, link: Arc<dyn CommandLink>) -> Self {
        Self { store, link }
    }

    /// Command a new operating mode.
    ///
    /// # Errors
    ///
    /// [`GcsError::InvalidMode`] for an unknown code, with no state change;
    /// [`GcsError::Channel`] when the station has stopped.
    pub fn set_commanded_mode(&self, mode: i64) -> Result<(), GcsError> {
        let Some(mode) = DriveMode::from_code(mode) else {
            warn!(mode, "rejected mode command");
            return Err(GcsError::InvalidMode(mode));
        };
        let link = Arc::clone(&self.link);
        self.post(move |s| {
            s.control.mode = mode;
            link.send_cmd_mode(mode.code());
            info!(?mode, "commanded mode changed");
            s.validate();
            s.broadcast();
        })
    }

    /// Set or clear the locally requested e-stop.
    pub fn set_estop(&self, active: bool) -> Result<(), GcsError> {
        let link = Arc::clone(&self.link);
        self.post(move |s| {
            s.control.estop = active;
            link.send_estop(active);
            info!(active, "e-stop set by operator");
            s.validate();
            s.broadcast();
        })
    }

    pub async fn snapshot(&self) -> Result<String, GcsError> {
        self.store.snapshot().await
    }

    /// Open a snapshot stream with its own bounded sink.
    pub fn subscribe(&self, capacity: usize, keepalive: Duration) -> SnapshotStream {
        SnapshotStream::subscribe(self.store.clone(), capacity, keepalive)
    }

    fn post<F>(&self, job: F) -> Result<(), GcsError>
    where
        F: FnOnce(&mut SharedState) + Send + 'static,
    {
        if self.store.post(job) {
            Ok(())
        } else {
            Err(GcsError::Channel("state store is not running".to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatcher::testing::{RecordingLink, Sent};
    use gcs_kernel::{LocalStore, job_queue};
    use gcs_types::AlertLevel;

    fn setup() -> (OperatorCommands, LocalStore, Arc<RecordingLink>) {
        let (handle, inbox) = job_queue();
        let link = Arc::new(RecordingLink::default());
        let commands = OperatorCommands::new(handle, link.clone());
        let store = LocalStore {
            state: SharedState::default(),
            inbox,
        };
        (commands, store, link)
    }

    #[test]
    fn valid_mode_is_applied_and_sent() {
        let (commands, mut store, link) = setup();
        commands.set_commanded_mode(2).unwrap();
        assert!(link.sent.lock().unwrap().is_empty());

        store.drain();
        assert_eq!(store.state.control.mode, DriveMode::Remote);
        assert_eq!(*link.sent.lock().unwrap(), vec![Sent::CmdMode(2)]);
    }

    #[test]
    fn invalid_mode_is_rejected_without_mutation() {
        let (commands, mut store, link) = setup();
        for bad in [3, -2, 100] {
            let err = commands.set_commanded_mode(bad).unwrap_err();
            assert!(matches!(err, GcsError::InvalidMode(m) if m == bad));
        }
        assert_eq!(store.drain(), 0);
        assert_eq!(store.state.control.mode, DriveMode::Idle);
        assert!(link.sent.lock().unwrap().is_empty());
    }

    #[test]
    fn estop_sets_flag_and_raises_confirmation_alert() {
        let (commands, mut store, link) = setup();
        commands.set_estop(true).unwrap();
        store.drain();

        assert!(store.state.control.estop);
        assert_eq!(*link.sent.lock().unwrap(), vec![Sent::Estop(true)]);
        let alerts = store.state.alerts();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].level, AlertLevel::Warn);
        assert!(alerts[0].message.contains("waiting for vehicle confirmation"));
    }

    #[test]
    fn commands_fail_once_store_is_gone() {
        let (commands, store, _link) = setup();
        drop(store);
        assert!(matches!(commands.set_estop(false), Err(GcsError::Channel(_))));
    }

    #[tokio::test]
    async fn stream_yields_broadcast_after_command() {
        let (commands, mut store, _link) = setup();
        let mut stream = commands.subscribe(4, Duration::from_secs(5));
        commands.set_commanded_mode(1).unwrap();
        store.drain();

        let snapshot = stream.next().await.unwrap();
        let value: serde_json::Value = serde_json::from_str(&snapshot).unwrap();
        assert_eq!(value["control"]["mode"], "nav");
    }
}
