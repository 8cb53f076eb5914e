//! [`Station`] – the single task that owns the state store.
//!
//! Every mutation of [`SharedState`] happens inside [`Station::run`]: posted
//! jobs from the link, the input driver and the cockpit are executed in
//! arrival order, interleaved with [`Dispatcher`] ticks.  Nothing else holds
//! the state, so no field needs a lock.
//!
//! Shutdown is cooperative.  [`StationHandle::shutdown`] clears the running
//! flag and wakes the loop; the loop then closes its inbox, runs whatever
//! was already queued, and returns the final state.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use gcs_kernel::{SharedState, StoreHandle, StoreInbox, job_queue};
use tokio::sync::Notify;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::dispatcher::Dispatcher;

pub struct Station {
    state: SharedState,
    inbox: StoreInbox,
    dispatcher: Dispatcher,
    tick: Duration,
    running: Arc<AtomicBool>,
    wake: Arc<Notify>,
}

/// Cloneable control surface for a running [`Station`].
#[derive(Clone)]
pub struct StationHandle {
    store: StoreHandle,
    running: Arc<AtomicBool>,
    wake: Arc<Notify>,
}

impl Station {
    /// Build a station around `state`.  The returned handle's store is the
    /// only way to reach the state once [`run`](Self::run) starts.
    pub fn new(state: SharedState, dispatcher: Dispatcher, tick: Duration) -> (Self, StationHandle) {
        let (store, inbox) = job_queue();
        Self::with_queue(state, store, inbox, dispatcher, tick)
    }

    /// Like [`new`](Self::new) for a queue created earlier, so components
    /// that post to the store can be wired before the station exists.
    pub fn with_queue(
        state: SharedState,
        store: StoreHandle,
        inbox: StoreInbox,
        dispatcher: Dispatcher,
        tick: Duration,
    ) -> (Self, StationHandle) {
        let running = Arc::new(AtomicBool::new(true));
        let wake = Arc::new(Notify::new());
        let station = Self {
            state,
            inbox,
            dispatcher,
            tick: tick.max(Duration::from_millis(1)),
            running: Arc::clone(&running),
            wake: Arc::clone(&wake),
        };
        let handle = StationHandle {
            store,
            running,
            wake,
        };
        (station, handle)
    }

    /// Drive the store until shutdown.  Returns the final state.
    pub async fn run(mut self) -> SharedState {
        let mut ticker = tokio::time::interval(self.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!(tick_ms = self.tick.as_millis() as u64, "station running");

        while self.running.load(Ordering::Acquire) {
            tokio::select! {
                job = self.inbox.recv() => match job {
                    Some(job) => job(&mut self.state),
                    None => break,
                },
                _ = ticker.tick() => {
                    self.dispatcher.tick(Instant::now(), &mut self.state);
                }
                _ = self.wake.notified() => {}
            }
        }

        self.inbox.close();
        let mut drained = 0usize;
        while let Some(job) = self.inbox.try_recv() {
            job(&mut self.state);
            drained += 1;
        }
        debug!(drained, "queued jobs completed");
        info!("station stopped");
        self.state
    }
}

impl StationHandle {
    pub fn store(&self) -> StoreHandle {
        self.store.clone()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Ask the loop to stop.  Idempotent.
    pub fn shutdown(&self) {
        if self.running.swap(false, Ordering::AcqRel) {
            info!("station shutdown requested");
        }
        self.wake.notify_one();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatcher::DispatchConfig;
    use crate::dispatcher::testing::{RecordingLink, Sent};
    use gcs_kernel::SubStruct;
    use gcs_types::{DriveMode, FieldValue, field_map};

    fn station(config: &DispatchConfig) -> (Station, StationHandle, Arc<RecordingLink>) {
        let link = Arc::new(RecordingLink::default());
        let dispatcher = Dispatcher::new(config, link.clone());
        let (station, handle) = Station::new(SharedState::default(), dispatcher, config.tick_interval());
        (station, handle, link)
    }

    #[tokio::test]
    async fn posted_jobs_run_on_the_owner() {
        let (station, handle, _link) = station(&DispatchConfig::default());
        let task = tokio::spawn(station.run());

        let store = handle.store();
        store.apply_update(
            SubStruct::Twist,
            field_map([("final_lx", FieldValue::Float(0.25))]),
        );
        let lx = store.query(|s| s.twist.final_lx).await.unwrap();
        assert!((lx - 0.25).abs() < 1e-9);

        handle.shutdown();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn dispatcher_ticks_while_idle() {
        let (station, handle, link) = station(&DispatchConfig::default());
        let task = tokio::spawn(station.run());
        tokio::time::sleep(Duration::from_millis(60)).await;
        handle.shutdown();
        task.await.unwrap();
        assert!(link.count(|s| *s == Sent::Heartbeat) >= 1);
    }

    #[tokio::test]
    async fn queued_jobs_complete_after_shutdown() {
        let config = DispatchConfig {
            heartbeat_rate: 0.0,
            teleop_rate: 0.0,
            state_push_interval: 0.0,
            ..Default::default()
        };
        let (station, handle, _link) = station(&config);
        let store = handle.store();

        handle.shutdown();
        store.post(|s| s.control.mode = DriveMode::Remote);

        let state = station.run().await;
        assert_eq!(state.control.mode, DriveMode::Remote);
        assert!(!store.post(|_| {}));
    }

    #[tokio::test]
    async fn shutdown_is_idempotent() {
        let (station, handle, _link) = station(&DispatchConfig::default());
        let task = tokio::spawn(station.run());
        handle.shutdown();
        handle.shutdown();
        assert!(!handle.is_running());
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .unwrap()
            .unwrap();
    }
}
