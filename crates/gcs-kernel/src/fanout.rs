//! Broadcast fan-out – bounded per-consumer snapshot sinks.
//!
//! The store serialises a snapshot once per broadcast and hands the same
//! `Arc<str>` to every registered sink with a non-blocking `try_send`:
//!
//! * a **full** sink drops that update (no error, no backpressure);
//! * a **closed** sink (receiver dropped) is pruned from the registry.
//!
//! Consumers that need a steady stream wrap their receiver in a
//! [`SnapshotStream`], which falls back to a freshly requested snapshot when
//! nothing arrives within the keepalive window.

use std::sync::Arc;
use std::time::Duration;

use gcs_types::GcsError;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::debug;
use uuid::Uuid;

use crate::post::StoreHandle;

/// Receiving half of a snapshot sink.
pub type SinkReceiver = mpsc::Receiver<Arc<str>>;

/// Opaque identifier of a registered sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SinkId(Uuid);

impl SinkId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SinkId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SinkId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Create an unregistered sink pair.  A zero capacity is raised to one.
pub fn sink_channel(capacity: usize) -> (mpsc::Sender<Arc<str>>, SinkReceiver) {
    mpsc::channel(capacity.max(1))
}

/// Per-broadcast delivery counts.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryReport {
    pub delivered: usize,
    pub dropped: usize,
    pub pruned: usize,
}

/// Registry of snapshot sinks.
#[derive(Default)]
pub struct FanOut {
    sinks: Vec<(SinkId, mpsc::Sender<Arc<str>>)>,
}

impl FanOut {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `sender` under `id`.  Re-registering an id replaces it.
    pub fn insert(&mut self, id: SinkId, sender: mpsc::Sender<Arc<str>>) {
        self.remove(id);
        self.sinks.push((id, sender));
    }

    /// Returns `true` when a sink was removed.
    pub fn remove(&mut self, id: SinkId) -> bool {
        let before = self.sinks.len();
        self.sinks.retain(|(sid, _)| *sid != id);
        self.sinks.len() != before
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    /// Push `payload` to every sink without blocking.
    pub fn publish(&mut self, payload: &Arc<str>) -> DeliveryReport {
        let mut report = DeliveryReport::default();
        self.sinks.retain(|(id, tx)| match tx.try_send(Arc::clone(payload)) {
            Ok(()) => {
                report.delivered += 1;
                true
            }
            Err(TrySendError::Full(_)) => {
                report.dropped += 1;
                true
            }
            Err(TrySendError::Closed(_)) => {
                debug!(sink = %id, "pruning closed snapshot sink");
                report.pruned += 1;
                false
            }
        });
        report
    }
}

// ────────────────────────────────────────────────────────────────────────────
// SnapshotStream
// ────────────────────────────────────────────────────────────────────────────

/// Consumer-side helper yielding every broadcast, or a fresh snapshot after
/// `keepalive` of silence.
pub struct SnapshotStream {
    id: SinkId,
    rx: SinkReceiver,
    store: StoreHandle,
    keepalive: Duration,
}

impl SnapshotStream {
    /// Register a new sink with `store` and wrap it.
    pub fn subscribe(store: StoreHandle, capacity: usize, keepalive: Duration) -> Self {
        let (id, rx) = store.subscribe(capacity);
        Self {
            id,
            rx,
            store,
            keepalive,
        }
    }

    pub fn id(&self) -> SinkId {
        self.id
    }

    /// Wait for the next snapshot.
    ///
    /// Returns an error once the store's owning context has gone away.
    pub async fn next(&mut self) -> Result<Arc<str>, GcsError> {
        match tokio::time::timeout(self.keepalive, self.rx.recv()).await {
            Ok(Some(snapshot)) => Ok(snapshot),
            Ok(None) => Err(GcsError::Channel("snapshot sink closed".to_string())),
            Err(_) => self.store.snapshot().await.map(Arc::from),
        }
    }
}

impl Drop for SnapshotStream {
    fn drop(&mut self) {
        self.store.unsubscribe(self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(s: &str) -> Arc<str> {
        Arc::from(s)
    }

    #[tokio::test]
    async fn every_sink_receives_the_same_payload() {
        let mut fan = FanOut::new();
        let (tx_a, mut rx_a) = sink_channel(4);
        let (tx_b, mut rx_b) = sink_channel(4);
        fan.insert(SinkId::new(), tx_a);
        fan.insert(SinkId::new(), tx_b);

        let report = fan.publish(&payload("{}"));
        assert_eq!(report.delivered, 2);
        assert_eq!(&*rx_a.recv().await.unwrap(), "{}");
        assert_eq!(&*rx_b.recv().await.unwrap(), "{}");
    }

    #[tokio::test]
    async fn full_sink_drops_without_error() {
        let mut fan = FanOut::new();
        let (tx, mut rx) = sink_channel(1);
        fan.insert(SinkId::new(), tx);

        fan.publish(&payload("first"));
        let report = fan.publish(&payload("second"));
        assert_eq!(report.dropped, 1);
        assert_eq!(fan.len(), 1);
        assert_eq!(&*rx.recv().await.unwrap(), "first");
    }

    #[test]
    fn closed_sink_is_pruned() {
        let mut fan = FanOut::new();
        let (tx, rx) = sink_channel(1);
        fan.insert(SinkId::new(), tx);
        drop(rx);

        let report = fan.publish(&payload("x"));
        assert_eq!(report.pruned, 1);
        assert!(fan.is_empty());
    }

    #[test]
    fn remove_unregisters() {
        let mut fan = FanOut::new();
        let id = SinkId::new();
        let (tx, _rx) = sink_channel(1);
        fan.insert(id, tx);
        assert!(fan.remove(id));
        assert!(!fan.remove(id));
    }
}
