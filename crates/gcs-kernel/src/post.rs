//! Post queue – the only way into the store from another context.
//!
//! [`StoreHandle`] is a cheap, cloneable, thread-safe sender of boxed
//! closures.  Posting never blocks, so it is safe from the UDP reader
//! thread, the MQTT event-loop thread and the input-driver thread alike.
//! The owning task drains the matching [`StoreInbox`] and runs every job
//! against `&mut SharedState` in arrival order.
//!
//! Ordering is FIFO per poster; jobs from different posters interleave.

use gcs_types::{FieldMap, GcsError};
use tokio::sync::{mpsc, oneshot};
use tracing::trace;

use crate::fanout::{SinkId, SinkReceiver, sink_channel};
use crate::state::{Collection, SharedState, SubStruct};

/// A unit of work executed on the store's owning context.
pub type Job = Box<dyn FnOnce(&mut SharedState) + Send + 'static>;

/// Create a connected handle / inbox pair.
pub fn job_queue() -> (StoreHandle, StoreInbox) {
    let (tx, rx) = mpsc::unbounded_channel();
    (StoreHandle { tx }, StoreInbox { rx })
}

/// Fire-and-forget sender of store jobs.
#[derive(Clone)]
pub struct StoreHandle {
    tx: mpsc::UnboundedSender<Job>,
}

impl StoreHandle {
    /// Queue `job` for the owning context.
    ///
    /// Returns `false` when the owner has shut down; the job is discarded.
    pub fn post<F>(&self, job: F) -> bool
    where
        F: FnOnce(&mut SharedState) + Send + 'static,
    {
        let accepted = self.tx.send(Box::new(job)).is_ok();
        if !accepted {
            trace!("store inbox closed, job discarded");
        }
        accepted
    }

    pub fn apply_update(&self, key: SubStruct, fields: FieldMap) -> bool {
        self.post(move |s| s.apply_update(key, &fields))
    }

    pub fn apply_indexed_update(&self, collection: Collection, index: usize, fields: FieldMap) -> bool {
        self.post(move |s| s.apply_indexed_update(collection, index, &fields))
    }

    pub fn set_remote_enabled(&self, enabled: bool) -> bool {
        self.post(move |s| s.set_remote_enabled(enabled))
    }

    /// Refresh `last_received` without merging anything.
    pub fn touch(&self) -> bool {
        self.post(|s| s.touch())
    }

    pub fn request_broadcast(&self) -> bool {
        self.post(|s| s.broadcast())
    }

    /// Validate and broadcast.
    pub fn revalidate(&self) -> bool {
        self.post(|s| {
            s.validate();
            s.broadcast();
        })
    }

    /// Run `f` on the owning context and return its result.
    pub async fn query<R, F>(&self, f: F) -> Result<R, GcsError>
    where
        R: Send + 'static,
        F: FnOnce(&SharedState) -> R + Send + 'static,
    {
        let (reply_tx, reply_rx) = oneshot::channel();
        let posted = self.post(move |s| {
            let _ = reply_tx.send(f(s));
        });
        if !posted {
            return Err(GcsError::Channel("state store is not running".to_string()));
        }
        reply_rx
            .await
            .map_err(|_| GcsError::Channel("state store dropped the query".to_string()))
    }

    /// Serialised snapshot, produced on the owning context.
    pub async fn snapshot(&self) -> Result<String, GcsError> {
        self.query(|s| s.snapshot()).await?
    }

    /// Register a bounded sink.  The receiver sees every broadcast that runs
    /// after the registration job.
    pub fn subscribe(&self, capacity: usize) -> (SinkId, SinkReceiver) {
        let id = SinkId::new();
        let (tx, rx) = sink_channel(capacity);
        self.post(move |s| s.add_subscriber(id, tx));
        (id, rx)
    }

    pub fn unsubscribe(&self, id: SinkId) -> bool {
        self.post(move |s| {
            s.remove_subscriber(id);
        })
    }

    /// `true` once the inbox has been closed or dropped.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Receiving half, held by the store's owner.
pub struct StoreInbox {
    rx: mpsc::UnboundedReceiver<Job>,
}

impl StoreInbox {
    pub async fn recv(&mut self) -> Option<Job> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<Job> {
        self.rx.try_recv().ok()
    }

    /// Refuse further posts.  Jobs already queued can still be drained.
    pub fn close(&mut self) {
        self.rx.close();
    }
}

/// Convenience wrapper pairing a store with its inbox, for tests and
/// single-task embeddings.
pub struct LocalStore {
    pub state: SharedState,
    pub inbox: StoreInbox,
}

impl LocalStore {
    /// Run every queued job.  Returns how many ran.
    pub fn drain(&mut self) -> usize {
        let mut ran = 0;
        while let Some(job) = self.inbox.try_recv() {
            job(&mut self.state);
            ran += 1;
        }
        ran
    }
}
