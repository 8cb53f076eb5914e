//! Transports – raw byte carriage to and from the vehicle.
//!
//! | Transport | Receive context | Key semantics |
//! |---|---|---|
//! | [`UdpTransport`] | dedicated reader thread | ignored (tag is in the frame) |
//! | [`MqttTransport`] | `rumqttc` event-loop task | topic |
//!
//! Received bytes go to a [`ReceiveCallback`].  The callback runs on the
//! receiving context, so it must only decode and post; it never mutates
//! shared state directly.

pub mod mqtt;
pub mod udp;

use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use gcs_types::GcsError;

pub use mqtt::{MqttSettings, MqttTransport};
pub use udp::UdpTransport;

/// Invoked with `(key, payload)` for every received message.
pub type ReceiveCallback = Arc<dyn Fn(&str, &[u8]) + Send + Sync>;

pub trait Transport: Send + Sync {
    fn name(&self) -> &'static str;

    /// Transmit one encoded message.
    fn send(&self, key: &str, bytes: &[u8]) -> Result<(), GcsError>;

    /// Stop receiving and release the underlying handles.  Calling it a
    /// second time is a no-op.
    fn close(&self);
}

/// Join `handle`, giving up after `timeout`.  Returns `true` when the
/// thread finished in time; otherwise it is left detached.
pub fn join_with_timeout(handle: JoinHandle<()>, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    while !handle.is_finished() {
        if Instant::now() >= deadline {
            return false;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    handle.join().is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_returns_for_finished_thread() {
        let h = std::thread::spawn(|| {});
        assert!(join_with_timeout(h, Duration::from_secs(1)));
    }

    #[test]
    fn join_gives_up_on_stuck_thread() {
        let (tx, rx) = std::sync::mpsc::channel::<()>();
        let h = std::thread::spawn(move || {
            let _ = rx.recv();
        });
        assert!(!join_with_timeout(h, Duration::from_millis(20)));
        drop(tx);
    }
}
