//! Pub/sub transport for the structured encoding, over MQTT.
//!
//! The `rumqttc` event loop runs on its own task.  It re-subscribes to the
//! inbound topics on every `ConnAck`, so a broker restart does not silently
//! end telemetry.  Outbound publishes use `try_publish` and never block the
//! caller.

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use gcs_types::GcsError;
use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{ReceiveCallback, Transport};

const REQUEST_CAPACITY: usize = 64;
const RETRY_DELAY: Duration = Duration::from_secs(2);

#[derive(Debug, Clone)]
pub struct MqttSettings {
    pub host: String,
    pub port: u16,
    pub client_id: String,
    pub keep_alive: Duration,
}

impl Default for MqttSettings {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 1883,
            client_id: "nev-gcs".to_string(),
            keep_alive: Duration::from_secs(15),
        }
    }
}

pub struct MqttTransport {
    client: AsyncClient,
    running: Arc<AtomicBool>,
    event_loop: Mutex<Option<JoinHandle<()>>>,
}

impl MqttTransport {
    /// Start the event loop and subscribe to `topics`.  Must be called from
    /// within a Tokio runtime.
    pub fn connect(settings: &MqttSettings, topics: Vec<String>, on_receive: ReceiveCallback) -> Self {
        let mut opts = MqttOptions::new(&settings.client_id, &settings.host, settings.port);
        opts.set_keep_alive(settings.keep_alive);
        let (client, mut eventloop) = AsyncClient::new(opts, REQUEST_CAPACITY);
        let running = Arc::new(AtomicBool::new(true));

        let task = {
            let client = client.clone();
            let running = Arc::clone(&running);
            tokio::spawn(async move {
                while running.load(Ordering::Acquire) {
                    match eventloop.poll().await {
                        Ok(Event::Incoming(Packet::ConnAck(_))) => {
                            info!(topics = topics.len(), "MQTT connected, subscribing");
                            for topic in &topics {
                                if let Err(e) = client.try_subscribe(topic.as_str(), QoS::AtMostOnce) {
                                    warn!(%topic, error = %e, "MQTT subscribe failed");
                                }
                            }
                        }
                        Ok(Event::Incoming(Packet::Publish(p))) => on_receive(&p.topic, &p.payload),
                        Ok(_) => {}
                        Err(e) => {
                            if !running.load(Ordering::Acquire) {
                                break;
                            }
                            warn!(error = %e, "MQTT connection error");
                            tokio::time::sleep(RETRY_DELAY).await;
                        }
                    }
                }
                debug!("MQTT event loop stopped");
            })
        };

        info!(host = %settings.host, port = settings.port, "MQTT link starting");
        Self {
            client,
            running,
            event_loop: Mutex::new(Some(task)),
        }
    }
}

impl Transport for MqttTransport {
    fn name(&self) -> &'static str {
        "mqtt"
    }

    fn send(&self, key: &str, bytes: &[u8]) -> Result<(), GcsError> {
        self.client
            .try_publish(key, QoS::AtMostOnce, false, bytes.to_vec())
            .map_err(|e| GcsError::Transport(format!("MQTT publish to {key}: {e}")))
    }

    fn close(&self) {
        if !self.running.swap(false, Ordering::AcqRel) {
            return;
        }
        if let Err(e) = self.client.try_disconnect() {
            debug!(error = %e, "MQTT disconnect request not queued");
        }
        if let Some(task) = self.event_loop.lock().ok().and_then(|mut g| g.take()) {
            task.abort();
        }
        info!("MQTT link closed");
    }
}

impl Drop for MqttTransport {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn close_without_broker_is_idempotent() {
        let settings = MqttSettings {
            host: "127.0.0.1".to_string(),
            port: 1,
            ..Default::default()
        };
        let cb: ReceiveCallback = Arc::new(|_, _| {});
        let transport = MqttTransport::connect(&settings, vec!["nev/vehicle/mux".into()], cb);
        transport.close();
        transport.close();
    }

    #[tokio::test]
    async fn publish_is_queued_without_blocking() {
        let settings = MqttSettings {
            host: "127.0.0.1".to_string(),
            port: 1,
            ..Default::default()
        };
        let cb: ReceiveCallback = Arc::new(|_, _| {});
        let transport = MqttTransport::connect(&settings, Vec::new(), cb);
        assert!(transport.send("nev/gcs/heartbeat", b"{}").is_ok());
        transport.close();
    }
}
