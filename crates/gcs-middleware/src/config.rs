//! `[link]` configuration and link construction.

use std::net::SocketAddr;
use std::sync::Arc;

use gcs_kernel::StoreHandle;
use gcs_types::GcsError;
use serde::{Deserialize, Serialize};

use crate::codec::{BinaryCodec, StructuredCodec, WireCodec};
use crate::inbound::InboundRouter;
use crate::link::VehicleLink;
use crate::transport::{MqttSettings, MqttTransport, Transport, UdpTransport};

/// Which transport, and with it which wire encoding, the link uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// Fixed binary frames over UDP.
    #[default]
    Udp,
    /// Structured JSON over MQTT topics.
    Mqtt,
}

impl std::str::FromStr for TransportKind {
    type Err = GcsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "udp" => Ok(Self::Udp),
            "mqtt" => Ok(Self::Mqtt),
            other => Err(GcsError::Config(format!("unknown transport {other:?}"))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkConfig {
    #[serde(default)]
    pub transport: TransportKind,
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    #[serde(default = "default_vehicle_addr")]
    pub vehicle_addr: String,
    #[serde(default = "default_mqtt_host")]
    pub mqtt_host: String,
    #[serde(default = "default_mqtt_port")]
    pub mqtt_port: u16,
    #[serde(default = "default_topic_prefix")]
    pub topic_prefix: String,
    #[serde(default = "default_client_id")]
    pub client_id: String,
}

fn default_bind_addr() -> String {
    "0.0.0.0:47000".to_string()
}
fn default_vehicle_addr() -> String {
    "127.0.0.1:47001".to_string()
}
fn default_mqtt_host() -> String {
    "localhost".to_string()
}
fn default_mqtt_port() -> u16 {
    1883
}
fn default_topic_prefix() -> String {
    "nev".to_string()
}
fn default_client_id() -> String {
    "nev-gcs".to_string()
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            transport: TransportKind::default(),
            bind_addr: default_bind_addr(),
            vehicle_addr: default_vehicle_addr(),
            mqtt_host: default_mqtt_host(),
            mqtt_port: default_mqtt_port(),
            topic_prefix: default_topic_prefix(),
            client_id: default_client_id(),
        }
    }
}

fn parse_addr(field: &str, value: &str) -> Result<SocketAddr, GcsError> {
    value
        .parse()
        .map_err(|e| GcsError::Config(format!("link.{field} {value:?}: {e}")))
}

/// Open the configured transport and wire its receive path to `store`.
///
/// The MQTT transport spawns its event loop, so this must run inside a
/// Tokio runtime.
pub fn open_link(config: &LinkConfig, store: StoreHandle) -> Result<VehicleLink, GcsError> {
    let router = InboundRouter::new(store);
    match config.transport {
        TransportKind::Udp => {
            let codec: Arc<dyn WireCodec> = Arc::new(BinaryCodec::new());
            let bind = parse_addr("bind_addr", &config.bind_addr)?;
            let peer = parse_addr("vehicle_addr", &config.vehicle_addr)?;
            let callback = VehicleLink::receive_callback(Arc::clone(&codec), router);
            let transport: Box<dyn Transport> = Box::new(UdpTransport::open(bind, peer, callback)?);
            Ok(VehicleLink::new(codec, transport))
        }
        TransportKind::Mqtt => {
            let structured = StructuredCodec::new(config.topic_prefix.clone());
            let topics = structured.inbound_keys();
            let codec: Arc<dyn WireCodec> = Arc::new(structured);
            let settings = MqttSettings {
                host: config.mqtt_host.clone(),
                port: config.mqtt_port,
                client_id: config.client_id.clone(),
                ..MqttSettings::default()
            };
            let callback = VehicleLink::receive_callback(Arc::clone(&codec), router);
            let transport: Box<dyn Transport> =
                Box::new(MqttTransport::connect(&settings, topics, callback));
            Ok(VehicleLink::new(codec, transport))
        }
    }
}
