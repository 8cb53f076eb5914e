//! Vehicle link – outbound command primitives over a codec and transport.
//!
//! Each command kind keeps its own [`SequenceCounter`].  Encode and
//! transmit failures are logged and swallowed: a dead link must never take
//! the control loop down with it.

use std::sync::Arc;

use gcs_types::GcsError;
use tracing::{info, warn};

use crate::codec::{OutboundCommand, SequenceCounter, WireCodec};
use crate::inbound::InboundRouter;
use crate::transport::{ReceiveCallback, Transport};

/// The four outbound primitives.  Implemented by [`VehicleLink`] and by
/// recording doubles in tests.
pub trait CommandLink: Send + Sync {
    fn send_heartbeat(&self);
    fn send_teleop(&self, linear_x: f64, angular_z: f64);
    fn send_estop(&self, active: bool);
    fn send_cmd_mode(&self, mode: i8);
}

#[derive(Debug, Default)]
struct Sequences {
    heartbeat: SequenceCounter,
    teleop: SequenceCounter,
    estop: SequenceCounter,
    cmd_mode: SequenceCounter,
}

pub struct VehicleLink {
    codec: Arc<dyn WireCodec>,
    transport: Box<dyn Transport>,
    seq: Sequences,
}

impl VehicleLink {
    pub fn new(codec: Arc<dyn WireCodec>, transport: Box<dyn Transport>) -> Self {
        Self {
            codec,
            transport,
            seq: Sequences::default(),
        }
    }

    /// Build the receive callback that decodes with `codec` and hands the
    /// frame to `router`.  Pass it to the transport constructor.
    pub fn receive_callback(codec: Arc<dyn WireCodec>, router: InboundRouter) -> ReceiveCallback {
        Arc::new(move |key, bytes| {
            if let Some(frame) = codec.decode(key, bytes) {
                router.dispatch(frame);
            }
        })
    }

    pub fn codec_name(&self) -> &'static str {
        self.codec.name()
    }

    /// Release the transport.  Idempotent.
    pub fn close(&self) {
        self.transport.close();
    }

    fn transmit(&self, command: OutboundCommand, seq: u16) {
        if let Err(e) = self.try_transmit(&command, seq) {
            warn!(
                tag = %command.tag(),
                transport = self.transport.name(),
                error = %e,
                "outbound send failed"
            );
        }
    }

    fn try_transmit(&self, command: &OutboundCommand, seq: u16) -> Result<(), GcsError> {
        let encoded = self.codec.encode(command, seq)?;
        self.transport.send(&encoded.key, &encoded.bytes)
    }
}

impl CommandLink for VehicleLink {
    fn send_heartbeat(&self) {
        let ts = chrono::Utc::now().timestamp_micros() as f64 / 1e6;
        self.transmit(OutboundCommand::Heartbeat { ts }, self.seq.heartbeat.next());
    }

    fn send_teleop(&self, linear_x: f64, angular_z: f64) {
        self.transmit(
            OutboundCommand::Teleop {
                linear_x,
                angular_z,
            },
            self.seq.teleop.next(),
        );
    }

    fn send_estop(&self, active: bool) {
        info!(active, "e-stop command sent");
        self.transmit(OutboundCommand::Estop { active }, self.seq.estop.next());
    }

    fn send_cmd_mode(&self, mode: i8) {
        info!(mode, "mode command sent");
        self.transmit(OutboundCommand::CmdMode { mode }, self.seq.cmd_mode.next());
    }
}
