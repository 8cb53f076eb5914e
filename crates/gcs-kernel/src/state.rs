//! [`SharedState`] – the single mutable source of truth.
//!
//! Exactly one task owns a `SharedState`; every other context reaches it
//! through a [`StoreHandle`](crate::post::StoreHandle).  There are no locks
//! on any field: exclusivity comes from ownership.
//!
//! Every inbound merge stamps `last_received` and then runs a validation
//! pass and a broadcast synchronously, so observers never see a snapshot
//! whose alert list lags behind its data.

use std::sync::Arc;
use std::time::Instant;

use gcs_types::{
    Alert, ControlState, DiskPartition, EStopStatus, FieldMap, FieldMerge, GcsError, GpuEntry,
    HunterStatus, MuxStatus, NetInterface, NetworkStatus, SystemResources, TwistValues,
};
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

use crate::collection::IndexedCollection;
use crate::fanout::{FanOut, SinkId};
use crate::validation::{ValidationConfig, Validator, VehicleView};

/// Vehicle sub-structs addressable by a direct merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubStruct {
    Mux,
    Twist,
    Network,
    Hunter,
    Estop,
    Resources,
}

/// Positionally addressed collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Gpu,
    Disk,
    NetInterface,
}

/// Value reported as `vehicle_age` before the first receipt.
pub const NEVER_RECEIVED: f64 = -1.0;

pub struct SharedState {
    pub mux: MuxStatus,
    pub twist: TwistValues,
    pub network: NetworkStatus,
    pub hunter: HunterStatus,
    pub estop: EStopStatus,
    pub resources: SystemResources,
    /// Written only by operator-side components, never from the wire.
    pub control: ControlState,
    gpu_list: IndexedCollection<GpuEntry>,
    disk_partitions: IndexedCollection<DiskPartition>,
    net_interfaces: IndexedCollection<NetInterface>,
    remote_enabled: bool,
    alerts: Vec<Alert>,
    last_received: Option<Instant>,
    validator: Validator,
    fanout: FanOut,
}

impl Default for SharedState {
    fn default() -> Self {
        Self::new(Validator::with_builtin_rules(&ValidationConfig::default()))
    }
}

#[derive(Serialize)]
struct Snapshot<'a> {
    mux: &'a MuxStatus,
    twist: &'a TwistValues,
    network: &'a NetworkStatus,
    hunter: &'a HunterStatus,
    estop: &'a EStopStatus,
    resources: &'a SystemResources,
    gpu_list: &'a IndexedCollection<GpuEntry>,
    disk_partitions: &'a IndexedCollection<DiskPartition>,
    net_interfaces: &'a IndexedCollection<NetInterface>,
    remote_enabled: bool,
    control: &'a ControlState,
    alerts: &'a [Alert],
    vehicle_age: f64,
    server_time: f64,
}

impl SharedState {
    pub fn new(validator: Validator) -> Self {
        Self {
            mux: MuxStatus::default(),
            twist: TwistValues::default(),
            network: NetworkStatus::default(),
            hunter: HunterStatus::default(),
            estop: EStopStatus::default(),
            resources: SystemResources::default(),
            control: ControlState::default(),
            gpu_list: IndexedCollection::new(),
            disk_partitions: IndexedCollection::new(),
            net_interfaces: IndexedCollection::new(),
            remote_enabled: false,
            alerts: Vec::new(),
            last_received: None,
            validator,
            fanout: FanOut::new(),
        }
    }

    // ── Inbound merges ──────────────────────────────────────────────────────

    /// Merge `fields` into the sub-struct named by `key`, then validate and
    /// broadcast.  Names outside the sub-struct's whitelist are ignored.
    pub fn apply_update(&mut self, key: SubStruct, fields: &FieldMap) {
        let written = match key {
            SubStruct::Mux => self.mux.merge(fields),
            SubStruct::Twist => self.twist.merge(fields),
            SubStruct::Network => self.network.merge(fields),
            SubStruct::Hunter => self.hunter.merge(fields),
            SubStruct::Estop => self.estop.merge(fields),
            SubStruct::Resources => self.resources.merge(fields),
        };
        trace!(?key, written, "applied update");
        self.touch();
        self.validate();
        self.broadcast();
    }

    /// Merge `fields` into slot `index` of `collection`, growing it with
    /// empty placeholders first when needed.
    pub fn apply_indexed_update(&mut self, collection: Collection, index: usize, fields: &FieldMap) {
        let written = match collection {
            Collection::Gpu => self.gpu_list.upsert(index, fields),
            Collection::Disk => self.disk_partitions.upsert(index, fields),
            Collection::NetInterface => self.net_interfaces.upsert(index, fields),
        };
        trace!(?collection, index, written, "applied indexed update");
        self.touch();
        self.validate();
        self.broadcast();
    }

    pub fn set_remote_enabled(&mut self, enabled: bool) {
        self.remote_enabled = enabled;
        self.broadcast();
    }

    /// Refresh `last_received` to now.
    pub fn touch(&mut self) {
        self.touch_at(Instant::now());
    }

    /// Refresh `last_received` to `at`.  An earlier instant than the one
    /// already recorded is ignored.
    pub fn touch_at(&mut self, at: Instant) {
        self.last_received = Some(self.last_received.map_or(at, |prev| prev.max(at)));
    }

    // ── Validation ──────────────────────────────────────────────────────────

    pub fn validate(&mut self) {
        self.validate_at(Instant::now());
    }

    /// Recompute the alert list as of `now`, replacing the previous one.
    pub fn validate_at(&mut self, now: Instant) {
        let view = VehicleView {
            mux: &self.mux,
            twist: &self.twist,
            estop: &self.estop,
            control: &self.control,
            vehicle_age: self.last_received.map(|t| now.saturating_duration_since(t)),
        };
        self.alerts = self.validator.evaluate(&view);
    }

    // ── Broadcast ───────────────────────────────────────────────────────────

    /// Serialise once and push to every sink.  No-op without subscribers.
    pub fn broadcast(&mut self) {
        if self.fanout.is_empty() {
            return;
        }
        match self.snapshot() {
            Ok(json) => {
                let payload: Arc<str> = Arc::from(json);
                let report = self.fanout.publish(&payload);
                if report.dropped > 0 {
                    debug!(dropped = report.dropped, "snapshot sinks full, update dropped");
                }
            }
            Err(e) => warn!(error = %e, "failed to serialise snapshot"),
        }
    }

    pub fn add_subscriber(&mut self, id: SinkId, sender: mpsc::Sender<Arc<str>>) {
        self.fanout.insert(id, sender);
        debug!(sink = %id, total = self.fanout.len(), "snapshot subscriber added");
    }

    pub fn remove_subscriber(&mut self, id: SinkId) -> bool {
        let removed = self.fanout.remove(id);
        if removed {
            debug!(sink = %id, total = self.fanout.len(), "snapshot subscriber removed");
        }
        removed
    }

    pub fn subscriber_count(&self) -> usize {
        self.fanout.len()
    }

    // ── Reads ───────────────────────────────────────────────────────────────

    /// Full JSON snapshot, including `vehicle_age` (seconds, or
    /// [`NEVER_RECEIVED`]) and `server_time` (Unix seconds).
    pub fn snapshot(&self) -> Result<String, GcsError> {
        let snap = Snapshot {
            mux: &self.mux,
            twist: &self.twist,
            network: &self.network,
            hunter: &self.hunter,
            estop: &self.estop,
            resources: &self.resources,
            gpu_list: &self.gpu_list,
            disk_partitions: &self.disk_partitions,
            net_interfaces: &self.net_interfaces,
            remote_enabled: self.remote_enabled,
            control: &self.control,
            alerts: &self.alerts,
            vehicle_age: self.vehicle_age(Instant::now()),
            server_time: chrono::Utc::now().timestamp_millis() as f64 / 1000.0,
        };
        serde_json::to_string(&snap).map_err(|e| GcsError::Serialization(e.to_string()))
    }

    /// Seconds since the last receipt, rounded to milliseconds.
    pub fn vehicle_age(&self, now: Instant) -> f64 {
        match self.last_received {
            Some(t) => (now.saturating_duration_since(t).as_secs_f64() * 1000.0).round() / 1000.0,
            None => NEVER_RECEIVED,
        }
    }

    pub fn alerts(&self) -> &[Alert] {
        &self.alerts
    }

    pub fn remote_enabled(&self) -> bool {
        self.remote_enabled
    }

    pub fn last_received(&self) -> Option<Instant> {
        self.last_received
    }

    pub fn gpu_list(&self) -> &IndexedCollection<GpuEntry> {
        &self.gpu_list
    }

    pub fn disk_partitions(&self) -> &IndexedCollection<DiskPartition> {
        &self.disk_partitions
    }

    pub fn net_interfaces(&self) -> &IndexedCollection<NetInterface> {
        &self.net_interfaces
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::fanout::sink_channel;
    use gcs_types::{AlertLevel, FieldValue, field_map};

    #[test]
    fn update_merges_known_fields_and_stamps() {
        let mut s = SharedState::default();
        assert!(s.last_received().is_none());
        s.apply_update(
            SubStruct::Hunter,
            &field_map([
                ("battery_voltage", FieldValue::Float(25.4)),
                ("not_a_field", FieldValue::Int(1)),
            ]),
        );
        assert!((s.hunter.battery_voltage - 25.4).abs() < 1e-9);
        assert!(s.last_received().is_some());
    }

    #[test]
    fn indexed_update_grows_with_placeholders() {
        let mut s = SharedState::default();
        s.apply_indexed_update(
            Collection::Gpu,
            5,
            &field_map([("gpu_usage", FieldValue::Float(40.0))]),
        );
        assert_eq!(s.gpu_list().len(), 6);
        assert_eq!(s.gpu_list().get(0), Some(&GpuEntry::default()));
        assert_eq!(s.gpu_list().get(5).and_then(|g| g.gpu_usage), Some(40.0));
    }

    #[test]
    fn staleness_threshold() {
        let mut s = SharedState::default();
        let t = Instant::now();
        s.touch_at(t);

        s.validate_at(t + Duration::from_millis(2900));
        assert!(s.alerts().is_empty());

        s.validate_at(t + Duration::from_millis(3100));
        assert_eq!(s.alerts().len(), 1);
        assert_eq!(s.alerts()[0].level, AlertLevel::Error);
        assert!(s.alerts()[0].message.contains("3.1"));
    }

    #[test]
    fn last_received_never_moves_backwards() {
        let mut s = SharedState::default();
        let t = Instant::now();
        s.touch_at(t + Duration::from_secs(1));
        s.touch_at(t);
        assert_eq!(s.last_received(), Some(t + Duration::from_secs(1)));
    }

    #[test]
    fn alert_list_is_replaced_not_appended() {
        let mut s = SharedState::default();
        s.control.estop = true;
        s.validate();
        s.validate();
        assert_eq!(s.alerts().len(), 1);

        s.apply_update(SubStruct::Estop, &field_map([("is_estop", FieldValue::Int(1))]));
        assert!(s.alerts().is_empty());
    }

    #[test]
    fn moving_while_stopped() {
        let mut s = SharedState::default();
        s.apply_update(
            SubStruct::Estop,
            &field_map([("is_estop", FieldValue::Bool(true))]),
        );
        s.apply_update(SubStruct::Twist, &field_map([("final_lx", FieldValue::Float(0.2))]));
        assert_eq!(s.alerts().len(), 1);
        assert!(s.alerts()[0].message.contains("vehicle is moving"));

        s.apply_update(SubStruct::Twist, &field_map([("final_lx", FieldValue::Float(0.04))]));
        assert!(s.alerts().is_empty());
    }

    #[test]
    fn snapshot_reports_sentinel_age_before_first_receipt() {
        let s = SharedState::default();
        let v: serde_json::Value = serde_json::from_str(&s.snapshot().unwrap()).unwrap();
        assert_eq!(v["vehicle_age"], serde_json::json!(-1.0));
        assert!(v["server_time"].as_f64().unwrap() > 0.0);
        assert_eq!(v["gpu_list"], serde_json::json!([]));
        assert_eq!(v["mux"]["requested_mode"], "idle");
    }

    #[tokio::test]
    async fn remote_side_channel_broadcasts() {
        let mut s = SharedState::default();
        let (tx, mut rx) = sink_channel(4);
        s.add_subscriber(SinkId::new(), tx);
        s.set_remote_enabled(true);
        let snap = rx.recv().await.unwrap();
        let v: serde_json::Value = serde_json::from_str(&snap).unwrap();
        assert_eq!(v["remote_enabled"], true);
    }

    #[test]
    fn removed_subscriber_gets_nothing() {
        let mut s = SharedState::default();
        let id = SinkId::new();
        let (tx, mut rx) = sink_channel(4);
        s.add_subscriber(id, tx);
        assert!(s.remove_subscriber(id));
        s.broadcast();
        assert!(rx.try_recv().is_err());
        assert_eq!(s.subscriber_count(), 0);
    }
}
