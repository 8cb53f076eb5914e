//! Plain value records held by the state store.
//!
//! Every record here is behaviour-free apart from its [`FieldMerge`]
//! whitelist.  Integer-coded protocol enums convert with `from_code` /
//! `code`; an unknown code leaves the field untouched.

use serde::{Deserialize, Serialize};

use crate::field::{FieldMerge, FieldValue};

// ────────────────────────────────────────────────────────────────────────────
// Protocol enums
// ────────────────────────────────────────────────────────────────────────────

/// Operating mode, both as requested on the vehicle mux and as commanded
/// locally by the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriveMode {
    #[default]
    Idle,
    Ctrl,
    Nav,
    /// Teleoperation: the only mode in which teleop commands are sent.
    Remote,
}

impl DriveMode {
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            -1 => Some(Self::Idle),
            0 => Some(Self::Ctrl),
            1 => Some(Self::Nav),
            2 => Some(Self::Remote),
            _ => None,
        }
    }

    pub fn code(self) -> i8 {
        match self {
            Self::Idle => -1,
            Self::Ctrl => 0,
            Self::Nav => 1,
            Self::Remote => 2,
        }
    }
}

/// Command source the vehicle mux currently forwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActiveSource {
    #[default]
    None,
    Nav,
    Teleop,
}

impl ActiveSource {
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            -1 => Some(Self::None),
            0 => Some(Self::Nav),
            1 => Some(Self::Teleop),
            _ => None,
        }
    }

    pub fn code(self) -> i8 {
        match self {
            Self::None => -1,
            Self::Nav => 0,
            Self::Teleop => 1,
        }
    }
}

/// Link health as reported by the vehicle's network monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkStatus {
    Ok,
    HeartbeatDelay,
    #[default]
    SocketError,
}

impl LinkStatus {
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Self::Ok),
            1 => Some(Self::HeartbeatDelay),
            2 => Some(Self::SocketError),
            _ => None,
        }
    }

    pub fn code(self) -> u8 {
        match self {
            Self::Ok => 0,
            Self::HeartbeatDelay => 1,
            Self::SocketError => 2,
        }
    }
}

/// Reason the vehicle-side bridge latched an e-stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BridgeFlag {
    #[default]
    Ok,
    ServerCmd,
    Socket,
    HbTimeout,
    CtrlTimeout,
}

impl BridgeFlag {
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Self::Ok),
            1 => Some(Self::ServerCmd),
            2 => Some(Self::Socket),
            3 => Some(Self::HbTimeout),
            4 => Some(Self::CtrlTimeout),
            _ => None,
        }
    }

    pub fn code(self) -> u8 {
        match self {
            Self::Ok => 0,
            Self::ServerCmd => 1,
            Self::Socket => 2,
            Self::HbTimeout => 3,
            Self::CtrlTimeout => 4,
        }
    }
}

/// Reason the vehicle mux latched an e-stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MuxFlag {
    #[default]
    Ok,
    /// Remote requested while navigation is active and no teleop arrives.
    RemoteNavNoTeleop,
}

impl MuxFlag {
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Self::Ok),
            1 => Some(Self::RemoteNavNoTeleop),
            _ => None,
        }
    }

    pub fn code(self) -> u8 {
        match self {
            Self::Ok => 0,
            Self::RemoteNavNoTeleop => 1,
        }
    }
}

/// Severity of an operator-visible [`Alert`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertLevel {
    #[default]
    Ok,
    Warn,
    Error,
}

// ────────────────────────────────────────────────────────────────────────────
// Setter helpers
// ────────────────────────────────────────────────────────────────────────────

fn write_f64(slot: &mut f64, value: &FieldValue) -> bool {
    value.as_f64().map(|v| *slot = v).is_some()
}

fn write_bool(slot: &mut bool, value: &FieldValue) -> bool {
    value.as_bool().map(|v| *slot = v).is_some()
}

fn write_i64(slot: &mut i64, value: &FieldValue) -> bool {
    value.as_i64().map(|v| *slot = v).is_some()
}

fn write_u64(slot: &mut u64, value: &FieldValue) -> bool {
    value.as_u64().map(|v| *slot = v).is_some()
}

fn write_coded<T>(slot: &mut T, value: &FieldValue, decode: fn(i64) -> Option<T>) -> bool {
    value.as_i64().and_then(decode).map(|v| *slot = v).is_some()
}

fn write_opt_f64(slot: &mut Option<f64>, value: &FieldValue) -> bool {
    value.as_f64().map(|v| *slot = Some(v)).is_some()
}

fn write_opt_u64(slot: &mut Option<u64>, value: &FieldValue) -> bool {
    value.as_u64().map(|v| *slot = Some(v)).is_some()
}

fn write_opt_bool(slot: &mut Option<bool>, value: &FieldValue) -> bool {
    value.as_bool().map(|v| *slot = Some(v)).is_some()
}

fn write_opt_text(slot: &mut Option<String>, value: &FieldValue) -> bool {
    value.as_text().map(|v| *slot = Some(v.to_string())).is_some()
}

// ────────────────────────────────────────────────────────────────────────────
// Vehicle sub-structs
// ────────────────────────────────────────────────────────────────────────────

/// Command-source arbitration state on the vehicle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MuxStatus {
    pub requested_mode: DriveMode,
    pub active_source: ActiveSource,
    pub remote_enabled: bool,
    pub nav_active: bool,
    pub teleop_active: bool,
    pub final_active: bool,
}

impl FieldMerge for MuxStatus {
    const FIELDS: &'static [&'static str] = &[
        "requested_mode",
        "active_source",
        "remote_enabled",
        "nav_active",
        "teleop_active",
        "final_active",
    ];

    fn set_field(&mut self, name: &str, value: &FieldValue) -> bool {
        match name {
            "requested_mode" => write_coded(&mut self.requested_mode, value, DriveMode::from_code),
            "active_source" => write_coded(&mut self.active_source, value, ActiveSource::from_code),
            "remote_enabled" => write_bool(&mut self.remote_enabled, value),
            "nav_active" => write_bool(&mut self.nav_active, value),
            "teleop_active" => write_bool(&mut self.teleop_active, value),
            "final_active" => write_bool(&mut self.final_active, value),
            _ => false,
        }
    }
}

/// Linear / angular command pairs at each stage of the vehicle mux.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TwistValues {
    pub nav_lx: f64,
    pub nav_az: f64,
    pub teleop_lx: f64,
    pub teleop_az: f64,
    pub final_lx: f64,
    pub final_az: f64,
}

impl FieldMerge for TwistValues {
    const FIELDS: &'static [&'static str] = &[
        "nav_lx",
        "nav_az",
        "teleop_lx",
        "teleop_az",
        "final_lx",
        "final_az",
    ];

    fn set_field(&mut self, name: &str, value: &FieldValue) -> bool {
        match name {
            "nav_lx" => write_f64(&mut self.nav_lx, value),
            "nav_az" => write_f64(&mut self.nav_az, value),
            "teleop_lx" => write_f64(&mut self.teleop_lx, value),
            "teleop_az" => write_f64(&mut self.teleop_az, value),
            "final_lx" => write_f64(&mut self.final_lx, value),
            "final_az" => write_f64(&mut self.final_az, value),
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkStatus {
    pub connected: bool,
    pub status_code: LinkStatus,
    pub rtt_ms: f64,
    pub bandwidth_mbps: f64,
}

impl FieldMerge for NetworkStatus {
    const FIELDS: &'static [&'static str] =
        &["connected", "status_code", "rtt_ms", "bandwidth_mbps"];

    fn set_field(&mut self, name: &str, value: &FieldValue) -> bool {
        match name {
            "connected" => write_bool(&mut self.connected, value),
            "status_code" => write_coded(&mut self.status_code, value, LinkStatus::from_code),
            "rtt_ms" => write_f64(&mut self.rtt_ms, value),
            "bandwidth_mbps" => write_f64(&mut self.bandwidth_mbps, value),
            _ => false,
        }
    }
}

/// Chassis telemetry from the vehicle base controller.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HunterStatus {
    pub linear_vel: f64,
    pub steering_angle: f64,
    pub vehicle_state: i64,
    pub control_mode: i64,
    pub error_code: i64,
    pub battery_voltage: f64,
}

impl FieldMerge for HunterStatus {
    const FIELDS: &'static [&'static str] = &[
        "linear_vel",
        "steering_angle",
        "vehicle_state",
        "control_mode",
        "error_code",
        "battery_voltage",
    ];

    fn set_field(&mut self, name: &str, value: &FieldValue) -> bool {
        match name {
            "linear_vel" => write_f64(&mut self.linear_vel, value),
            "steering_angle" => write_f64(&mut self.steering_angle, value),
            "vehicle_state" => write_i64(&mut self.vehicle_state, value),
            "control_mode" => write_i64(&mut self.control_mode, value),
            "error_code" => write_i64(&mut self.error_code, value),
            "battery_voltage" => write_f64(&mut self.battery_voltage, value),
            _ => false,
        }
    }
}

/// Vehicle-confirmed e-stop state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EStopStatus {
    pub is_estop: bool,
    pub bridge_flag: BridgeFlag,
    pub mux_flag: MuxFlag,
}

impl FieldMerge for EStopStatus {
    const FIELDS: &'static [&'static str] = &["is_estop", "bridge_flag", "mux_flag"];

    fn set_field(&mut self, name: &str, value: &FieldValue) -> bool {
        match name {
            "is_estop" => write_bool(&mut self.is_estop, value),
            "bridge_flag" => write_coded(&mut self.bridge_flag, value, BridgeFlag::from_code),
            "mux_flag" => write_coded(&mut self.mux_flag, value, MuxFlag::from_code),
            _ => false,
        }
    }
}

/// Aggregate compute resources on the vehicle.  RAM figures are megabytes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SystemResources {
    pub cpu_phys: u64,
    pub cpu_logic: u64,
    pub cpu_usage: f64,
    pub cpu_temp: f64,
    pub cpu_load: f64,
    pub ram_total: u64,
    pub ram_used: u64,
    pub net_total_ifaces: u64,
    pub net_active_ifaces: u64,
    pub net_down_ifaces: u64,
}

impl FieldMerge for SystemResources {
    const FIELDS: &'static [&'static str] = &[
        "cpu_phys",
        "cpu_logic",
        "cpu_usage",
        "cpu_temp",
        "cpu_load",
        "ram_total",
        "ram_used",
        "net_total_ifaces",
        "net_active_ifaces",
        "net_down_ifaces",
    ];

    fn set_field(&mut self, name: &str, value: &FieldValue) -> bool {
        match name {
            "cpu_phys" => write_u64(&mut self.cpu_phys, value),
            "cpu_logic" => write_u64(&mut self.cpu_logic, value),
            "cpu_usage" => write_f64(&mut self.cpu_usage, value),
            "cpu_temp" => write_f64(&mut self.cpu_temp, value),
            "cpu_load" => write_f64(&mut self.cpu_load, value),
            "ram_total" => write_u64(&mut self.ram_total, value),
            "ram_used" => write_u64(&mut self.ram_used, value),
            "net_total_ifaces" => write_u64(&mut self.net_total_ifaces, value),
            "net_active_ifaces" => write_u64(&mut self.net_active_ifaces, value),
            "net_down_ifaces" => write_u64(&mut self.net_down_ifaces, value),
            _ => false,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Local control state
// ────────────────────────────────────────────────────────────────────────────

/// Locally authoritative operator state.  Never written from the wire.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ControlState {
    /// Mode last commanded by the operator.
    pub mode: DriveMode,
    /// Locally requested e-stop.
    pub estop: bool,
    pub linear_x: f64,
    /// Steering angle in radians, sent in the angular slot of teleop.
    pub angular_z: f64,
    pub raw_speed: f64,
    pub raw_steer: f64,
    pub joystick_connected: bool,
}

impl ControlState {
    /// Zero every operator output and flag the device as gone.
    pub fn reset_outputs(&mut self) {
        self.linear_x = 0.0;
        self.angular_z = 0.0;
        self.raw_speed = 0.0;
        self.raw_steer = 0.0;
        self.joystick_connected = false;
    }
}

/// An operator-visible condition produced by validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub level: AlertLevel,
    pub message: String,
}

impl Alert {
    pub fn warn(message: impl Into<String>) -> Self {
        Self {
            level: AlertLevel::Warn,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: AlertLevel::Error,
            message: message.into(),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Indexed collection entries
// ────────────────────────────────────────────────────────────────────────────
//
// Slots are created empty when an update targets a later index, so every
// field is optional and an empty entry serialises as `{}`.

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GpuEntry {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gpu_usage: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gpu_mem_used: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gpu_mem_total: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gpu_temp: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gpu_power: Option<f64>,
}

impl FieldMerge for GpuEntry {
    const FIELDS: &'static [&'static str] = &[
        "gpu_usage",
        "gpu_mem_used",
        "gpu_mem_total",
        "gpu_temp",
        "gpu_power",
    ];

    fn set_field(&mut self, name: &str, value: &FieldValue) -> bool {
        match name {
            "gpu_usage" => write_opt_f64(&mut self.gpu_usage, value),
            "gpu_mem_used" => write_opt_f64(&mut self.gpu_mem_used, value),
            "gpu_mem_total" => write_opt_f64(&mut self.gpu_mem_total, value),
            "gpu_temp" => write_opt_f64(&mut self.gpu_temp, value),
            "gpu_power" => write_opt_f64(&mut self.gpu_power, value),
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiskPartition {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mountpoint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_bytes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub used_bytes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub percent: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accessible: Option<bool>,
}

impl FieldMerge for DiskPartition {
    const FIELDS: &'static [&'static str] = &[
        "mountpoint",
        "total_bytes",
        "used_bytes",
        "percent",
        "accessible",
    ];

    fn set_field(&mut self, name: &str, value: &FieldValue) -> bool {
        match name {
            "mountpoint" => write_opt_text(&mut self.mountpoint, value),
            "total_bytes" => write_opt_u64(&mut self.total_bytes, value),
            "used_bytes" => write_opt_u64(&mut self.used_bytes, value),
            "percent" => write_opt_f64(&mut self.percent, value),
            "accessible" => write_opt_bool(&mut self.accessible, value),
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NetInterface {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_up: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speed_mbps: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub in_bps: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub out_bps: Option<f64>,
}

impl FieldMerge for NetInterface {
    const FIELDS: &'static [&'static str] = &["name", "is_up", "speed_mbps", "in_bps", "out_bps"];

    fn set_field(&mut self, name: &str, value: &FieldValue) -> bool {
        match name {
            "name" => write_opt_text(&mut self.name, value),
            "is_up" => write_opt_bool(&mut self.is_up, value),
            "speed_mbps" => write_opt_u64(&mut self.speed_mbps, value),
            "in_bps" => write_opt_f64(&mut self.in_bps, value),
            "out_bps" => write_opt_f64(&mut self.out_bps, value),
            _ => false,
        }
    }
}
