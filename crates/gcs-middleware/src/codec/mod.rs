//! Wire codec – bytes to named-field updates and back.
//!
//! Two encodings carry the same logical messages:
//!
//! | Codec | Framing | Key |
//! |---|---|---|
//! | [`BinaryCodec`] | 2-byte ASCII tag + little-endian fixed layout + `u16` seq | tag bytes |
//! | [`StructuredCodec`] | JSON object (or array) with a `seq` field | pub/sub topic |
//!
//! Both decode into a [`Frame`] and neither touches state: merging is the
//! vehicle link's job.  Every failure on the decode path (short input,
//! unknown tag, malformed payload) yields `None`.
//!
//! Sequence numbers are carried for the vehicle's benefit only.  They are
//! never checked on receipt; the last value received always wins.
//!
//! # Binary layouts
//!
//! Inbound (vehicle → station):
//!
//! | Tag | Payload |
//! |---|---|
//! | `MS` | `i8` requested_mode, `i8` active_source, 4 × `bool` |
//! | `TV` | 6 × `f32` (nav / teleop / final, linear then angular) |
//! | `NS` | `bool` connected, `u8` status_code, `f32` rtt_ms, `f32` bandwidth_mbps |
//! | `HS` | `f32` linear_vel, `f32` steering_angle, `u8` vehicle_state, `u8` control_mode, `u16` error_code, `f32` battery_voltage |
//! | `EP` | `bool` is_estop, `u8` bridge_flag, `u8` mux_flag |
//! | `RE` | `bool` remote_enabled |
//! | `CR` | `u16` cpu_phys, `u16` cpu_logic, `f32` cpu_usage, `f32` cpu_temp, `f32` cpu_load |
//! | `MR` | `u64` ram_total_bytes, `u64` ram_used_bytes |
//! | `GR` | `u8` idx, 5 × `f32` |
//! | `DI` | `u64` read_bytes, `u64` write_bytes |
//! | `DP` | `u8` idx, `[u8; 32]` mountpoint, `u64` total_bytes, `u64` used_bytes, `f32` percent, `bool` accessible |
//! | `NM` | 3 × `u16` interface counts |
//! | `NF` | `u8` idx, `[u8; 16]` name, `bool` is_up, `u32` speed_mbps, `f64` in_bps, `f64` out_bps |
//!
//! Outbound (station → vehicle): `HB` `f64` ts, `TC` 2 × `f32`, `ES` `bool`,
//! `CM` `i8`.

pub mod binary;
pub mod structured;

use std::sync::atomic::{AtomicU16, Ordering};

use gcs_types::{FieldMap, FieldValue, GcsError, field_map};

pub use binary::BinaryCodec;
pub use structured::StructuredCodec;

// ────────────────────────────────────────────────────────────────────────────
// Tags and layouts
// ────────────────────────────────────────────────────────────────────────────

/// Every message kind on the link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tag {
    MuxStatus,
    TwistValues,
    NetworkStatus,
    HunterStatus,
    EstopStatus,
    RemoteEnabled,
    CpuResources,
    MemResources,
    GpuResources,
    DiskIo,
    DiskPartition,
    NetMetrics,
    NetInterface,
    Heartbeat,
    Teleop,
    Estop,
    CmdMode,
}

impl Tag {
    pub const INBOUND: [Tag; 13] = [
        Tag::MuxStatus,
        Tag::TwistValues,
        Tag::NetworkStatus,
        Tag::HunterStatus,
        Tag::EstopStatus,
        Tag::RemoteEnabled,
        Tag::CpuResources,
        Tag::MemResources,
        Tag::GpuResources,
        Tag::DiskIo,
        Tag::DiskPartition,
        Tag::NetMetrics,
        Tag::NetInterface,
    ];

    pub const OUTBOUND: [Tag; 4] = [Tag::Heartbeat, Tag::Teleop, Tag::Estop, Tag::CmdMode];

    /// Two-byte ASCII tag of the binary framing.
    pub fn code(self) -> [u8; 2] {
        match self {
            Tag::MuxStatus => *b"MS",
            Tag::TwistValues => *b"TV",
            Tag::NetworkStatus => *b"NS",
            Tag::HunterStatus => *b"HS",
            Tag::EstopStatus => *b"EP",
            Tag::RemoteEnabled => *b"RE",
            Tag::CpuResources => *b"CR",
            Tag::MemResources => *b"MR",
            Tag::GpuResources => *b"GR",
            Tag::DiskIo => *b"DI",
            Tag::DiskPartition => *b"DP",
            Tag::NetMetrics => *b"NM",
            Tag::NetInterface => *b"NF",
            Tag::Heartbeat => *b"HB",
            Tag::Teleop => *b"TC",
            Tag::Estop => *b"ES",
            Tag::CmdMode => *b"CM",
        }
    }

    pub fn from_code(code: [u8; 2]) -> Option<Tag> {
        Tag::INBOUND
            .into_iter()
            .chain(Tag::OUTBOUND)
            .find(|t| t.code() == code)
    }

    /// Last path segment of the structured topic.
    pub fn topic_name(self) -> &'static str {
        match self {
            Tag::MuxStatus => "mux",
            Tag::TwistValues => "twist",
            Tag::NetworkStatus => "network",
            Tag::HunterStatus => "hunter",
            Tag::EstopStatus => "estop",
            Tag::RemoteEnabled => "remote",
            Tag::CpuResources => "cpu",
            Tag::MemResources => "mem",
            Tag::GpuResources => "gpu",
            Tag::DiskIo => "disk_io",
            Tag::DiskPartition => "disk",
            Tag::NetMetrics => "net",
            Tag::NetInterface => "net_iface",
            Tag::Heartbeat => "heartbeat",
            Tag::Teleop => "teleop",
            Tag::Estop => "estop",
            Tag::CmdMode => "cmd_mode",
        }
    }

    pub fn is_inbound(self) -> bool {
        Tag::INBOUND.contains(&self)
    }

    /// Fixed field layout of the payload.
    pub fn layout(self) -> &'static [FieldSpec] {
        use FieldKind::*;
        match self {
            Tag::MuxStatus => const { &[
                FieldSpec::new("requested_mode", I8),
                FieldSpec::new("active_source", I8),
                FieldSpec::new("remote_enabled", Bool),
                FieldSpec::new("nav_active", Bool),
                FieldSpec::new("teleop_active", Bool),
                FieldSpec::new("final_active", Bool),
            ] },
            Tag::TwistValues => const { &[
                FieldSpec::new("nav_lx", F32),
                FieldSpec::new("nav_az", F32),
                FieldSpec::new("teleop_lx", F32),
                FieldSpec::new("teleop_az", F32),
                FieldSpec::new("final_lx", F32),
                FieldSpec::new("final_az", F32),
            ] },
            Tag::NetworkStatus => const { &[
                FieldSpec::new("connected", Bool),
                FieldSpec::new("status_code", U8),
                FieldSpec::new("rtt_ms", F32),
                FieldSpec::new("bandwidth_mbps", F32),
            ] },
            Tag::HunterStatus => const { &[
                FieldSpec::new("linear_vel", F32),
                FieldSpec::new("steering_angle", F32),
                FieldSpec::new("vehicle_state", U8),
                FieldSpec::new("control_mode", U8),
                FieldSpec::new("error_code", U16),
                FieldSpec::new("battery_voltage", F32),
            ] },
            Tag::EstopStatus => const { &[
                FieldSpec::new("is_estop", Bool),
                FieldSpec::new("bridge_flag", U8),
                FieldSpec::new("mux_flag", U8),
            ] },
            Tag::RemoteEnabled => const { &[FieldSpec::new("remote_enabled", Bool)] },
            Tag::CpuResources => const { &[
                FieldSpec::new("cpu_phys", U16),
                FieldSpec::new("cpu_logic", U16),
                FieldSpec::new("cpu_usage", F32),
                FieldSpec::new("cpu_temp", F32),
                FieldSpec::new("cpu_load", F32),
            ] },
            Tag::MemResources => const { &[
                FieldSpec::new("ram_total_bytes", U64),
                FieldSpec::new("ram_used_bytes", U64),
            ] },
            Tag::GpuResources => const { &[
                FieldSpec::new("idx", U8),
                FieldSpec::new("gpu_usage", F32),
                FieldSpec::new("gpu_mem_used", F32),
                FieldSpec::new("gpu_mem_total", F32),
                FieldSpec::new("gpu_temp", F32),
                FieldSpec::new("gpu_power", F32),
            ] },
            Tag::DiskIo => const { &[
                FieldSpec::new("read_bytes", U64),
                FieldSpec::new("write_bytes", U64),
            ] },
            Tag::DiskPartition => const { &[
                FieldSpec::new("idx", U8),
                FieldSpec::new("mountpoint", Text(32)),
                FieldSpec::new("total_bytes", U64),
                FieldSpec::new("used_bytes", U64),
                FieldSpec::new("percent", F32),
                FieldSpec::new("accessible", Bool),
            ] },
            Tag::NetMetrics => const { &[
                FieldSpec::new("net_total_ifaces", U16),
                FieldSpec::new("net_active_ifaces", U16),
                FieldSpec::new("net_down_ifaces", U16),
            ] },
            Tag::NetInterface => const { &[
                FieldSpec::new("idx", U8),
                FieldSpec::new("name", Text(16)),
                FieldSpec::new("is_up", Bool),
                FieldSpec::new("speed_mbps", U32),
                FieldSpec::new("in_bps", F64),
                FieldSpec::new("out_bps", F64),
            ] },
            Tag::Heartbeat => const { &[FieldSpec::new("ts", F64)] },
            Tag::Teleop => const { &[
                FieldSpec::new("linear_x", F32),
                FieldSpec::new("angular_z", F32),
            ] },
            Tag::Estop => const { &[FieldSpec::new("active", Bool)] },
            Tag::CmdMode => const { &[FieldSpec::new("mode", I8)] },
        }
    }

    /// Size of the payload between tag and sequence number.
    pub fn payload_size(self) -> usize {
        self.layout().iter().map(|f| f.kind.size()).sum()
    }

    /// For tags that carry indexed entries in the structured encoding: the
    /// key holding the array (`None` for a top-level array) and the tag
    /// whose layout each entry follows.
    pub fn entry_source(self) -> Option<(Option<&'static str>, Tag)> {
        match self {
            Tag::GpuResources => Some((None, Tag::GpuResources)),
            Tag::DiskPartition => Some((Some("partitions"), Tag::DiskPartition)),
            Tag::NetMetrics => Some((Some("interfaces"), Tag::NetInterface)),
            _ => None,
        }
    }
}

impl std::fmt::Display for Tag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let code = self.code();
        write!(f, "{}{}", code[0] as char, code[1] as char)
    }
}

/// Wire type of a single fixed-layout field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    U8,
    /// One byte; any non-zero value decodes as `true`.
    Bool,
    I8,
    U16,
    U32,
    U64,
    F32,
    F64,
    /// Fixed-capacity UTF-8, padded with NUL or space.
    Text(usize),
}

impl FieldKind {
    pub const fn size(self) -> usize {
        match self {
            FieldKind::U8 | FieldKind::Bool | FieldKind::I8 => 1,
            FieldKind::U16 => 2,
            FieldKind::U32 | FieldKind::F32 => 4,
            FieldKind::U64 | FieldKind::F64 => 8,
            FieldKind::Text(n) => n,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
}

impl FieldSpec {
    pub const fn new(name: &'static str, kind: FieldKind) -> Self {
        Self { name, kind }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Frames and commands
// ────────────────────────────────────────────────────────────────────────────

/// One decoded inbound message.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub tag: Tag,
    pub seq: Option<u16>,
    /// Top-level fields.  For binary indexed tags this includes `idx`.
    pub fields: FieldMap,
    /// Indexed entries carried alongside the top-level fields, each with
    /// its own `idx`.  Empty for the binary encoding.
    pub entries: Vec<FieldMap>,
}

/// The four outbound command kinds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OutboundCommand {
    Heartbeat { ts: f64 },
    Teleop { linear_x: f64, angular_z: f64 },
    Estop { active: bool },
    CmdMode { mode: i8 },
}

/// Decimal places kept in teleop values.
pub const TELEOP_DECIMALS: i32 = 3;

impl OutboundCommand {
    pub fn tag(&self) -> Tag {
        match self {
            OutboundCommand::Heartbeat { .. } => Tag::Heartbeat,
            OutboundCommand::Teleop { .. } => Tag::Teleop,
            OutboundCommand::Estop { .. } => Tag::Estop,
            OutboundCommand::CmdMode { .. } => Tag::CmdMode,
        }
    }

    /// Field map in the outbound tag's layout, teleop values rounded.
    pub fn fields(&self) -> FieldMap {
        match *self {
            OutboundCommand::Heartbeat { ts } => field_map([("ts", FieldValue::Float(ts))]),
            OutboundCommand::Teleop {
                linear_x,
                angular_z,
            } => field_map([
                ("linear_x", FieldValue::Float(round_to(linear_x, TELEOP_DECIMALS))),
                ("angular_z", FieldValue::Float(round_to(angular_z, TELEOP_DECIMALS))),
            ]),
            OutboundCommand::Estop { active } => field_map([("active", FieldValue::Bool(active))]),
            OutboundCommand::CmdMode { mode } => {
                field_map([("mode", FieldValue::Int(i64::from(mode)))])
            }
        }
    }
}

/// An encoded outbound message and the key (tag or topic) it goes out on.
#[derive(Debug, Clone, PartialEq)]
pub struct Encoded {
    pub key: String,
    pub bytes: Vec<u8>,
}

/// One of the two interchangeable encodings.
pub trait WireCodec: Send + Sync {
    fn name(&self) -> &'static str;

    /// Decode one message received on `key`.  The binary codec ignores
    /// the key; the structured codec resolves the tag from it.
    fn decode(&self, key: &str, bytes: &[u8]) -> Option<Frame>;

    fn encode(&self, command: &OutboundCommand, seq: u16) -> Result<Encoded, GcsError>;

    /// Keys the transport must subscribe to for inbound traffic.
    fn inbound_keys(&self) -> Vec<String>;
}

// ────────────────────────────────────────────────────────────────────────────
// Helpers
// ────────────────────────────────────────────────────────────────────────────

/// Per-kind outbound sequence counter, wrapping at 65536.
#[derive(Debug, Default)]
pub struct SequenceCounter(AtomicU16);

impl SequenceCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the current value and advance.
    pub fn next(&self) -> u16 {
        self.0.fetch_add(1, Ordering::Relaxed)
    }
}

/// Decode a fixed-capacity text field: trailing NUL / space padding is
/// stripped and the rest must be valid UTF-8.
pub fn fixed_text(raw: &[u8]) -> Result<String, GcsError> {
    let end = raw
        .iter()
        .rposition(|b| *b != 0 && *b != b' ')
        .map_or(0, |i| i + 1);
    std::str::from_utf8(&raw[..end])
        .map(str::to_owned)
        .map_err(|e| GcsError::Codec(format!("invalid UTF-8 in fixed text: {e}")))
}

pub fn round_to(value: f64, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    (value * scale).round() / scale
}
