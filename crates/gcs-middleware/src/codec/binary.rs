//! Fixed-layout little-endian frames.
//!
//! ```text
//! ┌──────────────┬──────────────────────────────┬──────────────┐
//! │ Tag (2 B)    │ Payload (per-tag layout)     │ Seq (u16 LE) │
//! └──────────────┴──────────────────────────────┴──────────────┘
//! ```
//!
//! Bytes past the declared size are ignored so a newer vehicle may append
//! fields without breaking this station.

use gcs_types::{FieldMap, FieldValue, GcsError};
use tracing::trace;

use super::{Encoded, FieldKind, Frame, OutboundCommand, Tag, WireCodec, fixed_text};

pub const TAG_LEN: usize = 2;
pub const SEQ_LEN: usize = 2;

#[derive(Debug, Default, Clone, Copy)]
pub struct BinaryCodec;

impl BinaryCodec {
    pub fn new() -> Self {
        Self
    }

    /// Full frame length for `tag`, tag and sequence number included.
    pub fn frame_len(tag: Tag) -> usize {
        TAG_LEN + tag.payload_size() + SEQ_LEN
    }

    /// Build a frame of any tag from a field map.  Missing numeric fields
    /// encode as zero, missing text as empty.
    pub fn encode_fields(&self, tag: Tag, fields: &FieldMap, seq: u16) -> Result<Vec<u8>, GcsError> {
        let mut out = Vec::with_capacity(Self::frame_len(tag));
        out.extend_from_slice(&tag.code());
        for spec in tag.layout() {
            write_field(&mut out, spec.name, spec.kind, fields.get(spec.name))?;
        }
        out.extend_from_slice(&seq.to_le_bytes());
        Ok(out)
    }

    fn decode_frame(&self, bytes: &[u8]) -> Result<Frame, GcsError> {
        let code: [u8; 2] = bytes
            .get(..TAG_LEN)
            .and_then(|b| b.try_into().ok())
            .ok_or_else(|| GcsError::Codec("frame shorter than tag".to_string()))?;
        let tag = Tag::from_code(code)
            .filter(|t| t.is_inbound())
            .ok_or_else(|| GcsError::Codec(format!("unknown tag {:?}", code)))?;

        let needed = Self::frame_len(tag);
        if bytes.len() < needed {
            return Err(GcsError::Codec(format!(
                "{tag} frame is {} bytes, need {needed}",
                bytes.len()
            )));
        }

        let mut fields = FieldMap::new();
        let mut offset = TAG_LEN;
        for spec in tag.layout() {
            let size = spec.kind.size();
            let value = read_field(spec.kind, &bytes[offset..offset + size])?;
            fields.insert(spec.name.to_string(), value);
            offset += size;
        }
        let seq = u16::from_le_bytes([bytes[offset], bytes[offset + 1]]);

        Ok(Frame {
            tag,
            seq: Some(seq),
            fields,
            entries: Vec::new(),
        })
    }
}

impl WireCodec for BinaryCodec {
    fn name(&self) -> &'static str {
        "binary"
    }

    fn decode(&self, _key: &str, bytes: &[u8]) -> Option<Frame> {
        match self.decode_frame(bytes) {
            Ok(frame) => Some(frame),
            Err(e) => {
                trace!(error = %e, len = bytes.len(), "dropping binary frame");
                None
            }
        }
    }

    fn encode(&self, command: &OutboundCommand, seq: u16) -> Result<Encoded, GcsError> {
        let tag = command.tag();
        Ok(Encoded {
            key: tag.to_string(),
            bytes: self.encode_fields(tag, &command.fields(), seq)?,
        })
    }

    fn inbound_keys(&self) -> Vec<String> {
        Vec::new()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Field primitives
// ────────────────────────────────────────────────────────────────────────────

fn read_field(kind: FieldKind, raw: &[u8]) -> Result<FieldValue, GcsError> {
    let arr = |n: usize| take(raw, n);
    Ok(match kind {
        FieldKind::U8 => FieldValue::Int(i64::from(raw[0])),
        FieldKind::Bool => FieldValue::Bool(raw[0] != 0),
        FieldKind::I8 => FieldValue::Int(i64::from(raw[0] as i8)),
        FieldKind::U16 => FieldValue::Int(i64::from(u16::from_le_bytes([raw[0], raw[1]]))),
        FieldKind::U32 => {
            let b: [u8; 4] = arr(4)?.try_into().map_err(codec_err)?;
            FieldValue::Int(i64::from(u32::from_le_bytes(b)))
        }
        FieldKind::U64 => {
            let b: [u8; 8] = arr(8)?.try_into().map_err(codec_err)?;
            let v = i64::try_from(u64::from_le_bytes(b))
                .map_err(|_| GcsError::Codec("u64 field out of range".to_string()))?;
            FieldValue::Int(v)
        }
        FieldKind::F32 => {
            let b: [u8; 4] = arr(4)?.try_into().map_err(codec_err)?;
            FieldValue::Float(f64::from(f32::from_le_bytes(b)))
        }
        FieldKind::F64 => {
            let b: [u8; 8] = arr(8)?.try_into().map_err(codec_err)?;
            FieldValue::Float(f64::from_le_bytes(b))
        }
        FieldKind::Text(n) => FieldValue::Text(fixed_text(arr(n)?)?),
    })
}

fn take(raw: &[u8], n: usize) -> Result<&[u8], GcsError> {
    raw.get(..n)
        .ok_or_else(|| GcsError::Codec("truncated field".to_string()))
}

fn codec_err(e: std::array::TryFromSliceError) -> GcsError {
    GcsError::Codec(e.to_string())
}

fn write_field(
    out: &mut Vec<u8>,
    name: &str,
    kind: FieldKind,
    value: Option<&FieldValue>,
) -> Result<(), GcsError> {
    let int = |v: Option<&FieldValue>| v.and_then(FieldValue::as_i64).unwrap_or(0);
    let float = |v: Option<&FieldValue>| v.and_then(FieldValue::as_f64).unwrap_or(0.0);
    let range_err = || GcsError::Codec(format!("field {name} out of range for {kind:?}"));

    match kind {
        FieldKind::U8 => out.push(u8::try_from(int(value)).map_err(|_| range_err())?),
        FieldKind::Bool => {
            let b = value.and_then(FieldValue::as_bool).unwrap_or(false);
            out.push(u8::from(b));
        }
        FieldKind::I8 => {
            let v = i8::try_from(int(value)).map_err(|_| range_err())?;
            out.extend_from_slice(&v.to_le_bytes());
        }
        FieldKind::U16 => {
            let v = u16::try_from(int(value)).map_err(|_| range_err())?;
            out.extend_from_slice(&v.to_le_bytes());
        }
        FieldKind::U32 => {
            let v = u32::try_from(int(value)).map_err(|_| range_err())?;
            out.extend_from_slice(&v.to_le_bytes());
        }
        FieldKind::U64 => {
            let v = u64::try_from(int(value)).map_err(|_| range_err())?;
            out.extend_from_slice(&v.to_le_bytes());
        }
        FieldKind::F32 => out.extend_from_slice(&(float(value) as f32).to_le_bytes()),
        FieldKind::F64 => out.extend_from_slice(&float(value).to_le_bytes()),
        FieldKind::Text(n) => {
            let text = value.and_then(FieldValue::as_text).unwrap_or("");
            if text.len() > n {
                return Err(GcsError::Codec(format!(
                    "field {name} is {} bytes, capacity {n}",
                    text.len()
                )));
            }
            out.extend_from_slice(text.as_bytes());
            out.resize(out.len() + (n - text.len()), 0);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use gcs_types::field_map;

    const TOL: f64 = 1e-4;

    fn codec() -> BinaryCodec {
        BinaryCodec::new()
    }

    fn float(frame: &Frame, name: &str) -> f64 {
        frame.fields[name].as_f64().unwrap()
    }

    #[test]
    fn twist_roundtrip_within_tolerance() {
        let fields = field_map([
            ("nav_lx", FieldValue::Float(0.5)),
            ("nav_az", FieldValue::Float(-0.25)),
            ("teleop_lx", FieldValue::Float(0.1)),
            ("teleop_az", FieldValue::Float(0.333)),
            ("final_lx", FieldValue::Float(0.2)),
            ("final_az", FieldValue::Float(-0.7)),
        ]);
        let bytes = codec().encode_fields(Tag::TwistValues, &fields, 9).unwrap();
        assert_eq!(bytes.len(), BinaryCodec::frame_len(Tag::TwistValues));

        let frame = codec().decode("", &bytes).unwrap();
        assert_eq!(frame.tag, Tag::TwistValues);
        assert_eq!(frame.seq, Some(9));
        for (name, value) in &fields {
            assert!((float(&frame, name) - value.as_f64().unwrap()).abs() < TOL, "{name}");
        }
    }

    #[test]
    fn hunter_roundtrip_keeps_integers() {
        let fields = field_map([
            ("linear_vel", FieldValue::Float(1.25)),
            ("steering_angle", FieldValue::Float(-0.3)),
            ("vehicle_state", FieldValue::Int(2)),
            ("control_mode", FieldValue::Int(1)),
            ("error_code", FieldValue::Int(513)),
            ("battery_voltage", FieldValue::Float(25.6)),
        ]);
        let bytes = codec().encode_fields(Tag::HunterStatus, &fields, 0).unwrap();
        let frame = codec().decode("", &bytes).unwrap();
        assert_eq!(frame.fields["error_code"], FieldValue::Int(513));
        assert_eq!(frame.fields["vehicle_state"], FieldValue::Int(2));
        assert!((float(&frame, "battery_voltage") - 25.6).abs() < TOL);
    }

    #[test]
    fn short_frame_is_dropped() {
        let bytes = codec()
            .encode_fields(Tag::EstopStatus, &field_map([("is_estop", FieldValue::Bool(true))]), 1)
            .unwrap();
        assert!(codec().decode("", &bytes[..bytes.len() - 1]).is_none());
        assert!(codec().decode("", b"E").is_none());
        assert!(codec().decode("", b"").is_none());
    }

    #[test]
    fn unknown_tag_is_ignored() {
        assert!(codec().decode("", b"ZZ\x00\x00\x00\x00").is_none());
    }

    #[test]
    fn outbound_tag_is_not_decoded_as_inbound() {
        let enc = codec().encode(&OutboundCommand::Estop { active: true }, 0).unwrap();
        assert!(codec().decode("", &enc.bytes).is_none());
    }

    #[test]
    fn trailing_bytes_are_ignored() {
        let mut bytes = codec()
            .encode_fields(Tag::RemoteEnabled, &field_map([("remote_enabled", FieldValue::Bool(true))]), 4)
            .unwrap();
        bytes.extend_from_slice(&[0xAA, 0xBB]);
        let frame = codec().decode("", &bytes).unwrap();
        assert_eq!(frame.seq, Some(4));
    }

    #[test]
    fn bool_byte_is_coerced() {
        let mut bytes = b"RE".to_vec();
        bytes.push(7);
        bytes.extend_from_slice(&0u16.to_le_bytes());
        let frame = codec().decode("", &bytes).unwrap();
        assert_eq!(frame.fields["remote_enabled"], FieldValue::Bool(true));
    }

    #[test]
    fn signed_mode_decodes() {
        let bytes = codec()
            .encode_fields(Tag::MuxStatus, &field_map([("requested_mode", FieldValue::Int(-1))]), 0)
            .unwrap();
        let frame = codec().decode("", &bytes).unwrap();
        assert_eq!(frame.fields["requested_mode"], FieldValue::Int(-1));
    }

    #[test]
    fn padded_mountpoint_is_stripped() {
        let fields = field_map([
            ("idx", FieldValue::Int(2)),
            ("mountpoint", FieldValue::Text("/data".into())),
            ("total_bytes", FieldValue::Int(1_000_000)),
            ("used_bytes", FieldValue::Int(250_000)),
            ("percent", FieldValue::Float(25.0)),
            ("accessible", FieldValue::Bool(true)),
        ]);
        let bytes = codec().encode_fields(Tag::DiskPartition, &fields, 0).unwrap();
        let frame = codec().decode("", &bytes).unwrap();
        assert_eq!(frame.fields["mountpoint"], FieldValue::Text("/data".into()));
        assert_eq!(frame.fields["idx"], FieldValue::Int(2));
    }

    #[test]
    fn oversized_text_is_rejected() {
        let fields = field_map([("name", FieldValue::Text("x".repeat(17)))]);
        assert!(codec().encode_fields(Tag::NetInterface, &fields, 0).is_err());
    }

    #[test]
    fn duplicate_and_out_of_order_sequences_decode() {
        let f = field_map([("is_estop", FieldValue::Bool(false))]);
        for seq in [5u16, 5, 3, 65535, 0] {
            let bytes = codec().encode_fields(Tag::EstopStatus, &f, seq).unwrap();
            assert_eq!(codec().decode("", &bytes).unwrap().seq, Some(seq));
        }
    }

    #[test]
    fn command_mode_encoding() {
        let enc = codec().encode(&OutboundCommand::CmdMode { mode: -1 }, 258).unwrap();
        assert_eq!(enc.key, "CM");
        assert_eq!(enc.bytes, vec![b'C', b'M', 0xFF, 0x02, 0x01]);
    }

    #[test]
    fn teleop_encoding_is_rounded() {
        let enc = codec()
            .encode(
                &OutboundCommand::Teleop {
                    linear_x: 0.45678,
                    angular_z: 0.0,
                },
                0,
            )
            .unwrap();
        let lx = f32::from_le_bytes(enc.bytes[2..6].try_into().unwrap());
        assert!((f64::from(lx) - 0.457).abs() < 1e-6);
    }
}
