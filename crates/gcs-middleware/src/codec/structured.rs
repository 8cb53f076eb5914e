//! JSON messages keyed by pub/sub topic.
//!
//! Inbound topics are `<prefix>/vehicle/<name>`, outbound
//! `<prefix>/gcs/<name>`, with `<name>` from [`Tag::topic_name`].  Values
//! are coerced to the tag's declared field kinds, so a vehicle that sends
//! `1` for a boolean or `2` for a float is understood.

use gcs_types::{FieldMap, FieldValue, GcsError};
use serde_json::{Map, Value};
use tracing::trace;

use super::{Encoded, FieldKind, Frame, OutboundCommand, Tag, WireCodec};

#[derive(Debug, Clone)]
pub struct StructuredCodec {
    prefix: String,
}

impl Default for StructuredCodec {
    fn default() -> Self {
        Self::new("nev")
    }
}

impl StructuredCodec {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn inbound_topic(&self, tag: Tag) -> String {
        format!("{}/vehicle/{}", self.prefix, tag.topic_name())
    }

    pub fn outbound_topic(&self, tag: Tag) -> String {
        format!("{}/gcs/{}", self.prefix, tag.topic_name())
    }

    fn tag_for_topic(&self, topic: &str) -> Option<Tag> {
        let name = topic
            .strip_prefix(self.prefix.as_str())?
            .strip_prefix("/vehicle/")?;
        Tag::INBOUND.into_iter().find(|t| t.topic_name() == name)
    }

    fn decode_message(&self, topic: &str, bytes: &[u8]) -> Result<Frame, GcsError> {
        let tag = self
            .tag_for_topic(topic)
            .ok_or_else(|| GcsError::Codec(format!("unknown topic {topic}")))?;
        let value: Value =
            serde_json::from_slice(bytes).map_err(|e| GcsError::Codec(e.to_string()))?;

        let (object, array) = match (&value, tag.entry_source()) {
            (Value::Array(items), Some((None, _))) => (None, Some(items)),
            (Value::Object(obj), Some((Some(key), _))) => {
                (Some(obj), obj.get(key).and_then(Value::as_array))
            }
            (Value::Object(obj), _) => (Some(obj), None),
            _ => return Err(GcsError::Codec(format!("unexpected payload shape on {topic}"))),
        };

        let fields = object.map(|o| coerce(tag, o)).unwrap_or_default();
        let seq = object
            .and_then(|o| o.get("seq"))
            .and_then(Value::as_u64)
            .and_then(|s| u16::try_from(s).ok());

        let entries = match (array, tag.entry_source()) {
            (Some(items), Some((_, entry_tag))) => items
                .iter()
                .filter_map(Value::as_object)
                .map(|o| coerce(entry_tag, o))
                .collect(),
            _ => Vec::new(),
        };

        Ok(Frame {
            tag,
            seq,
            fields,
            entries,
        })
    }
}

/// Pick the tag's declared fields out of `obj`, converting each to its
/// declared kind.  Absent or unconvertible values are skipped.
fn coerce(tag: Tag, obj: &Map<String, Value>) -> FieldMap {
    tag.layout()
        .iter()
        .filter_map(|spec| {
            let raw = obj.get(spec.name)?;
            convert(spec.kind, raw).map(|v| (spec.name.to_string(), v))
        })
        .collect()
}

fn convert(kind: FieldKind, raw: &Value) -> Option<FieldValue> {
    match kind {
        FieldKind::Bool => match raw {
            Value::Bool(b) => Some(FieldValue::Bool(*b)),
            Value::Number(n) => n.as_f64().map(|v| FieldValue::Bool(v != 0.0)),
            _ => None,
        },
        FieldKind::U8 | FieldKind::I8 | FieldKind::U16 | FieldKind::U32 | FieldKind::U64 => {
            match raw {
                Value::Number(n) => n
                    .as_i64()
                    .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64))
                    .map(FieldValue::Int),
                Value::Bool(b) => Some(FieldValue::Int(i64::from(*b))),
                _ => None,
            }
        }
        FieldKind::F32 | FieldKind::F64 => raw.as_f64().map(FieldValue::Float),
        FieldKind::Text(_) => raw.as_str().map(|s| FieldValue::Text(s.to_string())),
    }
}

impl WireCodec for StructuredCodec {
    fn name(&self) -> &'static str {
        "structured"
    }

    fn decode(&self, key: &str, bytes: &[u8]) -> Option<Frame> {
        match self.decode_message(key, bytes) {
            Ok(frame) => Some(frame),
            Err(e) => {
                trace!(topic = key, error = %e, "dropping structured message");
                None
            }
        }
    }

    fn encode(&self, command: &OutboundCommand, seq: u16) -> Result<Encoded, GcsError> {
        let mut body = Map::new();
        for (name, value) in command.fields() {
            let json = serde_json::to_value(value).map_err(|e| GcsError::Codec(e.to_string()))?;
            body.insert(name, json);
        }
        body.insert("seq".to_string(), Value::from(seq));
        let bytes = serde_json::to_vec(&Value::Object(body))
            .map_err(|e| GcsError::Serialization(e.to_string()))?;
        Ok(Encoded {
            key: self.outbound_topic(command.tag()),
            bytes,
        })
    }

    fn inbound_keys(&self) -> Vec<String> {
        Tag::INBOUND.iter().map(|t| self.inbound_topic(*t)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn codec() -> StructuredCodec {
        StructuredCodec::default()
    }

    fn decode(topic: &str, value: Value) -> Option<Frame> {
        codec().decode(topic, &serde_json::to_vec(&value).unwrap())
    }

    #[test]
    fn mux_decodes_with_bool_coercion() {
        let frame = decode(
            "nev/vehicle/mux",
            json!({"requested_mode": 2, "remote_enabled": 1, "teleop_active": 0, "seq": 17}),
        )
        .unwrap();
        assert_eq!(frame.tag, Tag::MuxStatus);
        assert_eq!(frame.seq, Some(17));
        assert_eq!(frame.fields["remote_enabled"], FieldValue::Bool(true));
        assert_eq!(frame.fields["teleop_active"], FieldValue::Bool(false));
        assert_eq!(frame.fields["requested_mode"], FieldValue::Int(2));
    }

    #[test]
    fn integer_float_is_accepted() {
        let frame = decode("nev/vehicle/twist", json!({"final_lx": 1})).unwrap();
        assert_eq!(frame.fields["final_lx"], FieldValue::Float(1.0));
    }

    #[test]
    fn gpu_array_becomes_entries() {
        let frame = decode(
            "nev/vehicle/gpu",
            json!([{"idx": 0, "gpu_usage": 12.5}, {"idx": 1, "gpu_temp": 61}]),
        )
        .unwrap();
        assert!(frame.fields.is_empty());
        assert_eq!(frame.entries.len(), 2);
        assert_eq!(frame.entries[1]["idx"], FieldValue::Int(1));
        assert_eq!(frame.entries[1]["gpu_temp"], FieldValue::Float(61.0));
    }

    #[test]
    fn net_carries_counts_and_interfaces() {
        let frame = decode(
            "nev/vehicle/net",
            json!({
                "net_total_ifaces": 3, "net_active_ifaces": 2, "net_down_ifaces": 1,
                "interfaces": [{"idx": 0, "name": "eth0", "is_up": true, "speed_mbps": 1000}]
            }),
        )
        .unwrap();
        assert_eq!(frame.fields["net_total_ifaces"], FieldValue::Int(3));
        assert_eq!(frame.entries[0]["name"], FieldValue::Text("eth0".into()));
    }

    #[test]
    fn unknown_topic_and_garbage_are_dropped() {
        assert!(decode("nev/vehicle/lidar", json!({})).is_none());
        assert!(decode("other/vehicle/mux", json!({})).is_none());
        assert!(codec().decode("nev/vehicle/mux", b"{not json").is_none());
        assert!(decode("nev/vehicle/mux", json!([1, 2])).is_none());
    }

    #[test]
    fn unknown_fields_are_not_forwarded() {
        let frame = decode("nev/vehicle/estop", json!({"is_estop": true, "extra": 5})).unwrap();
        assert_eq!(frame.fields.len(), 1);
    }

    #[test]
    fn encode_teleop_on_outbound_topic() {
        let enc = codec()
            .encode(
                &OutboundCommand::Teleop {
                    linear_x: 0.12345,
                    angular_z: -0.5,
                },
                42,
            )
            .unwrap();
        assert_eq!(enc.key, "nev/gcs/teleop");
        let v: Value = serde_json::from_slice(&enc.bytes).unwrap();
        assert_eq!(v, json!({"linear_x": 0.123, "angular_z": -0.5, "seq": 42}));
    }

    #[test]
    fn inbound_keys_cover_every_tag() {
        let keys = codec().inbound_keys();
        assert_eq!(keys.len(), Tag::INBOUND.len());
        assert!(keys.contains(&"nev/vehicle/disk_io".to_string()));
    }

    #[test]
    fn custom_prefix() {
        let c = StructuredCodec::new("fleet7");
        assert_eq!(c.outbound_topic(Tag::CmdMode), "fleet7/gcs/cmd_mode");
        let frame = c.decode("fleet7/vehicle/remote", br#"{"remote_enabled": true}"#);
        assert_eq!(frame.unwrap().tag, Tag::RemoteEnabled);
    }
}
