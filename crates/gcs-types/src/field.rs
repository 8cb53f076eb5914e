//! Named-field updates exchanged between the wire codec and the state store.
//!
//! Both wire encodings decode into a [`FieldMap`]: a mapping from field name
//! to a loosely typed [`FieldValue`].  Merging a map into a record goes
//! through [`FieldMerge`], whose implementations carry an explicit whitelist
//! of settable names so an unknown or misspelled key can never create state.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A decoded field map, keyed by field name.
pub type FieldMap = BTreeMap<String, FieldValue>;

/// A single decoded field value.
///
/// Values are coerced on read: an integer is accepted where a boolean is
/// declared (`0` is `false`, anything else `true`), and an integer is
/// accepted where a float is declared.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl FieldValue {
    /// Numeric view of the value.  Booleans map to `0.0` / `1.0`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Float(v) => Some(*v),
            FieldValue::Int(v) => Some(*v as f64),
            FieldValue::Bool(v) => Some(if *v { 1.0 } else { 0.0 }),
            FieldValue::Text(_) => None,
        }
    }

    /// Integer view of the value.  Floats are accepted only when integral.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            FieldValue::Int(v) => Some(*v),
            FieldValue::Float(v) if v.fract() == 0.0 && v.is_finite() => Some(*v as i64),
            FieldValue::Bool(v) => Some(i64::from(*v)),
            _ => None,
        }
    }

    /// Boolean view of the value, coercing integers.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FieldValue::Bool(v) => Some(*v),
            FieldValue::Int(v) => Some(*v != 0),
            FieldValue::Float(v) if v.fract() == 0.0 => Some(*v != 0.0),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Non-negative integer view, used for byte counters and indices.
    pub fn as_u64(&self) -> Option<u64> {
        self.as_i64().and_then(|v| u64::try_from(v).ok())
    }
}

impl From<bool> for FieldValue {
    fn from(v: bool) -> Self {
        FieldValue::Bool(v)
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        FieldValue::Int(v)
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        FieldValue::Float(v)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        FieldValue::Text(v.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        FieldValue::Text(v)
    }
}

/// Build a [`FieldMap`] from `(name, value)` pairs.
///
/// ```
/// use gcs_types::field::{field_map, FieldValue};
///
/// let fields = field_map([("final_lx", FieldValue::Float(0.2))]);
/// assert_eq!(fields.len(), 1);
/// ```
pub fn field_map<I, K>(pairs: I) -> FieldMap
where
    I: IntoIterator<Item = (K, FieldValue)>,
    K: Into<String>,
{
    pairs.into_iter().map(|(k, v)| (k.into(), v)).collect()
}

// ────────────────────────────────────────────────────────────────────────────
// FieldMerge
// ────────────────────────────────────────────────────────────────────────────

/// A record whose fields can be overwritten by name.
///
/// Implementations list every settable name in [`FieldMerge::FIELDS`] and
/// match on exactly those names in [`FieldMerge::set_field`].  Names outside
/// the whitelist, and values of an incompatible type, are ignored.
pub trait FieldMerge {
    /// Whitelisted field names.
    const FIELDS: &'static [&'static str];

    /// Overwrite the field called `name`.  Returns `true` when the field was
    /// written.
    fn set_field(&mut self, name: &str, value: &FieldValue) -> bool;

    /// `true` when `name` is on the whitelist.
    fn accepts(name: &str) -> bool {
        Self::FIELDS.contains(&name)
    }

    /// Overwrite every whitelisted field present in `fields`.
    ///
    /// Returns the number of fields written.
    fn merge(&mut self, fields: &FieldMap) -> usize {
        fields
            .iter()
            .filter(|(name, _)| Self::accepts(name))
            .filter(|(name, value)| self.set_field(name, value))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_coerces_to_bool() {
        assert_eq!(FieldValue::Int(0).as_bool(), Some(false));
        assert_eq!(FieldValue::Int(3).as_bool(), Some(true));
        assert_eq!(FieldValue::Text("1".into()).as_bool(), None);
    }

    #[test]
    fn non_integral_float_is_not_an_integer() {
        assert_eq!(FieldValue::Float(2.0).as_i64(), Some(2));
        assert_eq!(FieldValue::Float(2.5).as_i64(), None);
    }

    #[test]
    fn negative_is_not_unsigned() {
        assert_eq!(FieldValue::Int(-1).as_u64(), None);
        assert_eq!(FieldValue::Int(7).as_u64(), Some(7));
    }

    #[test]
    fn untagged_json_roundtrip() {
        let fields = field_map([
            ("a", FieldValue::Bool(true)),
            ("b", FieldValue::Int(4)),
            ("c", FieldValue::Float(0.5)),
            ("d", FieldValue::Text("eth0".into())),
        ]);
        let json = serde_json::to_string(&fields).unwrap();
        let back: FieldMap = serde_json::from_str(&json).unwrap();
        assert_eq!(fields, back);
    }
}
