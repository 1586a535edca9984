//! Config Value - heterogeneous configuration tree used as fingerprint input

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt::Write as _;

/// Tag key of an encoded callable: `{"$callable": IDENTITY}`.
const CALLABLE_TAG: &str = "$callable";
/// Tag key of an encoded non-finite float: `{"$float": "NaN" | "inf" | "-inf"}`.
const FLOAT_TAG: &str = "$float";
/// Map keys beginning with this are escaped by doubling it, so tags stay unforgeable.
const TAG_SIGIL: char = '$';

/// A configuration value: mappings, lists, primitives, and identified callables.
///
/// Maps are always key-sorted (`BTreeMap`), so two maps built in a different
/// insertion order are equal and serialize identically.
///
/// ## Callables
///
/// A callable (for example a custom metric function) is represented only by the
/// identity string its owner supplies. The identity is what makes two callables
/// "the same" across processes; memory addresses never take part.
///
/// ## Tagged forms
///
/// Callables and non-finite floats have no JSON literal, so they are written as
/// single-key objects (`{"$callable":"f1"}`, `{"$float":"NaN"}`). User map keys that
/// start with `$` are written with the `$` doubled, so no string or map can take the
/// shape of a tag.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValue {
    /// Absent value
    Null,
    /// Boolean flag
    Bool(bool),
    /// Integer (kept distinct from floats)
    Int(i64),
    /// Floating point number
    Float(f64),
    /// String
    Str(String),
    /// Ordered list
    List(Vec<ConfigValue>),
    /// Key-sorted mapping
    Map(BTreeMap<String, ConfigValue>),
    /// Callable, identified by a stable user-supplied identity
    Callable {
        /// Stable identity (name or source digest) of the callable
        identity: String,
    },
}

impl ConfigValue {
    /// Build a map value from `(key, value)` pairs in any order.
    pub fn map<K, V, I>(entries: I) -> Self
    where
        K: Into<String>,
        V: Into<Self>,
        I: IntoIterator<Item = (K, V)>,
    {
        Self::Map(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Build a callable value from its identity.
    pub fn callable(identity: impl Into<String>) -> Self {
        Self::Callable {
            identity: identity.into(),
        }
    }

    /// Numeric view: integers are widened to `f64`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(v) => Some(*v as f64),
            Self::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// Integer view: floats are accepted only when integral.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            Self::Float(v) if v.is_finite() && v.fract() == 0.0 => Some(*v as i64),
            _ => None,
        }
    }

    /// String view.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Boolean view.
    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Map view.
    #[must_use]
    pub const fn as_map(&self) -> Option<&BTreeMap<String, Self>> {
        match self {
            Self::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Write the canonical serialization of this value into `out`.
    ///
    /// Compact JSON with sorted keys. Floats use the shortest round-trip form and always
    /// carry a fractional part or exponent, so `5` and `5.0` stay distinct. Callables and
    /// non-finite floats use their tagged forms.
    pub fn write_canonical(&self, out: &mut String) {
        match self {
            Self::Null => out.push_str("null"),
            Self::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
            Self::Int(v) => {
                let _ = write!(out, "{v}");
            }
            Self::Float(v) => write_float(*v, out),
            Self::Str(s) => write_str(s, out),
            Self::List(items) => {
                out.push('[');
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        out.push(',');
                    }
                    item.write_canonical(out);
                }
                out.push(']');
            }
            Self::Map(entries) => {
                out.push('{');
                for (i, (key, value)) in entries.iter().enumerate() {
                    if i > 0 {
                        out.push(',');
                    }
                    write_str(&escape_key(key), out);
                    out.push(':');
                    value.write_canonical(out);
                }
                out.push('}');
            }
            Self::Callable { identity } => write_tagged(CALLABLE_TAG, identity, out),
        }
    }

    /// Canonical serialization as an owned string.
    #[must_use]
    pub fn to_canonical_string(&self) -> String {
        let mut out = String::new();
        self.write_canonical(&mut out);
        out
    }

    /// Convert to a `serde_json::Value` (callables and non-finite floats become tagged objects).
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value;
        match self {
            Self::Null => Value::Null,
            Self::Bool(b) => Value::Bool(*b),
            Self::Int(v) => Value::from(*v),
            Self::Float(v) => serde_json::Number::from_f64(*v)
                .map_or_else(|| tagged_json(FLOAT_TAG, non_finite_label(*v)), Value::Number),
            Self::Str(s) => Value::String(s.clone()),
            Self::List(items) => Value::Array(items.iter().map(Self::to_json).collect()),
            Self::Map(entries) => Value::Object(
                entries
                    .iter()
                    .map(|(k, v)| (escape_key(k), v.to_json()))
                    .collect(),
            ),
            Self::Callable { identity } => tagged_json(CALLABLE_TAG, identity),
        }
    }
}

fn write_str(s: &str, out: &mut String) {
    // serde_json's string escaping is deterministic and valid JSON
    match serde_json::to_string(s) {
        Ok(escaped) => out.push_str(&escaped),
        Err(_) => {
            out.push('"');
            out.push_str(s);
            out.push('"');
        }
    }
}

fn write_float(v: f64, out: &mut String) {
    if v.is_finite() {
        // -0.0 and 0.0 compare equal; normalize so they hash alike
        let v = if v == 0.0 { 0.0 } else { v };
        let _ = write!(out, "{v:?}");
    } else {
        write_tagged(FLOAT_TAG, non_finite_label(v), out);
    }
}

fn write_tagged(tag: &str, value: &str, out: &mut String) {
    out.push('{');
    write_str(tag, out);
    out.push(':');
    write_str(value, out);
    out.push('}');
}

fn tagged_json(tag: &str, value: &str) -> serde_json::Value {
    serde_json::Value::Object(
        std::iter::once((tag.to_string(), serde_json::Value::String(value.to_string()))).collect(),
    )
}

fn escape_key(key: &str) -> String {
    if key.starts_with(TAG_SIGIL) {
        format!("{TAG_SIGIL}{key}")
    } else {
        key.to_string()
    }
}

fn unescape_key(key: String) -> String {
    match key.strip_prefix(TAG_SIGIL) {
        Some(rest) if rest.starts_with(TAG_SIGIL) => rest.to_string(),
        _ => key,
    }
}

fn parse_non_finite(label: &str) -> Option<f64> {
    match label {
        "NaN" => Some(f64::NAN),
        "inf" => Some(f64::INFINITY),
        "-inf" => Some(f64::NEG_INFINITY),
        _ => None,
    }
}

/// Decode a single-key tagged object, if `entries` is one.
fn from_tagged(entries: &serde_json::Map<String, serde_json::Value>) -> Option<ConfigValue> {
    if entries.len() != 1 {
        return None;
    }
    let (tag, value) = entries.iter().next()?;
    let label = value.as_str()?;
    match tag.as_str() {
        CALLABLE_TAG => Some(ConfigValue::callable(label)),
        FLOAT_TAG => parse_non_finite(label).map(ConfigValue::Float),
        _ => None,
    }
}

fn non_finite_label(v: f64) -> &'static str {
    if v.is_nan() {
        "NaN"
    } else if v.is_sign_positive() {
        "inf"
    } else {
        "-inf"
    }
}

impl From<serde_json::Value> for ConfigValue {
    fn from(value: serde_json::Value) -> Self {
        use serde_json::Value;
        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(b),
            Value::Number(n) => n
                .as_i64()
                .map_or_else(|| Self::Float(n.as_f64().unwrap_or(f64::NAN)), Self::Int),
            Value::String(s) => Self::Str(s),
            Value::Array(items) => Self::List(items.into_iter().map(Self::from).collect()),
            Value::Object(entries) => from_tagged(&entries).unwrap_or_else(|| {
                Self::Map(
                    entries
                        .into_iter()
                        .map(|(k, v)| (unescape_key(k), Self::from(v)))
                        .collect(),
                )
            }),
        }
    }
}

impl From<bool> for ConfigValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i32> for ConfigValue {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<i64> for ConfigValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<u32> for ConfigValue {
    fn from(v: u32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<u64> for ConfigValue {
    #[allow(clippy::cast_precision_loss)]
    fn from(v: u64) -> Self {
        i64::try_from(v).map_or(Self::Float(v as f64), Self::Int)
    }
}

impl From<usize> for ConfigValue {
    #[allow(clippy::cast_precision_loss)]
    fn from(v: usize) -> Self {
        i64::try_from(v).map_or(Self::Float(v as f64), Self::Int)
    }
}

impl From<f64> for ConfigValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for ConfigValue {
    fn from(v: &str) -> Self {
        Self::Str(v.to_string())
    }
}

impl From<String> for ConfigValue {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}

impl<T: Into<Self>> From<Option<T>> for ConfigValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

impl<T: Into<Self>> From<Vec<T>> for ConfigValue {
    fn from(v: Vec<T>) -> Self {
        Self::List(v.into_iter().map(Into::into).collect())
    }
}

impl From<BTreeMap<String, Self>> for ConfigValue {
    fn from(v: BTreeMap<String, Self>) -> Self {
        Self::Map(v)
    }
}

/// Strings display bare; everything else displays in canonical form.
impl std::fmt::Display for ConfigValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Str(s) => f.write_str(s),
            other => f.write_str(&other.to_canonical_string()),
        }
    }
}

impl Serialize for ConfigValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ConfigValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        serde_json::Value::deserialize(deserializer).map(Self::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_sorts_keys() {
        let a = ConfigValue::map([("n_splits", 5), ("n_repeats", 2), ("random_state", 32)]);
        let b = ConfigValue::map([("random_state", 32), ("n_splits", 5), ("n_repeats", 2)]);
        assert_eq!(a.to_canonical_string(), b.to_canonical_string());
        assert_eq!(
            a.to_canonical_string(),
            r#"{"n_repeats":2,"n_splits":5,"random_state":32}"#
        );
    }

    #[test]
    fn test_int_and_float_stay_distinct() {
        assert_eq!(ConfigValue::Int(5).to_canonical_string(), "5");
        assert_eq!(ConfigValue::Float(5.0).to_canonical_string(), "5.0");
    }

    #[test]
    fn test_non_finite_floats() {
        assert_eq!(
            ConfigValue::Float(f64::NAN).to_canonical_string(),
            r#"{"$float":"NaN"}"#
        );
        assert_eq!(
            ConfigValue::Float(f64::NEG_INFINITY).to_canonical_string(),
            r#"{"$float":"-inf"}"#
        );
        assert_ne!(
            ConfigValue::Float(f64::INFINITY).to_canonical_string(),
            ConfigValue::from("inf").to_canonical_string()
        );
    }

    #[test]
    fn test_callable_round_trip_through_json() {
        let value = ConfigValue::callable("f1_micro");
        let json = serde_json::to_string(&value).unwrap();
        assert_eq!(json, r#"{"$callable":"f1_micro"}"#);
        let back: ConfigValue = serde_json::from_str(&json).unwrap();
        assert_eq!(back, value);
    }

    #[test]
    fn test_strings_never_decode_as_callables() {
        let value = ConfigValue::from("<callable:f1_micro>");
        let back: ConfigValue = serde_json::from_str(&serde_json::to_string(&value).unwrap()).unwrap();
        assert_eq!(back, value);
        assert_ne!(
            value.to_canonical_string(),
            ConfigValue::callable("f1_micro").to_canonical_string()
        );
    }

    #[test]
    fn test_dollar_keys_cannot_forge_tags() {
        let forged = ConfigValue::map([("$callable", "f1_micro")]);
        assert_eq!(forged.to_canonical_string(), r#"{"$$callable":"f1_micro"}"#);
        assert_ne!(
            forged.to_canonical_string(),
            ConfigValue::callable("f1_micro").to_canonical_string()
        );

        let back: ConfigValue = serde_json::from_str(&serde_json::to_string(&forged).unwrap()).unwrap();
        assert_eq!(back, forged);
    }

    #[test]
    fn test_non_finite_round_trip_through_json() {
        let value = ConfigValue::map([("alpha", f64::INFINITY)]);
        let back: ConfigValue = serde_json::from_str(&serde_json::to_string(&value).unwrap()).unwrap();
        assert_eq!(back, value);
    }

    #[test]
    fn test_from_json_preserves_number_kinds() {
        let value = ConfigValue::from(serde_json::json!({"a": 1, "b": 1.5}));
        let map = value.as_map().unwrap();
        assert_eq!(map["a"], ConfigValue::Int(1));
        assert_eq!(map["b"], ConfigValue::Float(1.5));
    }

    #[test]
    fn test_as_i64_rejects_fractional() {
        assert_eq!(ConfigValue::Float(3.0).as_i64(), Some(3));
        assert_eq!(ConfigValue::Float(3.5).as_i64(), None);
    }
}
