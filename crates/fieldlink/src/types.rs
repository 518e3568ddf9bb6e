// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! The closed set of wire value types.
//!
//! Every signal and slot carries exactly one of six value types. The pairing
//! of a logical name with a type tag is the cross-process identity: two
//! endpoints with the same logical name but different types are distinct and
//! never connectable to each other.

use serde::{Deserialize, Serialize};

/// Runtime tag for the closed set of supported value types.
///
/// `Unknown` is the explicit none-of-the-above variant: unrecognized tags
/// from configuration decode to it instead of failing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeTag {
    Unknown,
    Bool,
    Int,
    Uint,
    Double,
    String,
    Json,
}

impl TypeTag {
    /// Canonical type name used in name mangling and on the wire.
    ///
    /// These strings are part of the cross-process identity and must never
    /// change.
    pub const fn type_name(self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Bool => "bool",
            Self::Int => "int",
            Self::Uint => "uint",
            Self::Double => "double",
            Self::String => "string",
            Self::Json => "json",
        }
    }

    /// Parse a canonical type name. Anything unrecognized maps to `Unknown`.
    pub fn from_type_name(name: &str) -> Self {
        match name {
            "bool" => Self::Bool,
            "int" => Self::Int,
            "uint" => Self::Uint,
            "double" => Self::Double,
            "string" => Self::String,
            "json" => Self::Json,
            _ => Self::Unknown,
        }
    }
}

impl std::fmt::Display for TypeTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.type_name())
    }
}

/// Mangled endpoint identity: `<logical_name>@<type_name>`.
///
/// This string is what gets registered with the hub, matched against for
/// connections, and used to derive data-plane socket addresses.
pub fn full_name(logical_name: &str, tag: TypeTag) -> String {
    format!("{}@{}", logical_name, tag.type_name())
}

/// Split a mangled full name back into `(logical_name, tag)`.
///
/// A name without a `@` separator yields the whole string and `Unknown`.
pub fn split_full_name(full: &str) -> (&str, TypeTag) {
    match full.rsplit_once('@') {
        Some((logical, type_name)) => (logical, TypeTag::from_type_name(type_name)),
        None => (full, TypeTag::Unknown),
    }
}

/// A runtime-typed value, the tagged-union form of the six wire types.
///
/// Serializes to the self-describing JSON form used on the data plane and
/// the mirror bus: `{"type":"double","value":21.5}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum Value {
    Bool(bool),
    Int(i64),
    Uint(u64),
    Double(f64),
    String(String),
    Json(serde_json::Value),
}

impl Value {
    /// The tag corresponding to this value's variant.
    pub fn tag(&self) -> TypeTag {
        match self {
            Self::Bool(_) => TypeTag::Bool,
            Self::Int(_) => TypeTag::Int,
            Self::Uint(_) => TypeTag::Uint,
            Self::Double(_) => TypeTag::Double,
            Self::String(_) => TypeTag::String,
            Self::Json(_) => TypeTag::Json,
        }
    }

    /// Reject values with no faithful wire form.
    ///
    /// JSON cannot represent a non-finite double; serde_json emits `null`
    /// for it, which every receiver then rejects as malformed. Catching it
    /// at the send site keeps the sender's cache and the mirror in step.
    pub fn check_wire_safe(&self) -> Result<(), crate::error::Error> {
        if let Self::Double(v) = self {
            if !v.is_finite() {
                return Err(crate::error::Error::Serialization(format!(
                    "non-finite double {} has no wire form",
                    v
                )));
            }
        }
        Ok(())
    }

    /// Encode to the self-describing JSON wire form.
    pub fn encode(&self) -> Vec<u8> {
        // Tagged enum over plain JSON types cannot fail to serialize
        // (non-finite doubles are refused before this point).
        serde_json::to_vec(self).unwrap_or_default()
    }

    /// Decode from the wire form.
    pub fn decode(data: &[u8]) -> Result<Self, crate::error::Error> {
        serde_json::from_slice(data)
            .map_err(|e| crate::error::Error::Serialization(e.to_string()))
    }
}

/// Compile-time binding from a native representation to its type tag.
///
/// Implemented for exactly the six supported types; the set is closed.
pub trait Typed: Clone + Send + 'static {
    /// The runtime tag for this representation.
    const TAG: TypeTag;

    /// Wrap into the runtime-typed form.
    fn into_value(self) -> Value;

    /// Unwrap from the runtime-typed form; `None` on a tag mismatch.
    fn from_value(value: Value) -> Option<Self>;
}

impl Typed for bool {
    const TAG: TypeTag = TypeTag::Bool;

    fn into_value(self) -> Value {
        Value::Bool(self)
    }

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Bool(v) => Some(v),
            _ => None,
        }
    }
}

impl Typed for i64 {
    const TAG: TypeTag = TypeTag::Int;

    fn into_value(self) -> Value {
        Value::Int(self)
    }

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Int(v) => Some(v),
            _ => None,
        }
    }
}

impl Typed for u64 {
    const TAG: TypeTag = TypeTag::Uint;

    fn into_value(self) -> Value {
        Value::Uint(self)
    }

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Uint(v) => Some(v),
            _ => None,
        }
    }
}

impl Typed for f64 {
    const TAG: TypeTag = TypeTag::Double;

    fn into_value(self) -> Value {
        Value::Double(self)
    }

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Double(v) => Some(v),
            _ => None,
        }
    }
}

impl Typed for String {
    const TAG: TypeTag = TypeTag::String;

    fn into_value(self) -> Value {
        Value::String(self)
    }

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::String(v) => Some(v),
            _ => None,
        }
    }
}

impl Typed for serde_json::Value {
    const TAG: TypeTag = TypeTag::Json;

    fn into_value(self) -> Value {
        Value::Json(self)
    }

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Json(v) => Some(v),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_names_stable() {
        assert_eq!(TypeTag::Bool.type_name(), "bool");
        assert_eq!(TypeTag::Int.type_name(), "int");
        assert_eq!(TypeTag::Uint.type_name(), "uint");
        assert_eq!(TypeTag::Double.type_name(), "double");
        assert_eq!(TypeTag::String.type_name(), "string");
        assert_eq!(TypeTag::Json.type_name(), "json");
        assert_eq!(TypeTag::Unknown.type_name(), "unknown");
    }

    #[test]
    fn test_from_type_name_unrecognized_is_unknown() {
        assert_eq!(TypeTag::from_type_name("double"), TypeTag::Double);
        assert_eq!(TypeTag::from_type_name("float128"), TypeTag::Unknown);
        assert_eq!(TypeTag::from_type_name(""), TypeTag::Unknown);
    }

    #[test]
    fn test_full_name_deterministic() {
        let a = full_name("temperature_reading", TypeTag::Double);
        let b = full_name("temperature_reading", TypeTag::Double);
        assert_eq!(a, b);
        assert_eq!(a, "temperature_reading@double");
    }

    #[test]
    fn test_full_name_distinct_per_tag() {
        let as_double = full_name("level", TypeTag::Double);
        let as_int = full_name("level", TypeTag::Int);
        assert_ne!(as_double, as_int);
    }

    #[test]
    fn test_split_full_name() {
        let (logical, tag) = split_full_name("sensor_1@double");
        assert_eq!(logical, "sensor_1");
        assert_eq!(tag, TypeTag::Double);

        let (logical, tag) = split_full_name("no_separator");
        assert_eq!(logical, "no_separator");
        assert_eq!(tag, TypeTag::Unknown);
    }

    #[test]
    fn test_value_wire_form() {
        let encoded = Value::Double(21.5).encode();
        let json = std::str::from_utf8(&encoded).unwrap();
        assert_eq!(json, r#"{"type":"double","value":21.5}"#);

        let decoded = Value::decode(&encoded).unwrap();
        assert_eq!(decoded, Value::Double(21.5));
    }

    #[test]
    fn test_nonfinite_doubles_refused() {
        assert!(Value::Double(f64::NAN).check_wire_safe().is_err());
        assert!(Value::Double(f64::INFINITY).check_wire_safe().is_err());
        assert!(Value::Double(f64::NEG_INFINITY).check_wire_safe().is_err());
        assert!(Value::Double(21.5).check_wire_safe().is_ok());
        assert!(Value::Int(i64::MIN).check_wire_safe().is_ok());
    }

    #[test]
    fn test_value_decode_malformed() {
        // The `null` a lossy encoder would produce for NaN must not decode.
        assert!(Value::decode(br#"{"type":"double","value":null}"#).is_err());
        assert!(Value::decode(b"not json").is_err());
        assert!(Value::decode(br#"{"type":"float128","value":1}"#).is_err());
    }

    #[test]
    fn test_typed_round_trip() {
        assert_eq!(f64::from_value(21.5f64.into_value()), Some(21.5));
        assert_eq!(bool::from_value(Value::Double(1.0)), None);
        assert_eq!(
            String::from_value(Value::String("box".into())),
            Some("box".to_string())
        );
    }

    #[test]
    fn test_value_tag_matches_typed_tag() {
        assert_eq!(Value::Bool(true).tag(), bool::TAG);
        assert_eq!(Value::Int(-3).tag(), i64::TAG);
        assert_eq!(Value::Uint(3).tag(), u64::TAG);
        assert_eq!(Value::Double(0.5).tag(), f64::TAG);
        assert_eq!(Value::String("x".into()).tag(), String::TAG);
        assert_eq!(
            Value::Json(serde_json::json!({"a": 1})).tag(),
            serde_json::Value::TAG
        );
    }
}
