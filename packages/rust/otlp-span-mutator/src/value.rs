//! Typed attribute values and their canonical string form.
//!
//! OTLP attribute values carry more kinds than the processor understands
//! (arrays, key/value lists, bytes). [`TypedValue`] is the subset it can
//! configure, compare and stringify: strings, booleans, doubles and integers.
//!
//! Stringification is locale independent:
//!
//! | Kind   | Rendering                                  |
//! |--------|--------------------------------------------|
//! | String | verbatim                                   |
//! | Bool   | `true` / `false`                           |
//! | Double | shortest round-trip decimal, no exponent   |
//! | Int    | base 10                                    |

use opentelemetry_proto::tonic::common::v1::{any_value, AnyValue};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A scalar attribute value.
///
/// Deserializes from an untagged YAML/JSON scalar, so configuration literals
/// keep the type they were written with (`200` is an integer, `"200"` a string).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TypedValue {
    Bool(bool),
    Int(i64),
    Double(f64),
    String(String),
}

impl TypedValue {
    /// Reads the scalar out of an OTLP value, if it holds one of the four known kinds.
    pub fn from_any_value(value: &AnyValue) -> Option<Self> {
        value.value.as_ref().and_then(Self::from_kind)
    }

    /// Same as [`TypedValue::from_any_value`] for an already unwrapped value kind.
    pub fn from_kind(kind: &any_value::Value) -> Option<Self> {
        match kind {
            any_value::Value::StringValue(s) => Some(TypedValue::String(s.clone())),
            any_value::Value::BoolValue(b) => Some(TypedValue::Bool(*b)),
            any_value::Value::DoubleValue(d) => Some(TypedValue::Double(*d)),
            any_value::Value::IntValue(i) => Some(TypedValue::Int(*i)),
            _ => None,
        }
    }
}

impl fmt::Display for TypedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypedValue::String(s) => f.write_str(s),
            TypedValue::Bool(b) => write!(f, "{}", b),
            TypedValue::Int(i) => write!(f, "{}", i),
            TypedValue::Double(d) => format_double(*d, f),
        }
    }
}

fn format_double(d: f64, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if d.is_nan() {
        f.write_str("NaN")
    } else if d.is_infinite() {
        f.write_str(if d.is_sign_positive() { "+Inf" } else { "-Inf" })
    } else {
        // f64's Display is the shortest representation that round-trips and never
        // switches to exponent notation.
        write!(f, "{}", d)
    }
}

impl From<TypedValue> for AnyValue {
    fn from(value: TypedValue) -> Self {
        let kind = match value {
            TypedValue::String(s) => any_value::Value::StringValue(s),
            TypedValue::Bool(b) => any_value::Value::BoolValue(b),
            TypedValue::Double(d) => any_value::Value::DoubleValue(d),
            TypedValue::Int(i) => any_value::Value::IntValue(i),
        };
        AnyValue { value: Some(kind) }
    }
}

impl From<&str> for TypedValue {
    fn from(value: &str) -> Self {
        TypedValue::String(value.to_string())
    }
}

impl From<String> for TypedValue {
    fn from(value: String) -> Self {
        TypedValue::String(value)
    }
}

impl From<bool> for TypedValue {
    fn from(value: bool) -> Self {
        TypedValue::Bool(value)
    }
}

impl From<i64> for TypedValue {
    fn from(value: i64) -> Self {
        TypedValue::Int(value)
    }
}

impl From<f64> for TypedValue {
    fn from(value: f64) -> Self {
        TypedValue::Double(value)
    }
}
