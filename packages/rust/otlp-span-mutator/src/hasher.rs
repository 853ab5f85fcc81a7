//! One-way redaction of attribute values.
//!
//! The value is stringified with the [`TypedValue`] rules, digested with
//! SHA-256 and stored back as a lowercase hex string. Values that have no
//! string form (missing, arrays, key/value lists, bytes) are replaced by the
//! empty string.

use crate::attributes::AttributeMap;
use crate::value::TypedValue;
use opentelemetry_proto::tonic::common::v1::AnyValue;
use sha2::{Digest, Sha256};

/// Name and version of the digest written by [`hash_attribute`].
pub const HASH_ALGORITHM: &str = "sha256";

/// Digest of a value's string form, hex encoded.
pub fn digest(value: Option<&AnyValue>) -> String {
    match value.and_then(TypedValue::from_any_value) {
        Some(typed) => {
            let mut hasher = Sha256::new();
            hasher.update(typed.to_string().as_bytes());
            hex::encode(hasher.finalize())
        }
        None => String::new(),
    }
}

/// Replaces the value of `key` with its digest. Missing keys are left alone.
pub fn hash_attribute(attrs: &mut AttributeMap<'_>, key: &str) -> bool {
    match attrs.get_mut(key) {
        Some(kv) => {
            let hashed = digest(kv.value.as_ref());
            kv.value = Some(TypedValue::String(hashed).into());
            true
        }
        None => false,
    }
}
