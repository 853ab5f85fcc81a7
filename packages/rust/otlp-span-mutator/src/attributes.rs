//! Keyed access to a span's attribute list.
//!
//! OTLP keeps span attributes as a `Vec<KeyValue>`. [`AttributeMap`] wraps a
//! mutable borrow of that list and gives it map semantics:
//!
//! - `insert` never overwrites an existing key
//! - `update` never creates a missing key
//! - `upsert` always leaves the key present with the new value
//! - `delete` of a missing key is a no-op
//!
//! Existing entries are replaced in place, new entries are appended, so the
//! relative order of untouched attributes is preserved on the wire.

use opentelemetry_proto::tonic::common::v1::{AnyValue, KeyValue};

/// Finds the first attribute named `key`.
pub fn find<'a>(attrs: &'a [KeyValue], key: &str) -> Option<&'a KeyValue> {
    attrs.iter().find(|kv| kv.key == key)
}

/// A map view over a mutable attribute list.
#[derive(Debug)]
pub struct AttributeMap<'a> {
    attrs: &'a mut Vec<KeyValue>,
}

impl<'a> AttributeMap<'a> {
    pub fn new(attrs: &'a mut Vec<KeyValue>) -> Self {
        Self { attrs }
    }

    pub fn as_slice(&self) -> &[KeyValue] {
        self.attrs
    }

    pub fn len(&self) -> usize {
        self.attrs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attrs.is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        find(self.attrs, key).is_some()
    }

    /// Returns the entry for `key`. The entry's value may be `None` when the
    /// producer sent a key without a value.
    pub fn get(&self, key: &str) -> Option<&KeyValue> {
        find(self.attrs, key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut KeyValue> {
        self.attrs.iter_mut().find(|kv| kv.key == key)
    }

    /// Adds `key` if it is absent. Returns whether the attribute was written.
    pub fn insert(&mut self, key: impl Into<String>, value: AnyValue) -> bool {
        let key = key.into();
        if self.contains(&key) {
            return false;
        }
        self.attrs.push(KeyValue {
            key,
            value: Some(value),
        });
        true
    }

    /// Replaces the value of `key` if it is present. Returns whether the
    /// attribute was written.
    pub fn update(&mut self, key: &str, value: AnyValue) -> bool {
        match self.get_mut(key) {
            Some(kv) => {
                kv.value = Some(value);
                true
            }
            None => false,
        }
    }

    /// Sets `key` to `value`, replacing or adding it as needed.
    pub fn upsert(&mut self, key: impl Into<String>, value: AnyValue) {
        let key = key.into();
        if !self.update(&key, value.clone()) {
            self.attrs.push(KeyValue {
                key,
                value: Some(value),
            });
        }
    }

    /// Removes every attribute named `key`. Returns whether anything was removed.
    pub fn delete(&mut self, key: &str) -> bool {
        let before = self.attrs.len();
        self.attrs.retain(|kv| kv.key != key);
        self.attrs.len() != before
    }
}
