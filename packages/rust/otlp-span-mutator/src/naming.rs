//! Span names built from attribute values.
//!
//! The values of a configured, ordered list of attribute keys are rendered
//! and joined with a separator. The separator is never emitted before the
//! first part and is never trimmed or deduplicated.
//!
//! Rendering follows the [`TypedValue`] rules with two sentinels:
//! [`NIL_ATTRIBUTE_VALUE`] for a key present without a value and
//! [`UNKNOWN_ATTRIBUTE_TYPE`] for arrays, key/value lists and bytes.
//!
//! Two policies decide what happens when a key is missing:
//!
//! - [`NamingPolicy::StrictOrdered`] aborts at the first missing key.
//! - [`NamingPolicy::FixedArity`] collects parts up to the first missing key
//!   and commits only when every configured key produced a part.
//!
//! In both cases the span keeps its previous name on a miss.

use crate::attributes::find;
use crate::constants::{self, NIL_ATTRIBUTE_VALUE, UNKNOWN_ATTRIBUTE_TYPE};
use crate::value::TypedValue;
use opentelemetry_proto::tonic::common::v1::{any_value, KeyValue};
use opentelemetry_proto::tonic::trace::v1::Span;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::{env, fmt, str::FromStr};

/// Abort rule used by [`SpanNamer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NamingPolicy {
    /// Abort on the first missing key.
    #[default]
    StrictOrdered,
    /// Commit only when exactly one part per key was rendered.
    FixedArity,
}

impl fmt::Display for NamingPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NamingPolicy::StrictOrdered => write!(f, "strict_ordered"),
            NamingPolicy::FixedArity => write!(f, "fixed_arity"),
        }
    }
}

impl FromStr for NamingPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "strict_ordered" => Ok(NamingPolicy::StrictOrdered),
            "fixed_arity" => Ok(NamingPolicy::FixedArity),
            other => Err(format!("unknown naming policy: {}", other)),
        }
    }
}

impl NamingPolicy {
    /// Resolve the policy from the environment or the provided configuration.
    ///
    /// `SPAN_MUTATOR_NAMING_POLICY` takes precedence when it holds a valid
    /// value. Otherwise the configured policy is used, defaulting to
    /// `StrictOrdered`.
    pub fn resolve(config_policy: Option<NamingPolicy>) -> Self {
        let result = match env::var(constants::env_vars::NAMING_POLICY) {
            Ok(value) => match value.parse() {
                Ok(policy) => policy,
                Err(err) => {
                    tracing::warn!(
                        "NamingPolicy.resolve: {} in env, using config or default",
                        err
                    );
                    config_policy.unwrap_or_default()
                }
            },
            Err(_) => config_policy.unwrap_or_default(),
        };

        tracing::debug!("NamingPolicy.resolve: using {} naming policy", result);
        result
    }
}

fn render(entry: &KeyValue) -> Cow<'_, str> {
    match entry.value.as_ref().and_then(|v| v.value.as_ref()) {
        None => Cow::Borrowed(NIL_ATTRIBUTE_VALUE),
        Some(any_value::Value::StringValue(s)) => Cow::Borrowed(s.as_str()),
        Some(kind) => TypedValue::from_kind(kind)
            .map_or(Cow::Borrowed(UNKNOWN_ATTRIBUTE_TYPE), |v| {
                Cow::Owned(v.to_string())
            }),
    }
}

/// Builds span names from attribute values.
#[derive(Debug, Clone)]
pub struct SpanNamer {
    keys: Vec<String>,
    separator: String,
    policy: NamingPolicy,
}

impl SpanNamer {
    pub fn new(keys: Vec<String>, separator: impl Into<String>, policy: NamingPolicy) -> Self {
        Self {
            keys,
            separator: separator.into(),
            policy,
        }
    }

    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    pub fn separator(&self) -> &str {
        &self.separator
    }

    pub fn policy(&self) -> NamingPolicy {
        self.policy
    }

    /// The name the attributes produce, or `None` when the policy aborts.
    pub fn name(&self, attrs: &[KeyValue]) -> Option<String> {
        match self.policy {
            NamingPolicy::StrictOrdered => self.strict_ordered(attrs),
            NamingPolicy::FixedArity => self.fixed_arity(attrs),
        }
    }

    /// Renames `span` in place. Returns whether the name was replaced.
    pub fn rename(&self, span: &mut Span) -> bool {
        match self.name(&span.attributes) {
            Some(name) => {
                span.name = name;
                true
            }
            None => false,
        }
    }

    fn strict_ordered(&self, attrs: &[KeyValue]) -> Option<String> {
        let mut name = String::new();
        for (i, key) in self.keys.iter().enumerate() {
            let entry = find(attrs, key)?;
            if i > 0 && !self.separator.is_empty() {
                name.push_str(&self.separator);
            }
            name.push_str(&render(entry));
        }
        Some(name)
    }

    fn fixed_arity(&self, attrs: &[KeyValue]) -> Option<String> {
        let parts: Vec<Cow<'_, str>> = self
            .keys
            .iter()
            .map_while(|key| find(attrs, key).map(render))
            .collect();

        if parts.len() != self.keys.len() {
            return None;
        }
        Some(parts.join(self.separator.as_str()))
    }
}
