//! Ordered attribute actions applied to one span at a time.
//!
//! Actions run in configuration order and each one sees the effects of the
//! ones before it. A resolution miss skips that single action; nothing in the
//! pipeline fails a span.

use crate::attributes::AttributeMap;
use crate::filter::SpanFilter;
use crate::hasher::{hash_attribute, HASH_ALGORITHM};
use crate::resolver::ValueSource;
use opentelemetry_proto::tonic::trace::v1::Span;
use tracing::{debug, trace};

/// A single configured operation on a span's attributes.
#[derive(Debug, Clone)]
pub enum AttributeAction {
    Delete { key: String },
    Insert { key: String, source: ValueSource },
    Update { key: String, source: ValueSource },
    Upsert { key: String, source: ValueSource },
    Hash { key: String },
}

#[derive(Debug, Clone, Copy)]
enum WriteMode {
    Insert,
    Update,
    Upsert,
}

impl AttributeAction {
    fn name(&self) -> &'static str {
        match self {
            AttributeAction::Delete { .. } => "delete",
            AttributeAction::Insert { .. } => "insert",
            AttributeAction::Update { .. } => "update",
            AttributeAction::Upsert { .. } => "upsert",
            AttributeAction::Hash { .. } => "hash",
        }
    }

    /// Applies the action to `attrs`.
    pub fn apply(&self, attrs: &mut AttributeMap<'_>) {
        match self {
            AttributeAction::Delete { key } => {
                attrs.delete(key);
            }
            AttributeAction::Insert { key, source } => {
                self.write(attrs, key, source, WriteMode::Insert)
            }
            AttributeAction::Update { key, source } => {
                self.write(attrs, key, source, WriteMode::Update)
            }
            AttributeAction::Upsert { key, source } => {
                self.write(attrs, key, source, WriteMode::Upsert)
            }
            AttributeAction::Hash { key } => {
                let hashed = hash_attribute(attrs, key);
                trace!(key = %key, algorithm = HASH_ALGORITHM, hashed, "hashed attribute");
            }
        }
    }

    fn write(&self, attrs: &mut AttributeMap<'_>, key: &str, source: &ValueSource, mode: WriteMode) {
        let Some(values) = source.resolve(key, attrs.as_slice()) else {
            debug!(action = self.name(), key, "value not resolved, skipping action");
            return;
        };

        for (key, value) in values {
            let written = match mode {
                WriteMode::Insert => attrs.insert(key.as_str(), value),
                WriteMode::Update => attrs.update(&key, value),
                WriteMode::Upsert => {
                    attrs.upsert(key.as_str(), value);
                    true
                }
            };
            trace!(action = self.name(), key = %key, written, "applied attribute write");
        }
    }
}

/// The configured actions together with the span filter gating them.
#[derive(Debug, Clone, Default)]
pub struct ActionPipeline {
    actions: Vec<AttributeAction>,
    filter: SpanFilter,
}

impl ActionPipeline {
    pub fn new(actions: Vec<AttributeAction>, filter: SpanFilter) -> Self {
        Self { actions, filter }
    }

    pub fn actions(&self) -> &[AttributeAction] {
        &self.actions
    }

    pub fn filter(&self) -> &SpanFilter {
        &self.filter
    }

    /// Runs the actions on `span` unless the filter rejects it.
    ///
    /// Returns `false` when the span was skipped by the filter.
    pub fn apply(&self, span: &mut Span, service_name: &str) -> bool {
        if self.filter.should_skip(span, service_name) {
            debug!(span = %span.name, service = service_name, "span skipped by filter");
            return false;
        }

        let mut attrs = AttributeMap::new(&mut span.attributes);
        for action in &self.actions {
            action.apply(&mut attrs);
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::Extraction;
    use crate::test_utils::{kv, span, typed};
    use crate::value::TypedValue;
    use regex::Regex;

    fn literal(value: impl Into<TypedValue>) -> ValueSource {
        ValueSource::Literal(value.into())
    }

    fn copy_of(key: &str) -> ValueSource {
        ValueSource::FromAttribute {
            key: key.to_string(),
            extraction: None,
        }
    }

    fn pipeline(actions: Vec<AttributeAction>) -> ActionPipeline {
        ActionPipeline::new(actions, SpanFilter::default())
    }

    #[test]
    fn test_actions_run_in_order() {
        let pipeline = pipeline(vec![
            AttributeAction::Upsert {
                key: "region".to_string(),
                source: literal("eu-west-1"),
            },
            AttributeAction::Insert {
                key: "region.copy".to_string(),
                source: copy_of("region"),
            },
            AttributeAction::Delete {
                key: "region".to_string(),
            },
        ]);
        let mut span = span("op", vec![kv("env", "dev")]);

        assert!(pipeline.apply(&mut span, "svc"));

        assert_eq!(
            span.attributes,
            vec![kv("env", "dev"), kv("region.copy", "eu-west-1")]
        );
    }

    #[test]
    fn test_permuted_actions_differ() {
        let delete = AttributeAction::Delete {
            key: "env".to_string(),
        };
        let insert = AttributeAction::Insert {
            key: "env".to_string(),
            source: literal("prod"),
        };

        let mut first = span("op", vec![kv("env", "dev")]);
        pipeline(vec![delete.clone(), insert.clone()]).apply(&mut first, "svc");

        let mut second = span("op", vec![kv("env", "dev")]);
        pipeline(vec![insert, delete]).apply(&mut second, "svc");

        assert_eq!(first.attributes, vec![kv("env", "prod")]);
        assert!(second.attributes.is_empty());
    }

    #[test]
    fn test_misses_do_not_stop_the_pipeline() {
        let pipeline = pipeline(vec![
            AttributeAction::Upsert {
                key: "copy".to_string(),
                source: copy_of("absent"),
            },
            AttributeAction::Update {
                key: "absent".to_string(),
                source: literal("x"),
            },
            AttributeAction::Insert {
                key: "env".to_string(),
                source: literal("prod"),
            },
        ]);
        let mut span = span("op", vec![]);

        pipeline.apply(&mut span, "svc");

        assert_eq!(span.attributes, vec![kv("env", "prod")]);
    }

    #[test]
    fn test_extraction_writes_every_target() {
        let regex = Regex::new(r"^(?P<name>\w+?)(?P<num>\d+)$").expect("valid regex");
        let pipeline = pipeline(vec![AttributeAction::Upsert {
            key: String::new(),
            source: ValueSource::FromAttribute {
                key: "user".to_string(),
                extraction: Some(Extraction::from_regex(regex)),
            },
        }]);
        let mut span = span("op", vec![kv("user", "foo123"), kv("num", "0")]);

        pipeline.apply(&mut span, "svc");

        assert_eq!(
            span.attributes,
            vec![kv("user", "foo123"), kv("num", "123"), kv("name", "foo")]
        );
    }

    #[test]
    fn test_hash_action() {
        let pipeline = pipeline(vec![AttributeAction::Hash {
            key: "user.id".to_string(),
        }]);
        let mut span = span("op", vec![typed("user.id", 42i64)]);

        pipeline.apply(&mut span, "svc");

        let value = span.attributes[0].value.as_ref().expect("hashed value");
        match TypedValue::from_any_value(value) {
            Some(TypedValue::String(hashed)) => assert_eq!(hashed.len(), 64),
            other => panic!("expected hex digest, got {:?}", other),
        }
    }

    #[test]
    fn test_filtered_span_is_untouched() {
        let pipeline = ActionPipeline::new(
            vec![AttributeAction::Delete {
                key: "env".to_string(),
            }],
            SpanFilter::default().with_exclude(|_: &Span, service: &str| service == "svc"),
        );
        let mut span = span("op", vec![kv("env", "dev")]);

        assert!(!pipeline.apply(&mut span, "svc"));
        assert_eq!(span.attributes, vec![kv("env", "dev")]);
    }
}
