//! Builders for OTLP fixtures shared by the unit tests.

use crate::constants::SERVICE_NAME_KEY;
use crate::value::TypedValue;
use opentelemetry_proto::tonic::{
    collector::trace::v1::ExportTraceServiceRequest,
    common::v1::{any_value, AnyValue, ArrayValue, KeyValue},
    resource::v1::Resource,
    trace::v1::{ResourceSpans, ScopeSpans, Span},
};

pub fn string_value(s: &str) -> AnyValue {
    TypedValue::from(s).into()
}

pub fn typed(key: &str, value: impl Into<TypedValue>) -> KeyValue {
    let value: TypedValue = value.into();
    KeyValue {
        key: key.to_string(),
        value: Some(value.into()),
    }
}

pub fn kv(key: &str, value: &str) -> KeyValue {
    typed(key, value)
}

/// An attribute that is present but carries no value at all.
pub fn nil_kv(key: &str) -> KeyValue {
    KeyValue {
        key: key.to_string(),
        value: None,
    }
}

pub fn array_kv(key: &str) -> KeyValue {
    KeyValue {
        key: key.to_string(),
        value: Some(AnyValue {
            value: Some(any_value::Value::ArrayValue(ArrayValue {
                values: vec![string_value("a")],
            })),
        }),
    }
}

pub fn span(name: &str, attributes: Vec<KeyValue>) -> Span {
    Span {
        name: name.to_string(),
        attributes,
        ..Default::default()
    }
}

pub fn batch(service: &str, spans: Vec<Span>) -> ExportTraceServiceRequest {
    ExportTraceServiceRequest {
        resource_spans: vec![ResourceSpans {
            resource: Some(Resource {
                attributes: vec![kv(SERVICE_NAME_KEY, service)],
                ..Default::default()
            }),
            scope_spans: vec![ScopeSpans {
                spans,
                ..Default::default()
            }],
            ..Default::default()
        }],
    }
}

pub fn spans(batch: &ExportTraceServiceRequest) -> Vec<&Span> {
    batch
        .resource_spans
        .iter()
        .flat_map(|rs| rs.scope_spans.iter())
        .flat_map(|ss| ss.spans.iter())
        .collect()
}
