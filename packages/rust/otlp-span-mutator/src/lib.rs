//! Attribute actions and attribute-derived span names for OTLP trace batches.
//!
//! This crate implements a mutation stage for a trace pipeline. Given a batch of
//! spans (an OTLP [`ExportTraceServiceRequest`]) it:
//!
//! - runs an ordered list of attribute actions on each span: `insert`,
//!   `update`, `upsert`, `delete` and `hash`, with values taken from
//!   configuration, copied from another attribute, or extracted from another
//!   attribute with a regular expression
//! - gates those actions with optional include/exclude span filters
//! - rebuilds the span name from selected attribute values
//!
//! and forwards the batch to the next stage.
//!
//! Per-span problems are never errors. A missing source attribute, a pattern
//! that does not match or a missing naming key simply leaves the span as it was.
//! Only configuration errors (at setup) and the next stage's error (per batch)
//! are reported.
//!
//! # Quick Start
//!
//! ```
//! use otlp_span_mutator::Config;
//! use opentelemetry_proto::tonic::collector::trace::v1::ExportTraceServiceRequest;
//!
//! let settings = Config::from_yaml_str(
//!     r#"
//! actions:
//!   - { key: environment, action: insert, value: production }
//!   - { key: user.email, action: hash }
//! rename:
//!   from_attributes: [http.method, http.route]
//!   separator: " "
//! "#,
//! )
//! .and_then(|config| config.compile())
//! .expect("valid configuration");
//!
//! let mut batch = ExportTraceServiceRequest::default();
//! let stats = settings.mutate(&mut batch);
//! assert_eq!(stats.spans, 0);
//! ```
//!
//! See [`SpanMutator`] for forwarding to a next stage.
//!
//! [`ExportTraceServiceRequest`]: opentelemetry_proto::tonic::collector::trace::v1::ExportTraceServiceRequest

pub mod actions;
pub mod attributes;
pub mod config;
pub mod constants;
pub mod error;
pub mod filter;
pub mod hasher;
pub mod naming;
pub mod processor;
pub mod resolver;
pub mod value;

#[cfg(test)]
mod test_utils;

pub use actions::{ActionPipeline, AttributeAction};
pub use attributes::AttributeMap;
pub use config::{ActionConfig, ActionKind, Config, RenameConfig};
pub use error::{ConfigError, ConsumerError};
pub use filter::{MatchProperties, MatchType, PropertiesMatcher, SpanFilter, SpanMatcher};
pub use naming::{NamingPolicy, SpanNamer};
pub use processor::{
    Capabilities, MutationStats, ProcessorSettings, SpanMutator, TraceConsumer,
};
pub use resolver::{Extraction, ValueSource};
pub use value::TypedValue;
