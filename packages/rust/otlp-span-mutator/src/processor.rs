//! Batch processing stage.
//!
//! [`SpanMutator`] sits between two stages of a trace pipeline. For every span
//! of an incoming batch it:
//!
//! 1. asks the include/exclude filter whether the span is eligible,
//! 2. runs the configured attribute actions in order,
//! 3. recomputes the span name from attribute values, if renaming is configured,
//!
//! and then hands the batch, same shape but mutated content, to the next
//! [`TraceConsumer`] exactly once. The consumer's error is returned unchanged.
//!
//! # Usage
//!
//! ```no_run
//! use otlp_span_mutator::{Config, ConsumerError, SpanMutator, TraceConsumer};
//! use opentelemetry_proto::tonic::collector::trace::v1::ExportTraceServiceRequest;
//!
//! struct Discard;
//!
//! #[async_trait::async_trait]
//! impl TraceConsumer for Discard {
//!     async fn consume(&self, _batch: ExportTraceServiceRequest) -> Result<(), ConsumerError> {
//!         Ok(())
//!     }
//! }
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let settings = Config::from_yaml_str("actions: [{ key: env, action: upsert, value: prod }]")?
//!     .compile()?;
//! let mutator = SpanMutator::builder().settings(settings).next(Discard).build();
//! mutator.process(ExportTraceServiceRequest::default()).await?;
//! # Ok(())
//! # }
//! ```
//!
//! Configuration is compiled once and shared read-only; [`ProcessorSettings`]
//! is cheap to clone and safe to use from many tasks at once.

use crate::actions::ActionPipeline;
use crate::constants::SERVICE_NAME_KEY;
use crate::error::ConsumerError;
use crate::naming::SpanNamer;
use async_trait::async_trait;
use bon::bon;
use opentelemetry_proto::tonic::{
    collector::trace::v1::ExportTraceServiceRequest,
    common::v1::any_value,
    resource::v1::Resource,
    trace::v1::Span,
};
use std::sync::Arc;
use tracing::{debug, instrument};

#[cfg(test)]
use mockall::automock;

/// The next stage of the pipeline.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait TraceConsumer: Send + Sync {
    async fn consume(&self, batch: ExportTraceServiceRequest) -> Result<(), ConsumerError>;
}

/// What the enclosing pipeline needs to know about this stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    /// The stage modifies the batches it receives.
    pub mutates_data: bool,
}

/// Counters for one batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MutationStats {
    pub spans: usize,
    pub skipped: usize,
    pub renamed: usize,
}

/// Compiled, immutable processor configuration.
#[derive(Debug, Clone, Default)]
pub struct ProcessorSettings {
    inner: Arc<SettingsInner>,
}

#[derive(Debug, Default)]
struct SettingsInner {
    pipeline: ActionPipeline,
    namer: Option<SpanNamer>,
}

/// Service name of a resource, or the empty string.
pub fn service_name(resource: Option<&Resource>) -> &str {
    resource
        .into_iter()
        .flat_map(|r| r.attributes.iter())
        .find(|kv| kv.key == SERVICE_NAME_KEY)
        .and_then(|kv| kv.value.as_ref())
        .and_then(|v| match &v.value {
            Some(any_value::Value::StringValue(s)) => Some(s.as_str()),
            _ => None,
        })
        .unwrap_or_default()
}

impl ProcessorSettings {
    pub fn new(pipeline: ActionPipeline, namer: Option<SpanNamer>) -> Self {
        Self {
            inner: Arc::new(SettingsInner { pipeline, namer }),
        }
    }

    pub fn pipeline(&self) -> &ActionPipeline {
        &self.inner.pipeline
    }

    pub fn namer(&self) -> Option<&SpanNamer> {
        self.inner.namer.as_ref()
    }

    /// Mutates one span. Returns `None` when the filter skipped it, otherwise
    /// whether it was renamed.
    pub fn mutate_span(&self, span: &mut Span, service_name: &str) -> Option<bool> {
        if !self.inner.pipeline.apply(span, service_name) {
            return None;
        }

        // Spans without attributes are never renamed.
        let renamed = match &self.inner.namer {
            Some(namer) if !span.attributes.is_empty() => namer.rename(span),
            _ => false,
        };
        Some(renamed)
    }

    /// Mutates every span of `batch` in place.
    pub fn mutate(&self, batch: &mut ExportTraceServiceRequest) -> MutationStats {
        let mut stats = MutationStats::default();

        for resource_spans in &mut batch.resource_spans {
            let service = service_name(resource_spans.resource.as_ref());
            for scope_spans in &mut resource_spans.scope_spans {
                for span in &mut scope_spans.spans {
                    stats.spans += 1;
                    match self.mutate_span(span, service) {
                        None => stats.skipped += 1,
                        Some(true) => stats.renamed += 1,
                        Some(false) => {}
                    }
                }
            }
        }

        stats
    }
}

/// Attribute and name mutation stage in front of a [`TraceConsumer`].
pub struct SpanMutator<C> {
    settings: ProcessorSettings,
    next: C,
}

#[bon]
impl<C> SpanMutator<C>
where
    C: TraceConsumer,
{
    /// Creates a new SpanMutator forwarding to `next`.
    #[builder]
    pub fn new(settings: ProcessorSettings, next: C) -> Self {
        Self { settings, next }
    }
}

impl<C> SpanMutator<C>
where
    C: TraceConsumer,
{
    pub fn settings(&self) -> &ProcessorSettings {
        &self.settings
    }

    pub fn capabilities(&self) -> Capabilities {
        Capabilities { mutates_data: true }
    }

    /// Invoked when the pipeline starts. Nothing to do.
    pub async fn start(&self) -> Result<(), ConsumerError> {
        Ok(())
    }

    /// Invoked when the pipeline shuts down. Nothing to do.
    pub async fn shutdown(&self) -> Result<(), ConsumerError> {
        Ok(())
    }

    /// Mutates the batch and forwards it to the next stage.
    #[instrument(skip_all, fields(resource_spans = batch.resource_spans.len()))]
    pub async fn process(&self, mut batch: ExportTraceServiceRequest) -> Result<(), ConsumerError> {
        let stats = self.settings.mutate(&mut batch);
        debug!(
            spans = stats.spans,
            skipped = stats.skipped,
            renamed = stats.renamed,
            "batch mutated"
        );
        self.next.consume(batch).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::AttributeAction;
    use crate::filter::SpanFilter;
    use crate::naming::NamingPolicy;
    use crate::resolver::ValueSource;
    use crate::test_utils::{batch, kv, span, spans};
    use crate::value::TypedValue;
    use mockall::predicate::always;

    fn settings(filter: SpanFilter) -> ProcessorSettings {
        ProcessorSettings::new(
            ActionPipeline::new(
                vec![AttributeAction::Upsert {
                    key: "env".to_string(),
                    source: ValueSource::Literal(TypedValue::from("prod")),
                }],
                filter,
            ),
            Some(SpanNamer::new(
                vec!["http.method".to_string(), "http.route".to_string()],
                " ",
                NamingPolicy::StrictOrdered,
            )),
        )
    }

    #[test]
    fn test_service_name() {
        let request = batch("checkout", vec![]);
        assert_eq!(
            service_name(request.resource_spans[0].resource.as_ref()),
            "checkout"
        );
        assert_eq!(service_name(None), "");
        assert_eq!(service_name(Some(&Resource::default())), "");
    }

    #[test]
    fn test_mutate_counts_and_renames() {
        let mut request = batch(
            "checkout",
            vec![
                span("a", vec![kv("http.method", "GET"), kv("http.route", "/cart")]),
                span("b", vec![kv("http.method", "GET")]),
                span("c", vec![]),
            ],
        );

        let stats = settings(SpanFilter::default()).mutate(&mut request);

        assert_eq!(
            stats,
            MutationStats {
                spans: 3,
                skipped: 0,
                renamed: 1
            }
        );
        let spans = spans(&request);
        assert_eq!(spans[0].name, "GET /cart");
        assert_eq!(spans[1].name, "b");
        // The upsert runs before naming, so "c" has attributes but no naming keys.
        assert_eq!(spans[2].name, "c");
        assert_eq!(spans[2].attributes, vec![kv("env", "prod")]);
    }

    #[test]
    fn test_attributeless_span_is_not_renamed() {
        let settings = ProcessorSettings::new(
            ActionPipeline::default(),
            Some(SpanNamer::new(vec!["a".to_string()], "", NamingPolicy::FixedArity)),
        );
        let mut span = span("kept", vec![]);

        assert_eq!(settings.mutate_span(&mut span, "svc"), Some(false));
        assert_eq!(span.name, "kept");
    }

    #[test]
    fn test_filtered_span_is_neither_mutated_nor_renamed() {
        let filter = SpanFilter::default().with_include(|_: &Span, service: &str| service == "payments");
        let mut request = batch(
            "checkout",
            vec![span("a", vec![kv("http.method", "GET"), kv("http.route", "/cart")])],
        );

        let stats = settings(filter).mutate(&mut request);

        assert_eq!(stats.skipped, 1);
        let spans = spans(&request);
        assert_eq!(spans[0].name, "a");
        assert_eq!(spans[0].attributes.len(), 2);
    }

    #[tokio::test]
    async fn test_process_forwards_mutated_batch_once() {
        let mut next = MockTraceConsumer::new();
        next.expect_consume()
            .withf(|batch| {
                let spans = spans(batch);
                spans.len() == 1
                    && spans[0].name == "GET /cart"
                    && spans[0].attributes.contains(&kv("env", "prod"))
            })
            .times(1)
            .returning(|_| Ok(()));

        let mutator = SpanMutator::builder()
            .settings(settings(SpanFilter::default()))
            .next(next)
            .build();

        let request = batch(
            "checkout",
            vec![span("a", vec![kv("http.method", "GET"), kv("http.route", "/cart")])],
        );
        assert!(mutator.process(request).await.is_ok());
    }

    #[tokio::test]
    async fn test_process_propagates_consumer_error() {
        let mut next = MockTraceConsumer::new();
        next.expect_consume()
            .with(always())
            .times(1)
            .returning(|_| Err(ConsumerError::Rejected("queue full".to_string())));

        let mutator = SpanMutator::builder()
            .settings(settings(SpanFilter::default()))
            .next(next)
            .build();

        let result = mutator.process(batch("checkout", vec![])).await;

        match result {
            Err(ConsumerError::Rejected(message)) => assert_eq!(message, "queue full"),
            other => panic!("expected rejected error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_lifecycle_is_a_no_op() {
        let mut next = MockTraceConsumer::new();
        next.expect_consume().never();

        let mutator = SpanMutator::builder()
            .settings(ProcessorSettings::default())
            .next(next)
            .build();

        assert!(mutator.start().await.is_ok());
        assert!(mutator.shutdown().await.is_ok());
        assert!(mutator.capabilities().mutates_data);
    }
}
