//! Include/exclude gating of spans.
//!
//! A span is processed only when the include matcher (if any) accepts it and
//! the exclude matcher (if any) does not. Include is evaluated first.
//!
//! Any [`SpanMatcher`] can be plugged in. [`PropertiesMatcher`] is the built-in
//! one, matching on service name and span name either literally or by regexp.

use crate::error::ConfigError;
use opentelemetry_proto::tonic::trace::v1::Span;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Decides whether a span matches. Must be pure.
pub trait SpanMatcher: Send + Sync {
    fn matches(&self, span: &Span, service_name: &str) -> bool;
}

impl<F> SpanMatcher for F
where
    F: Fn(&Span, &str) -> bool + Send + Sync,
{
    fn matches(&self, span: &Span, service_name: &str) -> bool {
        self(span, service_name)
    }
}

/// Optional include and exclude matchers.
#[derive(Clone, Default)]
pub struct SpanFilter {
    include: Option<Arc<dyn SpanMatcher>>,
    exclude: Option<Arc<dyn SpanMatcher>>,
}

impl fmt::Debug for SpanFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpanFilter")
            .field("include", &self.include.as_ref().map(|_| "<matcher>"))
            .field("exclude", &self.exclude.as_ref().map(|_| "<matcher>"))
            .finish()
    }
}

impl SpanFilter {
    pub fn new(
        include: Option<Arc<dyn SpanMatcher>>,
        exclude: Option<Arc<dyn SpanMatcher>>,
    ) -> Self {
        Self { include, exclude }
    }

    pub fn with_include(mut self, matcher: impl SpanMatcher + 'static) -> Self {
        self.include = Some(Arc::new(matcher));
        self
    }

    pub fn with_exclude(mut self, matcher: impl SpanMatcher + 'static) -> Self {
        self.exclude = Some(Arc::new(matcher));
        self
    }

    /// True when the span must be left untouched.
    pub fn should_skip(&self, span: &Span, service_name: &str) -> bool {
        if let Some(include) = &self.include {
            if !include.matches(span, service_name) {
                return true;
            }
        }

        if let Some(exclude) = &self.exclude {
            if exclude.matches(span, service_name) {
                return true;
            }
        }

        false
    }
}

/// How the entries of a [`MatchProperties`] block are compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchType {
    #[default]
    Strict,
    Regexp,
}

/// Configuration of a [`PropertiesMatcher`].
///
/// ```yaml
/// match_type: regexp
/// services: ["^checkout"]
/// span_names: ["^GET /health"]
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MatchProperties {
    #[serde(default)]
    pub match_type: MatchType,
    #[serde(default)]
    pub services: Vec<String>,
    #[serde(default)]
    pub span_names: Vec<String>,
}

#[derive(Debug, Clone)]
enum Patterns {
    Strict(Vec<String>),
    Regexp(Vec<Regex>),
}

impl Patterns {
    fn compile(
        match_type: MatchType,
        entries: &[String],
        side: &'static str,
    ) -> Result<Self, ConfigError> {
        match match_type {
            MatchType::Strict => Ok(Patterns::Strict(entries.to_vec())),
            MatchType::Regexp => entries
                .iter()
                .map(|entry| Regex::new(entry))
                .collect::<Result<Vec<_>, _>>()
                .map(Patterns::Regexp)
                .map_err(|source| ConfigError::InvalidFilterPattern { side, source }),
        }
    }

    fn is_empty(&self) -> bool {
        match self {
            Patterns::Strict(entries) => entries.is_empty(),
            Patterns::Regexp(entries) => entries.is_empty(),
        }
    }

    // An empty list places no constraint.
    fn accepts(&self, candidate: &str) -> bool {
        match self {
            Patterns::Strict(entries) => {
                entries.is_empty() || entries.iter().any(|entry| entry == candidate)
            }
            Patterns::Regexp(entries) => {
                entries.is_empty() || entries.iter().any(|re| re.is_match(candidate))
            }
        }
    }
}

/// Matches spans by service name and span name.
///
/// A span matches when its service is accepted by `services` and its name is
/// accepted by `span_names`.
#[derive(Debug, Clone)]
pub struct PropertiesMatcher {
    services: Patterns,
    span_names: Patterns,
}

impl PropertiesMatcher {
    /// Compiles `properties`. `side` ("include" or "exclude") labels errors.
    pub fn new(properties: &MatchProperties, side: &'static str) -> Result<Self, ConfigError> {
        let services = Patterns::compile(properties.match_type, &properties.services, side)?;
        let span_names = Patterns::compile(properties.match_type, &properties.span_names, side)?;
        if services.is_empty() && span_names.is_empty() {
            return Err(ConfigError::EmptyMatchProperties { side });
        }
        Ok(Self {
            services,
            span_names,
        })
    }
}

impl SpanMatcher for PropertiesMatcher {
    fn matches(&self, span: &Span, service_name: &str) -> bool {
        self.services.accepts(service_name) && self.span_names.accepts(&span.name)
    }
}
