//! Resolution of the values an insert/update/upsert action writes.
//!
//! A value comes either from configuration (a literal, which always resolves)
//! or from another attribute of the same span. Copying from an attribute can
//! optionally run a regular expression over the source string and write one
//! attribute per named capture group.
//!
//! A miss (missing source, non-string source under a pattern, no match, or a
//! capture count that differs from the configured targets) resolves to `None`
//! and the caller skips the action for that span.

use crate::attributes::find;
use crate::value::TypedValue;
use opentelemetry_proto::tonic::common::v1::{any_value, AnyValue, KeyValue};
use regex::Regex;

/// Attribute writes produced by a successful resolution, in capture order.
pub type Resolved = Vec<(String, AnyValue)>;

/// Where an action takes its value from.
#[derive(Debug, Clone)]
pub enum ValueSource {
    /// A value baked in at configuration time.
    Literal(TypedValue),
    /// The value of another attribute, optionally split by a pattern.
    FromAttribute {
        key: String,
        extraction: Option<Extraction>,
    },
}

/// A compiled pattern and the attribute names its capture groups are written to.
#[derive(Debug, Clone)]
pub struct Extraction {
    regex: Regex,
    targets: Vec<String>,
}

impl Extraction {
    /// `targets[i]` receives capture group `i + 1`. Empty names drop their group.
    pub fn new(regex: Regex, targets: Vec<String>) -> Self {
        Self { regex, targets }
    }

    /// Uses the pattern's own group names as targets. Unnamed groups get an
    /// empty target and are dropped.
    pub fn from_regex(regex: Regex) -> Self {
        let targets = regex
            .capture_names()
            .skip(1)
            .map(|name| name.unwrap_or_default().to_string())
            .collect();
        Self { regex, targets }
    }

    pub fn regex(&self) -> &Regex {
        &self.regex
    }

    pub fn targets(&self) -> &[String] {
        &self.targets
    }

    fn extract(&self, text: &str) -> Option<Resolved> {
        let captures = self.regex.captures(text)?;
        // Group 0 is the whole match and has no target.
        if captures.len() - 1 != self.targets.len() {
            return None;
        }

        let values = self
            .targets
            .iter()
            .enumerate()
            .filter(|(_, name)| !name.is_empty())
            .map(|(index, name)| {
                // Groups that did not take part in the match yield an empty string.
                let text = captures.get(index + 1).map_or("", |m| m.as_str());
                (name.clone(), TypedValue::from(text).into())
            })
            .collect();
        Some(values)
    }
}

impl ValueSource {
    /// Resolves the writes for an action targeting `key` against `attrs`.
    ///
    /// `key` is ignored when the source carries an extraction; the capture
    /// targets name the written attributes instead.
    pub fn resolve(&self, key: &str, attrs: &[KeyValue]) -> Option<Resolved> {
        match self {
            ValueSource::Literal(value) => Some(vec![(key.to_string(), value.clone().into())]),
            ValueSource::FromAttribute {
                key: source,
                extraction,
            } => {
                let entry = find(attrs, source)?;
                match extraction {
                    None => Some(vec![(
                        key.to_string(),
                        entry.value.clone().unwrap_or_default(),
                    )]),
                    Some(extraction) => {
                        match entry.value.as_ref().and_then(|v| v.value.as_ref()) {
                            Some(any_value::Value::StringValue(text)) => extraction.extract(text),
                            _ => None,
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{array_kv, kv, nil_kv, string_value, typed};

    fn from_attribute(key: &str, extraction: Option<Extraction>) -> ValueSource {
        ValueSource::FromAttribute {
            key: key.to_string(),
            extraction,
        }
    }

    fn split_name_number() -> Extraction {
        let regex = Regex::new(r"^(\w+?)(\d+)$").expect("valid regex");
        Extraction::new(regex, vec!["name".to_string(), "num".to_string()])
    }

    #[test]
    fn test_literal_always_resolves() {
        let source = ValueSource::Literal(TypedValue::Int(3));

        let resolved = source.resolve("retries", &[]).expect("literal resolves");

        assert_eq!(
            resolved,
            vec![("retries".to_string(), TypedValue::Int(3).into())]
        );
    }

    #[test]
    fn test_copy_from_attribute() {
        let attrs = vec![typed("http.status_code", 404i64)];
        let source = from_attribute("http.status_code", None);

        let resolved = source.resolve("status", &attrs).expect("source present");

        assert_eq!(
            resolved,
            vec![("status".to_string(), TypedValue::Int(404).into())]
        );
    }

    #[test]
    fn test_copy_keeps_unknown_kinds() {
        let attrs = vec![array_kv("tags")];
        let source = from_attribute("tags", None);

        let resolved = source.resolve("copy", &attrs).expect("source present");

        assert_eq!(resolved[0].1, attrs[0].value.clone().expect("array value"));
    }

    #[test]
    fn test_missing_source_is_a_miss() {
        let attrs = vec![kv("other", "x")];
        assert!(from_attribute("absent", None)
            .resolve("copy", &attrs)
            .is_none());
    }

    #[test]
    fn test_extraction_splits_into_named_targets() {
        let attrs = vec![kv("user", "foo123")];
        let source = from_attribute("user", Some(split_name_number()));

        let resolved = source.resolve("ignored", &attrs).expect("pattern matches");

        assert_eq!(
            resolved,
            vec![
                ("name".to_string(), string_value("foo")),
                ("num".to_string(), string_value("123")),
            ]
        );
    }

    #[test]
    fn test_extraction_no_match_is_a_miss() {
        let attrs = vec![kv("user", "no digits here")];
        let source = from_attribute("user", Some(split_name_number()));

        assert!(source.resolve("ignored", &attrs).is_none());
    }

    #[test]
    fn test_extraction_requires_string_source() {
        let source = from_attribute("user", Some(split_name_number()));

        assert!(source.resolve("ignored", &[typed("user", 123i64)]).is_none());
        assert!(source.resolve("ignored", &[nil_kv("user")]).is_none());
    }

    #[test]
    fn test_extraction_arity_is_strict() {
        let regex = Regex::new(r"^(\w+?)(\d+)$").expect("valid regex");
        let extraction = Extraction::new(regex, vec!["name".to_string()]);
        let source = from_attribute("user", Some(extraction));

        assert!(source.resolve("ignored", &[kv("user", "foo123")]).is_none());
    }

    #[test]
    fn test_extraction_drops_empty_targets() {
        let regex = Regex::new(r"^(?P<scheme>\w+)://([^/]+)(?P<path>/.*)?$").expect("valid regex");
        let extraction = Extraction::from_regex(regex);
        assert_eq!(extraction.targets(), ["scheme", "", "path"]);

        let source = from_attribute("http.url", Some(extraction));
        let resolved = source
            .resolve("ignored", &[kv("http.url", "https://example.com")])
            .expect("pattern matches");

        // The optional path group did not participate and yields an empty string.
        assert_eq!(
            resolved,
            vec![
                ("scheme".to_string(), string_value("https")),
                ("path".to_string(), string_value("")),
            ]
        );
    }
}
