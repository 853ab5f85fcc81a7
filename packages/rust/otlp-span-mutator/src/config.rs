//! Loading and validation of the processor configuration.
//!
//! The configuration mirrors the collector's attributes and span processors:
//!
//! ```yaml
//! actions:
//!   - key: environment
//!     action: insert
//!     value: production
//!   - key: user.email
//!     action: hash
//!   - action: upsert
//!     from_attribute: http.url
//!     pattern: '^(?P<http_scheme>\w+)://(?P<http_host>[^/]+)'
//! include:
//!   match_type: strict
//!   services: [checkout]
//! exclude:
//!   match_type: regexp
//!   span_names: ['^GET /health']
//! rename:
//!   from_attributes: [http.method, http.status_code]
//!   separator: " "
//!   policy: strict_ordered
//! ```
//!
//! [`Config::compile`] validates everything up front and produces immutable
//! [`ProcessorSettings`]. Invalid configuration never reaches the span path.

use crate::actions::{ActionPipeline, AttributeAction};
use crate::error::ConfigError;
use crate::filter::{MatchProperties, PropertiesMatcher, SpanFilter, SpanMatcher};
use crate::naming::{NamingPolicy, SpanNamer};
use crate::processor::ProcessorSettings;
use crate::resolver::{Extraction, ValueSource};
use crate::value::TypedValue;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::{fmt, fs, path::Path, sync::Arc};

/// The action an [`ActionConfig`] performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    Insert,
    Update,
    Upsert,
    Delete,
    Hash,
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionKind::Insert => write!(f, "insert"),
            ActionKind::Update => write!(f, "update"),
            ActionKind::Upsert => write!(f, "upsert"),
            ActionKind::Delete => write!(f, "delete"),
            ActionKind::Hash => write!(f, "hash"),
        }
    }
}

/// One entry of the `actions` list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ActionConfig {
    /// Attribute the action targets. Not needed when `pattern` names the targets.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,

    pub action: ActionKind,

    /// Literal value for insert/update/upsert.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<TypedValue>,

    /// Attribute to copy the value from for insert/update/upsert.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_attribute: Option<String>,

    /// Regular expression applied to `from_attribute`. Each capture group is
    /// written to its own attribute.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,

    /// Attribute names for the capture groups, in group order. Defaults to the
    /// group names of `pattern`. Empty entries drop their group.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub targets: Option<Vec<String>>,
}

/// The `rename` block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RenameConfig {
    /// Attribute keys whose values make up the new name, in order.
    pub from_attributes: Vec<String>,

    /// Inserted between consecutive values. Empty means plain concatenation.
    #[serde(default)]
    pub separator: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy: Option<NamingPolicy>,
}

/// Top-level processor configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub actions: Vec<ActionConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include: Option<MatchProperties>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclude: Option<MatchProperties>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rename: Option<RenameConfig>,
}

impl Config {
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn from_json_value(value: serde_json::Value) -> Result<Self, ConfigError> {
        Ok(serde_json::from_value(value)?)
    }

    /// Reads a YAML configuration file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&contents)
    }

    /// Validates the configuration and compiles patterns and matchers.
    pub fn compile(&self) -> Result<ProcessorSettings, ConfigError> {
        if self.actions.is_empty() && self.rename.is_none() {
            return Err(ConfigError::Empty);
        }

        let actions = self
            .actions
            .iter()
            .enumerate()
            .map(|(index, action)| compile_action(index, action))
            .collect::<Result<Vec<_>, _>>()?;

        let filter = SpanFilter::new(
            compile_matcher(self.include.as_ref(), "include")?,
            compile_matcher(self.exclude.as_ref(), "exclude")?,
        );

        let namer = self.rename.as_ref().map(compile_rename).transpose()?;

        Ok(ProcessorSettings::new(
            ActionPipeline::new(actions, filter),
            namer,
        ))
    }
}

impl TryFrom<Config> for ProcessorSettings {
    type Error = ConfigError;

    fn try_from(config: Config) -> Result<Self, Self::Error> {
        config.compile()
    }
}

fn invalid(index: usize, message: impl Into<String>) -> ConfigError {
    ConfigError::InvalidAction {
        index,
        message: message.into(),
    }
}

fn required_key(index: usize, action: &ActionConfig) -> Result<String, ConfigError> {
    match action.key.as_deref() {
        Some(key) if !key.is_empty() => Ok(key.to_string()),
        _ => Err(invalid(
            index,
            format!("missing required field \"key\" for {} action", action.action),
        )),
    }
}

fn compile_action(index: usize, action: &ActionConfig) -> Result<AttributeAction, ConfigError> {
    match action.action {
        ActionKind::Delete | ActionKind::Hash => {
            if action.value.is_some()
                || action.from_attribute.is_some()
                || action.pattern.is_some()
                || action.targets.is_some()
            {
                return Err(invalid(
                    index,
                    format!(
                        "{} action does not accept value, from_attribute, pattern or targets",
                        action.action
                    ),
                ));
            }
            let key = required_key(index, action)?;
            Ok(match action.action {
                ActionKind::Delete => AttributeAction::Delete { key },
                _ => AttributeAction::Hash { key },
            })
        }
        ActionKind::Insert | ActionKind::Update | ActionKind::Upsert => {
            let source = compile_source(index, action)?;
            let key = match &source {
                ValueSource::FromAttribute {
                    extraction: Some(_),
                    ..
                } => action.key.clone().unwrap_or_default(),
                _ => required_key(index, action)?,
            };
            Ok(match action.action {
                ActionKind::Insert => AttributeAction::Insert { key, source },
                ActionKind::Update => AttributeAction::Update { key, source },
                _ => AttributeAction::Upsert { key, source },
            })
        }
    }
}

fn compile_source(index: usize, action: &ActionConfig) -> Result<ValueSource, ConfigError> {
    match (&action.value, &action.from_attribute) {
        (Some(value), None) => {
            if action.pattern.is_some() || action.targets.is_some() {
                return Err(invalid(index, "pattern and targets require from_attribute"));
            }
            Ok(ValueSource::Literal(value.clone()))
        }
        (None, Some(from_attribute)) => {
            if action.targets.is_some() && action.pattern.is_none() {
                return Err(invalid(index, "targets require a pattern"));
            }
            let extraction = action
                .pattern
                .as_deref()
                .map(|pattern| compile_extraction(index, pattern, action.targets.as_deref()))
                .transpose()?;
            Ok(ValueSource::FromAttribute {
                key: from_attribute.clone(),
                extraction,
            })
        }
        _ => Err(invalid(
            index,
            format!(
                "{} action requires exactly one of value or from_attribute",
                action.action
            ),
        )),
    }
}

fn compile_extraction(
    index: usize,
    pattern: &str,
    targets: Option<&[String]>,
) -> Result<Extraction, ConfigError> {
    let regex = Regex::new(pattern).map_err(|source| ConfigError::InvalidPattern { index, source })?;
    let groups = regex.captures_len() - 1;

    match targets {
        Some(targets) => {
            if targets.len() != groups {
                return Err(ConfigError::TargetCountMismatch {
                    index,
                    groups,
                    targets: targets.len(),
                });
            }
            Ok(Extraction::new(regex, targets.to_vec()))
        }
        None => {
            let extraction = Extraction::from_regex(regex);
            if extraction.targets().iter().all(String::is_empty) {
                return Err(invalid(
                    index,
                    "pattern must contain at least one named capture group",
                ));
            }
            Ok(extraction)
        }
    }
}

fn compile_matcher(
    properties: Option<&MatchProperties>,
    side: &'static str,
) -> Result<Option<Arc<dyn SpanMatcher>>, ConfigError> {
    properties
        .map(|properties| {
            PropertiesMatcher::new(properties, side)
                .map(|matcher| Arc::new(matcher) as Arc<dyn SpanMatcher>)
        })
        .transpose()
}

fn compile_rename(rename: &RenameConfig) -> Result<SpanNamer, ConfigError> {
    if rename.from_attributes.is_empty() {
        return Err(ConfigError::MissingRenameKeys);
    }
    Ok(SpanNamer::new(
        rename.from_attributes.clone(),
        rename.separator.clone(),
        NamingPolicy::resolve(rename.policy),
    ))
}
