use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading or compiling a processor configuration.
///
/// These are setup-time failures. Nothing in the per-span path produces them.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read configuration file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid YAML configuration: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid JSON configuration: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration has neither actions nor rename")]
    Empty,

    #[error("Action {index}: {message}")]
    InvalidAction { index: usize, message: String },

    #[error("Action {index}: invalid pattern: {source}")]
    InvalidPattern {
        index: usize,
        #[source]
        source: regex::Error,
    },

    #[error("Action {index}: pattern has {groups} capture groups but {targets} targets are configured")]
    TargetCountMismatch {
        index: usize,
        groups: usize,
        targets: usize,
    },

    #[error("{side} filter must list at least one service or span name")]
    EmptyMatchProperties { side: &'static str },

    #[error("{side} filter has an invalid regexp: {source}")]
    InvalidFilterPattern {
        side: &'static str,
        #[source]
        source: regex::Error,
    },

    #[error("rename.from_attributes must not be empty")]
    MissingRenameKeys,
}

/// Errors returned by the next stage of the pipeline.
#[derive(Error, Debug)]
pub enum ConsumerError {
    #[error("Next stage rejected the batch: {0}")]
    Rejected(String),

    #[error("I/O error while forwarding the batch: {0}")]
    Io(#[from] std::io::Error),
}
