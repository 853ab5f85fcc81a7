//! Constants for the otlp-span-mutator package.
//!
//! Sentinels, well-known attribute keys, environment variable names and
//! defaults live here so the processor, the binary and the tests agree on them.

/// Rendered in a span name for an attribute that is present but carries no value.
pub const NIL_ATTRIBUTE_VALUE: &str = "<nil-attribute-value>";

/// Rendered in a span name for an attribute whose value is not a string, bool,
/// double or integer.
pub const UNKNOWN_ATTRIBUTE_TYPE: &str = "<unknown-attribute-type>";

/// Resource attribute holding the service name handed to span filters.
pub const SERVICE_NAME_KEY: &str = "service.name";

/// Environment variable names for configuration.
pub mod env_vars {
    /// Path to the YAML configuration file used by the `span-mutator` binary.
    pub const CONFIG_PATH: &str = "SPAN_MUTATOR_CONFIG";

    /// Overrides the naming policy of the `rename` block.
    /// Valid values: strict_ordered, fixed_arity
    pub const NAMING_POLICY: &str = "SPAN_MUTATOR_NAMING_POLICY";
}

/// Default values for configuration parameters.
pub mod defaults {
    /// Log directive used when `RUST_LOG` is not set.
    pub const LOG_FILTER: &str = "info";
}
