//! Logging configuration

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Log line encoding
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// One JSON object per line, for log shippers
    #[default]
    Json,
    /// Multi-line human-readable output
    Pretty,
    /// Single-line human-readable output
    Compact,
}

/// Where log lines are written
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    /// Standard error
    #[default]
    Stderr,
    /// Standard output
    Stdout,
}

/// Logging configuration of a gateway process
///
/// Usually the `[telemetry]` section of the gateway config file; every field
/// has a default.
///
/// ```rust
/// use turbogate_telemetry::{LogFormat, TelemetryConfig};
///
/// let config = TelemetryConfig::builder()
///     .service_name("edge-gateway")
///     .filter("info,turbogate_core=debug")
///     .format(LogFormat::Compact)
///     .field("region", "eu-west-1")
///     .build();
/// assert_eq!(config.fields["region"], "eu-west-1");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Name logged with the startup line
    pub service_name: String,
    /// `EnvFilter` directives; `RUST_LOG` wins when set
    #[serde(alias = "log_level")]
    pub filter: String,
    /// Line encoding
    pub format: LogFormat,
    /// Destination stream
    pub output: LogOutput,
    /// Static fields logged with the startup line (region, deployment, ...)
    pub fields: BTreeMap<String, String>,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "turbogate".to_string(),
            filter: "info,turbogate=debug".to_string(),
            format: LogFormat::default(),
            output: LogOutput::default(),
            fields: BTreeMap::new(),
        }
    }
}

impl TelemetryConfig {
    /// Start from the defaults
    #[must_use]
    pub fn builder() -> TelemetryConfigBuilder {
        TelemetryConfigBuilder::default()
    }

    /// Install the global subscriber described by this configuration
    ///
    /// # Errors
    ///
    /// See [`crate::TelemetryGuard::init`].
    pub fn init(self) -> Result<crate::TelemetryGuard, crate::TelemetryError> {
        crate::TelemetryGuard::init(self)
    }
}

/// Builder for [`TelemetryConfig`]
#[derive(Debug, Clone, Default)]
pub struct TelemetryConfigBuilder {
    config: TelemetryConfig,
}

impl TelemetryConfigBuilder {
    /// Name logged with the startup line
    #[must_use]
    pub fn service_name(mut self, name: impl Into<String>) -> Self {
        self.config.service_name = name.into();
        self
    }

    /// Filter directives
    #[must_use]
    pub fn filter(mut self, directives: impl Into<String>) -> Self {
        self.config.filter = directives.into();
        self
    }

    /// Line encoding
    #[must_use]
    pub fn format(mut self, format: LogFormat) -> Self {
        self.config.format = format;
        self
    }

    /// Destination stream
    #[must_use]
    pub fn output(mut self, output: LogOutput) -> Self {
        self.config.output = output;
        self
    }

    /// Add a static field, replacing an earlier value for `key`
    #[must_use]
    pub fn field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.fields.insert(key.into(), value.into());
        self
    }

    /// Finish
    #[must_use]
    pub fn build(self) -> TelemetryConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = TelemetryConfig::default();
        assert_eq!(config.service_name, "turbogate");
        assert_eq!(config.format, LogFormat::Json);
        assert_eq!(config.output, LogOutput::Stderr);
        assert!(config.fields.is_empty());
    }

    #[test]
    fn test_builder_overrides_fields() {
        let config = TelemetryConfig::builder()
            .filter("debug")
            .output(LogOutput::Stdout)
            .field("deployment", "staging")
            .field("deployment", "prod")
            .build();

        assert_eq!(config.filter, "debug");
        assert_eq!(config.output, LogOutput::Stdout);
        assert_eq!(config.fields.len(), 1);
        assert_eq!(config.fields["deployment"], "prod");
    }

    #[test]
    fn test_partial_deserialize_keeps_defaults() {
        let config: TelemetryConfig =
            serde_json::from_str(r#"{"log_level": "warn", "format": "pretty"}"#).unwrap();
        assert_eq!(config.filter, "warn");
        assert_eq!(config.format, LogFormat::Pretty);
        assert_eq!(config.service_name, "turbogate");
        assert_eq!(config.output, LogOutput::Stderr);
    }
}
