//! Gateway configuration management

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use turbogate_telemetry::TelemetryConfig;
use turbogate_types::PluginConfig;

/// Default environment variable prefix for overrides
pub const ENV_PREFIX: &str = "TURBOGATE";

/// Gateway configuration
///
/// Every section has defaults, so a file only needs the parts it changes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Plugins in execution order
    pub plugins: Vec<PluginConfig>,
    /// Transport object pool sizing
    pub pool: PoolConfig,
    /// Trace delivery to observability plugins
    pub observability: ObservabilityConfig,
    /// Logging setup
    pub telemetry: TelemetryConfig,
}

/// Sizing of the request and response pools
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Instances allocated up front in each pool
    pub prewarm: usize,
    /// Idle instances kept per pool; releases beyond this are dropped
    pub max_idle: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            prewarm: 16,
            max_idle: 256,
        }
    }
}

/// Observability configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Hand completed traces to observability plugins
    pub enabled: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file not found
    #[error("Configuration file not found: {0}")]
    FileNotFound(PathBuf),

    /// Unsupported file format
    #[error("Unsupported configuration file format. Use .toml, .yaml, .yml, or .json")]
    UnsupportedFormat,

    /// Configuration parsing error
    #[error("Failed to parse configuration: {0}")]
    ParseError(#[from] config::ConfigError),
}

impl GatewayConfig {
    /// Load configuration from a file (TOML, YAML, or JSON)
    ///
    /// The format follows the file extension. Environment variables prefixed
    /// with `TURBOGATE_` override file settings, with `__` separating nested
    /// keys: `TURBOGATE_POOL__MAX_IDLE=512`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file does not exist, has an unsupported
    /// extension, or does not deserialize into a valid configuration.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::from_file_with_prefix(path, ENV_PREFIX)
    }

    /// Load configuration from a file with a custom environment prefix
    ///
    /// # Errors
    ///
    /// Same as [`GatewayConfig::from_file`].
    pub fn from_file_with_prefix(
        path: impl AsRef<Path>,
        env_prefix: &str,
    ) -> Result<Self, ConfigError> {
        use config::{Config, Environment, File, FileFormat};

        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }

        let format = match path.extension().and_then(|s| s.to_str()) {
            Some("toml") => FileFormat::Toml,
            Some("yaml" | "yml") => FileFormat::Yaml,
            Some("json") => FileFormat::Json,
            _ => return Err(ConfigError::UnsupportedFormat),
        };
        let source = path.to_str().ok_or(ConfigError::UnsupportedFormat)?;

        let config = Config::builder()
            .add_source(File::new(source, format))
            .add_source(
                Environment::with_prefix(env_prefix)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(config.try_deserialize()?)
    }

    /// Create a configuration builder for programmatic setup
    ///
    /// ```rust
    /// use turbogate::GatewayConfig;
    /// use turbogate_types::PluginConfig;
    ///
    /// let config = GatewayConfig::builder()
    ///     .plugin(PluginConfig::enabled("budget"))
    ///     .pool_size(8, 128)
    ///     .build();
    /// assert_eq!(config.plugins.len(), 1);
    /// ```
    pub fn builder() -> GatewayConfigBuilder {
        GatewayConfigBuilder::default()
    }
}

/// Builder for [`GatewayConfig`]
#[derive(Debug, Clone, Default)]
pub struct GatewayConfigBuilder {
    config: GatewayConfig,
}

impl GatewayConfigBuilder {
    /// Append a plugin descriptor
    #[must_use]
    pub fn plugin(mut self, plugin: PluginConfig) -> Self {
        self.config.plugins.push(plugin);
        self
    }

    /// Set pool pre-warm size and idle limit
    #[must_use]
    pub fn pool_size(mut self, prewarm: usize, max_idle: usize) -> Self {
        self.config.pool = PoolConfig { prewarm, max_idle };
        self
    }

    /// Enable or disable trace delivery
    #[must_use]
    pub fn observability(mut self, enabled: bool) -> Self {
        self.config.observability.enabled = enabled;
        self
    }

    /// Set the logging configuration
    #[must_use]
    pub fn telemetry(mut self, telemetry: TelemetryConfig) -> Self {
        self.config.telemetry = telemetry;
        self
    }

    /// Build the configuration
    #[must_use]
    pub fn build(self) -> GatewayConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = GatewayConfig::default();
        assert!(config.plugins.is_empty());
        assert_eq!(config.pool, PoolConfig { prewarm: 16, max_idle: 256 });
        assert!(config.observability.enabled);
    }

    #[test]
    fn test_builder() {
        let config = GatewayConfig::builder()
            .plugin(PluginConfig::enabled("a"))
            .plugin(PluginConfig::disabled("b"))
            .pool_size(0, 4)
            .observability(false)
            .build();

        assert_eq!(config.plugins.len(), 2);
        assert!(!config.plugins[1].enabled);
        assert_eq!(config.pool.max_idle, 4);
        assert!(!config.observability.enabled);
    }

    #[test]
    fn test_missing_file() {
        let err = GatewayConfig::from_file("/nonexistent/turbogate.toml").unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound(_)));
    }
}
