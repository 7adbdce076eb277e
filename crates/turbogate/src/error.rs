//! Gateway-level errors

use crate::config::ConfigError;
use crate::sink::SinkError;
use thiserror::Error;
use turbogate_core::PluginError;
use turbogate_telemetry::TelemetryError;

/// Errors raised by the gateway facade itself
///
/// Domain failures are not here: they travel as
/// [`DomainError`](turbogate_types::DomainError) values through the plugin
/// chain and end up in the client response.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum GatewayError {
    /// Configuration could not be loaded
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Plugin registration or lifecycle failure
    #[error(transparent)]
    Plugin(#[from] PluginError),

    /// A plugin factory failed to build an instance
    #[error("Failed to construct plugin '{name}': {source}")]
    PluginConstruction {
        /// Plugin name from the configuration
        name: String,
        /// Factory error
        #[source]
        source: anyhow::Error,
    },

    /// Writing to the client failed; the request has been cancelled
    #[error(transparent)]
    Sink(#[from] SinkError),

    /// Logging setup failed
    #[error(transparent)]
    Telemetry(#[from] TelemetryError),
}

/// Result type for gateway operations
pub type GatewayResult<T> = Result<T, GatewayError>;
