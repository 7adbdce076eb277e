//! Telemetry error types

use thiserror::Error;

/// Errors that can occur while setting up telemetry
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// Invalid configuration, such as an unparsable log filter
    #[error("Invalid telemetry configuration: {0}")]
    InvalidConfiguration(String),

    /// The global subscriber could not be installed
    #[error("Tracing subscriber error: {0}")]
    TracingError(String),
}

/// Result type for telemetry operations
pub type TelemetryResult<T> = Result<T, TelemetryError>;
