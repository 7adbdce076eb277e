//! Logging setup and trace logging for the TurboGate gateway
//!
//! - **Structured logging**: [`TelemetryConfig`] + [`TelemetryGuard`] install a
//!   `tracing-subscriber` registry with an `EnvFilter` and JSON, pretty or compact output
//! - **Trace logging**: [`TraceLogger`], an observability plugin that writes
//!   each completed request trace to the log
//! - **Span attribute keys** shared by the pipeline and exporters
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use turbogate_telemetry::{LogFormat, TelemetryConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let _guard = TelemetryConfig::builder()
//!         .service_name("edge-gateway")
//!         .format(LogFormat::Json)
//!         .build()
//!         .init()?;
//!
//!     // Gateway code here...
//!     Ok(())
//! }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]

mod config;
mod error;
mod exporter;
mod init;

pub use config::{LogFormat, LogOutput, TelemetryConfig, TelemetryConfigBuilder};
pub use error::{TelemetryError, TelemetryResult};
pub use exporter::TraceLogger;
pub use init::{TelemetryGuard, build_filter};

// Re-export tracing macros for convenience
pub use tracing::{Instrument, instrument};
pub use tracing::{debug, error, info, trace, warn};
pub use tracing::{debug_span, error_span, info_span, trace_span, warn_span};

/// Span names and attribute keys recorded by the gateway
pub use turbogate_types::trace::attr as span_attributes;

/// Prelude module for convenient imports
pub mod prelude {
    pub use super::config::{LogFormat, LogOutput, TelemetryConfig, TelemetryConfigBuilder};
    pub use super::error::{TelemetryError, TelemetryResult};
    pub use super::exporter::TraceLogger;
    pub use super::init::TelemetryGuard;
    pub use super::span_attributes;
    pub use tracing::{Instrument, debug, error, info, instrument, trace, warn};
}
