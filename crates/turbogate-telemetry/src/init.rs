//! Subscriber installation

use crate::config::{LogFormat, LogOutput};
use crate::{TelemetryConfig, TelemetryError};
use tracing::{Subscriber, info};
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{
    Layer, Registry, filter::EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt,
};

/// Guard that owns the gateway's logging setup
///
/// Keep it alive for as long as the process logs; dropping it emits the
/// shutdown line. The global subscriber itself cannot be uninstalled.
///
/// ```rust,ignore
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let _telemetry = TelemetryConfig::default().init()?;
///     run_gateway().await
/// }
/// ```
#[derive(Debug)]
pub struct TelemetryGuard {
    config: TelemetryConfig,
}

impl TelemetryGuard {
    /// Install the global subscriber for `config`
    ///
    /// # Errors
    ///
    /// Returns [`TelemetryError::InvalidConfiguration`] when the log filter
    /// cannot be parsed and [`TelemetryError::TracingError`] when a global
    /// subscriber is already installed.
    pub fn init(config: TelemetryConfig) -> Result<Self, TelemetryError> {
        let env_filter = build_filter(&config)?;

        Registry::default()
            .with(env_filter)
            .with(fmt_layer(&config))
            .try_init()
            .map_err(|e| TelemetryError::TracingError(e.to_string()))?;

        info!(
            service_name = %config.service_name,
            version = env!("CARGO_PKG_VERSION"),
            format = ?config.format,
            output = ?config.output,
            fields = ?config.fields,
            "Logging initialized"
        );

        Ok(Self { config })
    }

    /// Get the service name
    #[must_use]
    pub fn service_name(&self) -> &str {
        &self.config.service_name
    }

    /// Get the configuration
    #[must_use]
    pub fn config(&self) -> &TelemetryConfig {
        &self.config
    }
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        info!(
            service_name = %self.config.service_name,
            "Logging shut down"
        );
    }
}

/// Filter from `RUST_LOG`, falling back to the configured directives
///
/// # Errors
///
/// Returns [`TelemetryError::InvalidConfiguration`] for unparsable directives.
pub fn build_filter(config: &TelemetryConfig) -> Result<EnvFilter, TelemetryError> {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.filter))
        .map_err(|e| TelemetryError::InvalidConfiguration(format!("Invalid log filter: {e}")))
}

fn fmt_layer<S>(config: &TelemetryConfig) -> Box<dyn Layer<S> + Send + Sync>
where
    S: Subscriber + for<'a> LookupSpan<'a> + 'static,
{
    let writer = match config.output {
        LogOutput::Stderr => BoxMakeWriter::new(std::io::stderr),
        LogOutput::Stdout => BoxMakeWriter::new(std::io::stdout),
    };
    let layer = fmt::layer().with_writer(writer).with_target(true);

    match config.format {
        LogFormat::Json => layer
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .json()
            .boxed(),
        LogFormat::Pretty => layer.pretty().boxed(),
        LogFormat::Compact => layer.compact().boxed(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_filter_rejected() {
        // RUST_LOG, if set in the environment, would mask the configured value
        if std::env::var_os("RUST_LOG").is_some() {
            return;
        }
        let config = TelemetryConfig::builder().filter("turbogate=verbose").build();
        assert!(matches!(
            build_filter(&config),
            Err(TelemetryError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_valid_filter_accepted() {
        let config = TelemetryConfig::builder()
            .filter("warn,turbogate_core=debug")
            .build();
        assert!(build_filter(&config).is_ok());
    }
}
