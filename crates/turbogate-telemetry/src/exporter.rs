//! Trace logging observability plugin

use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info, warn};
use turbogate_core::{CancellationToken, ObservabilityPlugin, Plugin, PluginResult};
use turbogate_types::{SpanStatus, Trace};

/// Writes every completed request trace to the `tracing` log
///
/// One `info` summary per trace, one `debug` line per span. Failed spans are
/// logged at `warn`.
#[derive(Debug, Default)]
pub struct TraceLogger {
    exported: AtomicU64,
}

impl TraceLogger {
    /// Registry name of this plugin
    pub const NAME: &'static str = "trace-logger";

    /// Create a logger
    pub fn new() -> Self {
        Self::default()
    }

    /// Traces written so far
    pub fn traces_logged(&self) -> u64 {
        self.exported.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl Plugin for TraceLogger {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn as_observability(self: Arc<Self>) -> Option<Arc<dyn ObservabilityPlugin>> {
        Some(self)
    }
}

#[async_trait]
impl ObservabilityPlugin for TraceLogger {
    async fn inject(&self, _background: &CancellationToken, trace: &Trace) -> PluginResult<()> {
        let failed = trace
            .spans
            .iter()
            .filter(|span| span.status == SpanStatus::Error)
            .count();
        let duration_ms = trace
            .end_time
            .map(|end| (end - trace.start_time).num_milliseconds());

        info!(
            trace_id = %trace.trace_id,
            spans = trace.spans.len(),
            failed_spans = failed,
            duration_ms = ?duration_ms,
            "Request trace"
        );

        for span in &trace.spans {
            if span.status == SpanStatus::Error {
                warn!(
                    trace_id = %trace.trace_id,
                    span = %span.name,
                    kind = ?span.kind,
                    duration_ms = ?span.duration_ms(),
                    message = span.status_message.as_deref().unwrap_or_default(),
                    "Span failed"
                );
            } else {
                debug!(
                    trace_id = %trace.trace_id,
                    span = %span.name,
                    kind = ?span.kind,
                    duration_ms = ?span.duration_ms(),
                    attributes = ?span.attributes,
                    "Span"
                );
            }
        }

        self.exported.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}
