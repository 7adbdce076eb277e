//! Subscriber installation and trace logging

use std::sync::Arc;
use turbogate_core::{ObservabilityDispatcher, Plugin, PluginEntry, PluginSnapshot, RequestContext};
use turbogate_telemetry::{LogFormat, TelemetryConfig, TelemetryError, TraceLogger};
use turbogate_types::SpanKind;

#[test]
fn second_init_is_rejected() {
    let config = TelemetryConfig::builder()
        .filter("debug")
        .format(LogFormat::Compact)
        .build();

    let guard = config.clone().init().unwrap();
    assert_eq!(guard.service_name(), "turbogate");
    assert_eq!(guard.config().filter, "debug");

    assert!(matches!(
        config.init(),
        Err(TelemetryError::TracingError(_))
    ));
}

#[tokio::test]
async fn trace_logger_receives_dispatched_traces() {
    let logger = Arc::new(TraceLogger::new());
    assert_eq!(logger.name(), TraceLogger::NAME);

    let snapshot: PluginSnapshot = Arc::new(vec![PluginEntry::new(logger.clone())]);
    let ctx = RequestContext::with_request_id("req-7");
    let mut span = ctx.trace().start_span("plugin.guard.prehook", SpanKind::Plugin);
    span.set_error("denied");
    ctx.trace().end_span(span);

    let dispatcher = ObservabilityDispatcher::new();
    assert_eq!(dispatcher.dispatch(&snapshot, ctx.trace().complete()), 1);
    dispatcher.flush().await;

    assert_eq!(logger.traces_logged(), 1);
}
