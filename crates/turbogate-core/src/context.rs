//! Per-request context shared by every hook of one request
//!
//! The context is cheap to clone (all state sits behind `Arc`s) so streaming
//! pipelines can move it into the chunk stream. It carries the request id, the
//! cancellation token owned by the caller, a small key/value bag plugins use to
//! talk to each other across hooks, and the trace recorder.

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use turbogate_types::{Span, SpanKind, SpanStatus, Trace};
use uuid::Uuid;

/// Context for one request, handed to every hook by shared reference
#[derive(Clone)]
pub struct RequestContext {
    request_id: Arc<str>,
    cancellation: CancellationToken,
    values: Arc<RwLock<HashMap<String, Value>>>,
    trace: Arc<TraceRecorder>,
}

impl fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestContext")
            .field("request_id", &self.request_id)
            .field("cancelled", &self.cancellation.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestContext {
    /// Create a context with a fresh request id
    #[must_use]
    pub fn new() -> Self {
        Self::with_request_id(Uuid::new_v4().to_string())
    }

    /// Create a context with a caller-supplied request id
    ///
    /// The request id doubles as the trace id.
    #[must_use]
    pub fn with_request_id(request_id: impl Into<String>) -> Self {
        let request_id: String = request_id.into();
        Self {
            trace: Arc::new(TraceRecorder::new(request_id.clone())),
            request_id: request_id.into(),
            cancellation: CancellationToken::new(),
            values: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Tie the context to a caller's cancellation token
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    /// Request identifier
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// Cancellation token for this request
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancellation
    }

    /// Whether the request has been cancelled
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Cancel the request (client went away, sink failed...)
    pub fn cancel(&self) {
        self.cancellation.cancel();
    }

    /// Store a value for later hooks of the same request
    pub fn set_value(&self, key: impl Into<String>, value: Value) {
        self.values.write().insert(key.into(), value);
    }

    /// Read a value stored by an earlier hook
    pub fn value(&self, key: &str) -> Option<Value> {
        self.values.read().get(key).cloned()
    }

    /// Trace recorder for this request
    pub fn trace(&self) -> &TraceRecorder {
        &self.trace
    }
}

/// A span that has started but not yet been recorded
#[derive(Debug, Clone)]
pub struct ActiveSpan {
    name: String,
    kind: SpanKind,
    start_time: DateTime<Utc>,
    status: SpanStatus,
    status_message: Option<String>,
    attributes: HashMap<String, Value>,
}

impl ActiveSpan {
    /// Set an attribute
    pub fn set_attribute(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.attributes.insert(key.into(), value.into());
    }

    /// Mark the span as failed
    pub fn set_error(&mut self, message: impl Into<String>) {
        self.status = SpanStatus::Error;
        self.status_message = Some(message.into());
    }

    /// Span name
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Collects the spans of one request into a [`Trace`]
#[derive(Debug)]
pub struct TraceRecorder {
    trace: Mutex<Trace>,
}

impl TraceRecorder {
    /// Empty recorder for a trace id
    pub fn new(trace_id: impl Into<String>) -> Self {
        Self {
            trace: Mutex::new(Trace::new(trace_id)),
        }
    }

    /// Start a span now
    pub fn start_span(&self, name: impl Into<String>, kind: SpanKind) -> ActiveSpan {
        self.start_span_at(name, kind, Utc::now())
    }

    /// Start a span at a given time
    pub fn start_span_at(
        &self,
        name: impl Into<String>,
        kind: SpanKind,
        start_time: DateTime<Utc>,
    ) -> ActiveSpan {
        ActiveSpan {
            name: name.into(),
            kind,
            start_time,
            status: SpanStatus::Unset,
            status_message: None,
            attributes: HashMap::new(),
        }
    }

    /// End a span now and add it to the trace
    pub fn end_span(&self, span: ActiveSpan) {
        self.end_span_at(span, Utc::now());
    }

    /// End a span at a given time and add it to the trace
    pub fn end_span_at(&self, span: ActiveSpan, end_time: DateTime<Utc>) {
        let status = match span.status {
            SpanStatus::Unset => SpanStatus::Ok,
            other => other,
        };
        let mut trace = self.trace.lock();
        let span = Span {
            span_id: Uuid::new_v4().to_string(),
            parent_id: None,
            trace_id: trace.trace_id.clone(),
            name: span.name,
            kind: span.kind,
            start_time: span.start_time,
            end_time: Some(end_time),
            status,
            status_message: span.status_message,
            attributes: span.attributes,
        };
        trace.spans.push(span);
    }

    /// Set a request-level attribute
    pub fn set_attribute(&self, key: impl Into<String>, value: impl Into<Value>) {
        self.trace.lock().attributes.insert(key.into(), value.into());
    }

    /// Copy of the trace as recorded so far
    pub fn snapshot(&self) -> Trace {
        self.trace.lock().clone()
    }

    /// Mark the trace complete and return it
    ///
    /// Spans recorded afterwards still land in the recorder but not in the
    /// returned copy.
    pub fn complete(&self) -> Trace {
        let mut trace = self.trace.lock();
        if trace.end_time.is_none() {
            trace.end_time = Some(Utc::now());
        }
        trace.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_state() {
        let ctx = RequestContext::with_request_id("req-1");
        let other = ctx.clone();

        other.set_value("cache_key", Value::from("abc"));
        assert_eq!(ctx.value("cache_key"), Some(Value::from("abc")));

        other.cancel();
        assert!(ctx.is_cancelled());
    }

    #[test]
    fn test_recorder_collects_spans() {
        let ctx = RequestContext::with_request_id("trace-7");
        let mut span = ctx.trace().start_span("plugin.auth.prehook", SpanKind::Plugin);
        span.set_error("denied");
        ctx.trace().end_span(span);
        let ok = ctx.trace().start_span("llm.call", SpanKind::LlmCall);
        ctx.trace().end_span(ok);

        let trace = ctx.trace().complete();
        assert_eq!(trace.trace_id, "trace-7");
        assert_eq!(trace.spans.len(), 2);
        assert_eq!(trace.spans[0].status, SpanStatus::Error);
        assert_eq!(trace.spans[0].status_message.as_deref(), Some("denied"));
        assert_eq!(trace.spans[1].status, SpanStatus::Ok);
        assert!(trace.is_complete());
    }
}
