//! Execution traces handed to observability plugins.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Well-known span names and attribute keys
pub mod attr {
    /// Span recorded around the provider call
    pub const LLM_CALL_SPAN: &str = "llm.call";
    /// Set on a PreHook span that short-circuited
    pub const SHORT_CIRCUIT: &str = "short_circuit";
    /// Rendered hook error
    pub const ERROR: &str = "error";
    /// Provider key of the call
    pub const PROVIDER: &str = "provider";
    /// Model of the call
    pub const MODEL: &str = "model";
    /// Request kind of the call
    pub const REQUEST_KIND: &str = "request.kind";
    /// Chunks delivered by a streamed call
    pub const STREAM_CHUNK_COUNT: &str = "stream.chunk_count";
    /// Aggregated streaming PostHook invocations
    pub const PLUGIN_INVOCATIONS: &str = "plugin.invocations";
    /// Aggregated streaming PostHook mean duration
    pub const PLUGIN_AVG_DURATION_MS: &str = "plugin.avg_duration_ms";
    /// Aggregated streaming PostHook total duration
    pub const PLUGIN_TOTAL_DURATION_MS: &str = "plugin.total_duration_ms";
    /// Aggregated streaming PostHook failures
    pub const PLUGIN_ERROR_COUNT: &str = "plugin.error_count";
}

/// Span name for a plugin hook: `plugin.<name>.<hook>`
///
/// The plugin name is lower-cased with spaces replaced by dashes.
///
/// ```
/// assert_eq!(
///     turbogate_types::trace::plugin_span_name("Semantic Cache", "prehook"),
///     "plugin.semantic-cache.prehook"
/// );
/// ```
#[must_use]
pub fn plugin_span_name(plugin: &str, hook: &str) -> String {
    format!("plugin.{}.{}", plugin.replace(' ', "-").to_lowercase(), hook)
}

/// What a span measures
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpanKind {
    /// A plugin hook invocation
    Plugin,
    /// The provider call
    LlmCall,
    /// Transport-level handling
    Http,
    /// Anything else
    #[default]
    Internal,
}

/// Outcome of a span
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpanStatus {
    /// Not set
    #[default]
    Unset,
    /// Completed successfully
    Ok,
    /// Completed with an error
    Error,
}

/// One timed operation within a trace
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Span {
    /// Span identifier
    pub span_id: String,
    /// Parent span, if nested
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    /// Owning trace
    pub trace_id: String,
    /// Span name (e.g. `plugin.cache.prehook`)
    pub name: String,
    /// Span kind
    pub kind: SpanKind,
    /// Start time
    pub start_time: DateTime<Utc>,
    /// End time, once ended
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    /// Outcome
    #[serde(default)]
    pub status: SpanStatus,
    /// Message attached to an error status
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_message: Option<String>,
    /// Free-form attributes
    #[serde(default)]
    pub attributes: HashMap<String, Value>,
}

impl Span {
    /// Duration in milliseconds, if the span has ended
    #[must_use]
    pub fn duration_ms(&self) -> Option<i64> {
        self.end_time
            .map(|end| (end - self.start_time).num_milliseconds())
    }

    /// Attribute lookup
    #[must_use]
    pub fn attribute(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }
}

/// The completed set of spans for one request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trace {
    /// Trace identifier
    pub trace_id: String,
    /// Upstream parent, when propagated by the caller
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    /// Spans in start order
    #[serde(default)]
    pub spans: Vec<Span>,
    /// Trace start
    pub start_time: DateTime<Utc>,
    /// Trace end, once completed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    /// Request-level attributes
    #[serde(default)]
    pub attributes: HashMap<String, Value>,
}

impl Trace {
    /// Empty trace starting now
    #[must_use]
    pub fn new(trace_id: impl Into<String>) -> Self {
        Self {
            trace_id: trace_id.into(),
            parent_id: None,
            spans: Vec::new(),
            start_time: Utc::now(),
            end_time: None,
            attributes: HashMap::new(),
        }
    }

    /// Spans with a given name
    pub fn spans_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Span> + 'a {
        self.spans.iter().filter(move |span| span.name == name)
    }

    /// Whether the trace has been completed
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.end_time.is_some()
    }
}
