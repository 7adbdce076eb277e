//! Domain pipeline executor
//!
//! Runs the PreHook chain in registration order, the provider call, then the
//! PostHook chain in reverse over exactly the plugins whose PreHook ran. The
//! [`ExecutionRecord`] built on the forward pass is the only thing the backward
//! pass consults, so a short-circuit at plugin *k* yields PostHooks *k..1*.
//!
//! Hook failures never reach the caller. They are logged, recorded on the
//! span and kept in [`PluginPipeline::pre_hook_errors`] /
//! [`PluginPipeline::post_hook_errors`]; the chain continues with the state it
//! had before the failing call.

use crate::context::{ActiveSpan, RequestContext};
use crate::error::HookFailure;
use crate::plugins::core::{PostHookOutcome, PreHookOutcome};
use crate::plugins::registry::PluginSnapshot;
use async_stream::stream;
use chrono::Utc;
use futures::StreamExt;
use futures::stream::BoxStream;
use smallvec::SmallVec;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};
use turbogate_types::trace::attr;
use turbogate_types::{
    DomainError, DomainRequest, DomainResponse, ShortCircuit, SpanKind, StreamChunk,
    plugin_span_name,
};

/// Stream of provider chunks, before PostHooks
pub type ProviderStream = BoxStream<'static, Result<DomainResponse, DomainError>>;

/// Stream of chunks after PostHooks
pub type ChunkStream = BoxStream<'static, StreamChunk>;

/// Indices (into the plugin snapshot) of plugins whose PreHook ran, in order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionRecord {
    executed: SmallVec<[usize; 8]>,
}

impl ExecutionRecord {
    /// Append a plugin index
    pub fn push(&mut self, index: usize) {
        self.executed.push(index);
    }

    /// Number of PreHooks that ran
    pub fn len(&self) -> usize {
        self.executed.len()
    }

    /// Whether no PreHook ran
    pub fn is_empty(&self) -> bool {
        self.executed.is_empty()
    }

    /// Plugin index at a position of the forward pass
    pub fn get(&self, position: usize) -> Option<usize> {
        self.executed.get(position).copied()
    }

    /// Plugin indices in forward order
    pub fn indices(&self) -> &[usize] {
        &self.executed
    }

    /// Forget everything, keeping capacity
    pub fn clear(&mut self) {
        self.executed.clear();
    }
}

/// Final `(response, error)` pair after the PostHook chain
///
/// The error, when present, is never the empty sentinel and has its fallback
/// directive resolved. When both sides survive the chain the error wins and
/// the response is dropped.
#[derive(Debug, Clone, Default)]
pub struct PipelineOutcome {
    /// Response to return
    pub response: Option<DomainResponse>,
    /// Error to return
    pub error: Option<DomainError>,
}

impl PipelineOutcome {
    /// Apply the recovery and precedence rules to a raw pair
    pub fn resolve(response: Option<DomainResponse>, error: Option<DomainError>) -> Self {
        match error {
            Some(error) if error.is_empty() => {
                debug!(has_response = response.is_some(), "Error recovered by PostHook");
                Self {
                    response,
                    error: None,
                }
            }
            Some(mut error) => {
                if response.is_some() {
                    debug!("PostHooks left both a response and an error; error takes precedence");
                }
                error.allow_fallbacks = error.allow_fallbacks.resolved();
                Self {
                    response: None,
                    error: Some(error),
                }
            }
            None => Self {
                response,
                error: None,
            },
        }
    }

    /// Whether the outcome carries a response
    pub fn is_success(&self) -> bool {
        self.error.is_none() && self.response.is_some()
    }

    /// Whether PostHooks cleared both sides
    pub fn is_cleared(&self) -> bool {
        self.response.is_none() && self.error.is_none()
    }

    /// Collapse into a `Result` for callers that need exactly one side
    ///
    /// An outcome with neither side becomes a gateway error (500, fallback
    /// denied).
    ///
    /// # Errors
    ///
    /// Returns the pipeline's error, or the gateway error above.
    pub fn into_result(self) -> Result<DomainResponse, DomainError> {
        match (self.response, self.error) {
            (_, Some(error)) => Err(error),
            (Some(response), None) => Ok(response),
            (None, None) => Err(
                DomainError::gateway(500, "plugin pipeline produced neither a response nor an error")
                    .with_type("gateway_error")
                    .with_fallbacks(false),
            ),
        }
    }

    fn into_chunk(self, index: u64) -> StreamChunk {
        StreamChunk {
            index,
            response: self.response,
            error: self.error,
        }
    }
}

/// How a streaming execution began
pub enum StreamStart {
    /// The provider stream opened; chunks follow
    Streaming(ChunkStream),
    /// Settled before any provider chunk: a PreHook short-circuit or a
    /// failure to open the provider stream, after the PostHook chain
    Settled(PipelineOutcome),
}

impl StreamStart {
    /// View the start as a chunk stream
    ///
    /// A settled outcome becomes a single chunk at index 0, or no chunk at
    /// all when PostHooks cleared both sides.
    pub fn into_stream(self) -> ChunkStream {
        match self {
            Self::Streaming(chunks) => chunks,
            Self::Settled(outcome) if outcome.is_cleared() => {
                debug!("PostHooks cleared settled stream, no chunk to send");
                futures::stream::empty().boxed()
            }
            Self::Settled(outcome) => futures::stream::iter([outcome.into_chunk(0)]).boxed(),
        }
    }
}

impl fmt::Debug for StreamStart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Streaming(_) => f.write_str("Streaming(..)"),
            Self::Settled(outcome) => f.debug_tuple("Settled").field(outcome).finish(),
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct PluginTiming {
    invocations: u64,
    total: Duration,
    errors: u64,
}

/// Executes the domain hook chain for one request
///
/// A pipeline is created per request from a registry snapshot and discarded
/// afterwards.
#[derive(Debug)]
pub struct PluginPipeline {
    plugins: PluginSnapshot,
    record: ExecutionRecord,
    pre_hook_errors: Vec<HookFailure>,
    post_hook_errors: Vec<HookFailure>,
    streaming: bool,
    timings: Vec<(usize, PluginTiming)>,
    chunk_count: u64,
}

impl PluginPipeline {
    /// Pipeline over a snapshot of the active ordering
    pub fn new(plugins: PluginSnapshot) -> Self {
        Self {
            plugins,
            record: ExecutionRecord::default(),
            pre_hook_errors: Vec::new(),
            post_hook_errors: Vec::new(),
            streaming: false,
            timings: Vec::new(),
            chunk_count: 0,
        }
    }

    /// Run PreHooks in registration order
    ///
    /// Returns the (possibly rewritten) request and the first short-circuit
    /// decision, if any. Later PreHooks never run after a short-circuit.
    pub async fn run_pre_hooks(
        &mut self,
        ctx: &RequestContext,
        mut request: DomainRequest,
    ) -> (DomainRequest, Option<ShortCircuit>) {
        let plugins = Arc::clone(&self.plugins);

        for (index, entry) in plugins.iter().enumerate() {
            let name = entry.name();
            debug!(plugin = %name, hook = "pre", request_id = %ctx.request_id(), "Running PreHook");

            let mut span = ctx
                .trace()
                .start_span(plugin_span_name(name, "prehook"), SpanKind::Plugin);
            let result = entry.plugin().pre_hook(ctx, &request).await;
            self.record.push(index);

            match result {
                Ok(PreHookOutcome {
                    request: replacement,
                    short_circuit,
                }) => {
                    if let Some(replacement) = replacement {
                        request = replacement;
                    }
                    if let Some(decision) = short_circuit {
                        span.set_attribute(attr::SHORT_CIRCUIT, true);
                        ctx.trace().end_span(span);
                        debug!(
                            plugin = %name,
                            with_response = decision.is_response(),
                            executed = self.record.len(),
                            "PreHook short-circuited"
                        );
                        return (request, Some(decision));
                    }
                }
                Err(e) => {
                    warn!(plugin = %name, hook = "pre", error = %e, "Error in PreHook");
                    span.set_attribute(attr::ERROR, e.to_string());
                    span.set_error(e.to_string());
                    self.pre_hook_errors.push(HookFailure::new(name, &e));
                }
            }
            ctx.trace().end_span(span);
        }

        (request, None)
    }

    /// Run PostHooks in reverse over the plugins whose PreHook ran
    ///
    /// Every executed plugin's PostHook runs, whatever earlier PostHooks did to
    /// the pair.
    pub async fn run_post_hooks(
        &mut self,
        ctx: &RequestContext,
        mut response: Option<DomainResponse>,
        mut error: Option<DomainError>,
    ) -> PipelineOutcome {
        let plugins = Arc::clone(&self.plugins);

        for position in (0..self.record.len()).rev() {
            let Some(index) = self.record.get(position) else {
                continue;
            };
            let Some(entry) = plugins.get(index) else {
                continue;
            };
            let name = entry.name();
            debug!(plugin = %name, hook = "post", request_id = %ctx.request_id(), "Running PostHook");

            let result = if self.streaming {
                let started = Instant::now();
                let result = entry
                    .plugin()
                    .post_hook(ctx, response.as_ref(), error.as_ref())
                    .await;
                self.accumulate(index, started.elapsed(), result.is_err());
                result
            } else {
                let mut span = ctx
                    .trace()
                    .start_span(plugin_span_name(name, "posthook"), SpanKind::Plugin);
                let result = entry
                    .plugin()
                    .post_hook(ctx, response.as_ref(), error.as_ref())
                    .await;
                if let Err(e) = &result {
                    span.set_attribute(attr::ERROR, e.to_string());
                    span.set_error(e.to_string());
                }
                ctx.trace().end_span(span);
                result
            };

            match result {
                Ok(PostHookOutcome::Unchanged) => {}
                Ok(PostHookOutcome::Replace {
                    response: new_response,
                    error: new_error,
                }) => {
                    response = new_response;
                    error = new_error;
                }
                Err(e) => {
                    warn!(plugin = %name, hook = "post", error = %e, "Error in PostHook");
                    self.post_hook_errors.push(HookFailure::new(name, &e));
                }
            }
        }

        if self.streaming {
            self.chunk_count += 1;
        }

        PipelineOutcome::resolve(response, error)
    }

    /// Run the full chain around a provider call
    pub async fn execute<F, Fut>(
        &mut self,
        ctx: &RequestContext,
        request: DomainRequest,
        call: F,
    ) -> PipelineOutcome
    where
        F: FnOnce(DomainRequest) -> Fut,
        Fut: Future<Output = Result<DomainResponse, DomainError>>,
    {
        let (request, short_circuit) = self.run_pre_hooks(ctx, request).await;

        let (response, error) = match short_circuit {
            Some(decision) => decision.into_parts(),
            None => {
                let mut span = llm_span(ctx, &request);
                let result = call(request).await;
                if let Err(e) = &result {
                    span.set_error(e.to_string());
                }
                ctx.trace().end_span(span);
                match result {
                    Ok(response) => (Some(response), None),
                    Err(error) => (None, Some(error)),
                }
            }
        };

        self.run_post_hooks(ctx, response, error).await
    }

    /// Run the chain around a streaming provider call
    ///
    /// PreHooks run once, now. When the provider stream opens, the returned
    /// [`StreamStart::Streaming`] runs the PostHook chain for every provider
    /// chunk, stops as soon as the request is cancelled (even while waiting on
    /// the provider) and records aggregated PostHook spans when it ends. A
    /// short-circuit, or a failure to open the provider stream, goes through
    /// the PostHook chain once and settles as [`StreamStart::Settled`].
    pub async fn execute_stream<F, Fut>(
        mut self,
        ctx: &RequestContext,
        request: DomainRequest,
        call: F,
    ) -> StreamStart
    where
        F: FnOnce(DomainRequest) -> Fut + Send,
        Fut: Future<Output = Result<ProviderStream, DomainError>> + Send,
    {
        let (request, short_circuit) = self.run_pre_hooks(ctx, request).await;

        let (response, error) = match short_circuit {
            Some(decision) => decision.into_parts(),
            None => {
                let mut span = llm_span(ctx, &request);
                match call(request).await {
                    Ok(upstream) => {
                        return StreamStart::Streaming(self.stream_chunks(ctx.clone(), upstream, span));
                    }
                    Err(error) => {
                        span.set_error(error.to_string());
                        ctx.trace().end_span(span);
                        (None, Some(error))
                    }
                }
            }
        };

        StreamStart::Settled(self.run_post_hooks(ctx, response, error).await)
    }

    fn stream_chunks(
        mut self,
        ctx: RequestContext,
        mut upstream: ProviderStream,
        mut span: ActiveSpan,
    ) -> ChunkStream {
        self.streaming = true;
        let mut pipeline = self;
        Box::pin(stream! {
            let mut index = 0u64;
            loop {
                let item = tokio::select! {
                    biased;
                    () = ctx.cancellation_token().cancelled() => {
                        debug!(request_id = %ctx.request_id(), "Request cancelled, stopping stream");
                        span.set_error("cancelled");
                        break;
                    }
                    item = upstream.next() => item,
                };
                let Some(item) = item else {
                    break;
                };
                let (response, error) = match item {
                    Ok(response) => (Some(response), None),
                    Err(error) => (None, Some(error)),
                };
                let outcome = pipeline.run_post_hooks(&ctx, response, error).await;
                if outcome.is_cleared() {
                    debug!(index, "PostHooks cleared chunk, skipping");
                } else {
                    yield outcome.into_chunk(index);
                }
                index += 1;
            }
            span.set_attribute(attr::STREAM_CHUNK_COUNT, index);
            ctx.trace().end_span(span);
            pipeline.finalize_streaming_spans(&ctx);
        })
    }

    /// Record one aggregated PostHook span per plugin for a finished stream
    ///
    /// Does nothing outside streaming mode or when no chunk was processed.
    pub fn finalize_streaming_spans(&mut self, ctx: &RequestContext) {
        if !self.streaming || self.timings.is_empty() {
            return;
        }

        let now = Utc::now();
        for (index, timing) in std::mem::take(&mut self.timings) {
            let Some(entry) = self.plugins.get(index) else {
                continue;
            };
            if timing.invocations == 0 {
                continue;
            }

            let total_ms = timing.total.as_secs_f64() * 1000.0;
            let started = now
                - chrono::Duration::from_std(timing.total).unwrap_or_else(|_| chrono::Duration::zero());
            let mut span = ctx.trace().start_span_at(
                plugin_span_name(entry.name(), "posthook"),
                SpanKind::Plugin,
                started,
            );
            span.set_attribute(attr::PLUGIN_INVOCATIONS, timing.invocations);
            span.set_attribute(
                attr::PLUGIN_AVG_DURATION_MS,
                total_ms / timing.invocations as f64,
            );
            span.set_attribute(attr::PLUGIN_TOTAL_DURATION_MS, timing.total.as_millis() as u64);
            if timing.errors > 0 {
                span.set_attribute(attr::PLUGIN_ERROR_COUNT, timing.errors);
                span.set_error("some invocations failed");
            }
            ctx.trace().end_span_at(span, now);
        }
    }

    /// Plugins whose PreHook ran
    pub fn execution_record(&self) -> &ExecutionRecord {
        &self.record
    }

    /// Names of plugins whose PreHook ran, in execution order
    pub fn executed_names(&self) -> Vec<&str> {
        self.record
            .indices()
            .iter()
            .filter_map(|&index| self.plugins.get(index))
            .map(|entry| entry.name())
            .collect()
    }

    /// PreHook failures of this request
    pub fn pre_hook_errors(&self) -> &[HookFailure] {
        &self.pre_hook_errors
    }

    /// PostHook failures of this request
    pub fn post_hook_errors(&self) -> &[HookFailure] {
        &self.post_hook_errors
    }

    /// Chunks processed by the PostHook chain while streaming
    pub fn chunk_count(&self) -> u64 {
        self.chunk_count
    }

    fn accumulate(&mut self, index: usize, elapsed: Duration, failed: bool) {
        // First-seen order, which is the reverse execution order
        let position = match self.timings.iter().position(|(i, _)| *i == index) {
            Some(position) => position,
            None => {
                self.timings.push((index, PluginTiming::default()));
                self.timings.len() - 1
            }
        };
        let timing = &mut self.timings[position].1;
        timing.invocations += 1;
        timing.total += elapsed;
        if failed {
            timing.errors += 1;
        }
    }
}

fn llm_span(ctx: &RequestContext, request: &DomainRequest) -> ActiveSpan {
    let mut span = ctx.trace().start_span(attr::LLM_CALL_SPAN, SpanKind::LlmCall);
    span.set_attribute(attr::PROVIDER, request.provider.as_str());
    span.set_attribute(attr::MODEL, request.model.as_str());
    span.set_attribute(attr::REQUEST_KIND, request.kind.to_string());
    span
}
