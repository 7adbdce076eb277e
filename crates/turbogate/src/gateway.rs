//! Gateway facade
//!
//! One [`Gateway`] owns the pools, the plugin registry, the provider and the
//! observability dispatcher. Per request it wires them together:
//!
//! ```text
//! handle():  pooled request ─▶ transport pre-hooks ─▶ decode ─▶ domain pipeline
//!            ─▶ encode ─▶ transport post-hooks | chunk hooks ─▶ sink
//!            ─▶ pooled objects released ─▶ trace dispatched
//! invoke():  domain pipeline only (embedded use, no transport hooks)
//! ```

use crate::codec::{JsonCodec, TransportCodec, hook_failure_error};
use crate::config::{GatewayConfig, PoolConfig};
use crate::error::{GatewayError, GatewayResult};
use crate::factory::PluginFactory;
use crate::provider::Provider;
use crate::sink::{ResponseSink, SinkError};
use async_stream::stream;
use futures::StreamExt;
use std::sync::Arc;
use tracing::{debug, info, warn};
use turbogate_core::{
    ChunkDisposition, ChunkStream, HookFailure, ObservabilityDispatcher, PluginError,
    PluginPipeline, PluginRegistry, PluginSnapshot, RequestContext, StreamStart,
    TransportInterceptor, TransportPools,
};
use turbogate_types::{
    DomainError, DomainRequest, DomainResponse, PluginState, StreamChunk, TransportRequest,
    TransportResponse,
};

/// Header carrying a caller-supplied request id
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// The plugin gateway
#[derive(Debug)]
pub struct Gateway {
    registry: Arc<PluginRegistry>,
    provider: Arc<dyn Provider>,
    codec: Arc<dyn TransportCodec>,
    pools: TransportPools,
    dispatcher: ObservabilityDispatcher,
    observability: bool,
}

/// Builder for [`Gateway`]
#[derive(Debug)]
pub struct GatewayBuilder {
    provider: Arc<dyn Provider>,
    registry: Option<Arc<PluginRegistry>>,
    codec: Option<Arc<dyn TransportCodec>>,
    pool: PoolConfig,
    observability: bool,
}

impl GatewayBuilder {
    /// Use an existing registry
    #[must_use]
    pub fn registry(mut self, registry: Arc<PluginRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Use a custom codec instead of [`JsonCodec`]
    #[must_use]
    pub fn codec(mut self, codec: Arc<dyn TransportCodec>) -> Self {
        self.codec = Some(codec);
        self
    }

    /// Pool sizing
    #[must_use]
    pub fn pool(mut self, pool: PoolConfig) -> Self {
        self.pool = pool;
        self
    }

    /// Enable or disable trace delivery to observability plugins
    #[must_use]
    pub fn observability(mut self, enabled: bool) -> Self {
        self.observability = enabled;
        self
    }

    /// Build the gateway
    pub fn build(self) -> Gateway {
        Gateway {
            registry: self.registry.unwrap_or_default(),
            provider: self.provider,
            codec: self.codec.unwrap_or_else(|| Arc::new(JsonCodec::new())),
            pools: TransportPools::new(self.pool.prewarm, self.pool.max_idle),
            dispatcher: ObservabilityDispatcher::new(),
            observability: self.observability,
        }
    }
}

impl Gateway {
    /// Start building a gateway around a provider
    pub fn builder(provider: Arc<dyn Provider>) -> GatewayBuilder {
        GatewayBuilder {
            provider,
            registry: None,
            codec: None,
            pool: PoolConfig::default(),
            observability: true,
        }
    }

    /// Build a gateway and register the configured plugins in order
    ///
    /// Plugins without a constructor in `factory`, whose constructor fails,
    /// or whose `initialize` fails, are marked `error` in the registry and
    /// skipped.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Plugin`] on a duplicate plugin name.
    pub async fn from_config(
        config: &GatewayConfig,
        factory: &PluginFactory,
        provider: Arc<dyn Provider>,
    ) -> GatewayResult<Self> {
        let gateway = Self::builder(provider)
            .pool(config.pool)
            .observability(config.observability.enabled)
            .build();

        for plugin_config in &config.plugins {
            let name = plugin_config.name.as_str();
            let plugin = match factory.build(plugin_config) {
                Some(Ok(plugin)) => plugin,
                Some(Err(source)) => {
                    let error = GatewayError::PluginConstruction {
                        name: name.to_string(),
                        source,
                    };
                    warn!(plugin = %name, error = %error, "Skipping plugin");
                    gateway
                        .registry
                        .record(name, PluginState::Error, error.to_string());
                    continue;
                }
                None => {
                    warn!(plugin = %name, "No constructor for plugin, skipping");
                    gateway
                        .registry
                        .record(name, PluginState::Error, "no constructor registered");
                    continue;
                }
            };
            match gateway.registry.register(plugin, plugin_config).await {
                Ok(()) => {}
                // The registry has already recorded the `error` status
                Err(e @ PluginError::Initialization { .. }) => {
                    warn!(plugin = %name, error = %e, "Plugin failed to initialize, skipping");
                }
                Err(e) => return Err(e.into()),
            }
        }

        info!(
            plugins = gateway.registry.len(),
            observability = gateway.observability,
            "Gateway ready"
        );
        Ok(gateway)
    }

    /// The plugin registry
    pub fn registry(&self) -> &Arc<PluginRegistry> {
        &self.registry
    }

    /// The transport object pools
    pub fn pools(&self) -> &TransportPools {
        &self.pools
    }

    /// The observability dispatcher
    pub fn dispatcher(&self) -> &ObservabilityDispatcher {
        &self.dispatcher
    }

    /// Serve one network request end to end
    ///
    /// Every outcome (short-circuit, hook failure, provider error, stream
    /// abort) is written to `sink` as a response; the pooled objects are
    /// released before the trace is dispatched.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Sink`] when writing to the client failed; the
    /// request context is cancelled in that case.
    pub async fn handle(
        &self,
        incoming: &TransportRequest,
        sink: &dyn ResponseSink,
    ) -> GatewayResult<()> {
        let ctx = match incoming.header(REQUEST_ID_HEADER) {
            Some(id) if !id.is_empty() => RequestContext::with_request_id(id),
            _ => RequestContext::new(),
        };
        let plugins = self.registry.snapshot();

        let result = self.serve(&ctx, &plugins, incoming, sink).await;
        if let Err(e) = &result {
            warn!(request_id = %ctx.request_id(), error = %e, "Failed to write response");
        }

        self.dispatch(&plugins, &ctx);
        result.map_err(GatewayError::from)
    }

    /// Run only the domain pipeline, as an embedded call
    ///
    /// # Errors
    ///
    /// Returns the final [`DomainError`] of the pipeline.
    pub async fn invoke(&self, request: DomainRequest) -> Result<DomainResponse, DomainError> {
        self.invoke_with(&RequestContext::new(), request).await
    }

    /// [`Gateway::invoke`] with a caller-owned context
    ///
    /// # Errors
    ///
    /// Returns the final [`DomainError`] of the pipeline.
    pub async fn invoke_with(
        &self,
        ctx: &RequestContext,
        request: DomainRequest,
    ) -> Result<DomainResponse, DomainError> {
        let plugins = self.registry.snapshot();
        let mut pipeline = PluginPipeline::new(Arc::clone(&plugins));
        let outcome = pipeline
            .execute(ctx, request, |request| self.provider.invoke(ctx, request))
            .await;
        self.dispatch(&plugins, ctx);
        outcome.into_result()
    }

    /// Run the streaming domain pipeline, as an embedded call
    ///
    /// The trace is dispatched once the returned stream has been drained.
    pub async fn invoke_stream(&self, ctx: &RequestContext, request: DomainRequest) -> ChunkStream {
        let plugins = self.registry.snapshot();
        let mut chunks = PluginPipeline::new(Arc::clone(&plugins))
            .execute_stream(ctx, request, |request| {
                self.provider.invoke_stream(ctx, request)
            })
            .await
            .into_stream();

        let dispatcher = self.observability.then(|| self.dispatcher.clone());
        let ctx = ctx.clone();
        Box::pin(stream! {
            while let Some(chunk) = chunks.next().await {
                yield chunk;
            }
            if let Some(dispatcher) = dispatcher {
                dispatcher.dispatch(&plugins, ctx.trace().complete());
            }
        })
    }

    /// Wait for in-flight trace deliveries, then clean up every plugin once
    ///
    /// Returns the cleanup failures, which have already been logged.
    pub async fn shutdown(&self) -> Vec<HookFailure> {
        info!("Shutting down gateway");
        self.dispatcher.shutdown().await;
        self.registry.shutdown().await
    }

    async fn serve(
        &self,
        ctx: &RequestContext,
        plugins: &PluginSnapshot,
        incoming: &TransportRequest,
        sink: &dyn ResponseSink,
    ) -> Result<(), SinkError> {
        let mut request = self.pools.requests.acquire();
        request.clone_from(incoming);
        let mut response = self.pools.responses.acquire();
        let interceptor = TransportInterceptor::new(Arc::clone(plugins));

        match interceptor.run_pre_hooks(ctx, &mut request).await {
            Ok(None) => {}
            Ok(Some(short_circuit)) => {
                debug!(request_id = %ctx.request_id(), status = short_circuit.status_code, "Transport short-circuit");
                return write(ctx, sink.send_response(&short_circuit).await);
            }
            Err(failure) => {
                self.codec
                    .encode_error(&hook_failure_error(&failure), &mut response);
                return write(ctx, sink.send_response(&response).await);
            }
        }

        let domain_request = match self.codec.decode(&request) {
            Ok(domain_request) => domain_request,
            Err(error) => {
                debug!(request_id = %ctx.request_id(), error = %error, "Rejected malformed request");
                self.codec.encode_error(&error, &mut response);
                return self
                    .finish_response(ctx, &interceptor, &request, &mut response, sink)
                    .await;
            }
        };

        if domain_request.stream {
            return self
                .stream_response(
                    ctx,
                    plugins,
                    &interceptor,
                    &request,
                    &mut response,
                    domain_request,
                    sink,
                )
                .await;
        }

        let mut pipeline = PluginPipeline::new(Arc::clone(plugins));
        let outcome = pipeline
            .execute(ctx, domain_request, |domain_request| {
                self.provider.invoke(ctx, domain_request)
            })
            .await;
        match outcome.into_result() {
            Ok(domain_response) => self.codec.encode_response(&domain_response, &mut response),
            Err(error) => self.codec.encode_error(&error, &mut response),
        }

        self.finish_response(ctx, &interceptor, &request, &mut response, sink)
            .await
    }

    async fn finish_response(
        &self,
        ctx: &RequestContext,
        interceptor: &TransportInterceptor,
        request: &TransportRequest,
        response: &mut TransportResponse,
        sink: &dyn ResponseSink,
    ) -> Result<(), SinkError> {
        if let Err(failure) = interceptor.run_post_hooks(ctx, request, response).await {
            response.reset();
            self.codec
                .encode_error(&hook_failure_error(&failure), response);
        }
        write(ctx, sink.send_response(response).await)
    }

    #[allow(clippy::too_many_arguments)]
    async fn stream_response(
        &self,
        ctx: &RequestContext,
        plugins: &PluginSnapshot,
        interceptor: &TransportInterceptor,
        request: &TransportRequest,
        head: &mut TransportResponse,
        domain_request: DomainRequest,
        sink: &dyn ResponseSink,
    ) -> Result<(), SinkError> {
        let start = PluginPipeline::new(Arc::clone(plugins))
            .execute_stream(ctx, domain_request, |domain_request| {
                self.provider.invoke_stream(ctx, domain_request)
            })
            .await;

        // Nothing streamed yet: a failure keeps its own status code
        let mut chunks = match start {
            StreamStart::Streaming(chunks) => chunks,
            StreamStart::Settled(outcome) => match outcome.into_result() {
                Ok(domain_response) => {
                    futures::stream::iter([StreamChunk::response(0, domain_response)]).boxed()
                }
                Err(error) => {
                    debug!(request_id = %ctx.request_id(), status = error.http_status(), "Stream settled with an error");
                    self.codec.encode_error(&error, head);
                    return self
                        .finish_response(ctx, interceptor, request, head, sink)
                        .await;
                }
            },
        };

        self.codec.encode_stream_head(head);
        if let Err(e) = write(ctx, sink.start_stream(head).await) {
            drain(chunks).await;
            return Err(e);
        }

        let mut last_index = 0;
        while let Some(chunk) = chunks.next().await {
            last_index = chunk.index;
            match interceptor.run_chunk_hooks(ctx, request, chunk).await {
                ChunkDisposition::Forward(chunk) => {
                    let frame = self.codec.encode_chunk(&chunk);
                    if let Err(e) = write(ctx, sink.send_chunk(frame).await) {
                        drain(chunks).await;
                        return Err(e);
                    }
                }
                ChunkDisposition::Dropped { .. } => {}
                ChunkDisposition::Aborted(failure) => {
                    ctx.cancel();
                    drain(chunks).await;
                    let frame = self.codec.encode_chunk(&StreamChunk::error(
                        last_index,
                        hook_failure_error(&failure),
                    ));
                    return write(ctx, sink.abort_stream(frame).await);
                }
            }
        }

        write(ctx, sink.finish_stream(self.codec.stream_end()).await)
    }

    fn dispatch(&self, plugins: &PluginSnapshot, ctx: &RequestContext) {
        if self.observability {
            self.dispatcher.dispatch(plugins, ctx.trace().complete());
        }
    }
}

/// A failed write means the client is gone: cancel the request
fn write(ctx: &RequestContext, result: Result<(), SinkError>) -> Result<(), SinkError> {
    if result.is_err() {
        ctx.cancel();
    }
    result
}

/// Let a cancelled stream run to its end so its spans are recorded
async fn drain(mut chunks: ChunkStream) {
    while chunks.next().await.is_some() {}
}
