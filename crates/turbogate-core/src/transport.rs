//! Transport interceptor
//!
//! Raw HTTP-level hooks around the domain pipeline, used only on the
//! network-facing path:
//!
//! - pre-hooks in registration order, on the pooled request, may short-circuit
//! - post-hooks in reverse order, non-streaming responses only, abort on error
//! - chunk hooks in reverse order, once per streamed chunk
//!
//! The interceptor only runs hooks; turning a failure into bytes on the wire is
//! left to the caller's codec.

use crate::context::RequestContext;
use crate::error::HookFailure;
use crate::plugins::core::ChunkOutcome;
use crate::plugins::registry::PluginSnapshot;
use tracing::{debug, warn};
use turbogate_types::{StreamChunk, TransportRequest, TransportResponse};

/// What happened to a chunk after the chunk hooks ran
#[derive(Debug)]
pub enum ChunkDisposition {
    /// Send this chunk to the client
    Forward(StreamChunk),
    /// A hook dropped the chunk
    Dropped {
        /// Plugin that dropped it
        plugin: String,
    },
    /// A hook aborted the stream
    Aborted(HookFailure),
}

/// Runs transport-level hooks over one snapshot of the plugin ordering
#[derive(Debug, Clone)]
pub struct TransportInterceptor {
    plugins: PluginSnapshot,
}

impl TransportInterceptor {
    /// Interceptor over a snapshot of the active ordering
    pub fn new(plugins: PluginSnapshot) -> Self {
        Self { plugins }
    }

    /// Run transport pre-hooks in registration order
    ///
    /// `Ok(Some(response))` means a plugin short-circuited: send that response
    /// and skip the domain pipeline.
    ///
    /// # Errors
    ///
    /// A failing pre-hook short-circuits with its failure; remaining pre-hooks
    /// and the domain pipeline are skipped.
    pub async fn run_pre_hooks(
        &self,
        ctx: &RequestContext,
        request: &mut TransportRequest,
    ) -> Result<Option<TransportResponse>, HookFailure> {
        for entry in self.plugins.iter() {
            let name = entry.name();
            debug!(plugin = %name, hook = "transport_pre", request_id = %ctx.request_id(), "Running transport pre-hook");

            match entry.plugin().http_transport_pre_hook(ctx, request).await {
                Ok(None) => {}
                Ok(Some(response)) => {
                    debug!(
                        plugin = %name,
                        status = response.status_code,
                        "Transport pre-hook short-circuited"
                    );
                    return Ok(Some(response));
                }
                Err(e) => {
                    warn!(plugin = %name, hook = "transport_pre", error = %e, "Transport pre-hook failed");
                    return Err(HookFailure::new(name, &e));
                }
            }
        }
        Ok(None)
    }

    /// Run transport post-hooks in reverse order on a non-streaming response
    ///
    /// # Errors
    ///
    /// The first failure stops the chain; the caller must replace the response
    /// with an error response.
    pub async fn run_post_hooks(
        &self,
        ctx: &RequestContext,
        request: &TransportRequest,
        response: &mut TransportResponse,
    ) -> Result<(), HookFailure> {
        for entry in self.plugins.iter().rev() {
            let name = entry.name();
            debug!(plugin = %name, hook = "transport_post", request_id = %ctx.request_id(), "Running transport post-hook");

            if let Err(e) = entry
                .plugin()
                .http_transport_post_hook(ctx, request, response)
                .await
            {
                warn!(plugin = %name, hook = "transport_post", error = %e, "Transport post-hook failed, aborting");
                return Err(HookFailure::new(name, &e));
            }
        }
        Ok(())
    }

    /// Run chunk hooks in reverse order on one streamed chunk
    ///
    /// A drop or abort stops the chain for this chunk; a `(chunk, error)`
    /// outcome is logged and the chain continues.
    pub async fn run_chunk_hooks(
        &self,
        ctx: &RequestContext,
        request: &TransportRequest,
        mut chunk: StreamChunk,
    ) -> ChunkDisposition {
        for entry in self.plugins.iter().rev() {
            let name = entry.name();

            match entry
                .plugin()
                .http_transport_stream_chunk_hook(ctx, request, chunk)
                .await
            {
                ChunkOutcome::Continue(next) => chunk = next,
                ChunkOutcome::Drop => {
                    debug!(plugin = %name, request_id = %ctx.request_id(), "Chunk dropped by stream hook");
                    return ChunkDisposition::Dropped {
                        plugin: name.to_string(),
                    };
                }
                ChunkOutcome::ContinueWithError(next, e) => {
                    warn!(plugin = %name, hook = "stream_chunk", error = %e, "Stream chunk hook error, continuing");
                    chunk = next;
                }
                ChunkOutcome::Abort(e) => {
                    warn!(plugin = %name, hook = "stream_chunk", error = %e, "Stream chunk hook aborted stream");
                    return ChunkDisposition::Aborted(HookFailure::new(name, &e));
                }
            }
        }
        ChunkDisposition::Forward(chunk)
    }
}
