//! Core plugin traits and hook outcome types
//!
//! A plugin implements any subset of the hooks; every hook has a pass-through
//! default. Domain hooks take shared borrows and hand back explicit
//! replacements, so a hook that fails cannot leave half-applied changes behind.
//! Transport hooks work on the pooled request/response in place.

use crate::context::RequestContext;
use crate::error::{PluginError, PluginResult};
use async_trait::async_trait;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use turbogate_types::{
    DomainError, DomainRequest, DomainResponse, ShortCircuit, StreamChunk, Trace,
    TransportRequest, TransportResponse,
};

// ============================================================================
// HOOK OUTCOMES
// ============================================================================

/// What a domain PreHook decided
#[derive(Debug, Clone, Default)]
pub struct PreHookOutcome {
    /// Replacement request for the rest of the chain; `None` keeps the current one
    pub request: Option<DomainRequest>,
    /// Terminal decision; stops the PreHook chain and skips the provider
    pub short_circuit: Option<ShortCircuit>,
}

impl PreHookOutcome {
    /// Keep the request and continue
    #[must_use]
    pub fn proceed() -> Self {
        Self::default()
    }

    /// Continue with a rewritten request
    #[must_use]
    pub fn rewrite(request: DomainRequest) -> Self {
        Self {
            request: Some(request),
            short_circuit: None,
        }
    }

    /// Stop and answer with a response
    #[must_use]
    pub fn respond(response: DomainResponse) -> Self {
        Self {
            request: None,
            short_circuit: Some(ShortCircuit::Response(response)),
        }
    }

    /// Stop and answer with an error
    #[must_use]
    pub fn reject(error: DomainError) -> Self {
        Self {
            request: None,
            short_circuit: Some(ShortCircuit::Error(error)),
        }
    }
}

/// What a domain PostHook decided
#[derive(Debug, Clone, Default)]
pub enum PostHookOutcome {
    /// Leave response and error as they are
    #[default]
    Unchanged,
    /// Replace both sides; setting the error to [`DomainError::empty`] or
    /// `None` while providing a response recovers
    Replace {
        /// New response
        response: Option<DomainResponse>,
        /// New error
        error: Option<DomainError>,
    },
}

impl PostHookOutcome {
    /// Recover: drop the error and answer with `response`
    #[must_use]
    pub fn recover(response: DomainResponse) -> Self {
        Self::Replace {
            response: Some(response),
            error: None,
        }
    }

    /// Invalidate: drop the response and answer with `error`
    #[must_use]
    pub fn fail(error: DomainError) -> Self {
        Self::Replace {
            response: None,
            error: Some(error),
        }
    }
}

/// What a stream chunk hook decided for one chunk
#[derive(Debug)]
pub enum ChunkOutcome {
    /// Forward the (possibly modified) chunk
    Continue(StreamChunk),
    /// Drop the chunk silently; later chunks are unaffected
    Drop,
    /// Log the error and forward the chunk anyway
    ContinueWithError(StreamChunk, PluginError),
    /// Terminate the stream and surface the error to the client
    Abort(PluginError),
}

impl ChunkOutcome {
    /// Build an outcome from the `(chunk, error)` pair convention
    #[must_use]
    pub fn from_parts(chunk: Option<StreamChunk>, error: Option<PluginError>) -> Self {
        match (chunk, error) {
            (Some(chunk), None) => Self::Continue(chunk),
            (None, None) => Self::Drop,
            (Some(chunk), Some(error)) => Self::ContinueWithError(chunk, error),
            (None, Some(error)) => Self::Abort(error),
        }
    }
}

// ============================================================================
// PLUGIN TRAITS
// ============================================================================

/// A gateway plugin
///
/// Identity is the name; it must be unique within a registry. Ordering is by
/// registration, never by name.
///
/// # Examples
///
/// ```rust
/// use async_trait::async_trait;
/// use turbogate_core::{Plugin, PluginResult, PreHookOutcome, RequestContext};
/// use turbogate_types::DomainRequest;
///
/// #[derive(Debug)]
/// struct ModelPinning;
///
/// #[async_trait]
/// impl Plugin for ModelPinning {
///     fn name(&self) -> &str {
///         "model-pinning"
///     }
///
///     async fn pre_hook(
///         &self,
///         _ctx: &RequestContext,
///         request: &DomainRequest,
///     ) -> PluginResult<PreHookOutcome> {
///         let mut pinned = request.clone();
///         pinned.model = "gpt-4o-2024-08-06".into();
///         Ok(PreHookOutcome::rewrite(pinned))
///     }
/// }
/// ```
#[async_trait]
pub trait Plugin: Send + Sync + fmt::Debug {
    /// Stable plugin name
    fn name(&self) -> &str;

    /// Called once during registration with the plugin's config blob
    async fn initialize(&self, _config: Option<&Value>) -> PluginResult<()> {
        Ok(())
    }

    /// Raw request interception; return a response to short-circuit
    ///
    /// An `Err` also short-circuits: the client receives an error response and
    /// neither the remaining transport pre-hooks nor the domain pipeline run.
    async fn http_transport_pre_hook(
        &self,
        _ctx: &RequestContext,
        _request: &mut TransportRequest,
    ) -> PluginResult<Option<TransportResponse>> {
        Ok(None)
    }

    /// Raw response interception for non-streaming responses
    ///
    /// An `Err` aborts the remaining post-hooks and turns the response into an
    /// error response.
    async fn http_transport_post_hook(
        &self,
        _ctx: &RequestContext,
        _request: &TransportRequest,
        _response: &mut TransportResponse,
    ) -> PluginResult<()> {
        Ok(())
    }

    /// Per-chunk interception for streaming responses
    async fn http_transport_stream_chunk_hook(
        &self,
        _ctx: &RequestContext,
        _request: &TransportRequest,
        chunk: StreamChunk,
    ) -> ChunkOutcome {
        ChunkOutcome::Continue(chunk)
    }

    /// Domain request interception, run in registration order
    async fn pre_hook(
        &self,
        _ctx: &RequestContext,
        _request: &DomainRequest,
    ) -> PluginResult<PreHookOutcome> {
        Ok(PreHookOutcome::proceed())
    }

    /// Domain response interception, run in reverse for every plugin whose
    /// PreHook ran
    ///
    /// Either side may be absent.
    async fn post_hook(
        &self,
        _ctx: &RequestContext,
        _response: Option<&DomainResponse>,
        _error: Option<&DomainError>,
    ) -> PluginResult<PostHookOutcome> {
        Ok(PostHookOutcome::Unchanged)
    }

    /// Release resources; called exactly once when the plugin leaves the registry
    async fn cleanup(&self) -> PluginResult<()> {
        Ok(())
    }

    /// Capability query for [`ObservabilityPlugin`]
    ///
    /// Resolved once at registration. Implementors of `ObservabilityPlugin`
    /// return `Some(self)`.
    fn as_observability(self: Arc<Self>) -> Option<Arc<dyn ObservabilityPlugin>> {
        None
    }
}

/// A plugin that also receives completed traces
///
/// `inject` runs on a background task after the client response has been
/// written. It is not tied to the request's cancellation; `background` is
/// cancelled when the dispatcher shuts down.
#[async_trait]
pub trait ObservabilityPlugin: Plugin {
    /// Receive the completed trace of one request
    async fn inject(&self, background: &CancellationToken, trace: &Trace) -> PluginResult<()>;
}
