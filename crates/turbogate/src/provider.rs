//! Provider seam
//!
//! The gateway never talks to an AI provider itself; it awaits a
//! [`Provider`] once per request, between the PreHook and PostHook chains.

use async_trait::async_trait;
use std::fmt;
use turbogate_core::{ProviderStream, RequestContext};
use turbogate_types::{DomainError, DomainRequest, DomainResponse};

/// Executes a domain request against an upstream provider
///
/// Implementations should watch `ctx` for cancellation on long calls.
#[async_trait]
pub trait Provider: Send + Sync + fmt::Debug {
    /// One-shot call
    async fn invoke(
        &self,
        ctx: &RequestContext,
        request: DomainRequest,
    ) -> Result<DomainResponse, DomainError>;

    /// Open a chunk stream
    ///
    /// Defaults to an error for providers without streaming support.
    async fn invoke_stream(
        &self,
        _ctx: &RequestContext,
        request: DomainRequest,
    ) -> Result<ProviderStream, DomainError> {
        Err(DomainError::new(format!(
            "provider '{}' does not support streaming",
            request.provider
        ))
        .with_status(400)
        .with_type("unsupported_operation")
        .with_target(request.provider, request.model)
        .with_fallbacks(true))
    }
}
