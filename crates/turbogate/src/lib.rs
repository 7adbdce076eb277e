//! # TurboGate
//!
//! Plugin-driven interception gateway for AI provider traffic. Every request
//! passes through an ordered chain of plugins twice: once on the way in
//! (PreHooks, registration order) and once on the way out (PostHooks, exact
//! reverse over the plugins whose PreHook ran).
//!
//! ## Layers
//!
//! - **Transport hooks** see the raw pooled request and response, and every
//!   stream chunk before it reaches the client
//! - **Domain hooks** see the decoded [`DomainRequest`](turbogate_types::DomainRequest)
//!   and can rewrite it, short-circuit with a response or error, or recover
//!   a provider failure
//! - **Observability plugins** receive the completed request trace off the
//!   response path
//!
//! The gateway never owns a socket or talks to a provider itself: it writes
//! through a [`ResponseSink`] and calls a [`Provider`].
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use turbogate::prelude::*;
//!
//! #[derive(Debug)]
//! struct Echo;
//!
//! #[async_trait]
//! impl Provider for Echo {
//!     async fn invoke(
//!         &self,
//!         _ctx: &RequestContext,
//!         request: DomainRequest,
//!     ) -> Result<DomainResponse, DomainError> {
//!         let output = request.input.clone();
//!         Ok(DomainResponse::for_request(&request, output))
//!     }
//! }
//!
//! # tokio_test::block_on(async {
//! let gateway = Gateway::builder(Arc::new(Echo)).build();
//!
//! let request = DomainRequest::new(RequestKind::ChatCompletion, "openai", "gpt-4o");
//! let response = gateway.invoke(request).await.unwrap();
//! assert_eq!(response.model, "gpt-4o");
//!
//! let sink = BufferedSink::new();
//! let incoming = TransportRequest::new("POST", "/v1/chat/completions")
//!     .with_body(r#"{"model": "openai/gpt-4o", "messages": []}"#);
//! gateway.handle(&incoming, &sink).await.unwrap();
//! assert_eq!(sink.response().unwrap().status_code, 200);
//! # });
//! ```
//!
//! ## Configuration
//!
//! [`GatewayConfig`] loads from TOML, YAML or JSON with `TURBOGATE_`
//! environment overrides; [`Gateway::from_config`] builds the plugins it
//! names through a [`PluginFactory`].

#![deny(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod codec;
pub mod config;
pub mod error;
pub mod factory;
pub mod gateway;
pub mod provider;
pub mod sink;

pub use codec::{JsonCodec, TransportCodec, hook_failure_error};
pub use config::{
    ConfigError, GatewayConfig, GatewayConfigBuilder, ObservabilityConfig, PoolConfig,
};
pub use error::{GatewayError, GatewayResult};
pub use factory::PluginFactory;
pub use gateway::{Gateway, GatewayBuilder, REQUEST_ID_HEADER};
pub use provider::Provider;
pub use sink::{BufferedSink, ResponseSink, SinkError, StreamEnd};

/// Version of the TurboGate crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Everything needed to write plugins and providers and run a gateway
pub mod prelude {
    pub use super::{
        BufferedSink, Gateway, GatewayBuilder, GatewayConfig, GatewayError, GatewayResult,
        JsonCodec, PluginFactory, PoolConfig, Provider, ResponseSink, TransportCodec,
    };

    pub use turbogate_core::{
        CancellationToken, ChunkOutcome, ChunkStream, ObservabilityPlugin, Plugin, PluginError,
        PluginRegistry, PluginResult, PostHookOutcome, PreHookOutcome, ProviderStream,
        RequestContext,
    };
    pub use turbogate_telemetry::{TelemetryConfig, TelemetryGuard, TraceLogger};
    pub use turbogate_types::{
        DomainError, DomainRequest, DomainResponse, PluginConfig, PluginState, RequestKind,
        StreamChunk, Trace, TransportRequest, TransportResponse,
    };

    pub use async_trait::async_trait;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
