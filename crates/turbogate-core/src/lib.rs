//! # TurboGate Core
//!
//! The request-interception core of the gateway. Every provider call passes
//! through an ordered chain of plugins at two layers:
//!
//! - **Transport layer** ([`TransportInterceptor`]): raw pre/post hooks on the
//!   pooled HTTP request/response and a per-chunk hook for streams
//! - **Domain layer** ([`PluginPipeline`]): PreHooks in registration order,
//!   the provider call, PostHooks in exact reverse over the plugins whose
//!   PreHook ran
//!
//! Around them sit the [`PluginRegistry`] (ordering and lifecycle), the
//! [`ObjectPool`] for transport scratch objects and the
//! [`ObservabilityDispatcher`] that hands completed traces to observability
//! plugins off the response path.
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use async_trait::async_trait;
//! use turbogate_core::*;
//! use turbogate_types::*;
//!
//! #[derive(Debug)]
//! struct Budget;
//!
//! #[async_trait]
//! impl Plugin for Budget {
//!     fn name(&self) -> &str {
//!         "budget"
//!     }
//!
//!     async fn pre_hook(
//!         &self,
//!         _ctx: &RequestContext,
//!         _request: &DomainRequest,
//!     ) -> PluginResult<PreHookOutcome> {
//!         Ok(PreHookOutcome::reject(
//!             DomainError::new("budget exceeded").with_status(429).with_fallbacks(false),
//!         ))
//!     }
//! }
//!
//! # tokio_test::block_on(async {
//! let registry = PluginRegistry::new();
//! registry.register(Arc::new(Budget), &PluginConfig::enabled("budget")).await.unwrap();
//!
//! let ctx = RequestContext::new();
//! let mut pipeline = PluginPipeline::new(registry.snapshot());
//! let request = DomainRequest::new(RequestKind::ChatCompletion, "openai", "gpt-4o");
//! let outcome = pipeline
//!     .execute(&ctx, request, |_| async { Err(DomainError::new("provider not called")) })
//!     .await;
//!
//! assert_eq!(outcome.error.unwrap().http_status(), 429);
//! # });
//! ```

#![deny(unsafe_code)]

pub mod context;
pub mod error;
pub mod observability;
pub mod pipeline;
pub mod plugins;
pub mod pool;
pub mod transport;

pub use context::{ActiveSpan, RequestContext, TraceRecorder};
pub use error::{HookFailure, PluginError, PluginResult};
pub use observability::ObservabilityDispatcher;
pub use pipeline::{
    ChunkStream, ExecutionRecord, PipelineOutcome, PluginPipeline, ProviderStream, StreamStart,
};
pub use plugins::{
    ChunkOutcome, ObservabilityPlugin, Plugin, PluginEntry, PluginRegistry, PluginSnapshot,
    PostHookOutcome, PreHookOutcome,
};
pub use pool::{ObjectPool, PoolStats, Poolable, Pooled, TransportPools};
pub use transport::{ChunkDisposition, TransportInterceptor};

pub use tokio_util::sync::CancellationToken;

/// Version of the TurboGate core crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
