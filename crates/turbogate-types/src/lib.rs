//! # TurboGate Types
//!
//! Plain data model shared by every TurboGate crate:
//!
//! - **Transport types**: [`TransportRequest`], [`TransportResponse`], [`StreamChunk`]
//! - **Domain types**: [`DomainRequest`], [`DomainResponse`], [`ShortCircuit`]
//! - **Errors**: [`DomainError`] with its tri-state [`FallbackDirective`]
//! - **Plugin descriptors**: [`PluginConfig`], [`PluginStatus`], [`PluginState`]
//! - **Traces**: [`Trace`], [`Span`]
//!
//! Everything here is serde-serializable and free of I/O; the interception
//! logic lives in `turbogate-core`.
//!
//! ## Quick Start
//!
//! ```rust
//! use turbogate_types::*;
//!
//! let request = DomainRequest::new(RequestKind::ChatCompletion, "openai", "gpt-4o");
//!
//! let error = DomainError::new("rate limited").with_status(429);
//! assert!(error.allows_fallback());
//!
//! let mut http = TransportRequest::new("POST", "/v1/chat/completions");
//! http.set_header("Content-Type", "application/json");
//! assert!(http.is_json());
//! # let _ = request;
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod domain;
pub mod error;
pub mod plugin;
pub mod stream;
pub mod trace;
pub mod transport;

pub use domain::{DomainRequest, DomainResponse, ModelTarget, RequestKind, ShortCircuit};
pub use error::{DomainError, ErrorField, FallbackDirective};
pub use plugin::{PluginConfig, PluginState, PluginStatus};
pub use stream::StreamChunk;
pub use trace::{Span, SpanKind, SpanStatus, Trace, plugin_span_name};
pub use transport::{DEFAULT_MAP_CAPACITY, TransportRequest, TransportResponse};

/// Version of the TurboGate types crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
