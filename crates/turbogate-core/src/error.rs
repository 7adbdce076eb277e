//! Plugin and registry error types
//!
//! [`PluginError`] is what a hook returns when the *call itself* fails. It is
//! never surfaced to the client: pipelines log it and carry on with the state
//! they had before the call. Domain-level failures travel as
//! [`turbogate_types::DomainError`] values instead.

use thiserror::Error;

/// Errors raised by plugin hooks and registry operations
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum PluginError {
    /// Plugin initialization failed
    #[error("Plugin initialization failed: {message}")]
    Initialization { message: String },

    /// Plugin configuration is invalid (including duplicate names)
    #[error("Invalid plugin configuration: {message}")]
    Configuration { message: String },

    /// No plugin with that name is registered
    #[error("Plugin '{name}' not found")]
    NotFound { name: String },

    /// A PreHook or transport pre-hook failed
    #[error("Request processing error: {message}")]
    RequestProcessing { message: String },

    /// A PostHook or transport post-hook failed
    #[error("Response processing error: {message}")]
    ResponseProcessing { message: String },

    /// A stream chunk hook failed
    #[error("Stream processing error: {message}")]
    StreamProcessing { message: String },

    /// Cleanup at shutdown failed
    #[error("Plugin cleanup failed: {message}")]
    Cleanup { message: String },

    /// Observability injection failed
    #[error("Trace injection failed: {message}")]
    Injection { message: String },

    /// The request context was cancelled while the hook was running
    #[error("Request cancelled")]
    Cancelled,

    /// External system error
    #[error("External system error: {source}")]
    External {
        #[from]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl PluginError {
    /// Create an initialization error
    pub fn initialization(message: impl Into<String>) -> Self {
        Self::Initialization {
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create a not-found error
    pub fn not_found(name: impl Into<String>) -> Self {
        Self::NotFound { name: name.into() }
    }

    /// Create a request processing error
    pub fn request_processing(message: impl Into<String>) -> Self {
        Self::RequestProcessing {
            message: message.into(),
        }
    }

    /// Create a response processing error
    pub fn response_processing(message: impl Into<String>) -> Self {
        Self::ResponseProcessing {
            message: message.into(),
        }
    }

    /// Create a stream processing error
    pub fn stream_processing(message: impl Into<String>) -> Self {
        Self::StreamProcessing {
            message: message.into(),
        }
    }

    /// Create a cleanup error
    pub fn cleanup(message: impl Into<String>) -> Self {
        Self::Cleanup {
            message: message.into(),
        }
    }

    /// Create an injection error
    pub fn injection(message: impl Into<String>) -> Self {
        Self::Injection {
            message: message.into(),
        }
    }
}

pub type PluginResult<T> = Result<T, PluginError>;

/// A hook failure kept for diagnostics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookFailure {
    /// Plugin whose hook failed
    pub plugin: String,
    /// Rendered error
    pub message: String,
}

impl HookFailure {
    pub(crate) fn new(plugin: &str, error: &PluginError) -> Self {
        Self {
            plugin: plugin.to_string(),
            message: error.to_string(),
        }
    }
}
