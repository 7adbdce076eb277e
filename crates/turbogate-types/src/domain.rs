//! Domain-level request and response types.
//!
//! The provider-specific payloads (chat messages, tool calls, embeddings...)
//! are carried as opaque JSON; the interception core only needs the routing
//! fields.

use crate::error::DomainError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Kind of provider operation a request targets
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestKind {
    /// Chat completion
    #[default]
    ChatCompletion,
    /// Legacy text completion
    TextCompletion,
    /// Responses API
    Responses,
    /// Embedding generation
    Embedding,
    /// Text to speech
    Speech,
    /// Speech to text
    Transcription,
    /// Image generation
    ImageGeneration,
    /// Model listing
    ListModels,
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ChatCompletion => "chat_completion",
            Self::TextCompletion => "text_completion",
            Self::Responses => "responses",
            Self::Embedding => "embedding",
            Self::Speech => "speech",
            Self::Transcription => "transcription",
            Self::ImageGeneration => "image_generation",
            Self::ListModels => "list_models",
        };
        f.write_str(name)
    }
}

/// A provider/model pair, used for fallbacks
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModelTarget {
    /// Provider key
    pub provider: String,
    /// Model name
    pub model: String,
}

/// Provider-agnostic request handed to domain PreHooks
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DomainRequest {
    /// Operation kind
    #[serde(default)]
    pub kind: RequestKind,
    /// Provider key
    pub provider: String,
    /// Model name
    pub model: String,
    /// Whether the caller asked for a streamed response
    #[serde(default)]
    pub stream: bool,
    /// Provider-specific input payload
    #[serde(default)]
    pub input: Value,
    /// Ordered fallback targets the caller may retry against
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fallbacks: Vec<ModelTarget>,
}

impl DomainRequest {
    /// Create a request for a provider/model
    #[must_use]
    pub fn new(kind: RequestKind, provider: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            kind,
            provider: provider.into(),
            model: model.into(),
            ..Self::default()
        }
    }

    /// Set the input payload
    #[must_use]
    pub fn with_input(mut self, input: Value) -> Self {
        self.input = input;
        self
    }

    /// Mark the request as streaming
    #[must_use]
    pub fn streaming(mut self) -> Self {
        self.stream = true;
        self
    }

    /// Append a fallback target
    #[must_use]
    pub fn with_fallback(mut self, provider: impl Into<String>, model: impl Into<String>) -> Self {
        self.fallbacks.push(ModelTarget {
            provider: provider.into(),
            model: model.into(),
        });
        self
    }
}

/// Provider-agnostic response handed to domain PostHooks
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DomainResponse {
    /// Operation kind
    #[serde(default)]
    pub kind: RequestKind,
    /// Provider that served the response
    pub provider: String,
    /// Model that served the response
    pub model: String,
    /// Provider-specific output payload
    #[serde(default)]
    pub output: Value,
    /// Provider latency, when measured
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
}

impl DomainResponse {
    /// Create a response
    #[must_use]
    pub fn new(
        kind: RequestKind,
        provider: impl Into<String>,
        model: impl Into<String>,
        output: Value,
    ) -> Self {
        Self {
            kind,
            provider: provider.into(),
            model: model.into(),
            output,
            latency_ms: None,
        }
    }

    /// Create an empty response addressed to the request's target
    #[must_use]
    pub fn for_request(request: &DomainRequest, output: Value) -> Self {
        Self::new(request.kind, &request.provider, &request.model, output)
    }
}

/// Decision emitted by a PreHook to end the domain pipeline early
///
/// The provider is never called; the carried value becomes the PostHook input.
#[derive(Debug, Clone)]
pub enum ShortCircuit {
    /// Answer with a canned response (e.g. cache hit)
    Response(DomainResponse),
    /// Answer with an error (e.g. budget exceeded)
    Error(DomainError),
}

impl ShortCircuit {
    /// Whether the decision carries a response
    #[must_use]
    pub fn is_response(&self) -> bool {
        matches!(self, Self::Response(_))
    }

    /// Split into the PostHook input pair
    #[must_use]
    pub fn into_parts(self) -> (Option<DomainResponse>, Option<DomainError>) {
        match self {
            Self::Response(response) => (Some(response), None),
            Self::Error(error) => (None, Some(error)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_builder() {
        let request = DomainRequest::new(RequestKind::ChatCompletion, "openai", "gpt-4o")
            .with_input(json!({"messages": []}))
            .with_fallback("anthropic", "claude-sonnet")
            .streaming();

        assert!(request.stream);
        assert_eq!(request.fallbacks.len(), 1);
        assert_eq!(request.fallbacks[0].provider, "anthropic");
    }

    #[test]
    fn test_request_deserializes_with_defaults() {
        let request: DomainRequest =
            serde_json::from_str(r#"{"provider":"openai","model":"gpt-4o"}"#).unwrap();
        assert_eq!(request.kind, RequestKind::ChatCompletion);
        assert!(!request.stream);
        assert!(request.input.is_null());
    }

    #[test]
    fn test_short_circuit_parts() {
        let response = DomainResponse::new(RequestKind::Embedding, "openai", "e3", json!([]));
        let (resp, err) = ShortCircuit::Response(response.clone()).into_parts();
        assert_eq!(resp, Some(response));
        assert!(err.is_none());

        let (resp, err) = ShortCircuit::Error(DomainError::new("denied")).into_parts();
        assert!(resp.is_none());
        assert_eq!(err.unwrap().message(), "denied");
    }

    #[test]
    fn test_kind_display_matches_serde() {
        let kind = RequestKind::ImageGeneration;
        assert_eq!(
            serde_json::to_value(kind).unwrap(),
            json!(kind.to_string())
        );
    }
}
