//! Translation between the transport and domain representations
//!
//! [`JsonCodec`] understands OpenAI-style JSON bodies where the model is
//! addressed as `provider/model`, and frames stream chunks as server-sent
//! events.

use bytes::Bytes;
use serde_json::{Map, Value};
use std::fmt;
use turbogate_core::HookFailure;
use turbogate_types::{
    DomainError, DomainRequest, DomainResponse, ModelTarget, RequestKind, StreamChunk,
    TransportRequest, TransportResponse,
};

/// Converts between pooled transport objects and domain values
pub trait TransportCodec: Send + Sync + fmt::Debug {
    /// Build the domain request from a transport request
    ///
    /// # Errors
    ///
    /// Returns a client-facing [`DomainError`] when the request is malformed.
    fn decode(&self, request: &TransportRequest) -> Result<DomainRequest, DomainError>;

    /// Write a successful response into `out`
    fn encode_response(&self, response: &DomainResponse, out: &mut TransportResponse);

    /// Write an error response into `out`
    fn encode_error(&self, error: &DomainError, out: &mut TransportResponse);

    /// Status and headers that open a stream
    fn encode_stream_head(&self, out: &mut TransportResponse);

    /// Frame one chunk for the wire
    fn encode_chunk(&self, chunk: &StreamChunk) -> Bytes;

    /// Frame that terminates a stream normally
    fn stream_end(&self) -> Bytes;
}

/// Client-facing error for a failed transport hook
pub fn hook_failure_error(failure: &HookFailure) -> DomainError {
    DomainError::gateway(
        500,
        format!("plugin '{}' failed: {}", failure.plugin, failure.message),
    )
    .with_type("plugin_error")
    .with_fallbacks(false)
}

/// JSON bodies with `provider/model` addressing and SSE chunk framing
#[derive(Debug, Clone, Default)]
pub struct JsonCodec;

const SSE_DONE: &[u8] = b"data: [DONE]\n\n";

impl JsonCodec {
    /// Create a codec
    pub fn new() -> Self {
        Self
    }

    fn kind_for_path(path: &str) -> Option<RequestKind> {
        let path = path.trim_end_matches('/');
        // Order matters: "/chat/completions" also ends with "/completions"
        let kind = if path.ends_with("/chat/completions") {
            RequestKind::ChatCompletion
        } else if path.ends_with("/completions") {
            RequestKind::TextCompletion
        } else if path.ends_with("/responses") {
            RequestKind::Responses
        } else if path.ends_with("/embeddings") {
            RequestKind::Embedding
        } else if path.ends_with("/audio/speech") {
            RequestKind::Speech
        } else if path.ends_with("/audio/transcriptions") {
            RequestKind::Transcription
        } else if path.ends_with("/images/generations") {
            RequestKind::ImageGeneration
        } else if path.ends_with("/models") {
            RequestKind::ListModels
        } else {
            return None;
        };
        Some(kind)
    }

    fn parse_target(model: &str) -> Result<ModelTarget, DomainError> {
        match model.split_once('/') {
            Some((provider, model)) if !provider.is_empty() && !model.is_empty() => {
                Ok(ModelTarget {
                    provider: provider.to_string(),
                    model: model.to_string(),
                })
            }
            _ => Err(invalid_request(format!(
                "model '{model}' must be of the form provider/model"
            ))),
        }
    }

    fn body_object(request: &TransportRequest) -> Result<Map<String, Value>, DomainError> {
        if request.body.is_empty() {
            return Ok(Map::new());
        }
        match serde_json::from_slice::<Value>(&request.body) {
            Ok(Value::Object(body)) => Ok(body),
            Ok(_) => Err(invalid_request("request body must be a JSON object")),
            Err(e) => Err(invalid_request(format!("invalid JSON body: {e}"))),
        }
    }
}

fn invalid_request(message: impl Into<String>) -> DomainError {
    DomainError::gateway(400, message)
        .with_type("invalid_request_error")
        .with_fallbacks(false)
}

impl TransportCodec for JsonCodec {
    fn decode(&self, request: &TransportRequest) -> Result<DomainRequest, DomainError> {
        let kind = Self::kind_for_path(&request.path).ok_or_else(|| {
            DomainError::gateway(404, format!("no route for {} {}", request.method, request.path))
                .with_type("not_found")
                .with_fallbacks(false)
        })?;
        let mut body = Self::body_object(request)?;

        let target = match body.get("model").and_then(Value::as_str) {
            Some(model) => Self::parse_target(model)?,
            None if kind == RequestKind::ListModels => ModelTarget {
                provider: request.query_param("provider").unwrap_or_default().to_string(),
                model: String::new(),
            },
            None => return Err(invalid_request("missing 'model'")),
        };

        let fallbacks: Vec<ModelTarget> = match body.remove("fallbacks") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| {
                    item.as_str()
                        .ok_or_else(|| invalid_request("'fallbacks' must be a list of strings"))
                        .and_then(Self::parse_target)
                })
                .collect::<Result<_, _>>()?,
            Some(_) => return Err(invalid_request("'fallbacks' must be a list of strings")),
        };
        let stream = body.get("stream").and_then(Value::as_bool).unwrap_or(false);

        Ok(DomainRequest {
            kind,
            provider: target.provider,
            model: target.model,
            stream,
            input: Value::Object(body),
            fallbacks,
        })
    }

    fn encode_response(&self, response: &DomainResponse, out: &mut TransportResponse) {
        match serde_json::to_value(response) {
            Ok(body) => {
                out.status_code = 200;
                out.set_json_body(&body);
            }
            Err(e) => self.encode_error(
                &DomainError::gateway(500, format!("failed to encode response: {e}")),
                out,
            ),
        }
    }

    fn encode_error(&self, error: &DomainError, out: &mut TransportResponse) {
        out.status_code = error.http_status();
        let body = serde_json::to_value(error)
            .unwrap_or_else(|_| serde_json::json!({ "error": { "message": error.to_string() } }));
        out.set_json_body(&body);
    }

    fn encode_stream_head(&self, out: &mut TransportResponse) {
        out.status_code = 200;
        out.set_header("Content-Type", "text/event-stream");
        out.set_header("Cache-Control", "no-cache");
    }

    fn encode_chunk(&self, chunk: &StreamChunk) -> Bytes {
        let payload = serde_json::to_string(chunk).unwrap_or_else(|e| {
            serde_json::json!({ "index": chunk.index, "error": { "error": { "message": e.to_string() } } })
                .to_string()
        });
        Bytes::from(format!("data: {payload}\n\n"))
    }

    fn stream_end(&self) -> Bytes {
        Bytes::from_static(SSE_DONE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn post(path: &str, body: Value) -> TransportRequest {
        TransportRequest::new("POST", path)
            .with_header("Content-Type", "application/json")
            .with_body(body.to_string())
    }

    #[test]
    fn test_decode_chat_request() {
        let request = post(
            "/v1/chat/completions",
            json!({
                "model": "openai/gpt-4o",
                "messages": [{"role": "user", "content": "hi"}],
                "stream": true,
                "fallbacks": ["anthropic/claude-sonnet-4"]
            }),
        );

        let decoded = JsonCodec.decode(&request).unwrap();
        assert_eq!(decoded.kind, RequestKind::ChatCompletion);
        assert_eq!(decoded.provider, "openai");
        assert_eq!(decoded.model, "gpt-4o");
        assert!(decoded.stream);
        assert_eq!(decoded.fallbacks[0].provider, "anthropic");
        assert!(decoded.input.get("fallbacks").is_none());
        assert!(decoded.input.get("messages").is_some());
    }

    #[test]
    fn test_decode_rejects_bad_requests() {
        let cases = [
            post("/v1/chat/completions", json!({"messages": []})),
            post("/v1/chat/completions", json!({"model": "gpt-4o"})),
            post("/v1/chat/completions", json!({"model": "a/b", "fallbacks": "c/d"})),
            TransportRequest::new("POST", "/v1/chat/completions").with_body("{not json"),
        ];
        for request in cases {
            let error = JsonCodec.decode(&request).unwrap_err();
            assert_eq!(error.http_status(), 400);
            assert!(!error.allows_fallback());
        }

        let error = JsonCodec
            .decode(&post("/v1/unknown", json!({})))
            .unwrap_err();
        assert_eq!(error.http_status(), 404);
    }

    #[test]
    fn test_path_kinds() {
        assert_eq!(
            JsonCodec::kind_for_path("/v1/completions"),
            Some(RequestKind::TextCompletion)
        );
        assert_eq!(
            JsonCodec::kind_for_path("/openai/v1/embeddings/"),
            Some(RequestKind::Embedding)
        );
        assert_eq!(JsonCodec::kind_for_path("/health"), None);
    }

    #[test]
    fn test_encode_error_uses_status() {
        let mut out = TransportResponse::default();
        let error = DomainError::new("rate limited").with_status(429);
        JsonCodec.encode_error(&error, &mut out);

        assert_eq!(out.status_code, 429);
        assert_eq!(out.header("content-type"), Some("application/json"));
        let body: Value = serde_json::from_slice(&out.body).unwrap();
        assert_eq!(body["error"]["message"], "rate limited");
    }

    #[test]
    fn test_chunk_framing() {
        let chunk = StreamChunk::error(3, DomainError::new("reset"));
        let frame = JsonCodec.encode_chunk(&chunk);
        let text = std::str::from_utf8(&frame).unwrap();
        assert!(text.starts_with("data: {"));
        assert!(text.ends_with("\n\n"));
        assert!(text.contains("\"index\":3"));
        assert_eq!(&JsonCodec.stream_end()[..], SSE_DONE);
    }
}
