//! Streaming chunks.

use crate::domain::DomainResponse;
use crate::error::DomainError;
use serde::{Deserialize, Serialize};

/// One chunk of a streamed provider response
///
/// A chunk carries either a partial response, an error, or (after a PostHook
/// recovered an error) a response that replaced the error.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StreamChunk {
    /// Position of the chunk in the provider stream, starting at 0
    pub index: u64,
    /// Partial response payload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<DomainResponse>,
    /// Error reported for this chunk
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<DomainError>,
}

impl StreamChunk {
    /// A chunk carrying a partial response
    #[must_use]
    pub fn response(index: u64, response: DomainResponse) -> Self {
        Self {
            index,
            response: Some(response),
            error: None,
        }
    }

    /// A chunk carrying an error
    #[must_use]
    pub fn error(index: u64, error: DomainError) -> Self {
        Self {
            index,
            response: None,
            error: Some(error),
        }
    }

    /// Whether the chunk carries an error
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}
