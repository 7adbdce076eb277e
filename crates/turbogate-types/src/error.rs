//! Provider and pipeline error values.
//!
//! [`DomainError`] is a value that flows through PostHooks, not a Rust error
//! to be bubbled with `?`. PostHooks may rewrite it, recover from it (reduce it
//! to the empty sentinel) or create one to invalidate a response.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Tri-state fallback signal carried by a [`DomainError`]
///
/// `None` means the producer did not express a preference. Every consumer must
/// go through [`FallbackDirective::allows_fallback`], which treats the
/// unspecified state as "allow".
///
/// # Example
///
/// ```
/// use turbogate_types::FallbackDirective;
///
/// assert!(FallbackDirective::UNSPECIFIED.allows_fallback());
/// assert!(!FallbackDirective::DENY.allows_fallback());
/// assert_eq!(FallbackDirective::UNSPECIFIED.resolved(), FallbackDirective::ALLOW);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FallbackDirective(Option<bool>);

impl FallbackDirective {
    /// No preference expressed
    pub const UNSPECIFIED: Self = Self(None);
    /// Fallback explicitly allowed
    pub const ALLOW: Self = Self(Some(true));
    /// Fallback explicitly denied
    pub const DENY: Self = Self(Some(false));

    /// Wrap a nullable boolean
    #[must_use]
    pub const fn from_option(value: Option<bool>) -> Self {
        Self(value)
    }

    /// The raw nullable boolean
    #[must_use]
    pub const fn as_option(self) -> Option<bool> {
        self.0
    }

    /// Whether a producer set the directive explicitly
    #[must_use]
    pub const fn is_specified(self) -> bool {
        self.0.is_some()
    }

    /// Default resolution: unspecified means allowed
    #[must_use]
    pub const fn allows_fallback(self) -> bool {
        !matches!(self.0, Some(false))
    }

    /// The explicit directive after default resolution
    #[must_use]
    pub const fn resolved(self) -> Self {
        Self(Some(self.allows_fallback()))
    }
}

impl From<bool> for FallbackDirective {
    fn from(value: bool) -> Self {
        Self(Some(value))
    }
}

impl From<Option<bool>> for FallbackDirective {
    fn from(value: Option<bool>) -> Self {
        Self(value)
    }
}

/// Error details reported by a provider or plugin
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ErrorField {
    /// Error type as reported upstream (e.g. `rate_limit_error`)
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,
    /// Provider-specific error code
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// Human-readable message
    #[serde(default)]
    pub message: String,
    /// Underlying cause, if the error wraps another one
    #[serde(skip)]
    pub cause: Option<Arc<dyn std::error::Error + Send + Sync>>,
}

/// Provider or pipeline error carried through the PostHook chain
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DomainError {
    /// HTTP status to surface, when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    /// Error details
    #[serde(default)]
    pub error: ErrorField,
    /// Whether the caller may retry against a fallback provider
    #[serde(default)]
    pub allow_fallbacks: FallbackDirective,
    /// Raised by the gateway itself rather than by a provider
    #[serde(default)]
    pub is_gateway_error: bool,
    /// Provider that produced the error
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    /// Model that was requested
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl DomainError {
    /// Create an error with a message
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: ErrorField {
                message: message.into(),
                ..ErrorField::default()
            },
            ..Self::default()
        }
    }

    /// The empty sentinel: a PostHook returning this has recovered the error
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Create an error raised by the gateway itself
    #[must_use]
    pub fn gateway(status_code: u16, message: impl Into<String>) -> Self {
        Self {
            is_gateway_error: true,
            status_code: Some(status_code),
            ..Self::new(message)
        }
    }

    /// Set the status code
    #[must_use]
    pub fn with_status(mut self, status_code: u16) -> Self {
        self.status_code = Some(status_code);
        self
    }

    /// Set the error type
    #[must_use]
    pub fn with_type(mut self, error_type: impl Into<String>) -> Self {
        self.error.error_type = Some(error_type.into());
        self
    }

    /// Set the provider error code
    #[must_use]
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.error.code = Some(code.into());
        self
    }

    /// Wrap an underlying cause
    #[must_use]
    pub fn with_cause(mut self, cause: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.error.cause = Some(Arc::new(cause));
        self
    }

    /// Set the fallback directive
    #[must_use]
    pub fn with_fallbacks(mut self, directive: impl Into<FallbackDirective>) -> Self {
        self.allow_fallbacks = directive.into();
        self
    }

    /// Attach the provider/model the error belongs to
    #[must_use]
    pub fn with_target(mut self, provider: impl Into<String>, model: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self.model = Some(model.into());
        self
    }

    /// Error message
    #[must_use]
    pub fn message(&self) -> &str {
        &self.error.message
    }

    /// Whether this is the recovery sentinel: no message, no cause, no status, no type
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.status_code.is_none()
            && self.error.error_type.is_none()
            && self.error.message.is_empty()
            && self.error.cause.is_none()
    }

    /// Whether the caller may fall back to another provider
    #[must_use]
    pub fn allows_fallback(&self) -> bool {
        self.allow_fallbacks.allows_fallback()
    }

    /// Status code to use on the wire, defaulting to 500
    #[must_use]
    pub fn http_status(&self) -> u16 {
        self.status_code.unwrap_or(500)
    }
}

impl fmt::Display for DomainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(status) = self.status_code {
            write!(f, "[{status}] ")?;
        }
        match (&self.error.message, &self.error.cause) {
            (message, _) if !message.is_empty() => write!(f, "{message}"),
            (_, Some(cause)) => write!(f, "{cause}"),
            _ => write!(f, "unknown error"),
        }
    }
}

impl std::error::Error for DomainError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.error
            .cause
            .as_deref()
            .map(|cause| cause as &(dyn std::error::Error + 'static))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_sentinel() {
        assert!(DomainError::empty().is_empty());
        assert!(DomainError::default().with_code("ignored").is_empty());
        assert!(!DomainError::new("boom").is_empty());
        assert!(!DomainError::empty().with_status(500).is_empty());
        assert!(!DomainError::empty().with_type("server_error").is_empty());
        assert!(
            !DomainError::empty()
                .with_cause(std::io::Error::other("io"))
                .is_empty()
        );
    }

    #[test]
    fn test_fallback_default_resolution() {
        let unspecified = DomainError::new("rate limited").with_status(429);
        let allowed = unspecified.clone().with_fallbacks(true);
        let denied = unspecified.clone().with_fallbacks(false);

        assert!(!unspecified.allow_fallbacks.is_specified());
        assert_eq!(unspecified.allows_fallback(), allowed.allows_fallback());
        assert!(!denied.allows_fallback());
        assert_eq!(FallbackDirective::DENY.resolved(), FallbackDirective::DENY);
    }

    #[test]
    fn test_fallback_serde_is_nullable_bool() {
        let json = serde_json::to_value(FallbackDirective::UNSPECIFIED).unwrap();
        assert!(json.is_null());
        let parsed: FallbackDirective = serde_json::from_str("false").unwrap();
        assert_eq!(parsed, FallbackDirective::DENY);

        let error: DomainError = serde_json::from_str(r#"{"error":{"message":"x"}}"#).unwrap();
        assert_eq!(error.allow_fallbacks, FallbackDirective::UNSPECIFIED);
    }

    #[test]
    fn test_display_and_source() {
        let error = DomainError::new("rate limited").with_status(429);
        assert_eq!(error.to_string(), "[429] rate limited");

        let wrapped = DomainError::empty().with_cause(std::io::Error::other("socket closed"));
        assert_eq!(wrapped.to_string(), "socket closed");
        assert!(std::error::Error::source(&wrapped).is_some());
    }

    #[test]
    fn test_gateway_error() {
        let error = DomainError::gateway(502, "upstream unavailable");
        assert!(error.is_gateway_error);
        assert_eq!(error.http_status(), 502);
        assert_eq!(DomainError::new("x").http_status(), 500);
    }
}
