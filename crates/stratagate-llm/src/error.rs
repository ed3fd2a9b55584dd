//! Provider error types for stratagate-llm.
//!
//! [`ProviderError`] classifies every way a single provider call can fail.
//! Adapters never return it across `generate`; it is folded into a
//! [`ProviderAttempt`](stratagate_types::ProviderAttempt) instead. Its two
//! helpers drive the retry loop: [`ProviderError::status_code`] and
//! [`ProviderError::is_retryable`].

use thiserror::Error;

/// Errors that can occur when calling a text-completion provider.
#[derive(Error, Debug)]
pub enum ProviderError {
    /// No API key could be resolved for the provider.
    #[error("missing API key: {0}")]
    MissingApiKey(String),

    /// The provider rejected the key (HTTP 401).
    #[error("invalid API key: {0}")]
    InvalidApiKey(String),

    /// The key is valid but lacks access (HTTP 403).
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// The provider returned a rate-limit response (HTTP 429).
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// The request was malformed (HTTP 400).
    #[error("bad request: {0}")]
    BadRequest(String),

    /// The provider failed internally (HTTP 5xx).
    #[error("server error (HTTP {status}): {message}")]
    ServerError {
        /// HTTP status code.
        status: u16,
        /// Error message extracted from the body.
        message: String,
    },

    /// Any other non-success HTTP status.
    #[error("HTTP {status}: {message}")]
    UnexpectedStatus {
        /// HTTP status code.
        status: u16,
        /// Error message extracted from the body.
        message: String,
    },

    /// The requested model does not exist (HTTP 404).
    #[error("model not found: {0}")]
    ModelNotFound(String),

    /// The request timed out.
    #[error("timeout")]
    Timeout,

    /// Connection-level failure.
    #[error("network error: {0}")]
    Network(String),

    /// The provider answered 200 but with no usable text.
    #[error("Empty response content")]
    EmptyResponse,

    /// The provider returned a body that could not be parsed.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// The caller cancelled the request.
    #[error("request cancelled")]
    Cancelled,

    /// A JSON serialization/deserialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A convenience type alias for provider operations.
pub type Result<T> = std::result::Result<T, ProviderError>;

impl ProviderError {
    /// Classify a non-success HTTP response.
    pub fn from_status(status: u16, body: &str) -> Self {
        let message = extract_error_message(body).unwrap_or_else(|| {
            if body.trim().is_empty() {
                format!("HTTP {status}")
            } else {
                body.trim().to_string()
            }
        });
        match status {
            400 => ProviderError::BadRequest(message),
            401 => ProviderError::InvalidApiKey(message),
            403 => ProviderError::PermissionDenied(message),
            404 => ProviderError::ModelNotFound(message),
            429 => ProviderError::RateLimited(message),
            500..=599 => ProviderError::ServerError { status, message },
            _ => ProviderError::UnexpectedStatus { status, message },
        }
    }

    /// The HTTP status this error corresponds to, if any.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            ProviderError::BadRequest(_) => Some(400),
            ProviderError::InvalidApiKey(_) => Some(401),
            ProviderError::PermissionDenied(_) => Some(403),
            ProviderError::ModelNotFound(_) => Some(404),
            ProviderError::RateLimited(_) => Some(429),
            ProviderError::ServerError { status, .. }
            | ProviderError::UnexpectedStatus { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether the retry loop should try again after this error.
    ///
    /// Bad requests, rejected keys, missing keys, empty content and
    /// cancellation end the loop. Everything else is treated as transient.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            ProviderError::BadRequest(_)
                | ProviderError::InvalidApiKey(_)
                | ProviderError::MissingApiKey(_)
                | ProviderError::EmptyResponse
                | ProviderError::Cancelled
                | ProviderError::Json(_)
        )
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ProviderError::Timeout
        } else if err.is_decode() {
            ProviderError::InvalidResponse(err.to_string())
        } else {
            ProviderError::Network(err.to_string())
        }
    }
}

/// Extract a human-readable error message from a JSON error response body.
///
/// Understands `{"error": {"message": ".."}}`, `{"error": ".."}` and the
/// flat `{"message": ".."}` shape some providers use.
pub(crate) fn extract_error_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    value
        .get("error")
        .and_then(|v| {
            v.get("message")
                .and_then(|m| m.as_str())
                .map(String::from)
                .or_else(|| v.as_str().map(String::from))
        })
        .or_else(|| {
            value
                .get("message")
                .and_then(|m| m.as_str())
                .map(String::from)
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_status_classifies() {
        assert!(matches!(
            ProviderError::from_status(400, ""),
            ProviderError::BadRequest(_)
        ));
        assert!(matches!(
            ProviderError::from_status(401, ""),
            ProviderError::InvalidApiKey(_)
        ));
        assert!(matches!(
            ProviderError::from_status(403, ""),
            ProviderError::PermissionDenied(_)
        ));
        assert!(matches!(
            ProviderError::from_status(404, ""),
            ProviderError::ModelNotFound(_)
        ));
        assert!(matches!(
            ProviderError::from_status(429, ""),
            ProviderError::RateLimited(_)
        ));
        assert!(matches!(
            ProviderError::from_status(503, ""),
            ProviderError::ServerError { status: 503, .. }
        ));
        assert!(matches!(
            ProviderError::from_status(409, ""),
            ProviderError::UnexpectedStatus { status: 409, .. }
        ));
    }

    #[test]
    fn from_status_extracts_openai_message() {
        let body = r#"{"error": {"message": "Incorrect API key provided", "type": "invalid_request_error"}}"#;
        let err = ProviderError::from_status(401, body);
        assert_eq!(err.to_string(), "invalid API key: Incorrect API key provided");
    }

    #[test]
    fn from_status_falls_back_to_raw_body() {
        let err = ProviderError::from_status(502, "Bad Gateway");
        assert_eq!(err.to_string(), "server error (HTTP 502): Bad Gateway");

        let err = ProviderError::from_status(500, "  ");
        assert_eq!(err.to_string(), "server error (HTTP 500): HTTP 500");
    }

    #[test]
    fn status_codes_round_trip() {
        for status in [400u16, 401, 403, 404, 429, 500, 502, 418] {
            assert_eq!(
                ProviderError::from_status(status, "").status_code(),
                Some(status)
            );
        }
        assert_eq!(ProviderError::Timeout.status_code(), None);
        assert_eq!(ProviderError::EmptyResponse.status_code(), None);
    }

    #[test]
    fn retryable_classes() {
        assert!(ProviderError::RateLimited("slow down".into()).is_retryable());
        assert!(ProviderError::Timeout.is_retryable());
        assert!(ProviderError::Network("reset".into()).is_retryable());
        assert!(
            ProviderError::ServerError {
                status: 500,
                message: "oops".into()
            }
            .is_retryable()
        );
        assert!(ProviderError::PermissionDenied("no".into()).is_retryable());

        assert!(!ProviderError::BadRequest("bad".into()).is_retryable());
        assert!(!ProviderError::InvalidApiKey("bad".into()).is_retryable());
        assert!(!ProviderError::MissingApiKey("OPENAI_API_KEY".into()).is_retryable());
        assert!(!ProviderError::EmptyResponse.is_retryable());
        assert!(!ProviderError::Cancelled.is_retryable());
    }

    #[test]
    fn empty_response_message() {
        assert_eq!(ProviderError::EmptyResponse.to_string(), "Empty response content");
    }

    #[test]
    fn extract_error_message_shapes() {
        assert_eq!(
            extract_error_message(r#"{"error": "quota"}"#).as_deref(),
            Some("quota")
        );
        assert_eq!(
            extract_error_message(r#"{"message": "invalid api token"}"#).as_deref(),
            Some("invalid api token")
        );
        assert_eq!(extract_error_message("not json"), None);
    }
}
