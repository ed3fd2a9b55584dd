//! Error types for the stratagate gateway.
//!
//! [`GatewayError`] covers failures outside a provider call: bad
//! configuration, unreadable files, unknown provider names. Provider call
//! failures never surface as errors; they become failed
//! [`ProviderResult`](crate::provider::ProviderResult)s instead.

use thiserror::Error;

/// Top-level error type for the stratagate gateway.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum GatewayError {
    /// Configuration is malformed or semantically invalid.
    #[error("invalid config: {reason}")]
    ConfigInvalid {
        /// What is wrong with the configuration.
        reason: String,
    },

    /// A provider name did not resolve to any known backend.
    #[error("unknown provider: {0}")]
    UnknownProvider(String),

    /// Underlying I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization / deserialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, GatewayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_invalid_display() {
        let err = GatewayError::ConfigInvalid {
            reason: "max_tpm must be positive".into(),
        };
        assert_eq!(err.to_string(), "invalid config: max_tpm must be positive");
    }

    #[test]
    fn unknown_provider_display() {
        let err = GatewayError::UnknownProvider("watson".into());
        assert_eq!(err.to_string(), "unknown provider: watson");
    }

    #[test]
    fn gateway_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: GatewayError = io_err.into();
        assert!(matches!(err, GatewayError::Io(_)));
        assert!(err.to_string().contains("missing"));
    }

    #[test]
    fn gateway_error_from_json() {
        let json_err = serde_json::from_str::<serde_json::Value>("{{bad}}").unwrap_err();
        let err: GatewayError = json_err.into();
        assert!(matches!(err, GatewayError::Json(_)));
    }
}
