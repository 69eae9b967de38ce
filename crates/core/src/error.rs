//! Error types for the ragstream domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Backend failures live in their own enum so the transport adapter can
//! return them without depending on the rest of the taxonomy.

use thiserror::Error;

/// The top-level error type for all ragstream operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Request errors ---
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    // --- Backend errors ---
    #[error("Backend unavailable: {0}")]
    Backend(#[from] BackendError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Failures of the text-generation backend.
///
/// Every variant belongs to the "backend unavailable" class: the caller
/// gets no generated text. The variants only differ in how they are
/// reported.
#[derive(Debug, Clone, Error)]
pub enum BackendError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("API request failed: {message} (status: {status_code})")]
    Api { status_code: u16, message: String },

    #[error("Malformed backend response: {0}")]
    MalformedResponse(String),

    #[error("Stream interrupted: {0}")]
    StreamInterrupted(String),

    #[error("Backend not configured: {0}")]
    NotConfigured(String),
}

impl BackendError {
    /// Whether the failure was the backend not answering in time.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_error_displays_status() {
        let err = Error::Backend(BackendError::Api {
            status_code: 503,
            message: "model is loading".into(),
        });
        assert!(err.to_string().contains("503"));
        assert!(err.to_string().contains("model is loading"));
    }

    #[test]
    fn backend_error_converts_into_error() {
        let err: Error = BackendError::Network("connection refused".into()).into();
        assert!(matches!(err, Error::Backend(BackendError::Network(_))));
    }

    #[test]
    fn only_timeout_is_timeout() {
        assert!(BackendError::Timeout("30s".into()).is_timeout());
        assert!(!BackendError::Network("refused".into()).is_timeout());
        assert!(!BackendError::StreamInterrupted("reset".into()).is_timeout());
    }
}
