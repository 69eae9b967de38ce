//! HTTP error mapping for the gateway.

use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use ragstream_core::error::{BackendError, Error};
use serde_json::json;
use tracing::error;

/// Errors that end an exchange with a non-2xx response.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error(transparent)]
    Core(#[from] Error),

    #[error("Request body too large: {0}")]
    PayloadTooLarge(String),
}

impl GatewayError {
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::Core(Error::InvalidRequest(message.into()))
    }

    fn parts(&self) -> (StatusCode, &'static str) {
        match self {
            Self::PayloadTooLarge(_) => (StatusCode::PAYLOAD_TOO_LARGE, "payload_too_large"),
            Self::Core(Error::InvalidRequest(_)) => (StatusCode::BAD_REQUEST, "invalid_request"),
            Self::Core(Error::Backend(err)) if err.is_timeout() => {
                (StatusCode::GATEWAY_TIMEOUT, "backend_timeout")
            }
            Self::Core(Error::Backend(_)) => (StatusCode::BAD_GATEWAY, "backend_unavailable"),
            Self::Core(Error::Config { .. }) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error")
            }
        }
    }

    pub fn status(&self) -> StatusCode {
        self.parts().0
    }
}

impl From<BackendError> for GatewayError {
    fn from(err: BackendError) -> Self {
        Self::Core(Error::Backend(err))
    }
}

/// Body extraction failures. Anything but an oversized body is the client's malformed request.
impl From<JsonRejection> for GatewayError {
    fn from(rejection: JsonRejection) -> Self {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            Self::PayloadTooLarge(rejection.body_text())
        } else {
            Self::invalid_request(rejection.body_text())
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let (status, error_type) = self.parts();
        if status.is_server_error() {
            error!(status = status.as_u16(), error = %self, "Request failed");
        }

        let body = json!({
            "error": {
                "type": error_type,
                "message": self.to_string(),
            }
        });
        (status, Json(body)).into_response()
    }
}
