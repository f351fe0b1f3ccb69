// HTTP error handling

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Result type for HTTP handlers
pub type AppResult<T> = Result<T, AppError>;

/// Application error with HTTP status code
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
}

impl AppError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, message)
    }

    pub fn internal_server_error(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.status, self.message)
    }
}

impl std::error::Error for AppError {}

/// Error response JSON structure
#[derive(Debug, Serialize, Deserialize)]
struct ErrorResponse {
    error: String,
    status: u16,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status;
        let body = Json(ErrorResponse {
            error: self.message,
            status: status.as_u16(),
        });

        (status, body).into_response()
    }
}

/// Convert core signaling errors to HTTP errors.
///
/// Caller mistakes map to 400, unknown identifiers to 404 and
/// conflicting state transitions to 409; engine handshake failures
/// surface as 400 with their wrapped message.
impl From<mediabridge_core::Error> for AppError {
    fn from(err: mediabridge_core::Error) -> Self {
        use mediabridge_core::Error;

        let message = err.to_string();
        match err {
            Error::IncompleteOffer(_)
            | Error::InvalidNegotiationParameters(_)
            | Error::CapabilityMismatch(_)
            | Error::UnsupportedKind(_)
            | Error::TransportConnectFailed(_) => Self::bad_request(message),
            Error::TransportNotFound(_)
            | Error::ProducerNotFound(_)
            | Error::ConsumerNotFound(_)
            | Error::SessionNotFound(_) => Self::not_found(message),
            Error::TransportNotConnected(_) | Error::AlreadyClosed(_) => Self::conflict(message),
        }
    }
}

/// Convert anyhow errors to HTTP errors
impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        tracing::error!("Unhandled error: {}", err);
        Self::internal_server_error("Internal server error")
    }
}
