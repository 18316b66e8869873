//! Centralized error types for the WatchTogether core library.
//!
//! This module provides a unified error handling system that:
//! - Defines structured error types using `thiserror`
//! - Maps errors to appropriate HTTP status codes
//! - Implements `IntoResponse` for automatic JSON error responses

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

/// Application-wide error type for the WatchTogether server.
///
/// Kinds follow the error-handling policy: `InputValidation` is sanitized
/// silently by callers and should rarely reach the wire; `Capacity` and
/// `Permission` are returned only to the initiating caller, never
/// broadcast; `NotFound`/`Conflict`/`Transport`/`Internal` map to HTTP
/// status codes for the REST surface.
#[derive(Debug, Error, Serialize)]
#[serde(tag = "type", content = "details")]
pub enum WatchTogetherError {
    /// Input failed validation after sanitization was attempted.
    #[error("Invalid input: {0}")]
    InputValidation(String),

    /// Operation rejected because a capacity limit was reached (room full, file too large).
    #[error("Capacity exceeded: {0}")]
    Capacity(String),

    /// Caller lacks the privilege required for the operation (host-only actions).
    #[error("Permission denied: {0}")]
    Permission(String),

    /// Requested room, member, or media was not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Operation conflicts with current state (e.g. host already assigned).
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Underlying transport (HTTP client, socket, filesystem) failed.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl WatchTogetherError {
    /// Returns a machine-readable error code for API responses.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InputValidation(_) => "input_validation",
            Self::Capacity(_) => "capacity",
            Self::Permission(_) => "permission",
            Self::NotFound(_) => "not_found",
            Self::Conflict(_) => "conflict",
            Self::Transport(_) => "transport",
            Self::Internal(_) => "internal_error",
        }
    }

    /// Maps the error to an appropriate HTTP status code.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InputValidation(_) => StatusCode::BAD_REQUEST,
            Self::Capacity(_) => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Permission(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Transport(_) => StatusCode::BAD_GATEWAY,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Convenient Result alias for application-wide operations.
pub type WatchTogetherResult<T> = Result<T, WatchTogetherError>;

/// JSON response body for error responses.
#[derive(Serialize)]
struct ErrorResponse {
    error: &'static str,
    message: String,
    status: u16,
}

impl IntoResponse for WatchTogetherError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: self.code(),
            message: self.to_string(),
            status: status.as_u16(),
        };
        (status, Json(body)).into_response()
    }
}

impl From<std::io::Error> for WatchTogetherError {
    fn from(err: std::io::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

impl From<reqwest::Error> for WatchTogetherError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permission_error_returns_forbidden() {
        let err = WatchTogetherError::Permission("not host".into());
        assert_eq!(err.code(), "permission");
        assert_eq!(err.status_code(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn not_found_error_returns_404() {
        let err = WatchTogetherError::NotFound("room".into());
        assert_eq!(err.code(), "not_found");
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn capacity_error_never_maps_to_5xx() {
        let err = WatchTogetherError::Capacity("room full".into());
        assert!(err.status_code().is_client_error());
    }
}
