//! API error responses

use axum::{http::StatusCode, Json};
use mailchats_common::Error;
use serde::Serialize;
use tracing::error;

/// Error response
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

/// Error half of every handler result
pub type ApiError = (StatusCode, Json<ErrorResponse>);

/// Build an error response
pub fn api_error(status: StatusCode, error: &str, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: error.to_string(),
            message: message.into(),
        }),
    )
}

pub fn bad_request(message: impl Into<String>) -> ApiError {
    api_error(StatusCode::BAD_REQUEST, "validation_error", message)
}

pub fn not_found(message: impl Into<String>) -> ApiError {
    api_error(StatusCode::NOT_FOUND, "not_found", message)
}

pub fn unauthorized(message: impl Into<String>) -> ApiError {
    api_error(StatusCode::UNAUTHORIZED, "unauthorized", message)
}

/// Map a storage or service error, logging server-side failures.
///
/// `context` replaces the message of 5xx errors so internals are not leaked.
pub fn from_error(e: Error, context: &str) -> ApiError {
    let status =
        StatusCode::from_u16(e.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    if status.is_server_error() {
        error!("{}: {}", context, e);
        api_error(status, &e.code().to_lowercase(), context)
    } else {
        api_error(status, &e.code().to_lowercase(), e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_from_error() {
        let (status, Json(body)) = from_error(
            Error::Conflict("Username already exists".into()),
            "Failed to register",
        );
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body.error, "conflict");
        assert_eq!(body.message, "Username already exists");

        let (status, Json(body)) =
            from_error(Error::Database("pool timed out".into()), "Failed to list campaigns");
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.message, "Failed to list campaigns");
    }
}
