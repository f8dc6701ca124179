//! Shared error handling for API endpoints.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use tracing::error;

use crate::auth::SessionError;
use crate::media::MediaError;

/// Extension trait for concise error mapping on Results.
pub trait ResultExt<T> {
    fn db_err(self, msg: &str) -> Result<T, ApiError>;
}

impl<T, E: std::fmt::Display> ResultExt<T> for Result<T, E> {
    fn db_err(self, msg: &str) -> Result<T, ApiError> {
        self.map_err(|e| ApiError::db_error(msg, e))
    }
}

/// API error type with automatic response conversion.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Unauthorized(String),
    Forbidden(String),
    NotFound(String),
    Conflict(String),
    PayloadTooLarge(String),
    TooManyRequests(String),
    Internal(String),
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn db_error(context: &str, e: impl std::fmt::Display) -> Self {
        error!("{}: {}", context, e);
        Self::Internal("Database error".into())
    }

    pub fn media_error(context: &str, e: impl std::fmt::Display) -> Self {
        error!("{}: {}", context, e);
        Self::Internal(context.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::TooManyRequests(_) => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<SessionError> for ApiError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::Unauthorized(msg) => ApiError::unauthorized(msg),
            SessionError::Signing(e) => {
                error!("Failed to sign token: {}", e);
                ApiError::internal("Failed to generate tokens")
            }
            SessionError::Database(e) => ApiError::db_error("Failed to store refresh token", e),
        }
    }
}

impl From<MediaError> for ApiError {
    fn from(err: MediaError) -> Self {
        match err {
            MediaError::TooLarge(limit) => {
                ApiError::PayloadTooLarge(format!("File exceeds the {} byte limit", limit))
            }
            MediaError::Multipart(msg) => ApiError::bad_request(msg),
            other => ApiError::media_error("Failed to store upload", other),
        }
    }
}

/// Error envelope: `{status, data: null, message, success: false}`.
#[derive(Serialize)]
struct ErrorResponse {
    status: u16,
    data: Option<()>,
    message: String,
    success: bool,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match self {
            ApiError::BadRequest(msg)
            | ApiError::Unauthorized(msg)
            | ApiError::Forbidden(msg)
            | ApiError::NotFound(msg)
            | ApiError::Conflict(msg)
            | ApiError::PayloadTooLarge(msg)
            | ApiError::TooManyRequests(msg)
            | ApiError::Internal(msg) => msg,
        };
        (
            status,
            Json(ErrorResponse {
                status: status.as_u16(),
                data: None,
                message,
                success: false,
            }),
        )
            .into_response()
    }
}

/// Reject empty or whitespace-only text fields.
pub fn require_text<'a>(value: Option<&'a str>, field: &str) -> Result<&'a str, ApiError> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(ApiError::bad_request(format!("{} is required", field))),
    }
}

/// Like [`require_text`] but returns the value untrimmed.
pub fn require_secret<'a>(value: Option<&'a str>, field: &str) -> Result<&'a str, ApiError> {
    require_text(value, field)?;
    value.ok_or_else(|| ApiError::bad_request(format!("{} is required", field)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_error_envelope() {
        let response = ApiError::forbidden("nope").into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], 403);
        assert_eq!(json["message"], "nope");
        assert_eq!(json["success"], false);
        assert!(json["data"].is_null());
    }

    #[test]
    fn test_require_text() {
        assert_eq!(require_text(Some("  hi "), "content").unwrap(), "hi");
        assert!(require_text(Some("   "), "content").is_err());
        assert!(require_text(None, "content").is_err());
        assert_eq!(require_secret(Some(" pw "), "password").unwrap(), " pw ");
        assert!(require_secret(Some("  "), "password").is_err());
    }
}
