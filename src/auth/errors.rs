//! Authentication error types.

use axum::response::{IntoResponse, Response};

use crate::api::ApiError;

/// Why a request could not be authenticated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthErrorKind {
    NotAuthenticated,
    InvalidToken,
    UserNotFound,
    DatabaseError,
}

/// Rejection for the `Auth` extractor. Renders the standard error envelope
/// and leaves cookies untouched.
#[derive(Debug)]
pub struct ApiAuthError {
    pub(super) kind: AuthErrorKind,
}

impl ApiAuthError {
    pub(super) fn new(kind: AuthErrorKind) -> Self {
        Self { kind }
    }

    pub fn kind(&self) -> AuthErrorKind {
        self.kind
    }
}

impl From<ApiAuthError> for ApiError {
    fn from(err: ApiAuthError) -> Self {
        match err.kind {
            AuthErrorKind::NotAuthenticated => ApiError::unauthorized("Unauthorized request"),
            AuthErrorKind::InvalidToken => ApiError::unauthorized("Invalid or expired access token"),
            AuthErrorKind::UserNotFound => ApiError::unauthorized("Invalid access token"),
            AuthErrorKind::DatabaseError => ApiError::internal("Database error"),
        }
    }
}

impl IntoResponse for ApiAuthError {
    fn into_response(self) -> Response {
        ApiError::from(self).into_response()
    }
}
