use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

/// Success envelope: `{status, data, message, success: true}`.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    #[serde(skip)]
    code: StatusCode,
    status: u16,
    data: T,
    message: String,
    success: bool,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn new(code: StatusCode, data: T, message: impl Into<String>) -> Self {
        Self {
            code,
            status: code.as_u16(),
            data,
            message: message.into(),
            success: code.is_success(),
        }
    }

    pub fn ok(data: T, message: impl Into<String>) -> Self {
        Self::new(StatusCode::OK, data, message)
    }

    pub fn created(data: T, message: impl Into<String>) -> Self {
        Self::new(StatusCode::CREATED, data, message)
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        (self.code, Json(self)).into_response()
    }
}
