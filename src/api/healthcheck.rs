use axum::{Router, response::IntoResponse, routing::get};

use super::response::ApiResponse;

pub fn router() -> Router {
    Router::new().route("/", get(healthcheck))
}

async fn healthcheck() -> impl IntoResponse {
    ApiResponse::ok("OK", "Everything is OK")
}
