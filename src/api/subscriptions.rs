use axum::{
    Router,
    extract::{Path, State},
    response::IntoResponse,
    routing::{get, post},
};
use serde_json::json;
use tracing::debug;

use super::ResourceState;
use super::error::{ApiError, ResultExt};
use super::response::ApiResponse;
use crate::auth::Auth;

pub fn router(state: ResourceState) -> Router {
    Router::new()
        .route("/c/{channel_id}", post(toggle_subscription))
        .route("/subscribers", get(subscribers))
        .route("/channels", get(subscribed_channels))
        .with_state(state)
}

async fn toggle_subscription(
    State(state): State<ResourceState>,
    Auth(user): Auth,
    Path(channel_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .db
        .users()
        .get_by_id(&channel_id)
        .await
        .db_err("Failed to load channel")?
        .ok_or_else(|| ApiError::not_found("Channel does not exist"))?;

    let subscribed = state
        .db
        .subscriptions()
        .toggle(&user.id, &channel_id)
        .await
        .db_err("Failed to toggle subscription")?;

    debug!(user_id = %user.id, channel_id = %channel_id, subscribed, "Subscription toggled");

    let message = if subscribed {
        "Subscribed successfully"
    } else {
        "Unsubscribed successfully"
    };
    Ok(ApiResponse::ok(json!({ "subscribed": subscribed }), message))
}

async fn subscribers(
    State(state): State<ResourceState>,
    Auth(user): Auth,
) -> Result<impl IntoResponse, ApiError> {
    let subscribers = state
        .db
        .subscriptions()
        .subscribers(&user.id)
        .await
        .db_err("Failed to list subscribers")?;

    Ok(ApiResponse::ok(
        subscribers,
        "Subscribers fetched successfully",
    ))
}

async fn subscribed_channels(
    State(state): State<ResourceState>,
    Auth(user): Auth,
) -> Result<impl IntoResponse, ApiError> {
    let channels = state
        .db
        .subscriptions()
        .subscribed_channels(&user.id)
        .await
        .db_err("Failed to list subscribed channels")?;

    Ok(ApiResponse::ok(
        channels,
        "Subscribed channels fetched successfully",
    ))
}
