//! Channel statistics and the channel's full video list.

use axum::{
    Router,
    extract::{Path, State},
    response::IntoResponse,
    routing::get,
};

use super::ResourceState;
use super::error::{ApiError, ResultExt};
use super::response::ApiResponse;
use crate::auth::OptionalAuth;
use crate::db::Database;

pub fn router(state: ResourceState) -> Router {
    Router::new()
        .route("/stats/{channel_id}", get(channel_stats))
        .route("/videos/{channel_id}", get(channel_videos))
        .with_state(state)
}

async fn ensure_channel_exists(db: &Database, channel_id: &str) -> Result<(), ApiError> {
    db.users()
        .get_by_id(channel_id)
        .await
        .db_err("Failed to load channel")?
        .map(|_| ())
        .ok_or_else(|| ApiError::not_found("Channel does not exist"))
}

async fn channel_stats(
    State(state): State<ResourceState>,
    Path(channel_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    ensure_channel_exists(&state.db, &channel_id).await?;

    let stats = state
        .db
        .stats()
        .channel_stats(&channel_id)
        .await
        .db_err("Failed to compute channel stats")?;

    Ok(ApiResponse::ok(stats, "Channel stats fetched successfully"))
}

/// Drafts are included only when the channel owner asks.
async fn channel_videos(
    State(state): State<ResourceState>,
    OptionalAuth(viewer): OptionalAuth,
    Path(channel_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    ensure_channel_exists(&state.db, &channel_id).await?;

    let videos = state
        .db
        .videos()
        .list_all_by_owner(&channel_id, viewer.as_ref().map(|v| v.id.as_str()))
        .await
        .db_err("Failed to list channel videos")?;

    Ok(ApiResponse::ok(videos, "Channel videos fetched successfully"))
}
