use axum::{
    Router,
    extract::{Path, State},
    response::IntoResponse,
    routing::{get, post},
};
use serde_json::{Value, json};

use super::ResourceState;
use super::error::{ApiError, ResultExt};
use super::response::ApiResponse;
use crate::auth::Auth;
use crate::db::LikeTarget;

pub fn router(state: ResourceState) -> Router {
    Router::new()
        .route("/toggle/v/{video_id}", post(toggle_video_like))
        .route("/toggle/c/{comment_id}", post(toggle_comment_like))
        .route("/toggle/t/{tweet_id}", post(toggle_tweet_like))
        .route("/videos", get(liked_videos))
        .with_state(state)
}

async fn toggle(
    state: &ResourceState,
    user_id: &str,
    target: LikeTarget,
    target_id: &str,
) -> Result<ApiResponse<Value>, ApiError> {
    let exists = match target {
        LikeTarget::Video => state
            .db
            .videos()
            .get_visible(target_id, Some(user_id))
            .await
            .db_err("Failed to load video")?
            .is_some(),
        LikeTarget::Comment => state
            .db
            .comments()
            .get_by_id(target_id)
            .await
            .db_err("Failed to load comment")?
            .is_some(),
        LikeTarget::Tweet => state
            .db
            .tweets()
            .get_by_id(target_id)
            .await
            .db_err("Failed to load tweet")?
            .is_some(),
    };
    if !exists {
        return Err(ApiError::not_found(match target {
            LikeTarget::Video => "Video does not exist",
            LikeTarget::Comment => "Comment does not exist",
            LikeTarget::Tweet => "Tweet does not exist",
        }));
    }

    let liked = state
        .db
        .likes()
        .toggle(user_id, target, target_id)
        .await
        .db_err("Failed to toggle like")?;

    let message = if liked {
        "Liked successfully"
    } else {
        "Unliked successfully"
    };
    Ok(ApiResponse::ok(json!({ "liked": liked }), message))
}

async fn toggle_video_like(
    State(state): State<ResourceState>,
    Auth(user): Auth,
    Path(video_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    toggle(&state, &user.id, LikeTarget::Video, &video_id).await
}

async fn toggle_comment_like(
    State(state): State<ResourceState>,
    Auth(user): Auth,
    Path(comment_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    toggle(&state, &user.id, LikeTarget::Comment, &comment_id).await
}

async fn toggle_tweet_like(
    State(state): State<ResourceState>,
    Auth(user): Auth,
    Path(tweet_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    toggle(&state, &user.id, LikeTarget::Tweet, &tweet_id).await
}

async fn liked_videos(
    State(state): State<ResourceState>,
    Auth(user): Auth,
) -> Result<impl IntoResponse, ApiError> {
    let videos = state
        .db
        .likes()
        .liked_videos(&user.id)
        .await
        .db_err("Failed to list liked videos")?;

    Ok(ApiResponse::ok(videos, "Liked videos fetched successfully"))
}
