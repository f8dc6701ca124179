//! Comments on videos.

use axum::{
    Router,
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::{get, patch},
};
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use super::ResourceState;
use super::error::{ApiError, ResultExt, require_text};
use super::json::JsonBody;
use super::pagination::{PageQuery, Paginated};
use super::response::ApiResponse;
use crate::auth::{Auth, ensure_owner};
use crate::db::{Comment, Database};

pub fn router(state: ResourceState) -> Router {
    Router::new()
        .route("/{video_id}", get(list_comments).post(add_comment))
        .route("/c/{comment_id}", patch(update_comment).delete(delete_comment))
        .with_state(state)
}

#[derive(Deserialize)]
struct AddCommentRequest {
    content: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateCommentRequest {
    new_content: Option<String>,
}

async fn ensure_video_exists(db: &Database, video_id: &str) -> Result<(), ApiError> {
    db.videos()
        .get_by_id(video_id)
        .await
        .db_err("Failed to load video")?
        .map(|_| ())
        .ok_or_else(|| ApiError::not_found("Video does not exist"))
}

async fn load_comment(db: &Database, id: &str) -> Result<Comment, ApiError> {
    db.comments()
        .get_by_id(id)
        .await
        .db_err("Failed to load comment")?
        .ok_or_else(|| ApiError::not_found("Comment does not exist"))
}

async fn list_comments(
    State(state): State<ResourceState>,
    Path(video_id): Path<String>,
    Query(query): Query<PageQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let page = query.parse()?;
    ensure_video_exists(&state.db, &video_id).await?;

    let (comments, total) = state
        .db
        .comments()
        .list_for_video(&video_id, page.limit, page.offset())
        .await
        .db_err("Failed to list comments")?;

    Ok(ApiResponse::ok(
        Paginated::new(comments, total, page),
        "Comments fetched successfully",
    ))
}

async fn add_comment(
    State(state): State<ResourceState>,
    Auth(user): Auth,
    Path(video_id): Path<String>,
    JsonBody(payload): JsonBody<AddCommentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let content = require_text(payload.content.as_deref(), "content")?;
    ensure_video_exists(&state.db, &video_id).await?;

    let comment = state
        .db
        .comments()
        .create(&video_id, &user.id, content)
        .await
        .db_err("Failed to add comment")?;

    Ok(ApiResponse::created(comment, "Comment added successfully"))
}

async fn update_comment(
    State(state): State<ResourceState>,
    Auth(user): Auth,
    Path(comment_id): Path<String>,
    JsonBody(payload): JsonBody<UpdateCommentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let content = require_text(payload.new_content.as_deref(), "newContent")?;

    let comment = load_comment(&state.db, &comment_id).await?;
    ensure_owner(&comment.owner_id, &user.id)?;

    if comment.content == content {
        return Err(ApiError::bad_request("Comment content is unchanged"));
    }

    let comment = state
        .db
        .comments()
        .update_content(&comment.id, content)
        .await
        .db_err("Failed to update comment")?
        .ok_or_else(|| ApiError::not_found("Comment does not exist"))?;

    Ok(ApiResponse::ok(comment, "Comment updated successfully"))
}

async fn delete_comment(
    State(state): State<ResourceState>,
    Auth(user): Auth,
    Path(comment_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let comment = load_comment(&state.db, &comment_id).await?;
    ensure_owner(&comment.owner_id, &user.id)?;

    state
        .db
        .comments()
        .delete(&comment.id)
        .await
        .db_err("Failed to delete comment")?;

    info!(user_id = %user.id, comment_id = %comment.id, "Comment deleted");

    Ok(ApiResponse::ok(json!({}), "Comment deleted successfully"))
}
