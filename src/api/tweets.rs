use axum::{
    Router,
    extract::{Path, State},
    response::IntoResponse,
    routing::{get, patch, post},
};
use serde::Deserialize;
use serde_json::json;

use super::ResourceState;
use super::error::{ApiError, ResultExt, require_text};
use super::json::JsonBody;
use super::response::ApiResponse;
use crate::auth::{Auth, ensure_owner};
use crate::db::{Database, Tweet};

pub fn router(state: ResourceState) -> Router {
    Router::new()
        .route("/", post(create_tweet))
        .route("/user/{user_id}", get(user_tweets))
        .route("/{tweet_id}", patch(update_tweet).delete(delete_tweet))
        .with_state(state)
}

#[derive(Deserialize)]
struct CreateTweetRequest {
    content: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateTweetRequest {
    new_content: Option<String>,
}

async fn load_tweet(db: &Database, id: &str) -> Result<Tweet, ApiError> {
    db.tweets()
        .get_by_id(id)
        .await
        .db_err("Failed to load tweet")?
        .ok_or_else(|| ApiError::not_found("Tweet does not exist"))
}

async fn create_tweet(
    State(state): State<ResourceState>,
    Auth(user): Auth,
    JsonBody(payload): JsonBody<CreateTweetRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let content = require_text(payload.content.as_deref(), "content")?;

    let tweet = state
        .db
        .tweets()
        .create(&user.id, content)
        .await
        .db_err("Failed to create tweet")?;

    Ok(ApiResponse::created(tweet, "Tweet created successfully"))
}

async fn user_tweets(
    State(state): State<ResourceState>,
    Path(user_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .db
        .users()
        .get_by_id(&user_id)
        .await
        .db_err("Failed to load user")?
        .ok_or_else(|| ApiError::not_found("User does not exist"))?;

    let tweets = state
        .db
        .tweets()
        .list_by_owner(&user_id)
        .await
        .db_err("Failed to list tweets")?;

    Ok(ApiResponse::ok(tweets, "Tweets fetched successfully"))
}

async fn update_tweet(
    State(state): State<ResourceState>,
    Auth(user): Auth,
    Path(tweet_id): Path<String>,
    JsonBody(payload): JsonBody<UpdateTweetRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let content = require_text(payload.new_content.as_deref(), "newContent")?;

    let tweet = load_tweet(&state.db, &tweet_id).await?;
    ensure_owner(&tweet.owner_id, &user.id)?;

    let tweet = state
        .db
        .tweets()
        .update_content(&tweet.id, content)
        .await
        .db_err("Failed to update tweet")?
        .ok_or_else(|| ApiError::not_found("Tweet does not exist"))?;

    Ok(ApiResponse::ok(tweet, "Tweet updated successfully"))
}

async fn delete_tweet(
    State(state): State<ResourceState>,
    Auth(user): Auth,
    Path(tweet_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let tweet = load_tweet(&state.db, &tweet_id).await?;
    ensure_owner(&tweet.owner_id, &user.id)?;

    state
        .db
        .tweets()
        .delete(&tweet.id)
        .await
        .db_err("Failed to delete tweet")?;

    Ok(ApiResponse::ok(json!({}), "Tweet deleted successfully"))
}
