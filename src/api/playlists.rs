use axum::{
    Router,
    extract::{Path, State},
    response::IntoResponse,
    routing::{get, patch, post},
};
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use super::ResourceState;
use super::error::{ApiError, ResultExt, require_text};
use super::json::JsonBody;
use super::response::ApiResponse;
use crate::auth::{Auth, OptionalAuth, ensure_owner};
use crate::db::{Database, Playlist};

pub fn router(state: ResourceState) -> Router {
    Router::new()
        .route("/", get(own_playlists).post(create_playlist))
        .route("/user/{user_id}", get(user_playlists))
        .route("/add/{playlist_id}/{video_id}", post(add_video))
        .route("/remove/{playlist_id}/{video_id}", patch(remove_video))
        .route(
            "/{playlist_id}",
            get(get_playlist)
                .patch(update_playlist)
                .delete(delete_playlist),
        )
        .with_state(state)
}

#[derive(Deserialize)]
struct PlaylistRequest {
    name: Option<String>,
    description: Option<String>,
}

async fn load_playlist(db: &Database, id: &str) -> Result<Playlist, ApiError> {
    db.playlists()
        .get_by_id(id)
        .await
        .db_err("Failed to load playlist")?
        .ok_or_else(|| ApiError::not_found("Playlist does not exist"))
}

/// Load a playlist the user owns together with a video the user can see.
async fn load_owned_with_video(
    db: &Database,
    user_id: &str,
    playlist_id: &str,
    video_id: &str,
) -> Result<Playlist, ApiError> {
    let playlist = load_playlist(db, playlist_id).await?;
    ensure_owner(&playlist.owner_id, user_id)?;

    db.videos()
        .get_visible(video_id, Some(user_id))
        .await
        .db_err("Failed to load video")?
        .ok_or_else(|| ApiError::not_found("Video does not exist"))?;

    Ok(playlist)
}

async fn create_playlist(
    State(state): State<ResourceState>,
    Auth(user): Auth,
    JsonBody(payload): JsonBody<PlaylistRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let name = require_text(payload.name.as_deref(), "name")?;
    let description = require_text(payload.description.as_deref(), "description")?;

    let playlist = state
        .db
        .playlists()
        .create(&user.id, name, description)
        .await
        .db_err("Failed to create playlist")?;

    Ok(ApiResponse::created(playlist, "Playlist created successfully"))
}

async fn own_playlists(
    State(state): State<ResourceState>,
    Auth(user): Auth,
) -> Result<impl IntoResponse, ApiError> {
    let playlists = state
        .db
        .playlists()
        .list_by_owner(&user.id, Some(&user.id))
        .await
        .db_err("Failed to list playlists")?;

    Ok(ApiResponse::ok(playlists, "Playlists fetched successfully"))
}

async fn user_playlists(
    State(state): State<ResourceState>,
    OptionalAuth(viewer): OptionalAuth,
    Path(user_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .db
        .users()
        .get_by_id(&user_id)
        .await
        .db_err("Failed to load user")?
        .ok_or_else(|| ApiError::not_found("User does not exist"))?;

    let playlists = state
        .db
        .playlists()
        .list_by_owner(&user_id, viewer.as_ref().map(|v| v.id.as_str()))
        .await
        .db_err("Failed to list playlists")?;

    Ok(ApiResponse::ok(playlists, "Playlists fetched successfully"))
}

async fn get_playlist(
    State(state): State<ResourceState>,
    OptionalAuth(viewer): OptionalAuth,
    Path(playlist_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let playlist = state
        .db
        .playlists()
        .get_with_videos(&playlist_id, viewer.as_ref().map(|v| v.id.as_str()))
        .await
        .db_err("Failed to load playlist")?
        .ok_or_else(|| ApiError::not_found("Playlist does not exist"))?;

    Ok(ApiResponse::ok(playlist, "Playlist fetched successfully"))
}

async fn add_video(
    State(state): State<ResourceState>,
    Auth(user): Auth,
    Path((playlist_id, video_id)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    let playlist = load_owned_with_video(&state.db, &user.id, &playlist_id, &video_id).await?;

    let added = state
        .db
        .playlists()
        .add_video(&playlist.id, &video_id)
        .await
        .db_err("Failed to add video to playlist")?;
    if !added {
        return Err(ApiError::bad_request("Video is already in the playlist"));
    }

    let playlist = state
        .db
        .playlists()
        .get_with_videos(&playlist.id, Some(&user.id))
        .await
        .db_err("Failed to load playlist")?
        .ok_or_else(|| ApiError::not_found("Playlist does not exist"))?;

    Ok(ApiResponse::ok(playlist, "Video added to playlist successfully"))
}

async fn remove_video(
    State(state): State<ResourceState>,
    Auth(user): Auth,
    Path((playlist_id, video_id)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    let playlist = load_playlist(&state.db, &playlist_id).await?;
    ensure_owner(&playlist.owner_id, &user.id)?;

    let removed = state
        .db
        .playlists()
        .remove_video(&playlist.id, &video_id)
        .await
        .db_err("Failed to remove video from playlist")?;
    if !removed {
        return Err(ApiError::not_found("Video is not in the playlist"));
    }

    let playlist = state
        .db
        .playlists()
        .get_with_videos(&playlist.id, Some(&user.id))
        .await
        .db_err("Failed to load playlist")?
        .ok_or_else(|| ApiError::not_found("Playlist does not exist"))?;

    Ok(ApiResponse::ok(
        playlist,
        "Video removed from playlist successfully",
    ))
}

async fn update_playlist(
    State(state): State<ResourceState>,
    Auth(user): Auth,
    Path(playlist_id): Path<String>,
    JsonBody(payload): JsonBody<PlaylistRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let name = require_text(payload.name.as_deref(), "name")?;
    let description = require_text(payload.description.as_deref(), "description")?;

    let playlist = load_playlist(&state.db, &playlist_id).await?;
    ensure_owner(&playlist.owner_id, &user.id)?;

    if playlist.name == name && playlist.description == description {
        return Err(ApiError::bad_request("Playlist details are unchanged"));
    }

    let playlist = state
        .db
        .playlists()
        .update(&playlist.id, name, description)
        .await
        .db_err("Failed to update playlist")?
        .ok_or_else(|| ApiError::not_found("Playlist does not exist"))?;

    Ok(ApiResponse::ok(playlist, "Playlist updated successfully"))
}

async fn delete_playlist(
    State(state): State<ResourceState>,
    Auth(user): Auth,
    Path(playlist_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let playlist = load_playlist(&state.db, &playlist_id).await?;
    ensure_owner(&playlist.owner_id, &user.id)?;

    state
        .db
        .playlists()
        .delete(&playlist.id)
        .await
        .db_err("Failed to delete playlist")?;

    info!(user_id = %user.id, playlist_id = %playlist.id, "Playlist deleted");

    Ok(ApiResponse::ok(json!({}), "Playlist deleted successfully"))
}
