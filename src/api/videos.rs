//! Video publishing and playback.
//!
//! Mutations are restricted to the video's owner.

use axum::{
    Router,
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    response::IntoResponse,
    routing::{delete, get, patch, post},
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::info;

use super::UploadSettings;
use super::error::{ApiError, ResultExt, require_text};
use super::pagination::{PageQuery, Paginated};
use super::response::ApiResponse;
use super::upload::{PublishVideoForm, UpdateVideoForm};
use crate::auth::{Auth, OptionalAuth, ensure_owner};
use crate::db::{Database, NewVideo, Video, VideoFilter, VideoSort};
use crate::impl_has_auth_backend;
use crate::jwt::JwtConfig;
use crate::media::MediaHost;

#[derive(Clone)]
pub struct VideosState {
    pub db: Database,
    pub jwt: Arc<JwtConfig>,
    pub media: Arc<MediaHost>,
    pub uploads: Arc<UploadSettings>,
}

impl_has_auth_backend!(VideosState);

pub fn router(state: VideosState) -> Router {
    let body_limit = DefaultBodyLimit::max(state.uploads.max_bytes);

    Router::new()
        .route("/", get(list_videos))
        .route("/publish", post(publish_video).layer(body_limit))
        .route("/{video_id}", get(get_video))
        .route("/update/{video_id}", patch(update_video).layer(body_limit))
        .route("/delete/{video_id}", delete(delete_video))
        .route("/togglePublishStatus/{video_id}", patch(toggle_publish))
        .with_state(state)
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListVideosQuery {
    #[serde(flatten)]
    page: PageQuery,
    sort_by: Option<String>,
    sort_type: Option<String>,
    query: Option<String>,
}

impl ListVideosQuery {
    fn sort(&self) -> Result<VideoSort, ApiError> {
        let sort_type = normalized(self.sort_type.as_deref(), "asc");
        let ascending = match sort_type.as_str() {
            "asc" => true,
            "desc" => false,
            other => {
                return Err(ApiError::bad_request(format!(
                    "Invalid sortType '{}': expected asc or desc",
                    other
                )));
            }
        };
        match (normalized(self.sort_by.as_deref(), "views").as_str(), ascending) {
            ("views", true) => Ok(VideoSort::ViewsAsc),
            ("views", false) => Ok(VideoSort::ViewsDesc),
            ("duration", true) => Ok(VideoSort::DurationAsc),
            ("duration", false) => Ok(VideoSort::DurationDesc),
            (other, _) => Err(ApiError::bad_request(format!(
                "Invalid sortBy '{}': expected views or duration",
                other
            ))),
        }
    }

    fn filter(&self) -> Result<VideoFilter, ApiError> {
        match normalized(self.query.as_deref(), "getallvideos").as_str() {
            "getallvideos" => Ok(VideoFilter::All),
            "published=true" => Ok(VideoFilter::Published),
            "published=false" => Ok(VideoFilter::Unpublished),
            other => Err(ApiError::bad_request(format!(
                "Invalid query '{}': expected published=true, published=false or getAllVideos",
                other
            ))),
        }
    }
}

/// Trimmed, lowercased query value, or the default when absent or blank.
fn normalized(value: Option<&str>, default: &str) -> String {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        Some(v) => v.to_ascii_lowercase(),
        None => default.to_string(),
    }
}

async fn load_video(db: &Database, id: &str) -> Result<Video, ApiError> {
    db.videos()
        .get_by_id(id)
        .await
        .db_err("Failed to load video")?
        .ok_or_else(|| ApiError::not_found("Video does not exist"))
}

async fn list_videos(
    State(state): State<VideosState>,
    Auth(user): Auth,
    Query(query): Query<ListVideosQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let page = query.page.parse()?;
    let sort = query.sort()?;
    let filter = query.filter()?;

    let (videos, total) = state
        .db
        .videos()
        .list_by_owner(&user.id, filter, sort, page.limit, page.offset())
        .await
        .db_err("Failed to list videos")?;

    Ok(ApiResponse::ok(
        Paginated::new(videos, total, page),
        "Videos fetched successfully",
    ))
}

async fn publish_video(
    State(state): State<VideosState>,
    Auth(user): Auth,
    multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let form = PublishVideoForm::read(multipart, state.uploads.limits()).await?;

    let title = require_text(form.title.as_deref(), "title")?;
    let description = require_text(form.description.as_deref(), "description")?;
    let video_file = form
        .video_file
        .ok_or_else(|| ApiError::bad_request("Video file is required"))?;
    let thumbnail = form
        .thumbnail
        .ok_or_else(|| ApiError::bad_request("Thumbnail is required"))?;

    let hosted_video = state.media.upload(video_file).await?;
    let hosted_thumbnail = match state.media.upload(thumbnail).await {
        Ok(hosted) => hosted,
        Err(e) => {
            state.media.remove(&hosted_video.url).await;
            return Err(e.into());
        }
    };

    let created = state
        .db
        .videos()
        .create(&NewVideo {
            owner_id: &user.id,
            video_file: &hosted_video.url,
            thumbnail: &hosted_thumbnail.url,
            title,
            description,
            duration: hosted_video.duration.unwrap_or(0.0),
        })
        .await;

    let id = match created {
        Ok(id) => id,
        Err(e) => {
            state.media.remove(&hosted_video.url).await;
            state.media.remove(&hosted_thumbnail.url).await;
            return Err(ApiError::db_error("Failed to create video", e));
        }
    };

    info!(user_id = %user.id, video_id = %id, "Video published");

    let video = load_video(&state.db, &id).await?;
    Ok(ApiResponse::created(video, "Video published successfully"))
}

/// Fetch a video, counting the view. Unpublished videos are visible only to their owner.
async fn get_video(
    State(state): State<VideosState>,
    OptionalAuth(viewer): OptionalAuth,
    Path(video_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let mut video = state
        .db
        .videos()
        .get_with_owner(&video_id)
        .await
        .db_err("Failed to load video")?
        .ok_or_else(|| ApiError::not_found("Video does not exist"))?;

    let viewer_id = viewer.as_ref().map(|v| v.id.as_str());
    if !video.video.is_published && viewer_id != Some(video.video.owner_id.as_str()) {
        return Err(ApiError::not_found("Video does not exist"));
    }

    state
        .db
        .videos()
        .record_view(&video_id, viewer_id)
        .await
        .db_err("Failed to record view")?;
    video.video.views += 1;

    Ok(ApiResponse::ok(video, "Video fetched successfully"))
}

async fn update_video(
    State(state): State<VideosState>,
    Auth(user): Auth,
    Path(video_id): Path<String>,
    multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let video = load_video(&state.db, &video_id).await?;
    ensure_owner(&video.owner_id, &user.id)?;

    let form = UpdateVideoForm::read(multipart, state.uploads.limits()).await?;
    let title = form.title.as_deref().map(str::trim).filter(|t| !t.is_empty());
    let description = form
        .description
        .as_deref()
        .map(str::trim)
        .filter(|d| !d.is_empty());

    if title.is_none() && description.is_none() && form.thumbnail.is_none() {
        return Err(ApiError::bad_request(
            "At least one of title, description or thumbnail is required",
        ));
    }

    let new_thumbnail = match form.thumbnail {
        Some(file) => Some(state.media.upload(file).await?),
        None => None,
    };
    let thumbnail = new_thumbnail
        .as_ref()
        .map(|t| t.url.as_str())
        .unwrap_or(&video.thumbnail);

    let updated = state
        .db
        .videos()
        .update_details(
            &video.id,
            title.unwrap_or(&video.title),
            description.unwrap_or(&video.description),
            thumbnail,
        )
        .await;
    if let Err(e) = updated {
        if let Some(hosted) = &new_thumbnail {
            state.media.remove(&hosted.url).await;
        }
        return Err(ApiError::db_error("Failed to update video", e));
    }

    if new_thumbnail.is_some() {
        state.media.remove(&video.thumbnail).await;
    }

    let video = load_video(&state.db, &video.id).await?;
    Ok(ApiResponse::ok(video, "Video updated successfully"))
}

async fn delete_video(
    State(state): State<VideosState>,
    Auth(user): Auth,
    Path(video_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let video = load_video(&state.db, &video_id).await?;
    ensure_owner(&video.owner_id, &user.id)?;

    state
        .db
        .videos()
        .delete(&video.id)
        .await
        .db_err("Failed to delete video")?;

    state.media.remove(&video.video_file).await;
    state.media.remove(&video.thumbnail).await;

    info!(user_id = %user.id, video_id = %video.id, "Video deleted");

    Ok(ApiResponse::ok(json!({}), "Video deleted successfully"))
}

async fn toggle_publish(
    State(state): State<VideosState>,
    Auth(user): Auth,
    Path(video_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let video = load_video(&state.db, &video_id).await?;
    ensure_owner(&video.owner_id, &user.id)?;

    let is_published = state
        .db
        .videos()
        .toggle_published(&video.id)
        .await
        .db_err("Failed to toggle publish status")?
        .ok_or_else(|| ApiError::not_found("Video does not exist"))?;

    Ok(ApiResponse::ok(
        json!({ "isPublished": is_published }),
        "Video publish status toggled successfully",
    ))
}
