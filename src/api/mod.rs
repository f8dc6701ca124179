mod comments;
mod dashboard;
mod error;
mod healthcheck;
mod json;
mod likes;
mod pagination;
mod playlists;
mod response;
mod subscriptions;
mod tweets;
mod upload;
mod users;
mod videos;

use axum::Router;
use std::path::PathBuf;
use std::sync::Arc;

use crate::db::Database;
use crate::impl_has_auth_backend;
use crate::jwt::JwtConfig;
use crate::media::MediaHost;
use crate::rate_limit::RateLimitConfig;

pub use error::{ApiError, ResultExt};
pub use json::JsonBody;
pub use pagination::{Page, PageQuery, Paginated};
pub use response::ApiResponse;
pub use upload::UploadLimits;

/// Where multipart uploads are buffered and how large they may be.
#[derive(Debug, Clone)]
pub struct UploadSettings {
    pub dir: PathBuf,
    pub max_bytes: usize,
}

impl UploadSettings {
    pub fn limits(&self) -> UploadLimits<'_> {
        UploadLimits {
            dir: &self.dir,
            max_bytes: self.max_bytes,
        }
    }
}

/// State shared by the resource routers that only need auth and storage.
#[derive(Clone)]
pub struct ResourceState {
    pub db: Database,
    pub jwt: Arc<JwtConfig>,
}

impl_has_auth_backend!(ResourceState);

/// Everything the API routers need.
pub struct ApiConfig {
    pub db: Database,
    pub jwt: Arc<JwtConfig>,
    pub media: Arc<MediaHost>,
    pub uploads: Arc<UploadSettings>,
    pub secure_cookies: bool,
    pub rate_limit: RateLimitConfig,
}

/// Create the API router (mounted under `/api/v1`).
pub fn create_api_router(config: ApiConfig) -> Router {
    let users_state = users::UsersState {
        db: config.db.clone(),
        jwt: config.jwt.clone(),
        media: config.media.clone(),
        uploads: config.uploads.clone(),
        secure_cookies: config.secure_cookies,
        rate_limit: config.rate_limit,
    };

    let videos_state = videos::VideosState {
        db: config.db.clone(),
        jwt: config.jwt.clone(),
        media: config.media,
        uploads: config.uploads,
    };

    let resource_state = ResourceState {
        db: config.db,
        jwt: config.jwt,
    };

    Router::new()
        .nest("/healthcheck", healthcheck::router())
        .nest("/users", users::router(users_state))
        .nest("/videos", videos::router(videos_state))
        .nest("/comments", comments::router(resource_state.clone()))
        .nest("/tweets", tweets::router(resource_state.clone()))
        .nest("/likes", likes::router(resource_state.clone()))
        .nest("/playlists", playlists::router(resource_state.clone()))
        .nest("/subscriptions", subscriptions::router(resource_state.clone()))
        .nest("/dashboard", dashboard::router(resource_state))
}
