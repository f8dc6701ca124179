pub mod api;
pub mod auth;
pub mod cli;
pub mod db;
pub mod jwt;
pub mod media;
pub mod password;
pub mod rate_limit;

use api::{ApiConfig, UploadSettings, create_api_router};
use axum::Router;
use axum::http::{HeaderName, HeaderValue, Method, header};
use db::Database;
use jwt::JwtConfig;
use media::MediaHost;
use rate_limit::RateLimitConfig;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::warn;

/// Path prefix of the JSON API.
pub const API_PREFIX: &str = "/api/v1";

/// Path prefix hosted media is served from.
pub const MEDIA_PREFIX: &str = "/media";

pub struct ServerConfig {
    /// Database connection (cloneable, uses connection pool internally)
    pub db: Database,
    /// Secret for signing access tokens
    pub access_secret: Vec<u8>,
    /// Secret for signing refresh tokens, distinct from the access secret
    pub refresh_secret: Vec<u8>,
    /// Access token lifetime in seconds
    pub access_ttl: u64,
    /// Refresh token lifetime in seconds
    pub refresh_ttl: u64,
    /// Whether to set Secure flag on cookies (should be true in production with HTTPS)
    pub secure_cookies: bool,
    /// Origin allowed to make credentialed cross-origin requests
    pub cors_origin: Option<String>,
    /// Directory hosted media files are stored in
    pub media_dir: PathBuf,
    /// Public URL prefix under which `media_dir` is reachable
    pub media_base_url: String,
    /// Directory multipart uploads are buffered in
    pub upload_dir: PathBuf,
    /// Largest accepted upload, per file and per request body
    pub max_upload_bytes: usize,
    /// Login/register/refresh attempts allowed per client IP per minute
    pub auth_requests_per_minute: u32,
    /// Header carrying the client IP when behind a trusted proxy. None uses the socket peer.
    pub ip_header: Option<HeaderName>,
}

fn cors_layer(origin: Option<&str>) -> Option<CorsLayer> {
    let origin = origin?;
    let value = match HeaderValue::from_str(origin) {
        Ok(value) => value,
        Err(e) => {
            warn!(origin = %origin, error = %e, "Ignoring invalid CORS origin");
            return None;
        }
    };

    Some(
        CorsLayer::new()
            .allow_origin(value)
            .allow_credentials(true)
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PATCH,
                Method::DELETE,
            ])
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]),
    )
}

/// Create the application router with the given configuration.
pub fn create_app(config: &ServerConfig) -> Router {
    let jwt = Arc::new(JwtConfig::with_durations(
        &config.access_secret,
        &config.refresh_secret,
        config.access_ttl,
        config.refresh_ttl,
    ));

    let media = Arc::new(MediaHost::new(
        config.media_dir.clone(),
        &config.media_base_url,
    ));

    let uploads = Arc::new(UploadSettings {
        dir: config.upload_dir.clone(),
        max_bytes: config.max_upload_bytes,
    });

    let api_router = create_api_router(ApiConfig {
        db: config.db.clone(),
        jwt,
        media,
        uploads,
        secure_cookies: config.secure_cookies,
        rate_limit: RateLimitConfig::new(
            config.auth_requests_per_minute,
            config.ip_header.clone(),
        ),
    });

    let app = Router::new()
        .nest(API_PREFIX, api_router)
        .nest_service(MEDIA_PREFIX, ServeDir::new(&config.media_dir))
        .layer(TraceLayer::new_for_http());

    match cors_layer(config.cors_origin.as_deref()) {
        Some(cors) => app.layer(cors),
        None => app,
    }
}

/// Run the server on the given listener. This function blocks until the server exits.
pub async fn run_server(config: ServerConfig, listener: TcpListener) -> Result<(), std::io::Error> {
    tokio::fs::create_dir_all(&config.media_dir).await?;
    tokio::fs::create_dir_all(&config.upload_dir).await?;

    let app = create_app(&config);
    let make_service = app.into_make_service_with_connect_info::<SocketAddr>();
    axum::serve(listener, make_service).await
}
