#![allow(dead_code)]

use axum::{
    Router,
    body::Body,
    extract::ConnectInfo,
    http::{HeaderMap, HeaderName, Request, StatusCode, header},
    response::Response,
};
use serde_json::Value;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::OnceLock;
use tower::ServiceExt;
use vidtube::{
    ServerConfig,
    auth::issue_tokens,
    create_app,
    db::{Database, NewUser},
    jwt::JwtConfig,
    password::hash_password,
};

pub const ACCESS_SECRET: &[u8] = b"test-access-secret-0123456789abcdef";
pub const REFRESH_SECRET: &[u8] = b"test-refresh-secret-0123456789abcdef";
pub const MEDIA_BASE_URL: &str = "http://localhost/media";
pub const PASSWORD: &str = "correct horse battery staple";
pub const CLIENT_ADDR: SocketAddr =
    SocketAddr::new(std::net::IpAddr::V4(std::net::Ipv4Addr::new(192, 0, 2, 10)), 40000);

/// Hashing is slow in debug builds, so seeded users share one hash.
fn password_hash() -> &'static str {
    static HASH: OnceLock<String> = OnceLock::new();
    HASH.get_or_init(|| hash_password(PASSWORD).expect("hash"))
}

pub struct TestApp {
    pub app: Router,
    pub db: Database,
    pub jwt: JwtConfig,
    root: PathBuf,
}

pub struct TestUser {
    pub id: String,
    pub username: String,
    pub access_token: String,
    pub refresh_token: String,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_rate_limit(10_000).await
    }

    pub async fn with_rate_limit(auth_requests_per_minute: u32) -> Self {
        Self::build(auth_requests_per_minute, None).await
    }

    /// Rate limit keyed on a proxy header instead of the socket peer.
    pub async fn behind_proxy(auth_requests_per_minute: u32, ip_header: &'static str) -> Self {
        Self::build(
            auth_requests_per_minute,
            Some(HeaderName::from_static(ip_header)),
        )
        .await
    }

    async fn build(auth_requests_per_minute: u32, ip_header: Option<HeaderName>) -> Self {
        let db = Database::open(":memory:")
            .await
            .expect("Failed to open test database");
        let root = std::env::temp_dir().join(format!("vidtube-it-{}", uuid::Uuid::new_v4()));

        let config = ServerConfig {
            db: db.clone(),
            access_secret: ACCESS_SECRET.to_vec(),
            refresh_secret: REFRESH_SECRET.to_vec(),
            access_ttl: 900,
            refresh_ttl: 3600,
            secure_cookies: false,
            cors_origin: None,
            media_dir: root.join("media"),
            media_base_url: MEDIA_BASE_URL.to_string(),
            upload_dir: root.join("uploads"),
            max_upload_bytes: 1024 * 1024,
            auth_requests_per_minute,
            ip_header,
        };

        Self {
            app: create_app(&config),
            db,
            jwt: JwtConfig::with_durations(ACCESS_SECRET, REFRESH_SECRET, 900, 3600),
            root,
        }
    }

    pub fn media_dir(&self) -> PathBuf {
        self.root.join("media")
    }

    /// Number of files currently hosted.
    pub fn media_file_count(&self) -> usize {
        std::fs::read_dir(self.media_dir())
            .map(|entries| entries.count())
            .unwrap_or(0)
    }

    /// Make every update of `table.column` fail inside SQLite.
    pub async fn fail_updates_of(&self, table: &str, column: &str) {
        sqlx::query(&format!(
            "CREATE TRIGGER fail_{table}_{column} BEFORE UPDATE OF {column} ON {table}
             BEGIN SELECT RAISE(ABORT, 'update refused'); END"
        ))
        .execute(self.db.pool())
        .await
        .unwrap();
    }

    /// Path on disk of a URL issued by the media host.
    pub fn media_path(&self, url: &str) -> PathBuf {
        let name = url
            .strip_prefix(MEDIA_BASE_URL)
            .and_then(|rest| rest.strip_prefix('/'))
            .expect("URL not issued by the media host");
        self.media_dir().join(name)
    }

    /// Send a request as if it arrived from `CLIENT_ADDR`, unless the request already names a peer.
    pub async fn send(&self, mut request: Request<Body>) -> Response {
        if request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .is_none()
        {
            request.extensions_mut().insert(ConnectInfo(CLIENT_ADDR));
        }
        self.app.clone().oneshot(request).await.unwrap()
    }

    /// Send a request and decode the JSON envelope.
    pub async fn call(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.send(request).await;
        let status = response.status();
        (status, body_json(response).await)
    }

    /// Insert a user directly and sign them in.
    pub async fn create_user(&self, username: &str) -> TestUser {
        let id = self
            .db
            .users()
            .create(&NewUser {
                username,
                email: &format!("{}@example.com", username),
                full_name: &format!("{} Example", username),
                avatar: &format!("{}/missing-avatar.png", MEDIA_BASE_URL),
                cover_image: "",
                password_hash: password_hash(),
            })
            .await
            .unwrap();
        let tokens = issue_tokens(&self.db, &self.jwt, &id).await.unwrap();

        TestUser {
            id,
            username: username.to_string(),
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
        }
    }

    /// Publish a small MP4 as `user` and return the created video.
    pub async fn publish_video(&self, token: &str, title: &str) -> Value {
        let request = MultipartBuilder::new()
            .text("title", title)
            .text("description", "A test video")
            .file("videoFile", "clip.mp4", "video/mp4", &mp4_with_duration(1000, 42_000))
            .file("thumbnail", "thumb.png", "image/png", b"\x89PNG fake")
            .request("POST", "/api/v1/videos/publish", Some(token));

        let (status, body) = self.call(request).await;
        assert_eq!(status, StatusCode::CREATED, "publish failed: {}", body);
        body["data"].clone()
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.root);
    }
}

pub async fn body_json(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    if body.is_empty() {
        return Value::Null;
    }
    serde_json::from_slice(&body).unwrap()
}

pub fn json_request(method: &str, uri: &str, token: Option<&str>, body: &Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

pub fn empty_request(method: &str, uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::empty()).unwrap()
}

/// All `Set-Cookie` header values of a response.
pub fn set_cookies(headers: &HeaderMap) -> Vec<String> {
    headers
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .map(str::to_string)
        .collect()
}

/// Value of the named cookie among `Set-Cookie` headers.
pub fn cookie_value(cookies: &[String], name: &str) -> Option<String> {
    let prefix = format!("{}=", name);
    cookies.iter().find_map(|c| {
        let pair = c.split(';').next()?;
        pair.strip_prefix(&prefix).map(str::to_string)
    })
}

/// Builds `multipart/form-data` request bodies.
pub struct MultipartBuilder {
    boundary: String,
    body: Vec<u8>,
}

impl MultipartBuilder {
    pub fn new() -> Self {
        Self {
            boundary: format!("vidtube-boundary-{}", uuid::Uuid::new_v4().simple()),
            body: Vec::new(),
        }
    }

    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                self.boundary, name, value
            )
            .as_bytes(),
        );
        self
    }

    pub fn file(mut self, name: &str, file_name: &str, content_type: &str, data: &[u8]) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                self.boundary, name, file_name, content_type
            )
            .as_bytes(),
        );
        self.body.extend_from_slice(data);
        self.body.extend_from_slice(b"\r\n");
        self
    }

    pub fn request(mut self, method: &str, uri: &str, token: Option<&str>) -> Request<Body> {
        self.body
            .extend_from_slice(format!("--{}--\r\n", self.boundary).as_bytes());

        let mut builder = Request::builder().method(method).uri(uri).header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", self.boundary),
        );
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        builder.body(Body::from(self.body)).unwrap()
    }
}

/// Minimal MP4 with an `ftyp` box and a version 0 `moov/mvhd` box.
pub fn mp4_with_duration(timescale: u32, duration: u32) -> Vec<u8> {
    let mut mvhd = vec![0u8; 12];
    mvhd.extend_from_slice(&timescale.to_be_bytes());
    mvhd.extend_from_slice(&duration.to_be_bytes());
    mvhd.extend_from_slice(&[0u8; 80]);

    let mut mvhd_box = ((mvhd.len() + 8) as u32).to_be_bytes().to_vec();
    mvhd_box.extend_from_slice(b"mvhd");
    mvhd_box.extend_from_slice(&mvhd);

    let mut moov_box = ((mvhd_box.len() + 8) as u32).to_be_bytes().to_vec();
    moov_box.extend_from_slice(b"moov");
    moov_box.extend_from_slice(&mvhd_box);

    let mut file = 16u32.to_be_bytes().to_vec();
    file.extend_from_slice(b"ftypisom\0\0\0\0");
    file.extend_from_slice(&moov_box);
    file
}
