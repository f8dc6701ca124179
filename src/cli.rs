//! CLI argument parsing, validation, and startup helpers.

use crate::ServerConfig;
use crate::db::Database;
use crate::jwt::{DEFAULT_ACCESS_TOKEN_DURATION_SECS, DEFAULT_REFRESH_TOKEN_DURATION_SECS};
use crate::rate_limit::DEFAULT_AUTH_REQUESTS_PER_MINUTE;
use axum::http::HeaderName;
use clap::Parser;
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use url::Url;

const MIN_SECRET_LENGTH: usize = 32;

/// Longest accepted token lifetime: one year
pub const MAX_TOKEN_TTL_SECS: u64 = 365 * 24 * 60 * 60;

/// Default upload size limit: 100 MiB
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 100 * 1024 * 1024;

pub const ACCESS_SECRET_ENV: &str = "ACCESS_TOKEN_SECRET";
pub const REFRESH_SECRET_ENV: &str = "REFRESH_TOKEN_SECRET";

#[derive(clap::ValueEnum, Clone, Debug, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
    Compact,
}

#[derive(Parser, Debug, Clone)]
#[command(name = "vidtube", about = "Video sharing platform backend")]
pub struct Args {
    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value = "8000")]
    pub port: u16,

    /// Path to SQLite database file
    #[arg(short, long, env = "DATABASE_PATH", default_value = "vidtube.db")]
    pub database: String,

    /// Path to file containing the access token secret. Prefer ACCESS_TOKEN_SECRET instead
    #[arg(long)]
    pub access_secret_file: Option<String>,

    /// Path to file containing the refresh token secret. Prefer REFRESH_TOKEN_SECRET instead
    #[arg(long)]
    pub refresh_secret_file: Option<String>,

    /// Access token lifetime in seconds
    #[arg(long, env = "ACCESS_TOKEN_TTL_SECS", default_value_t = DEFAULT_ACCESS_TOKEN_DURATION_SECS)]
    pub access_ttl: u64,

    /// Refresh token lifetime in seconds
    #[arg(long, env = "REFRESH_TOKEN_TTL_SECS", default_value_t = DEFAULT_REFRESH_TOKEN_DURATION_SECS)]
    pub refresh_ttl: u64,

    /// Origin allowed to call the API with credentials (e.g. "http://localhost:5173")
    #[arg(long, env = "CORS_ORIGIN")]
    pub cors_origin: Option<String>,

    /// Directory hosted media is stored in
    #[arg(long, env = "MEDIA_DIR", default_value = "media")]
    pub media_dir: PathBuf,

    /// Public URL of the media directory
    #[arg(long, env = "MEDIA_BASE_URL", default_value = "http://localhost:8000/media")]
    pub media_base_url: String,

    /// Directory multipart uploads are buffered in
    #[arg(long, env = "UPLOAD_DIR", default_value = "uploads")]
    pub upload_dir: PathBuf,

    /// Largest accepted upload in bytes
    #[arg(long, env = "MAX_UPLOAD_BYTES", default_value_t = DEFAULT_MAX_UPLOAD_BYTES)]
    pub max_upload_bytes: usize,

    /// Login/register/refresh attempts allowed per client IP per minute
    #[arg(long, env = "AUTH_REQUESTS_PER_MINUTE", default_value_t = DEFAULT_AUTH_REQUESTS_PER_MINUTE)]
    pub auth_requests_per_minute: u32,

    /// Header a trusted reverse proxy puts the client IP in (e.g. "x-forwarded-for").
    /// Without it the socket peer address is used for rate limiting
    #[arg(long, env = "IP_HEADER")]
    pub ip_header: Option<String>,

    /// Omit the Secure flag on cookies (local development over plain HTTP)
    #[arg(long, env = "INSECURE_COOKIES")]
    pub insecure_cookies: bool,

    /// Log output format
    #[arg(short, long, default_value = "pretty")]
    pub log_format: LogFormat,
}

/// Initialize logging based on the specified format. `RUST_LOG` overrides the default `info` level.
pub fn init_logging(format: &LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Pretty => builder.init(),
        LogFormat::Json => builder.json().init(),
        LogFormat::Compact => builder.compact().init(),
    }
}

/// Load a signing secret from an environment variable or file.
/// Returns None and logs an error if the secret cannot be loaded.
pub fn load_secret(env_name: &str, secret_file: Option<&str>) -> Option<String> {
    let secret = if let Ok(secret) = std::env::var(env_name) {
        // Clear the environment variable to prevent leaking
        // SAFETY: We're single-threaded at this point during startup,
        // and no other code is reading this environment variable.
        unsafe { std::env::remove_var(env_name) };
        secret
    } else if let Some(path) = secret_file {
        match std::fs::read_to_string(path) {
            Ok(content) => content.trim().to_string(),
            Err(e) => {
                error!(path = %path, error = %e, "Failed to read secret file");
                return None;
            }
        }
    } else {
        error!(
            variable = %env_name,
            "Token secret is required. Set the environment variable (recommended) or pass a secret file"
        );
        return None;
    };

    if secret.len() < MIN_SECRET_LENGTH {
        error!(
            variable = %env_name,
            "Secret is shorter than {} characters. Use a longer secret",
            MIN_SECRET_LENGTH
        );
        return None;
    }

    Some(secret)
}

/// Load both token secrets, rejecting a pair that reuses the same value.
pub fn load_token_secrets(args: &Args) -> Option<(String, String)> {
    let access = load_secret(ACCESS_SECRET_ENV, args.access_secret_file.as_deref())?;
    let refresh = load_secret(REFRESH_SECRET_ENV, args.refresh_secret_file.as_deref())?;

    if access == refresh {
        error!("Access and refresh token secrets must differ");
        return None;
    }

    Some((access, refresh))
}

/// Parse an absolute http(s) URL, logging an error if it is invalid.
pub fn validate_http_url(name: &str, value: &str) -> Option<Url> {
    let url = match Url::parse(value) {
        Ok(url) => url,
        Err(e) => {
            error!(setting = %name, value = %value, error = %e, "Invalid URL");
            return None;
        }
    };

    if url.scheme() != "http" && url.scheme() != "https" {
        error!(setting = %name, value = %value, "URL must use http or https");
        return None;
    }

    Some(url)
}

/// Build ServerConfig from validated arguments.
pub fn build_config(
    args: Args,
    db: Database,
    access_secret: String,
    refresh_secret: String,
) -> Option<ServerConfig> {
    validate_http_url("media-base-url", &args.media_base_url)?;
    if let Some(origin) = &args.cors_origin {
        validate_http_url("cors-origin", origin)?;
    }

    for (name, ttl) in [
        ("access-ttl", args.access_ttl),
        ("refresh-ttl", args.refresh_ttl),
    ] {
        if !(1..=MAX_TOKEN_TTL_SECS).contains(&ttl) {
            error!(
                setting = %name,
                value = ttl,
                "Token lifetime must be between 1 and {} seconds",
                MAX_TOKEN_TTL_SECS
            );
            return None;
        }
    }

    let ip_header = match args.ip_header.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(name) => match HeaderName::try_from(name) {
            Ok(header) => Some(header),
            Err(e) => {
                error!(value = %name, error = %e, "Invalid IP header name");
                return None;
            }
        },
    };

    Some(ServerConfig {
        db,
        access_secret: access_secret.into_bytes(),
        refresh_secret: refresh_secret.into_bytes(),
        access_ttl: args.access_ttl,
        refresh_ttl: args.refresh_ttl,
        secure_cookies: !args.insecure_cookies,
        cors_origin: args.cors_origin.map(|o| o.trim_end_matches('/').to_string()),
        media_dir: args.media_dir,
        media_base_url: args.media_base_url,
        upload_dir: args.upload_dir,
        max_upload_bytes: args.max_upload_bytes,
        auth_requests_per_minute: args.auth_requests_per_minute,
        ip_header,
    })
}

/// Open the database, logging errors if it fails.
pub async fn open_database(path: &str) -> Option<Database> {
    match Database::open(path).await {
        Ok(db) => {
            info!(path = %path, "Database opened");
            Some(db)
        }
        Err(e) => {
            error!(path = %path, error = %e, "Failed to open database");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_http_url() {
        assert!(validate_http_url("x", "https://cdn.example.com/media").is_some());
        assert!(validate_http_url("x", "http://localhost:8000").is_some());
        assert!(validate_http_url("x", "ftp://example.com").is_none());
        assert!(validate_http_url("x", "not a url").is_none());
    }

    #[test]
    fn test_args_defaults() {
        let args = Args::parse_from(["vidtube"]);
        assert_eq!(args.access_ttl, DEFAULT_ACCESS_TOKEN_DURATION_SECS);
        assert_eq!(args.refresh_ttl, DEFAULT_REFRESH_TOKEN_DURATION_SECS);
        assert_eq!(args.max_upload_bytes, DEFAULT_MAX_UPLOAD_BYTES);
    }

    #[test]
    fn test_secret_file_must_be_long_enough() {
        let dir = std::env::temp_dir().join(format!("vidtube-cli-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();

        let short = dir.join("short");
        std::fs::write(&short, "too-short\n").unwrap();
        assert!(load_secret("VIDTUBE_TEST_UNSET_SECRET", short.to_str()).is_none());

        let long = dir.join("long");
        std::fs::write(&long, format!("{}\n", "s".repeat(40))).unwrap();
        assert_eq!(
            load_secret("VIDTUBE_TEST_UNSET_SECRET", long.to_str()).as_deref(),
            Some("s".repeat(40).as_str())
        );

        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_build_config_rejects_unbounded_ttl() {
        let too_long = (MAX_TOKEN_TTL_SECS + 1).to_string();
        for args in [
            ["vidtube", "--access-ttl", "0"],
            ["vidtube", "--refresh-ttl", too_long.as_str()],
            ["vidtube", "--access-ttl", "18446744073709551615"],
        ] {
            let db = Database::open(":memory:").await.unwrap();
            let config = build_config(
                Args::parse_from(args),
                db,
                "a".repeat(32),
                "b".repeat(32),
            );
            assert!(config.is_none());
        }
    }

    #[tokio::test]
    async fn test_build_config_ip_header() {
        let secrets = || ("a".repeat(32), "b".repeat(32));

        let db = Database::open(":memory:").await.unwrap();
        let (access, refresh) = secrets();
        let config = build_config(Args::parse_from(["vidtube"]), db, access, refresh).unwrap();
        assert!(config.ip_header.is_none());

        let db = Database::open(":memory:").await.unwrap();
        let (access, refresh) = secrets();
        let args = Args::parse_from(["vidtube", "--ip-header", "X-Real-IP"]);
        let config = build_config(args, db, access, refresh).unwrap();
        assert_eq!(config.ip_header.unwrap().as_str(), "x-real-ip");

        let db = Database::open(":memory:").await.unwrap();
        let (access, refresh) = secrets();
        let args = Args::parse_from(["vidtube", "--ip-header", "bad header"]);
        assert!(build_config(args, db, access, refresh).is_none());
    }
}
