//! Rate limiting for credential endpoints.
//!
//! Uses a token bucket per client IP to slow down password guessing and
//! signup spam on login, register and refresh-token.

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{Extensions, HeaderMap, HeaderName},
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{Quota, RateLimiter, clock::DefaultClock, state::keyed::DefaultKeyedStateStore};
use std::{
    net::{IpAddr, SocketAddr},
    num::NonZeroU32,
    sync::Arc,
};
use tracing::warn;

use crate::api::ApiError;

/// Default requests per minute per IP on credential endpoints.
pub const DEFAULT_AUTH_REQUESTS_PER_MINUTE: u32 = 20;

/// Per-IP rate limiter.
pub type IpLimiter = RateLimiter<String, DefaultKeyedStateStore<String>, DefaultClock>;

#[derive(Clone)]
pub struct RateLimitConfig {
    pub auth: Arc<IpLimiter>,
    /// Header set by a trusted reverse proxy. When None the socket peer is used.
    pub ip_header: Option<HeaderName>,
}

impl RateLimitConfig {
    /// A zero quota is treated as one request per minute.
    pub fn new(auth_per_minute: u32, ip_header: Option<HeaderName>) -> Self {
        let quota = NonZeroU32::new(auth_per_minute).unwrap_or(NonZeroU32::MIN);
        Self {
            auth: Arc::new(RateLimiter::keyed(Quota::per_minute(quota))),
            ip_header,
        }
    }
}

/// Client IP from the configured proxy header, or from the socket peer when no
/// header is configured. A configured header is never bypassed: if it is
/// missing or unparseable the request has no usable IP.
pub fn client_ip(
    headers: &HeaderMap,
    extensions: &Extensions,
    ip_header: Option<&HeaderName>,
) -> Result<String, &'static str> {
    match ip_header {
        Some(name) => {
            let value = headers
                .get(name)
                .ok_or("IP header not present")?
                .to_str()
                .map_err(|_| "IP header contains invalid characters")?;
            // X-Forwarded-For style lists carry the original client first
            let first = value.split(',').next().unwrap_or_default().trim();
            first
                .parse::<IpAddr>()
                .map(|ip| ip.to_string())
                .map_err(|_| "IP header is not an IP address")
        }
        None => extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ci| ci.0.ip().to_string())
            .ok_or("No client IP available"),
    }
}

/// Middleware for rate limiting credential endpoints.
pub async fn rate_limit_auth(
    State(config): State<RateLimitConfig>,
    request: Request,
    next: Next,
) -> Response {
    let ip = match client_ip(
        request.headers(),
        request.extensions(),
        config.ip_header.as_ref(),
    ) {
        Ok(ip) => ip,
        Err(reason) => {
            warn!(reason, path = %request.uri().path(), "Unable to determine client IP");
            return ApiError::forbidden("Unable to determine client IP.").into_response();
        }
    };

    match config.auth.check_key(&ip) {
        Ok(_) => next.run(request).await,
        Err(_) => {
            warn!(ip = %ip, path = %request.uri().path(), "Rate limit exceeded");
            ApiError::TooManyRequests("Too many requests. Please try again later.".into())
                .into_response()
        }
    }
}
