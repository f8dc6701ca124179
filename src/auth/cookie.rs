//! Cookie and header parsing for session tokens.

use axum::http::{HeaderMap, header};

use super::session::TokenPair;

/// Cookie carrying the short-lived access token.
pub const ACCESS_COOKIE_NAME: &str = "accessToken";

/// Cookie carrying the long-lived refresh token.
pub const REFRESH_COOKIE_NAME: &str = "refreshToken";

/// Extract a cookie value from the Cookie header.
pub fn get_cookie<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    let cookie_header = headers.get(header::COOKIE)?.to_str().ok()?;
    for part in cookie_header.split(';') {
        let part = part.trim();
        if let Some((key, value)) = part.split_once('=') {
            if key.trim() == name {
                return Some(value.trim());
            }
        }
    }
    None
}

/// Extract the token from an `Authorization: Bearer <token>` header.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

fn secure_suffix(secure: bool) -> &'static str {
    if secure { "; Secure" } else { "" }
}

/// Set-Cookie values for a freshly issued token pair.
pub fn session_cookies(tokens: &TokenPair, secure: bool) -> [String; 2] {
    let secure = secure_suffix(secure);
    [
        format!(
            "{}={}; HttpOnly; SameSite=Strict; Path=/; Max-Age={}{}",
            ACCESS_COOKIE_NAME, tokens.access_token, tokens.access_duration, secure
        ),
        format!(
            "{}={}; HttpOnly; SameSite=Strict; Path=/; Max-Age={}{}",
            REFRESH_COOKIE_NAME, tokens.refresh_token, tokens.refresh_duration, secure
        ),
    ]
}

/// Set-Cookie values that remove both session cookies.
pub fn clear_cookies(secure: bool) -> [String; 2] {
    let secure = secure_suffix(secure);
    [
        format!(
            "{}=; HttpOnly; SameSite=Strict; Path=/; Max-Age=0{}",
            ACCESS_COOKIE_NAME, secure
        ),
        format!(
            "{}=; HttpOnly; SameSite=Strict; Path=/; Max-Age=0{}",
            REFRESH_COOKIE_NAME, secure
        ),
    ]
}
