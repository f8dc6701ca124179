//! User accounts and sessions.
//!
//! - POST `/register`, `/login`, `/refresh-token` (rate limited)
//! - POST `/logout`, `/change-password`
//! - GET `/current-user`, `/history`, `/c/{username}`
//! - PATCH `/update-account`, `/avatar`, `/cover-image`

use axum::{
    Router,
    body::Bytes,
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::{HeaderMap, header::SET_COOKIE},
    middleware,
    response::{AppendHeaders, IntoResponse},
    routing::{get, patch, post},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info};

use super::UploadSettings;
use super::error::{ApiError, ResultExt, require_secret, require_text};
use super::json::JsonBody;
use super::response::ApiResponse;
use super::upload::{ImageForm, RegisterForm};
use crate::auth::{
    Auth, OptionalAuth, REFRESH_COOKIE_NAME, clear_cookies, get_cookie, issue_tokens,
    rotate_tokens, session_cookies,
};
use crate::db::{Database, NewUser, User, is_unique_violation};
use crate::impl_has_auth_backend;
use crate::jwt::JwtConfig;
use crate::media::MediaHost;
use crate::password::{hash_password, verify_password};
use crate::rate_limit::{RateLimitConfig, rate_limit_auth};

#[derive(Clone)]
pub struct UsersState {
    pub db: Database,
    pub jwt: Arc<JwtConfig>,
    pub media: Arc<MediaHost>,
    pub uploads: Arc<UploadSettings>,
    pub secure_cookies: bool,
    pub rate_limit: RateLimitConfig,
}

impl_has_auth_backend!(UsersState);

pub fn router(state: UsersState) -> Router {
    let body_limit = DefaultBodyLimit::max(state.uploads.max_bytes);

    let credential_routes = Router::new()
        .route("/register", post(register).layer(body_limit))
        .route("/login", post(login))
        .route("/refresh-token", post(refresh_token))
        .route_layer(middleware::from_fn_with_state(
            state.rate_limit.clone(),
            rate_limit_auth,
        ))
        .with_state(state.clone());

    let account_routes = Router::new()
        .route("/logout", post(logout))
        .route("/change-password", post(change_password))
        .route("/current-user", get(current_user))
        .route("/update-account", patch(update_account))
        .route("/avatar", patch(update_avatar).layer(body_limit))
        .route("/cover-image", patch(update_cover_image).layer(body_limit))
        .route("/c/{username}", get(channel_profile))
        .route("/history", get(watch_history))
        .with_state(state);

    Router::new().merge(credential_routes).merge(account_routes)
}

// --- Request/Response types ---

#[derive(Deserialize)]
struct LoginRequest {
    username: Option<String>,
    email: Option<String>,
    password: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SessionResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    user: Option<User>,
    access_token: String,
    refresh_token: String,
}

#[derive(Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefreshRequest {
    refresh_token: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChangePasswordRequest {
    old_password: Option<String>,
    new_password: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateAccountRequest {
    full_name: Option<String>,
    email: Option<String>,
}

// --- Helpers ---

async fn hash_blocking(password: String) -> Result<String, ApiError> {
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| {
            error!("Password hashing task failed: {}", e);
            ApiError::internal("Failed to hash password")
        })?
        .map_err(|e| {
            error!("{}", e);
            ApiError::internal("Failed to hash password")
        })
}

async fn verify_blocking(password: String, hash: String) -> Result<bool, ApiError> {
    tokio::task::spawn_blocking(move || verify_password(&password, &hash))
        .await
        .map_err(|e| {
            error!("Password verification task failed: {}", e);
            ApiError::internal("Failed to verify password")
        })
}

async fn load_user(db: &Database, id: &str) -> Result<User, ApiError> {
    db.users()
        .get_by_id(id)
        .await
        .db_err("Failed to load user")?
        .ok_or_else(|| ApiError::not_found("User does not exist"))
}

// --- Handlers ---

async fn register(
    State(state): State<UsersState>,
    multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let form = RegisterForm::read(multipart, state.uploads.limits()).await?;

    let full_name = require_text(form.full_name.as_deref(), "fullName")?;
    let email = require_text(form.email.as_deref(), "email")?;
    let username = require_text(form.username.as_deref(), "username")?.to_lowercase();
    let password = require_secret(form.password.as_deref(), "password")?;

    if state
        .db
        .users()
        .exists_by_username_or_email(&username, email)
        .await
        .db_err("Failed to check existing user")?
    {
        return Err(ApiError::conflict(
            "User with email or username already exists",
        ));
    }

    let avatar = form
        .avatar
        .ok_or_else(|| ApiError::bad_request("Avatar file is required"))?;

    let password_hash = hash_blocking(password.to_string()).await?;

    let avatar = state.media.upload(avatar).await?;
    let cover_image = match form.cover_image {
        Some(file) => Some(state.media.upload(file).await?),
        None => None,
    };
    let cover_url = cover_image.as_ref().map(|c| c.url.as_str()).unwrap_or("");

    let created = state
        .db
        .users()
        .create(&NewUser {
            username: &username,
            email,
            full_name,
            avatar: &avatar.url,
            cover_image: cover_url,
            password_hash: &password_hash,
        })
        .await;

    let id = match created {
        Ok(id) => id,
        Err(e) => {
            state.media.remove(&avatar.url).await;
            if !cover_url.is_empty() {
                state.media.remove(cover_url).await;
            }
            if is_unique_violation(&e) {
                return Err(ApiError::conflict(
                    "User with email or username already exists",
                ));
            }
            return Err(ApiError::db_error("Failed to create user", e));
        }
    };

    info!(user_id = %id, username = %username, "User registered");

    let user = load_user(&state.db, &id).await?;
    Ok(ApiResponse::created(user, "User registered successfully"))
}

async fn login(
    State(state): State<UsersState>,
    JsonBody(payload): JsonBody<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let username = payload
        .username
        .as_deref()
        .map(str::trim)
        .filter(|u| !u.is_empty());
    let email = payload
        .email
        .as_deref()
        .map(str::trim)
        .filter(|e| !e.is_empty());
    let password = require_secret(payload.password.as_deref(), "password")?;

    let user = match (username, email) {
        (Some(username), _) => state
            .db
            .users()
            .get_by_username(&username.to_lowercase())
            .await
            .db_err("Failed to look up user")?,
        (None, Some(email)) => state
            .db
            .users()
            .get_by_email(email)
            .await
            .db_err("Failed to look up user")?,
        (None, None) => return Err(ApiError::bad_request("username or email is required")),
    }
    .ok_or_else(|| ApiError::not_found("User does not exist"))?;

    let credentials = state
        .db
        .users()
        .get_credentials(&user.id)
        .await
        .db_err("Failed to load credentials")?
        .ok_or_else(|| ApiError::not_found("User does not exist"))?;

    if !verify_blocking(password.to_string(), credentials.password_hash).await? {
        info!(user_id = %user.id, "Login failed: wrong password");
        return Err(ApiError::unauthorized("Invalid user credentials"));
    }

    let tokens = issue_tokens(&state.db, &state.jwt, &user.id).await?;
    let [access_cookie, refresh_cookie] = session_cookies(&tokens, state.secure_cookies);

    info!(user_id = %user.id, "User logged in");

    Ok((
        AppendHeaders([(SET_COOKIE, access_cookie), (SET_COOKIE, refresh_cookie)]),
        ApiResponse::ok(
            SessionResponse {
                user: Some(user),
                access_token: tokens.access_token,
                refresh_token: tokens.refresh_token,
            },
            "User logged in successfully",
        ),
    ))
}

async fn logout(
    State(state): State<UsersState>,
    Auth(user): Auth,
) -> Result<impl IntoResponse, ApiError> {
    state
        .db
        .users()
        .clear_refresh_token(&user.id)
        .await
        .db_err("Failed to clear refresh token")?;

    info!(user_id = %user.id, "User logged out");

    let [clear_access, clear_refresh] = clear_cookies(state.secure_cookies);
    Ok((
        AppendHeaders([(SET_COOKIE, clear_access), (SET_COOKIE, clear_refresh)]),
        ApiResponse::ok(json!({}), "User logged out"),
    ))
}

/// Exchange a refresh token (cookie first, then JSON body) for a new pair.
async fn refresh_token(
    State(state): State<UsersState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let from_body = if body.is_empty() {
        RefreshRequest::default()
    } else {
        serde_json::from_slice(&body).unwrap_or_default()
    };

    let presented = get_cookie(&headers, REFRESH_COOKIE_NAME)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .or(from_body.refresh_token);

    let tokens = rotate_tokens(&state.db, &state.jwt, presented.as_deref()).await?;
    let [access_cookie, refresh_cookie] = session_cookies(&tokens, state.secure_cookies);

    Ok((
        AppendHeaders([(SET_COOKIE, access_cookie), (SET_COOKIE, refresh_cookie)]),
        ApiResponse::ok(
            SessionResponse {
                user: None,
                access_token: tokens.access_token,
                refresh_token: tokens.refresh_token,
            },
            "Access token refreshed",
        ),
    ))
}

async fn change_password(
    State(state): State<UsersState>,
    Auth(user): Auth,
    JsonBody(payload): JsonBody<ChangePasswordRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let old_password = require_secret(payload.old_password.as_deref(), "oldPassword")?;
    let new_password = require_secret(payload.new_password.as_deref(), "newPassword")?;

    let credentials = state
        .db
        .users()
        .get_credentials(&user.id)
        .await
        .db_err("Failed to load credentials")?
        .ok_or_else(|| ApiError::unauthorized("Invalid access token"))?;

    if !verify_blocking(old_password.to_string(), credentials.password_hash).await? {
        return Err(ApiError::bad_request("Invalid old password"));
    }

    let hash = hash_blocking(new_password.to_string()).await?;
    state
        .db
        .users()
        .set_password_hash(&user.id, &hash)
        .await
        .db_err("Failed to update password")?;
    state
        .db
        .users()
        .clear_refresh_token(&user.id)
        .await
        .db_err("Failed to clear refresh token")?;

    info!(user_id = %user.id, "Password changed");

    Ok(ApiResponse::ok(json!({}), "Password changed successfully"))
}

async fn current_user(Auth(user): Auth) -> impl IntoResponse {
    ApiResponse::ok(user, "Current user fetched successfully")
}

async fn update_account(
    State(state): State<UsersState>,
    Auth(user): Auth,
    JsonBody(payload): JsonBody<UpdateAccountRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let full_name = require_text(payload.full_name.as_deref(), "fullName")?;
    let email = require_text(payload.email.as_deref(), "email")?;

    if let Some(existing) = state
        .db
        .users()
        .get_by_email(email)
        .await
        .db_err("Failed to look up email")?
    {
        if existing.id != user.id {
            return Err(ApiError::conflict("Email is already in use"));
        }
    }

    match state.db.users().update_details(&user.id, full_name, email).await {
        Ok(_) => {}
        Err(e) if is_unique_violation(&e) => {
            return Err(ApiError::conflict("Email is already in use"));
        }
        Err(e) => return Err(ApiError::db_error("Failed to update account", e)),
    }

    let user = load_user(&state.db, &user.id).await?;
    Ok(ApiResponse::ok(user, "Account details updated successfully"))
}

async fn update_avatar(
    State(state): State<UsersState>,
    Auth(user): Auth,
    multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let form = ImageForm::read(multipart, state.uploads.limits(), "avatar").await?;
    let file = form
        .image
        .ok_or_else(|| ApiError::bad_request("Avatar file is missing"))?;

    let hosted = state.media.upload(file).await?;
    if let Err(e) = state.db.users().set_avatar(&user.id, &hosted.url).await {
        state.media.remove(&hosted.url).await;
        return Err(ApiError::db_error("Failed to update avatar", e));
    }
    state.media.remove(&user.avatar).await;

    let user = load_user(&state.db, &user.id).await?;
    Ok(ApiResponse::ok(user, "Avatar image updated successfully"))
}

async fn update_cover_image(
    State(state): State<UsersState>,
    Auth(user): Auth,
    multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let form = ImageForm::read(multipart, state.uploads.limits(), "coverImage").await?;
    let file = form
        .image
        .ok_or_else(|| ApiError::bad_request("Cover image file is missing"))?;

    let hosted = state.media.upload(file).await?;
    if let Err(e) = state.db.users().set_cover_image(&user.id, &hosted.url).await {
        state.media.remove(&hosted.url).await;
        return Err(ApiError::db_error("Failed to update cover image", e));
    }
    if !user.cover_image.is_empty() {
        state.media.remove(&user.cover_image).await;
    }

    let user = load_user(&state.db, &user.id).await?;
    Ok(ApiResponse::ok(user, "Cover image updated successfully"))
}

async fn channel_profile(
    State(state): State<UsersState>,
    OptionalAuth(viewer): OptionalAuth,
    Path(username): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let username = username.trim().to_lowercase();
    if username.is_empty() {
        return Err(ApiError::bad_request("username is missing"));
    }

    let profile = state
        .db
        .subscriptions()
        .channel_profile(&username, viewer.as_ref().map(|v| v.id.as_str()))
        .await
        .db_err("Failed to load channel")?
        .ok_or_else(|| ApiError::not_found("Channel does not exist"))?;

    Ok(ApiResponse::ok(profile, "User channel fetched successfully"))
}

async fn watch_history(
    State(state): State<UsersState>,
    Auth(user): Auth,
) -> Result<impl IntoResponse, ApiError> {
    let history = state
        .db
        .videos()
        .watch_history(&user.id)
        .await
        .db_err("Failed to load watch history")?;

    Ok(ApiResponse::ok(history, "Watch history fetched successfully"))
}
