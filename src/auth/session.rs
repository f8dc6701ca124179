//! Token issuance and refresh-token rotation.
//!
//! A user holds at most one live refresh token, stored on their row. Issuing a
//! pair overwrites it, so presenting an older refresh token fails the equality
//! check in [`rotate_tokens`].

use thiserror::Error;
use tracing::{debug, warn};

use crate::db::Database;
use crate::jwt::{JwtConfig, JwtError};

/// Tokens handed to the client after login or rotation.
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub access_duration: u64,
    pub refresh_duration: u64,
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("{0}")]
    Unauthorized(&'static str),
    #[error("Token signing failed: {0}")]
    Signing(#[source] JwtError),
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Mint an access/refresh pair for a user and persist the refresh token.
pub async fn issue_tokens(
    db: &Database,
    jwt: &JwtConfig,
    user_id: &str,
) -> Result<TokenPair, SessionError> {
    let access = jwt
        .generate_access_token(user_id)
        .map_err(SessionError::Signing)?;
    let refresh = jwt
        .generate_refresh_token(user_id)
        .map_err(SessionError::Signing)?;

    if !db.users().set_refresh_token(user_id, &refresh.token).await? {
        return Err(SessionError::Unauthorized("User not found"));
    }

    debug!(user_id = %user_id, jti = %refresh.jti, "Issued token pair");

    Ok(TokenPair {
        access_token: access.token,
        refresh_token: refresh.token,
        access_duration: access.duration,
        refresh_duration: refresh.duration,
    })
}

/// Exchange a refresh token for a new pair. The presented token is single-use.
pub async fn rotate_tokens(
    db: &Database,
    jwt: &JwtConfig,
    presented: Option<&str>,
) -> Result<TokenPair, SessionError> {
    let presented = presented
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(SessionError::Unauthorized("Unauthorized request"))?;

    let claims = jwt
        .validate_refresh_token(presented)
        .map_err(|_| SessionError::Unauthorized("Invalid or expired refresh token"))?;

    let credentials = db
        .users()
        .get_credentials(&claims.sub)
        .await?
        .ok_or(SessionError::Unauthorized("Invalid refresh token"))?;

    if credentials.refresh_token.as_deref() != Some(presented) {
        warn!(user_id = %claims.sub, jti = %claims.jti, "Refresh token reuse or stale token");
        return Err(SessionError::Unauthorized(
            "Refresh token is expired or used",
        ));
    }

    issue_tokens(db, jwt, &credentials.id).await
}
