//! JWT token generation and validation.
//!
//! Access and refresh tokens are signed with distinct secrets, so leaking the
//! access secret cannot be used to forge refresh tokens.

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Token type for distinguishing access vs refresh tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenType {
    /// Short-lived access token, stateless
    Access,
    /// Long-lived refresh token, persisted on the user record
    Refresh,
}

/// JWT claims for access tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    /// Subject (user id)
    pub sub: String,
    /// Token type
    #[serde(rename = "typ")]
    pub token_type: TokenType,
    /// Issued at (Unix timestamp)
    pub iat: u64,
    /// Expiration time (Unix timestamp)
    pub exp: u64,
}

/// JWT claims for refresh tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshClaims {
    /// JWT ID, makes every refresh token unique even within the same second
    pub jti: String,
    /// Subject (user id)
    pub sub: String,
    /// Token type
    #[serde(rename = "typ")]
    pub token_type: TokenType,
    /// Issued at (Unix timestamp)
    pub iat: u64,
    /// Expiration time (Unix timestamp)
    pub exp: u64,
}

/// Default access token duration: 15 minutes
pub const DEFAULT_ACCESS_TOKEN_DURATION_SECS: u64 = 15 * 60;

/// Default refresh token duration: 10 days
pub const DEFAULT_REFRESH_TOKEN_DURATION_SECS: u64 = 10 * 24 * 60 * 60;

/// Signing keys and lifetimes for both token kinds.
#[derive(Clone)]
pub struct JwtConfig {
    access_encoding_key: EncodingKey,
    access_decoding_key: DecodingKey,
    refresh_encoding_key: EncodingKey,
    refresh_decoding_key: DecodingKey,
    access_duration: u64,
    refresh_duration: u64,
}

/// Result of generating an access token.
#[derive(Debug, Clone)]
pub struct AccessTokenResult {
    /// The JWT token string
    pub token: String,
    /// Token duration in seconds
    pub duration: u64,
}

/// Result of generating a refresh token.
#[derive(Debug, Clone)]
pub struct RefreshTokenResult {
    /// The JWT token string
    pub token: String,
    /// JWT ID
    pub jti: String,
    /// Token duration in seconds
    pub duration: u64,
}

impl JwtConfig {
    /// Create a configuration with the default token lifetimes.
    pub fn new(access_secret: &[u8], refresh_secret: &[u8]) -> Self {
        Self::with_durations(
            access_secret,
            refresh_secret,
            DEFAULT_ACCESS_TOKEN_DURATION_SECS,
            DEFAULT_REFRESH_TOKEN_DURATION_SECS,
        )
    }

    pub fn with_durations(
        access_secret: &[u8],
        refresh_secret: &[u8],
        access_duration: u64,
        refresh_duration: u64,
    ) -> Self {
        Self {
            access_encoding_key: EncodingKey::from_secret(access_secret),
            access_decoding_key: DecodingKey::from_secret(access_secret),
            refresh_encoding_key: EncodingKey::from_secret(refresh_secret),
            refresh_decoding_key: DecodingKey::from_secret(refresh_secret),
            access_duration,
            refresh_duration,
        }
    }

    /// Generate an access token for a user.
    pub fn generate_access_token(&self, user_id: &str) -> Result<AccessTokenResult, JwtError> {
        let now = now_secs()?;

        let claims = AccessClaims {
            sub: user_id.to_string(),
            token_type: TokenType::Access,
            iat: now,
            exp: expiry(now, self.access_duration)?,
        };

        let token = jsonwebtoken::encode(&Header::default(), &claims, &self.access_encoding_key)
            .map_err(JwtError::Encoding)?;

        Ok(AccessTokenResult {
            token,
            duration: self.access_duration,
        })
    }

    /// Generate a refresh token for a user.
    pub fn generate_refresh_token(&self, user_id: &str) -> Result<RefreshTokenResult, JwtError> {
        let now = now_secs()?;

        let jti = uuid::Uuid::new_v4().to_string();
        let exp = expiry(now, self.refresh_duration)?;

        let claims = RefreshClaims {
            jti: jti.clone(),
            sub: user_id.to_string(),
            token_type: TokenType::Refresh,
            iat: now,
            exp,
        };

        let token = jsonwebtoken::encode(&Header::default(), &claims, &self.refresh_encoding_key)
            .map_err(JwtError::Encoding)?;

        Ok(RefreshTokenResult {
            token,
            jti,
            duration: self.refresh_duration,
        })
    }

    /// Validate and decode an access token.
    pub fn validate_access_token(&self, token: &str) -> Result<AccessClaims, JwtError> {
        let token_data =
            jsonwebtoken::decode::<AccessClaims>(token, &self.access_decoding_key, &validation())
                .map_err(JwtError::Decoding)?;

        if token_data.claims.token_type != TokenType::Access {
            return Err(JwtError::WrongTokenType);
        }

        Ok(token_data.claims)
    }

    /// Validate and decode a refresh token.
    pub fn validate_refresh_token(&self, token: &str) -> Result<RefreshClaims, JwtError> {
        let token_data = jsonwebtoken::decode::<RefreshClaims>(
            token,
            &self.refresh_decoding_key,
            &validation(),
        )
        .map_err(JwtError::Decoding)?;

        if token_data.claims.token_type != TokenType::Refresh {
            return Err(JwtError::WrongTokenType);
        }

        Ok(token_data.claims)
    }
}

fn validation() -> Validation {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = 0;
    validation
}

fn expiry(now: u64, duration: u64) -> Result<u64, JwtError> {
    now.checked_add(duration).ok_or(JwtError::ExpiryOverflow)
}

fn now_secs() -> Result<u64, JwtError> {
    Ok(SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|_| JwtError::TimeError)?
        .as_secs())
}

/// Errors that can occur during JWT operations.
#[derive(Debug)]
pub enum JwtError {
    /// Error encoding the token
    Encoding(jsonwebtoken::errors::Error),
    /// Error decoding the token (bad signature, malformed, expired)
    Decoding(jsonwebtoken::errors::Error),
    /// System time error
    TimeError,
    /// Token lifetime pushes the expiry past the representable range
    ExpiryOverflow,
    /// Wrong token type (e.g., using refresh token as access token)
    WrongTokenType,
}

impl std::fmt::Display for JwtError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JwtError::Encoding(e) => write!(f, "Failed to encode token: {}", e),
            JwtError::Decoding(e) => write!(f, "Failed to decode token: {}", e),
            JwtError::TimeError => write!(f, "System time error"),
            JwtError::ExpiryOverflow => write!(f, "Token lifetime is too long"),
            JwtError::WrongTokenType => write!(f, "Wrong token type"),
        }
    }
}

impl std::error::Error for JwtError {}
