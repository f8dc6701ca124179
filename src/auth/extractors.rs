//! Axum extractors for authentication.

use axum::{extract::FromRequestParts, http::request::Parts};
use tracing::error;

use super::cookie::{ACCESS_COOKIE_NAME, bearer_token, get_cookie};
use super::errors::{ApiAuthError, AuthErrorKind};
use super::state::HasAuthBackend;
use crate::db::User;

/// Resolve the user behind the request's access token.
/// The cookie wins over the Authorization header when both are present.
async fn authenticate_request<S>(parts: &Parts, state: &S) -> Result<User, AuthErrorKind>
where
    S: HasAuthBackend + Send + Sync,
{
    let token = get_cookie(&parts.headers, ACCESS_COOKIE_NAME)
        .filter(|t| !t.is_empty())
        .or_else(|| bearer_token(&parts.headers))
        .ok_or(AuthErrorKind::NotAuthenticated)?;

    let claims = state
        .jwt()
        .validate_access_token(token)
        .map_err(|_| AuthErrorKind::InvalidToken)?;

    state
        .db()
        .users()
        .get_by_id(&claims.sub)
        .await
        .map_err(|e| {
            error!("Failed to load user: {}", e);
            AuthErrorKind::DatabaseError
        })?
        .ok_or(AuthErrorKind::UserNotFound)
}

/// Extractor for endpoints that require a signed-in user.
pub struct Auth(pub User);

impl<S> FromRequestParts<S> for Auth
where
    S: HasAuthBackend + Send + Sync,
{
    type Rejection = ApiAuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        authenticate_request(parts, state)
            .await
            .map(Auth)
            .map_err(ApiAuthError::new)
    }
}

/// Optional authentication. Never rejects; any failure yields `None`.
pub struct OptionalAuth(pub Option<User>);

impl<S> FromRequestParts<S> for OptionalAuth
where
    S: HasAuthBackend + Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        Ok(OptionalAuth(authenticate_request(parts, state).await.ok()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{Database, test_support};
    use crate::jwt::JwtConfig;
    use axum::http::{Request, header};

    #[derive(Clone)]
    struct TestState {
        db: Database,
        jwt: std::sync::Arc<JwtConfig>,
    }

    crate::impl_has_auth_backend!(TestState);

    async fn state() -> TestState {
        TestState {
            db: test_support::open().await,
            jwt: std::sync::Arc::new(JwtConfig::new(
                b"access-secret-for-extractor-tests-0",
                b"refresh-secret-for-extractor-tests0",
            )),
        }
    }

    fn parts(header_name: header::HeaderName, value: &str) -> Parts {
        let (parts, _) = Request::builder()
            .header(header_name, value)
            .body(())
            .unwrap()
            .into_parts();
        parts
    }

    #[tokio::test]
    async fn test_cookie_and_bearer() {
        let state = state().await;
        let id = test_support::user(&state.db, "alice").await;
        let token = state.jwt.generate_access_token(&id).unwrap().token;

        let mut from_cookie = parts(header::COOKIE, &format!("accessToken={}", token));
        let Auth(user) = Auth::from_request_parts(&mut from_cookie, &state)
            .await
            .unwrap();
        assert_eq!(user.id, id);

        let mut from_header = parts(header::AUTHORIZATION, &format!("Bearer {}", token));
        let Auth(user) = Auth::from_request_parts(&mut from_header, &state)
            .await
            .unwrap();
        assert_eq!(user.username, "alice");
    }

    #[tokio::test]
    async fn test_rejections() {
        let state = state().await;
        let id = test_support::user(&state.db, "alice").await;

        let mut missing = parts(header::COOKIE, "other=1");
        let err = Auth::from_request_parts(&mut missing, &state)
            .await
            .err()
            .unwrap();
        assert_eq!(err.kind(), AuthErrorKind::NotAuthenticated);

        let refresh = state.jwt.generate_refresh_token(&id).unwrap().token;
        let mut wrong_type = parts(header::COOKIE, &format!("accessToken={}", refresh));
        let err = Auth::from_request_parts(&mut wrong_type, &state)
            .await
            .err()
            .unwrap();
        assert_eq!(err.kind(), AuthErrorKind::InvalidToken);

        let ghost = state.jwt.generate_access_token("ghost").unwrap().token;
        let mut unknown = parts(header::AUTHORIZATION, &format!("Bearer {}", ghost));
        let err = Auth::from_request_parts(&mut unknown, &state)
            .await
            .err()
            .unwrap();
        assert_eq!(err.kind(), AuthErrorKind::UserNotFound);

        let OptionalAuth(user) = OptionalAuth::from_request_parts(&mut unknown, &state)
            .await
            .unwrap();
        assert!(user.is_none());
    }
}
