//! JWT session authentication.
//!
//! Dual-token system: short-lived access tokens (stateless) and long-lived
//! refresh tokens (one per user, stored on the user row and rotated on use).
//! Expired access tokens are rejected; clients refresh explicitly.

mod cookie;
mod errors;
mod extractors;
mod ownership;
mod session;
mod state;

pub use cookie::{
    ACCESS_COOKIE_NAME, REFRESH_COOKIE_NAME, bearer_token, clear_cookies, get_cookie,
    session_cookies,
};
pub use errors::{ApiAuthError, AuthErrorKind};
pub use extractors::{Auth, OptionalAuth};
pub use ownership::ensure_owner;
pub use session::{SessionError, TokenPair, issue_tokens, rotate_tokens};
pub use state::HasAuthBackend;
