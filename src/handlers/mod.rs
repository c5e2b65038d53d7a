// Two handler tiers:
// Public (no auth) -> Protected (session required, see middleware::auth)
pub mod protected;
pub mod public;

use axum::http::HeaderValue;

use crate::auth::SESSION_COOKIE;
use crate::error::ApiError;

/// `Set-Cookie` value carrying the session token
pub(crate) fn session_cookie(token: &str, max_age_secs: i64, secure: bool) -> Result<HeaderValue, ApiError> {
    let mut cookie = format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        SESSION_COOKIE,
        token,
        max_age_secs.max(0)
    );
    if secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie).map_err(|e| {
        tracing::error!("Invalid session cookie: {}", e);
        ApiError::internal_server_error("Failed to create session")
    })
}

pub(crate) fn expired_session_cookie() -> HeaderValue {
    HeaderValue::from_static("bento_session=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0")
}
