use axum::{extract::State, http::header, response::IntoResponse};
use chrono::Utc;
use serde::Deserialize;

use crate::api::ApiJson;
use crate::app::AppState;
use crate::config::Environment;
use crate::error::ApiError;
use crate::handlers::session_cookie;
use crate::middleware::ApiResponse;
use crate::services::AuthenticatedSession;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

fn with_cookie(
    state: &AppState,
    session: AuthenticatedSession,
    created: bool,
) -> Result<impl IntoResponse, ApiError> {
    let max_age = (session.expires_at - Utc::now()).num_seconds();
    let secure = state.config.environment != Environment::Development;
    let cookie = session_cookie(&session.token, max_age, secure)?;
    let body = if created {
        ApiResponse::created(session)
    } else {
        ApiResponse::success(session)
    };
    Ok(([(header::SET_COOKIE, cookie)], body))
}

/// POST /auth/register - Create an account and start a session
///
/// Expected Input:
/// ```json
/// { "email": "ada@example.com", "password": "at least 8 chars", "name": "Ada" }
/// ```
///
/// Responds 201 with `{ token, expires_at, user }` and sets the session cookie.
pub async fn register(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let session = state
        .users
        .register(&payload.email, &payload.password, payload.name.as_deref())
        .await?;
    with_cookie(&state, session, true)
}

/// POST /auth/login - Exchange credentials for a session token
pub async fn login(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let session = state.users.login(&payload.email, &payload.password).await?;
    with_cookie(&state, session, false)
}
