use axum::{extract::State, http::header, response::IntoResponse, Extension};
use serde::Serialize;
use uuid::Uuid;

use crate::app::AppState;
use crate::database::models::User;
use crate::error::ApiError;
use crate::handlers::expired_session_cookie;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};

#[derive(Debug, Serialize)]
pub struct WhoAmI {
    pub user: User,
    pub session_id: Uuid,
}

/// GET /api/auth/whoami - The authenticated user and their session id
pub async fn whoami(Extension(auth): Extension<AuthUser>) -> ApiResult<WhoAmI> {
    Ok(ApiResponse::success(WhoAmI {
        user: auth.user,
        session_id: auth.session_id,
    }))
}

/// DELETE /api/auth/session - Revoke the current session
pub async fn logout(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> Result<impl IntoResponse, ApiError> {
    state.users.logout(auth.session_id).await?;
    Ok(([(header::SET_COOKIE, expired_session_cookie())], ApiResponse::no_content()))
}
