use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

use crate::app::AppState;
use crate::auth::SESSION_COOKIE;
use crate::database::models::User;
use crate::error::ApiError;

/// Authenticated user context attached to every protected request
#[derive(Clone, Debug)]
pub struct AuthUser {
    pub user: User,
    pub session_id: Uuid,
}

/// Session middleware: resolves the bearer token (or session cookie) to a
/// live session and injects `AuthUser` into the request extensions.
pub async fn session_auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_token(request.headers()).map_err(ApiError::unauthorized)?;
    let (user, session) = state.users.authenticate(&token).await?;

    request.extensions_mut().insert(AuthUser {
        user,
        session_id: session.id,
    });

    Ok(next.run(request).await)
}

/// Token from `Authorization: Bearer`, falling back to the session cookie
fn extract_token(headers: &HeaderMap) -> Result<String, String> {
    if let Some(auth_header) = headers.get(header::AUTHORIZATION) {
        let auth_str = auth_header
            .to_str()
            .map_err(|_| "Invalid Authorization header format".to_string())?;

        return match auth_str.strip_prefix("Bearer ") {
            Some(token) if !token.trim().is_empty() => Ok(token.trim().to_string()),
            Some(_) => Err("Empty session token".to_string()),
            None => Err("Authorization header must use Bearer token format".to_string()),
        };
    }

    session_cookie(headers).ok_or_else(|| "Authentication required".to_string())
}

fn session_cookie(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.to_string())
        .filter(|value| !value.is_empty())
}
