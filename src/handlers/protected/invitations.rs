use axum::{extract::State, Extension};
use serde::Deserialize;

use crate::api::ApiJson;
use crate::app::AppState;
use crate::database::models::{Invitation, Membership};
use crate::middleware::{ApiResponse, ApiResult, AuthUser};

#[derive(Debug, Deserialize)]
pub struct InvitationTokenRequest {
    pub token: String,
}

/// POST /api/invitations/accept - Join the organization behind a token
pub async fn accept(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    ApiJson(payload): ApiJson<InvitationTokenRequest>,
) -> ApiResult<Membership> {
    let membership = state.team.accept_invitation(&auth.user, &payload.token).await?;
    Ok(ApiResponse::success(membership))
}

/// POST /api/invitations/decline
pub async fn decline(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    ApiJson(payload): ApiJson<InvitationTokenRequest>,
) -> ApiResult<Invitation> {
    let invitation = state.team.decline_invitation(&auth.user, &payload.token).await?;
    Ok(ApiResponse::success(invitation))
}
