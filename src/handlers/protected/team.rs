use axum::{extract::State, Extension};
use serde::Deserialize;
use uuid::Uuid;

use crate::api::{ApiJson, ApiPath, ApiQuery};
use crate::app::AppState;
use crate::database::models::{Invitation, Member};
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::types::Role;

#[derive(Debug, Deserialize)]
pub struct TeamQuery {
    pub organization_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct InviteRequest {
    pub organization_id: Uuid,
    pub email: String,
    #[serde(default = "default_role")]
    pub role: Role,
}

fn default_role() -> Role {
    Role::Member
}

/// GET /api/team/members?organization_id=
pub async fn members(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    ApiQuery(query): ApiQuery<TeamQuery>,
) -> ApiResult<Vec<Member>> {
    let members = state.team.members(auth.user.id, query.organization_id).await?;
    Ok(ApiResponse::success(members))
}

/// GET /api/team/invitations?organization_id= - Pending invitations
pub async fn invitations(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    ApiQuery(query): ApiQuery<TeamQuery>,
) -> ApiResult<Vec<Invitation>> {
    let invitations = state.team.invitations(auth.user.id, query.organization_id).await?;
    Ok(ApiResponse::success(invitations))
}

/// POST /api/team/invitations - Invite someone by email
///
/// Expected Input:
/// ```json
/// { "organization_id": "org_uuid", "email": "new@example.com", "role": "member" }
/// ```
pub async fn invite(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    ApiJson(payload): ApiJson<InviteRequest>,
) -> ApiResult<Invitation> {
    let invitation = state
        .team
        .invite(&auth.user, payload.organization_id, &payload.email, payload.role)
        .await?;
    Ok(ApiResponse::created(invitation))
}

/// DELETE /api/team/invitations/:id - Withdraw a pending invitation
///
/// 204 on success. 403 ("Unauthorized to delete this invitation") unless the
/// caller sent the invitation or is an owner/admin of its organization.
pub async fn delete_invitation(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<()> {
    state.team.revoke_invitation(auth.user.id, id).await?;
    Ok(ApiResponse::no_content())
}
