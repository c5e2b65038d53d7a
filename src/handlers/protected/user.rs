use axum::{extract::State, Extension};

use crate::app::AppState;
use crate::database::models::UserOrganization;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::ReceivedInvitation;

/// GET /api/user/organizations - Organizations the caller belongs to
///
/// Expected Output:
/// ```json
/// {
///   "success": true,
///   "data": [
///     { "id": "org_uuid", "name": "Acme", "slug": "acme", "role": "owner", "joined_at": "..." }
///   ]
/// }
/// ```
pub async fn organizations(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> ApiResult<Vec<UserOrganization>> {
    let organizations = state.users.organizations(auth.user.id).await?;
    Ok(ApiResponse::success(organizations))
}

/// GET /api/user/invitations - Pending invitations addressed to the caller
pub async fn invitations(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> ApiResult<Vec<ReceivedInvitation>> {
    let invitations = state.users.pending_invitations(&auth.user).await?;
    Ok(ApiResponse::success(invitations))
}
