use axum::{extract::State, Extension};
use serde::Deserialize;
use uuid::Uuid;

use crate::api::{ApiJson, ApiPath};
use crate::app::AppState;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::OrganizationDetails;

#[derive(Debug, Deserialize)]
pub struct CreateOrganizationRequest {
    pub name: String,
}

/// POST /api/organizations - Create an organization owned by the caller
pub async fn create(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    ApiJson(payload): ApiJson<CreateOrganizationRequest>,
) -> ApiResult<OrganizationDetails> {
    let details = state.organizations.create(auth.user.id, &payload.name).await?;
    Ok(ApiResponse::created(details))
}

/// GET /api/organizations/:id
pub async fn get(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<OrganizationDetails> {
    let details = state.organizations.get(auth.user.id, id).await?;
    Ok(ApiResponse::success(details))
}
