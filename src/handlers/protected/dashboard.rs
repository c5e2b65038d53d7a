use axum::{extract::State, Extension};

use crate::app::AppState;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::DashboardSummary;

/// GET /api/dashboard
pub async fn summary(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> ApiResult<DashboardSummary> {
    let summary = state.dashboard.summary(&auth.user).await?;
    Ok(ApiResponse::success(summary))
}
