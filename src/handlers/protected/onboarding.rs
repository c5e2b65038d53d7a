use axum::{extract::State, Extension};

use crate::api::ApiPath;
use crate::app::AppState;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::OnboardingProgress;
use crate::types::{OnboardingStep, UnknownVariant};

/// GET /api/onboarding/progress - Where the caller is in onboarding
///
/// Expected Output:
/// ```json
/// {
///   "success": true,
///   "data": {
///     "status": "in_progress",
///     "current_step": "invite_team",
///     "completed_steps": ["profile", "organization"],
///     "total_steps": 3,
///     "percent_complete": 66
///   }
/// }
/// ```
pub async fn progress(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> ApiResult<OnboardingProgress> {
    let progress = state.onboarding.progress(auth.user.id).await?;
    Ok(ApiResponse::success(progress))
}

/// POST /api/onboarding/steps/:step - Mark one step done
pub async fn complete_step(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    ApiPath(step): ApiPath<String>,
) -> ApiResult<OnboardingProgress> {
    let step: OnboardingStep = step.parse().map_err(|e: UnknownVariant| ApiError::bad_request(e.to_string()))?;
    let progress = state.onboarding.complete_step(auth.user.id, step).await?;
    Ok(ApiResponse::success(progress))
}

/// POST /api/onboarding/complete - Skip the remaining steps
pub async fn finish(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> ApiResult<OnboardingProgress> {
    let progress = state.onboarding.finish(auth.user.id).await?;
    Ok(ApiResponse::success(progress))
}

/// POST /api/onboarding/reset
pub async fn reset(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> ApiResult<OnboardingProgress> {
    let progress = state.onboarding.reset(auth.user.id).await?;
    Ok(ApiResponse::success(progress))
}
