use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::{json, Value};

use crate::app::AppState;

/// GET / - Service information
pub async fn root() -> Json<Value> {
    Json(json!({
        "success": true,
        "data": {
            "name": "Bento API",
            "version": env!("CARGO_PKG_VERSION"),
            "description": "Accounts, onboarding and team management for Bento",
            "endpoints": {
                "health": "/health (public)",
                "auth": "/auth/register, /auth/login (public)",
                "session": "/api/auth/* (protected)",
                "onboarding": "/api/onboarding/* (protected)",
                "user": "/api/user/* (protected)",
                "organizations": "/api/organizations[/:id] (protected)",
                "team": "/api/team/* (protected)",
                "invitations": "/api/invitations/* (protected)",
                "dashboard": "/api/dashboard (protected)",
            }
        }
    }))
}

/// GET /health - 200 when the store answers, 503 otherwise
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let now = chrono::Utc::now();
    let backend = state.store.backend();

    match state.store.health_check().await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "data": {
                    "status": "ok",
                    "timestamp": now,
                    "database": backend
                }
            })),
        ),
        Err(e) => {
            tracing::error!("Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "success": false,
                    "error": "database unavailable",
                    "code": "SERVICE_UNAVAILABLE",
                    "data": {
                        "status": "degraded",
                        "timestamp": now,
                        "database": backend
                    }
                })),
            )
        }
    }
}
