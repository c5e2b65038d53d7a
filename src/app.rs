use axum::{
    http::{header, HeaderValue, Method},
    middleware,
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use tracing::warn;

use crate::config::AppConfig;
use crate::database::Store;
use crate::error::ApiError;
use crate::handlers::{protected, public};
use crate::middleware::session_auth_middleware;
use crate::services::{
    DashboardService, Mailer, OnboardingService, OrganizationService, TeamService, UserService,
};

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn Store>,
    pub users: UserService,
    pub onboarding: OnboardingService,
    pub organizations: OrganizationService,
    pub team: TeamService,
    pub dashboard: DashboardService,
}

impl AppState {
    pub fn new(config: AppConfig, store: Arc<dyn Store>, mailer: Arc<dyn Mailer>) -> Self {
        let onboarding = OnboardingService::new(store.clone());
        Self {
            users: UserService::new(store.clone(), config.security.clone()),
            organizations: OrganizationService::new(store.clone(), onboarding.clone()),
            team: TeamService::new(store.clone(), mailer, onboarding.clone(), &config),
            dashboard: DashboardService::new(store.clone()),
            onboarding,
            store,
            config: Arc::new(config),
        }
    }
}

pub fn app(state: AppState) -> Router {
    let protected = Router::new()
        .merge(auth_routes())
        .merge(onboarding_routes())
        .merge(user_routes())
        .merge(organization_routes())
        .merge(team_routes())
        .merge(invitation_routes())
        .route("/api/dashboard", get(protected::dashboard::summary))
        .route_layer(middleware::from_fn_with_state(state.clone(), session_auth_middleware));

    Router::new()
        // Public
        .route("/", get(public::system::root))
        .route("/health", get(public::system::health))
        .route("/auth/register", post(public::auth::register))
        .route("/auth/login", post(public::auth::login))
        // Protected API
        .merge(protected)
        .fallback(not_found)
        // Global middleware
        .layer(cors_layer(&state.config))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn auth_routes() -> Router<AppState> {
    use protected::auth;

    Router::new()
        .route("/api/auth/whoami", get(auth::whoami))
        .route("/api/auth/session", delete(auth::logout))
}

fn onboarding_routes() -> Router<AppState> {
    use protected::onboarding;

    Router::new()
        .route("/api/onboarding/progress", get(onboarding::progress))
        .route("/api/onboarding/steps/:step", post(onboarding::complete_step))
        .route("/api/onboarding/complete", post(onboarding::finish))
        .route("/api/onboarding/reset", post(onboarding::reset))
}

fn user_routes() -> Router<AppState> {
    use protected::user;

    Router::new()
        .route("/api/user/organizations", get(user::organizations))
        .route("/api/user/invitations", get(user::invitations))
}

fn organization_routes() -> Router<AppState> {
    use protected::organizations;

    Router::new()
        .route("/api/organizations", post(organizations::create))
        .route("/api/organizations/:id", get(organizations::get))
}

fn team_routes() -> Router<AppState> {
    use protected::team;

    Router::new()
        .route("/api/team/members", get(team::members))
        .route("/api/team/invitations", get(team::invitations).post(team::invite))
        .route("/api/team/invitations/:id", delete(team::delete_invitation))
}

fn invitation_routes() -> Router<AppState> {
    use protected::invitations;

    Router::new()
        .route("/api/invitations/accept", post(invitations::accept))
        .route("/api/invitations/decline", post(invitations::decline))
}

async fn not_found() -> ApiError {
    ApiError::not_found("Route not found")
}

fn cors_layer(config: &AppConfig) -> CorsLayer {
    if !config.security.enable_cors {
        return CorsLayer::new();
    }

    let origins: Vec<HeaderValue> = config
        .security
        .cors_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin {:?}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true)
}
