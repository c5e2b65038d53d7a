use serde::Serialize;
use std::sync::Arc;

use crate::database::models::{User, UserOrganization};
use crate::database::Store;
use crate::services::error::ServiceResult;
use crate::services::onboarding_service::OnboardingProgress;

#[derive(Debug, Clone, Serialize)]
pub struct DashboardOrganization {
    #[serde(flatten)]
    pub organization: UserOrganization,
    pub member_count: i64,
}

/// Everything the landing page needs in one call
#[derive(Debug, Clone, Serialize)]
pub struct DashboardSummary {
    pub user: User,
    pub onboarding: OnboardingProgress,
    pub organizations: Vec<DashboardOrganization>,
    pub pending_invitations: usize,
}

#[derive(Clone)]
pub struct DashboardService {
    store: Arc<dyn Store>,
}

impl DashboardService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn summary(&self, user: &User) -> ServiceResult<DashboardSummary> {
        let mut organizations = Vec::new();
        for organization in self.store.organizations_for_user(user.id).await? {
            let member_count = self.store.count_members(organization.id).await?;
            organizations.push(DashboardOrganization { organization, member_count });
        }

        let now = chrono::Utc::now();
        let pending_invitations = self
            .store
            .pending_invitations_for_email(&user.email)
            .await?
            .iter()
            .filter(|i| !i.is_expired(now))
            .count();

        Ok(DashboardSummary {
            user: user.clone(),
            onboarding: OnboardingProgress::from_user(user),
            organizations,
            pending_invitations,
        })
    }
}
