use serde::Serialize;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::database::models::User;
use crate::database::Store;
use crate::services::error::{ServiceError, ServiceResult};
use crate::types::{OnboardingStatus, OnboardingStep};

/// Snapshot of where a user is in the onboarding flow
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OnboardingProgress {
    pub status: OnboardingStatus,
    /// First step not completed yet; `None` once everything is done
    pub current_step: Option<OnboardingStep>,
    pub completed_steps: Vec<OnboardingStep>,
    pub total_steps: usize,
    pub percent_complete: u8,
}

impl OnboardingProgress {
    pub fn from_user(user: &User) -> Self {
        let completed_steps = ordered_steps(&user.onboarding_completed_steps);
        let total_steps = OnboardingStep::ALL.len();
        let current_step = OnboardingStep::ALL
            .iter()
            .copied()
            .find(|step| !completed_steps.contains(step));
        let percent_complete = (completed_steps.len() * 100 / total_steps) as u8;

        Self {
            status: user.onboarding_status,
            current_step,
            completed_steps,
            total_steps,
            percent_complete,
        }
    }
}

/// Dedupe and put steps into flow order
fn ordered_steps(steps: &[OnboardingStep]) -> Vec<OnboardingStep> {
    OnboardingStep::ALL
        .iter()
        .copied()
        .filter(|step| steps.contains(step))
        .collect()
}

#[derive(Clone)]
pub struct OnboardingService {
    store: Arc<dyn Store>,
}

impl OnboardingService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    async fn load_user(&self, user_id: Uuid) -> ServiceResult<User> {
        self.store
            .find_user(user_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("User not found"))
    }

    pub async fn progress(&self, user_id: Uuid) -> ServiceResult<OnboardingProgress> {
        let user = self.load_user(user_id).await?;
        Ok(OnboardingProgress::from_user(&user))
    }

    /// Record `step` as done. Completing a step twice is a no-op.
    pub async fn complete_step(&self, user_id: Uuid, step: OnboardingStep) -> ServiceResult<OnboardingProgress> {
        let user = self.load_user(user_id).await?;
        if user.onboarding_completed_steps.contains(&step) {
            return Ok(OnboardingProgress::from_user(&user));
        }

        let updated = self.store.add_onboarding_step(user_id, step).await?;
        if updated.onboarding_status == OnboardingStatus::Completed
            && user.onboarding_status != OnboardingStatus::Completed
        {
            info!("User {} completed onboarding", user_id);
        }
        Ok(OnboardingProgress::from_user(&updated))
    }

    pub async fn finish(&self, user_id: Uuid) -> ServiceResult<OnboardingProgress> {
        self.load_user(user_id).await?;
        let updated = self
            .store
            .update_onboarding(user_id, OnboardingStatus::Completed, &OnboardingStep::ALL)
            .await?;
        info!("User {} finished onboarding", user_id);
        Ok(OnboardingProgress::from_user(&updated))
    }

    pub async fn reset(&self, user_id: Uuid) -> ServiceResult<OnboardingProgress> {
        self.load_user(user_id).await?;
        let updated = self
            .store
            .update_onboarding(user_id, OnboardingStatus::NotStarted, &[])
            .await?;
        Ok(OnboardingProgress::from_user(&updated))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};

    use crate::database::models::{
        Invitation, Member, Membership, NewOrganization, NewUser, Organization, Session,
        UserOrganization,
    };
    use crate::database::{DatabaseError, MemoryStore};

    /// Hands control back to the scheduler after every user read, so two
    /// requests for the same user interleave between read and write.
    struct YieldingStore(MemoryStore);

    #[async_trait]
    impl Store for YieldingStore {
        fn backend(&self) -> &'static str {
            self.0.backend()
        }
        async fn health_check(&self) -> Result<(), DatabaseError> {
            self.0.health_check().await
        }
        async fn insert_user(&self, user: NewUser) -> Result<User, DatabaseError> {
            self.0.insert_user(user).await
        }
        async fn find_user(&self, id: Uuid) -> Result<Option<User>, DatabaseError> {
            let user = self.0.find_user(id).await;
            tokio::task::yield_now().await;
            user
        }
        async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, DatabaseError> {
            self.0.find_user_by_email(email).await
        }
        async fn update_onboarding(
            &self,
            user_id: Uuid,
            status: OnboardingStatus,
            completed_steps: &[OnboardingStep],
        ) -> Result<User, DatabaseError> {
            self.0.update_onboarding(user_id, status, completed_steps).await
        }
        async fn add_onboarding_step(&self, user_id: Uuid, step: OnboardingStep) -> Result<User, DatabaseError> {
            self.0.add_onboarding_step(user_id, step).await
        }
        async fn insert_session(&self, session: &Session) -> Result<(), DatabaseError> {
            self.0.insert_session(session).await
        }
        async fn find_session(&self, id: Uuid) -> Result<Option<Session>, DatabaseError> {
            self.0.find_session(id).await
        }
        async fn revoke_session(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), DatabaseError> {
            self.0.revoke_session(id, at).await
        }
        async fn create_organization(&self, organization: NewOrganization) -> Result<Organization, DatabaseError> {
            self.0.create_organization(organization).await
        }
        async fn find_organization(&self, id: Uuid) -> Result<Option<Organization>, DatabaseError> {
            self.0.find_organization(id).await
        }
        async fn slug_exists(&self, slug: &str) -> Result<bool, DatabaseError> {
            self.0.slug_exists(slug).await
        }
        async fn organizations_for_user(&self, user_id: Uuid) -> Result<Vec<UserOrganization>, DatabaseError> {
            self.0.organizations_for_user(user_id).await
        }
        async fn find_membership(
            &self,
            organization_id: Uuid,
            user_id: Uuid,
        ) -> Result<Option<Membership>, DatabaseError> {
            self.0.find_membership(organization_id, user_id).await
        }
        async fn list_members(&self, organization_id: Uuid) -> Result<Vec<Member>, DatabaseError> {
            self.0.list_members(organization_id).await
        }
        async fn count_members(&self, organization_id: Uuid) -> Result<i64, DatabaseError> {
            self.0.count_members(organization_id).await
        }
        async fn insert_invitation(&self, invitation: &Invitation) -> Result<Invitation, DatabaseError> {
            self.0.insert_invitation(invitation).await
        }
        async fn find_invitation(&self, id: Uuid) -> Result<Option<Invitation>, DatabaseError> {
            self.0.find_invitation(id).await
        }
        async fn find_invitation_by_token(&self, token_hash: &str) -> Result<Option<Invitation>, DatabaseError> {
            self.0.find_invitation_by_token(token_hash).await
        }
        async fn pending_invitations_for_organization(
            &self,
            organization_id: Uuid,
        ) -> Result<Vec<Invitation>, DatabaseError> {
            self.0.pending_invitations_for_organization(organization_id).await
        }
        async fn pending_invitations_for_email(&self, email: &str) -> Result<Vec<Invitation>, DatabaseError> {
            self.0.pending_invitations_for_email(email).await
        }
        async fn delete_invitation(&self, id: Uuid) -> Result<(), DatabaseError> {
            self.0.delete_invitation(id).await
        }
        async fn delete_pending_invitation(&self, id: Uuid) -> Result<(), DatabaseError> {
            self.0.delete_pending_invitation(id).await
        }
        async fn accept_invitation(
            &self,
            invitation: &Invitation,
            user_id: Uuid,
            at: DateTime<Utc>,
        ) -> Result<Membership, DatabaseError> {
            self.0.accept_invitation(invitation, user_id, at).await
        }
        async fn decline_invitation(&self, id: Uuid, at: DateTime<Utc>) -> Result<Invitation, DatabaseError> {
            self.0.decline_invitation(id, at).await
        }
    }

    async fn service_with_user() -> (OnboardingService, Uuid) {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let user = store
            .insert_user(NewUser {
                email: "new@example.com".to_string(),
                name: "New".to_string(),
                password_hash: "hash".to_string(),
            })
            .await
            .unwrap();
        (OnboardingService::new(store), user.id)
    }

    #[tokio::test]
    async fn fresh_users_start_at_the_first_step() {
        let (service, user_id) = service_with_user().await;
        let progress = service.progress(user_id).await.unwrap();
        assert_eq!(progress.status, OnboardingStatus::NotStarted);
        assert_eq!(progress.current_step, Some(OnboardingStep::Profile));
        assert_eq!(progress.percent_complete, 0);
        assert_eq!(progress.total_steps, 3);
    }

    #[tokio::test]
    async fn steps_complete_out_of_order_and_idempotently() {
        let (service, user_id) = service_with_user().await;

        let progress = service.complete_step(user_id, OnboardingStep::Organization).await.unwrap();
        assert_eq!(progress.status, OnboardingStatus::InProgress);
        assert_eq!(progress.current_step, Some(OnboardingStep::Profile));
        assert_eq!(progress.percent_complete, 33);

        let again = service.complete_step(user_id, OnboardingStep::Organization).await.unwrap();
        assert_eq!(again, progress);

        service.complete_step(user_id, OnboardingStep::Profile).await.unwrap();
        let done = service.complete_step(user_id, OnboardingStep::InviteTeam).await.unwrap();
        assert_eq!(done.status, OnboardingStatus::Completed);
        assert_eq!(done.current_step, None);
        assert_eq!(done.percent_complete, 100);
        assert_eq!(done.completed_steps, OnboardingStep::ALL.to_vec());
    }

    #[tokio::test]
    async fn concurrent_steps_are_both_recorded() {
        let store = Arc::new(YieldingStore(MemoryStore::new()));
        let user = store
            .insert_user(NewUser {
                email: "racer@example.com".to_string(),
                name: "Racer".to_string(),
                password_hash: "hash".to_string(),
            })
            .await
            .unwrap();
        let service = OnboardingService::new(store);

        let (profile, organization) = tokio::join!(
            service.complete_step(user.id, OnboardingStep::Profile),
            service.complete_step(user.id, OnboardingStep::Organization),
        );
        profile.unwrap();
        organization.unwrap();

        let progress = service.progress(user.id).await.unwrap();
        assert_eq!(
            progress.completed_steps,
            vec![OnboardingStep::Profile, OnboardingStep::Organization]
        );
        assert_eq!(progress.status, OnboardingStatus::InProgress);
    }

    #[tokio::test]
    async fn finish_and_reset() {
        let (service, user_id) = service_with_user().await;
        let finished = service.finish(user_id).await.unwrap();
        assert_eq!(finished.status, OnboardingStatus::Completed);

        let reset = service.reset(user_id).await.unwrap();
        assert_eq!(reset.status, OnboardingStatus::NotStarted);
        assert!(reset.completed_steps.is_empty());
    }

    #[tokio::test]
    async fn unknown_user_is_not_found() {
        let (service, _) = service_with_user().await;
        assert!(matches!(
            service.progress(Uuid::new_v4()).await,
            Err(ServiceError::NotFound(_))
        ));
    }
}
