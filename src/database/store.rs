use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::database::manager::DatabaseError;
use crate::database::models::{
    Invitation, Member, Membership, NewOrganization, NewUser, Organization, Session, User,
    UserOrganization,
};
use crate::types::{OnboardingStatus, OnboardingStep};

/// Persistence operations the services rely on.
///
/// Implementations must report uniqueness violations as
/// `DatabaseError::Conflict` and missing rows on mutation as
/// `DatabaseError::NotFound`, so services behave the same on every backend.
#[async_trait]
pub trait Store: Send + Sync {
    /// Short backend name reported by the health endpoint
    fn backend(&self) -> &'static str;

    async fn health_check(&self) -> Result<(), DatabaseError>;

    // Users

    async fn insert_user(&self, user: NewUser) -> Result<User, DatabaseError>;

    async fn find_user(&self, id: Uuid) -> Result<Option<User>, DatabaseError>;

    /// Lookup by normalized (lowercase) email
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, DatabaseError>;

    async fn update_onboarding(
        &self,
        user_id: Uuid,
        status: OnboardingStatus,
        completed_steps: &[OnboardingStep],
    ) -> Result<User, DatabaseError>;

    /// Append `step` to the user's completed steps and recompute the status
    /// in one write. Already completed steps are left as they are.
    async fn add_onboarding_step(&self, user_id: Uuid, step: OnboardingStep) -> Result<User, DatabaseError>;

    // Sessions

    async fn insert_session(&self, session: &Session) -> Result<(), DatabaseError>;

    async fn find_session(&self, id: Uuid) -> Result<Option<Session>, DatabaseError>;

    async fn revoke_session(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), DatabaseError>;

    // Organizations and membership

    /// Insert the organization and its creator's `owner` membership atomically
    async fn create_organization(&self, organization: NewOrganization) -> Result<Organization, DatabaseError>;

    async fn find_organization(&self, id: Uuid) -> Result<Option<Organization>, DatabaseError>;

    async fn slug_exists(&self, slug: &str) -> Result<bool, DatabaseError>;

    async fn organizations_for_user(&self, user_id: Uuid) -> Result<Vec<UserOrganization>, DatabaseError>;

    async fn find_membership(
        &self,
        organization_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Membership>, DatabaseError>;

    async fn list_members(&self, organization_id: Uuid) -> Result<Vec<Member>, DatabaseError>;

    async fn count_members(&self, organization_id: Uuid) -> Result<i64, DatabaseError>;

    // Invitations

    async fn insert_invitation(&self, invitation: &Invitation) -> Result<Invitation, DatabaseError>;

    async fn find_invitation(&self, id: Uuid) -> Result<Option<Invitation>, DatabaseError>;

    async fn find_invitation_by_token(&self, token_hash: &str) -> Result<Option<Invitation>, DatabaseError>;

    /// Pending invitations of an organization, newest first
    async fn pending_invitations_for_organization(
        &self,
        organization_id: Uuid,
    ) -> Result<Vec<Invitation>, DatabaseError>;

    /// Pending invitations addressed to `email`, newest first
    async fn pending_invitations_for_email(&self, email: &str) -> Result<Vec<Invitation>, DatabaseError>;

    async fn delete_invitation(&self, id: Uuid) -> Result<(), DatabaseError>;

    /// Delete the invitation only while it is still pending.
    /// Fails with `Conflict` when it was accepted or declined in the meantime.
    async fn delete_pending_invitation(&self, id: Uuid) -> Result<(), DatabaseError>;

    /// Mark a pending invitation accepted and add the membership it grants.
    /// Fails with `Conflict` when the invitation is no longer pending.
    async fn accept_invitation(
        &self,
        invitation: &Invitation,
        user_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<Membership, DatabaseError>;

    /// Fails with `Conflict` when the invitation is no longer pending.
    async fn decline_invitation(&self, id: Uuid, at: DateTime<Utc>) -> Result<Invitation, DatabaseError>;
}
