use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::database::manager::{DatabaseError, DatabaseManager};
use crate::database::models::{
    Invitation, Member, Membership, NewOrganization, NewUser, Organization, Session, User,
    UserOrganization,
};
use crate::database::store::Store;
use crate::types::{InvitationStatus, OnboardingStatus, OnboardingStep, Role};

const USER_COLUMNS: &str = "id, email, name, password_hash, onboarding_status, \
     onboarding_completed_steps, created_at, updated_at";

const INVITATION_COLUMNS: &str = "id, organization_id, inviter_id, email, role, status, \
     token_hash, created_at, expires_at, responded_at";

/// `Store` backed by the shared Postgres pool
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Store for PgStore {
    fn backend(&self) -> &'static str {
        "postgres"
    }

    async fn health_check(&self) -> Result<(), DatabaseError> {
        DatabaseManager::health_check(&self.pool).await
    }

    async fn insert_user(&self, user: NewUser) -> Result<User, DatabaseError> {
        let query = format!(
            "INSERT INTO users (id, email, name, password_hash, onboarding_status, onboarding_completed_steps)
             VALUES ($1, $2, $3, $4, $5, '{{}}')
             RETURNING {}",
            USER_COLUMNS
        );
        let row = sqlx::query_as::<_, User>(&query)
            .bind(Uuid::new_v4())
            .bind(&user.email)
            .bind(&user.name)
            .bind(&user.password_hash)
            .bind(OnboardingStatus::NotStarted.as_str())
            .fetch_one(&self.pool)
            .await?;
        Ok(row)
    }

    async fn find_user(&self, id: Uuid) -> Result<Option<User>, DatabaseError> {
        let query = format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS);
        let user = sqlx::query_as::<_, User>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, DatabaseError> {
        let query = format!("SELECT {} FROM users WHERE email = $1", USER_COLUMNS);
        let user = sqlx::query_as::<_, User>(&query)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn update_onboarding(
        &self,
        user_id: Uuid,
        status: OnboardingStatus,
        completed_steps: &[OnboardingStep],
    ) -> Result<User, DatabaseError> {
        let steps: Vec<String> = completed_steps.iter().map(|s| s.as_str().to_string()).collect();
        let query = format!(
            "UPDATE users
             SET onboarding_status = $2, onboarding_completed_steps = $3, updated_at = now()
             WHERE id = $1
             RETURNING {}",
            USER_COLUMNS
        );
        let user = sqlx::query_as::<_, User>(&query)
            .bind(user_id)
            .bind(status.as_str())
            .bind(&steps)
            .fetch_optional(&self.pool)
            .await?;
        user.ok_or_else(|| DatabaseError::NotFound(format!("user {}", user_id)))
    }

    async fn add_onboarding_step(&self, user_id: Uuid, step: OnboardingStep) -> Result<User, DatabaseError> {
        // Both SET expressions see the row as it was before the update
        let all_steps: Vec<String> = OnboardingStep::ALL.iter().map(|s| s.as_str().to_string()).collect();
        let query = format!(
            "UPDATE users
             SET onboarding_completed_steps = CASE
                     WHEN $2 = ANY(onboarding_completed_steps) THEN onboarding_completed_steps
                     ELSE array_append(onboarding_completed_steps, $2)
                 END,
                 onboarding_status = CASE
                     WHEN array_append(onboarding_completed_steps, $2) @> $3 THEN $4
                     ELSE $5
                 END,
                 updated_at = now()
             WHERE id = $1
             RETURNING {}",
            USER_COLUMNS
        );
        let user = sqlx::query_as::<_, User>(&query)
            .bind(user_id)
            .bind(step.as_str())
            .bind(&all_steps)
            .bind(OnboardingStatus::Completed.as_str())
            .bind(OnboardingStatus::InProgress.as_str())
            .fetch_optional(&self.pool)
            .await?;
        user.ok_or_else(|| DatabaseError::NotFound(format!("user {}", user_id)))
    }

    async fn insert_session(&self, session: &Session) -> Result<(), DatabaseError> {
        sqlx::query(
            "INSERT INTO sessions (id, user_id, created_at, expires_at, revoked_at)
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(session.id)
        .bind(session.user_id)
        .bind(session.created_at)
        .bind(session.expires_at)
        .bind(session.revoked_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_session(&self, id: Uuid) -> Result<Option<Session>, DatabaseError> {
        let session = sqlx::query_as::<_, Session>(
            "SELECT id, user_id, created_at, expires_at, revoked_at FROM sessions WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(session)
    }

    async fn revoke_session(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), DatabaseError> {
        let result = sqlx::query(
            "UPDATE sessions SET revoked_at = COALESCE(revoked_at, $2) WHERE id = $1",
        )
        .bind(id)
        .bind(at)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound(format!("session {}", id)));
        }
        Ok(())
    }

    async fn create_organization(&self, organization: NewOrganization) -> Result<Organization, DatabaseError> {
        let mut tx = self.pool.begin().await?;

        let created = sqlx::query_as::<_, Organization>(
            "INSERT INTO organizations (id, name, slug, created_by)
             VALUES ($1, $2, $3, $4)
             RETURNING id, name, slug, created_by, created_at, updated_at",
        )
        .bind(Uuid::new_v4())
        .bind(&organization.name)
        .bind(&organization.slug)
        .bind(organization.created_by)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            "INSERT INTO memberships (organization_id, user_id, role, joined_at)
             VALUES ($1, $2, $3, $4)",
        )
        .bind(created.id)
        .bind(created.created_by)
        .bind(Role::Owner.as_str())
        .bind(created.created_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(created)
    }

    async fn find_organization(&self, id: Uuid) -> Result<Option<Organization>, DatabaseError> {
        let organization = sqlx::query_as::<_, Organization>(
            "SELECT id, name, slug, created_by, created_at, updated_at FROM organizations WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(organization)
    }

    async fn slug_exists(&self, slug: &str) -> Result<bool, DatabaseError> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM organizations WHERE slug = $1")
            .bind(slug)
            .fetch_one(&self.pool)
            .await?;
        Ok(count.0 > 0)
    }

    async fn organizations_for_user(&self, user_id: Uuid) -> Result<Vec<UserOrganization>, DatabaseError> {
        let rows = sqlx::query_as::<_, UserOrganization>(
            "SELECT o.id, o.name, o.slug, m.role, m.joined_at
             FROM memberships m
             JOIN organizations o ON o.id = m.organization_id
             WHERE m.user_id = $1
             ORDER BY m.joined_at, o.name",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn find_membership(
        &self,
        organization_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Membership>, DatabaseError> {
        let membership = sqlx::query_as::<_, Membership>(
            "SELECT organization_id, user_id, role, joined_at
             FROM memberships
             WHERE organization_id = $1 AND user_id = $2",
        )
        .bind(organization_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(membership)
    }

    async fn list_members(&self, organization_id: Uuid) -> Result<Vec<Member>, DatabaseError> {
        let rows = sqlx::query_as::<_, Member>(
            "SELECT u.id AS user_id, u.email, u.name, m.role, m.joined_at
             FROM memberships m
             JOIN users u ON u.id = m.user_id
             WHERE m.organization_id = $1
             ORDER BY m.joined_at, u.email",
        )
        .bind(organization_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn count_members(&self, organization_id: Uuid) -> Result<i64, DatabaseError> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM memberships WHERE organization_id = $1")
            .bind(organization_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count.0)
    }

    async fn insert_invitation(&self, invitation: &Invitation) -> Result<Invitation, DatabaseError> {
        let query = format!(
            "INSERT INTO invitations
                 (id, organization_id, inviter_id, email, role, status, token_hash, created_at, expires_at, responded_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
             RETURNING {}",
            INVITATION_COLUMNS
        );
        let row = sqlx::query_as::<_, Invitation>(&query)
            .bind(invitation.id)
            .bind(invitation.organization_id)
            .bind(invitation.inviter_id)
            .bind(&invitation.email)
            .bind(invitation.role.as_str())
            .bind(invitation.status.as_str())
            .bind(&invitation.token_hash)
            .bind(invitation.created_at)
            .bind(invitation.expires_at)
            .bind(invitation.responded_at)
            .fetch_one(&self.pool)
            .await?;
        Ok(row)
    }

    async fn find_invitation(&self, id: Uuid) -> Result<Option<Invitation>, DatabaseError> {
        let query = format!("SELECT {} FROM invitations WHERE id = $1", INVITATION_COLUMNS);
        let invitation = sqlx::query_as::<_, Invitation>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(invitation)
    }

    async fn find_invitation_by_token(&self, token_hash: &str) -> Result<Option<Invitation>, DatabaseError> {
        let query = format!("SELECT {} FROM invitations WHERE token_hash = $1", INVITATION_COLUMNS);
        let invitation = sqlx::query_as::<_, Invitation>(&query)
            .bind(token_hash)
            .fetch_optional(&self.pool)
            .await?;
        Ok(invitation)
    }

    async fn pending_invitations_for_organization(
        &self,
        organization_id: Uuid,
    ) -> Result<Vec<Invitation>, DatabaseError> {
        let query = format!(
            "SELECT {} FROM invitations
             WHERE organization_id = $1 AND status = $2
             ORDER BY created_at DESC",
            INVITATION_COLUMNS
        );
        let rows = sqlx::query_as::<_, Invitation>(&query)
            .bind(organization_id)
            .bind(InvitationStatus::Pending.as_str())
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn pending_invitations_for_email(&self, email: &str) -> Result<Vec<Invitation>, DatabaseError> {
        let query = format!(
            "SELECT {} FROM invitations
             WHERE email = $1 AND status = $2
             ORDER BY created_at DESC",
            INVITATION_COLUMNS
        );
        let rows = sqlx::query_as::<_, Invitation>(&query)
            .bind(email)
            .bind(InvitationStatus::Pending.as_str())
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn delete_invitation(&self, id: Uuid) -> Result<(), DatabaseError> {
        let result = sqlx::query("DELETE FROM invitations WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound(format!("invitation {}", id)));
        }
        Ok(())
    }

    async fn delete_pending_invitation(&self, id: Uuid) -> Result<(), DatabaseError> {
        let result = sqlx::query("DELETE FROM invitations WHERE id = $1 AND status = $2")
            .bind(id)
            .bind(InvitationStatus::Pending.as_str())
            .execute(&self.pool)
            .await?;
        if result.rows_affected() > 0 {
            return Ok(());
        }

        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM invitations WHERE id = $1)")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        if exists {
            Err(DatabaseError::Conflict("invitation is no longer pending".to_string()))
        } else {
            Err(DatabaseError::NotFound(format!("invitation {}", id)))
        }
    }

    async fn accept_invitation(
        &self,
        invitation: &Invitation,
        user_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<Membership, DatabaseError> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            "UPDATE invitations SET status = $2, responded_at = $3
             WHERE id = $1 AND status = $4",
        )
        .bind(invitation.id)
        .bind(InvitationStatus::Accepted.as_str())
        .bind(at)
        .bind(InvitationStatus::Pending.as_str())
        .execute(&mut *tx)
        .await?;

        // Dropping the transaction rolls it back
        if updated.rows_affected() == 0 {
            return Err(DatabaseError::Conflict("invitation is no longer pending".to_string()));
        }

        let membership = sqlx::query_as::<_, Membership>(
            "INSERT INTO memberships (organization_id, user_id, role, joined_at)
             VALUES ($1, $2, $3, $4)
             RETURNING organization_id, user_id, role, joined_at",
        )
        .bind(invitation.organization_id)
        .bind(user_id)
        .bind(invitation.role.as_str())
        .bind(at)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(membership)
    }

    async fn decline_invitation(&self, id: Uuid, at: DateTime<Utc>) -> Result<Invitation, DatabaseError> {
        let query = format!(
            "UPDATE invitations SET status = $2, responded_at = $3
             WHERE id = $1 AND status = $4
             RETURNING {}",
            INVITATION_COLUMNS
        );
        let invitation = sqlx::query_as::<_, Invitation>(&query)
            .bind(id)
            .bind(InvitationStatus::Declined.as_str())
            .bind(at)
            .bind(InvitationStatus::Pending.as_str())
            .fetch_optional(&self.pool)
            .await?;
        invitation.ok_or_else(|| DatabaseError::Conflict("invitation is no longer pending".to_string()))
    }
}
