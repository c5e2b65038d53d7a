use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::database::manager::DatabaseError;
use crate::database::models::{
    Invitation, Member, Membership, NewOrganization, NewUser, Organization, Session, User,
    UserOrganization,
};
use crate::database::store::Store;
use crate::types::{InvitationStatus, OnboardingStatus, OnboardingStep, Role};

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    sessions: HashMap<Uuid, Session>,
    organizations: HashMap<Uuid, Organization>,
    memberships: HashMap<(Uuid, Uuid), Membership>,
    invitations: HashMap<Uuid, Invitation>,
}

impl Tables {
    fn require_user(&self, id: Uuid) -> Result<&User, DatabaseError> {
        self.users
            .get(&id)
            .ok_or_else(|| DatabaseError::NotFound("referenced record does not exist".to_string()))
    }

    fn require_organization(&self, id: Uuid) -> Result<&Organization, DatabaseError> {
        self.organizations
            .get(&id)
            .ok_or_else(|| DatabaseError::NotFound("referenced record does not exist".to_string()))
    }

    fn insert_membership(&mut self, membership: Membership) -> Result<Membership, DatabaseError> {
        self.require_user(membership.user_id)?;
        self.require_organization(membership.organization_id)?;
        let key = (membership.organization_id, membership.user_id);
        if self.memberships.contains_key(&key) {
            return Err(DatabaseError::Conflict(
                "duplicate value violates memberships_pkey".to_string(),
            ));
        }
        self.memberships.insert(key, membership.clone());
        Ok(membership)
    }

    fn pending_sorted<F>(&self, keep: F) -> Vec<Invitation>
    where
        F: Fn(&Invitation) -> bool,
    {
        let mut rows: Vec<Invitation> = self
            .invitations
            .values()
            .filter(|i| i.is_pending() && keep(i))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        rows
    }
}

/// `Store` kept entirely in process memory, enforcing the same unique and
/// foreign-key constraints as the SQL schema.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn health_check(&self) -> Result<(), DatabaseError> {
        Ok(())
    }

    async fn insert_user(&self, user: NewUser) -> Result<User, DatabaseError> {
        let mut tables = self.tables.write().await;
        if tables.users.values().any(|u| u.email == user.email) {
            return Err(DatabaseError::Conflict(
                "duplicate value violates users_email_key".to_string(),
            ));
        }

        let now = Utc::now();
        let created = User {
            id: Uuid::new_v4(),
            email: user.email,
            name: user.name,
            password_hash: user.password_hash,
            onboarding_status: OnboardingStatus::NotStarted,
            onboarding_completed_steps: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        tables.users.insert(created.id, created.clone());
        Ok(created)
    }

    async fn find_user(&self, id: Uuid) -> Result<Option<User>, DatabaseError> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, DatabaseError> {
        let tables = self.tables.read().await;
        Ok(tables.users.values().find(|u| u.email == email).cloned())
    }

    async fn update_onboarding(
        &self,
        user_id: Uuid,
        status: OnboardingStatus,
        completed_steps: &[OnboardingStep],
    ) -> Result<User, DatabaseError> {
        let mut tables = self.tables.write().await;
        let user = tables
            .users
            .get_mut(&user_id)
            .ok_or_else(|| DatabaseError::NotFound(format!("user {}", user_id)))?;
        user.onboarding_status = status;
        user.onboarding_completed_steps = completed_steps.to_vec();
        user.updated_at = Utc::now();
        Ok(user.clone())
    }

    async fn add_onboarding_step(&self, user_id: Uuid, step: OnboardingStep) -> Result<User, DatabaseError> {
        let mut tables = self.tables.write().await;
        let user = tables
            .users
            .get_mut(&user_id)
            .ok_or_else(|| DatabaseError::NotFound(format!("user {}", user_id)))?;
        if !user.onboarding_completed_steps.contains(&step) {
            user.onboarding_completed_steps.push(step);
        }
        let steps = &user.onboarding_completed_steps;
        user.onboarding_status = if OnboardingStep::ALL.iter().all(|s| steps.contains(s)) {
            OnboardingStatus::Completed
        } else {
            OnboardingStatus::InProgress
        };
        user.updated_at = Utc::now();
        Ok(user.clone())
    }

    async fn insert_session(&self, session: &Session) -> Result<(), DatabaseError> {
        let mut tables = self.tables.write().await;
        tables.require_user(session.user_id)?;
        if tables.sessions.contains_key(&session.id) {
            return Err(DatabaseError::Conflict("duplicate value violates sessions_pkey".to_string()));
        }
        tables.sessions.insert(session.id, session.clone());
        Ok(())
    }

    async fn find_session(&self, id: Uuid) -> Result<Option<Session>, DatabaseError> {
        Ok(self.tables.read().await.sessions.get(&id).cloned())
    }

    async fn revoke_session(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), DatabaseError> {
        let mut tables = self.tables.write().await;
        let session = tables
            .sessions
            .get_mut(&id)
            .ok_or_else(|| DatabaseError::NotFound(format!("session {}", id)))?;
        session.revoked_at.get_or_insert(at);
        Ok(())
    }

    async fn create_organization(&self, organization: NewOrganization) -> Result<Organization, DatabaseError> {
        let mut tables = self.tables.write().await;
        tables.require_user(organization.created_by)?;
        if tables.organizations.values().any(|o| o.slug == organization.slug) {
            return Err(DatabaseError::Conflict(
                "duplicate value violates organizations_slug_key".to_string(),
            ));
        }

        let now = Utc::now();
        let created = Organization {
            id: Uuid::new_v4(),
            name: organization.name,
            slug: organization.slug,
            created_by: organization.created_by,
            created_at: now,
            updated_at: now,
        };
        tables.organizations.insert(created.id, created.clone());
        tables.insert_membership(Membership {
            organization_id: created.id,
            user_id: created.created_by,
            role: Role::Owner,
            joined_at: now,
        })?;
        Ok(created)
    }

    async fn find_organization(&self, id: Uuid) -> Result<Option<Organization>, DatabaseError> {
        Ok(self.tables.read().await.organizations.get(&id).cloned())
    }

    async fn slug_exists(&self, slug: &str) -> Result<bool, DatabaseError> {
        let tables = self.tables.read().await;
        Ok(tables.organizations.values().any(|o| o.slug == slug))
    }

    async fn organizations_for_user(&self, user_id: Uuid) -> Result<Vec<UserOrganization>, DatabaseError> {
        let tables = self.tables.read().await;
        let mut rows: Vec<UserOrganization> = tables
            .memberships
            .values()
            .filter(|m| m.user_id == user_id)
            .filter_map(|m| {
                tables.organizations.get(&m.organization_id).map(|o| UserOrganization {
                    id: o.id,
                    name: o.name.clone(),
                    slug: o.slug.clone(),
                    role: m.role,
                    joined_at: m.joined_at,
                })
            })
            .collect();
        rows.sort_by(|a, b| a.joined_at.cmp(&b.joined_at).then_with(|| a.name.cmp(&b.name)));
        Ok(rows)
    }

    async fn find_membership(
        &self,
        organization_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Membership>, DatabaseError> {
        let tables = self.tables.read().await;
        Ok(tables.memberships.get(&(organization_id, user_id)).cloned())
    }

    async fn list_members(&self, organization_id: Uuid) -> Result<Vec<Member>, DatabaseError> {
        let tables = self.tables.read().await;
        let mut rows: Vec<Member> = tables
            .memberships
            .values()
            .filter(|m| m.organization_id == organization_id)
            .filter_map(|m| {
                tables.users.get(&m.user_id).map(|u| Member {
                    user_id: u.id,
                    email: u.email.clone(),
                    name: u.name.clone(),
                    role: m.role,
                    joined_at: m.joined_at,
                })
            })
            .collect();
        rows.sort_by(|a, b| a.joined_at.cmp(&b.joined_at).then_with(|| a.email.cmp(&b.email)));
        Ok(rows)
    }

    async fn count_members(&self, organization_id: Uuid) -> Result<i64, DatabaseError> {
        let tables = self.tables.read().await;
        let count = tables
            .memberships
            .values()
            .filter(|m| m.organization_id == organization_id)
            .count();
        Ok(count as i64)
    }

    async fn insert_invitation(&self, invitation: &Invitation) -> Result<Invitation, DatabaseError> {
        let mut tables = self.tables.write().await;
        tables.require_organization(invitation.organization_id)?;
        tables.require_user(invitation.inviter_id)?;
        if tables.invitations.values().any(|i| i.token_hash == invitation.token_hash) {
            return Err(DatabaseError::Conflict(
                "duplicate value violates invitations_token_hash_key".to_string(),
            ));
        }
        let duplicate_pending = invitation.is_pending()
            && tables.invitations.values().any(|i| {
                i.is_pending()
                    && i.organization_id == invitation.organization_id
                    && i.email == invitation.email
            });
        if duplicate_pending {
            return Err(DatabaseError::Conflict(
                "duplicate value violates invitations_pending_email_idx".to_string(),
            ));
        }
        tables.invitations.insert(invitation.id, invitation.clone());
        Ok(invitation.clone())
    }

    async fn find_invitation(&self, id: Uuid) -> Result<Option<Invitation>, DatabaseError> {
        Ok(self.tables.read().await.invitations.get(&id).cloned())
    }

    async fn find_invitation_by_token(&self, token_hash: &str) -> Result<Option<Invitation>, DatabaseError> {
        let tables = self.tables.read().await;
        Ok(tables
            .invitations
            .values()
            .find(|i| i.token_hash == token_hash)
            .cloned())
    }

    async fn pending_invitations_for_organization(
        &self,
        organization_id: Uuid,
    ) -> Result<Vec<Invitation>, DatabaseError> {
        let tables = self.tables.read().await;
        Ok(tables.pending_sorted(|i| i.organization_id == organization_id))
    }

    async fn pending_invitations_for_email(&self, email: &str) -> Result<Vec<Invitation>, DatabaseError> {
        let tables = self.tables.read().await;
        Ok(tables.pending_sorted(|i| i.email == email))
    }

    async fn delete_invitation(&self, id: Uuid) -> Result<(), DatabaseError> {
        let mut tables = self.tables.write().await;
        tables
            .invitations
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| DatabaseError::NotFound(format!("invitation {}", id)))
    }

    async fn delete_pending_invitation(&self, id: Uuid) -> Result<(), DatabaseError> {
        let mut tables = self.tables.write().await;
        match tables.invitations.get(&id) {
            Some(stored) if stored.is_pending() => {
                tables.invitations.remove(&id);
                Ok(())
            }
            Some(_) => Err(DatabaseError::Conflict("invitation is no longer pending".to_string())),
            None => Err(DatabaseError::NotFound(format!("invitation {}", id))),
        }
    }

    async fn accept_invitation(
        &self,
        invitation: &Invitation,
        user_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<Membership, DatabaseError> {
        let mut tables = self.tables.write().await;
        let still_pending = tables
            .invitations
            .get(&invitation.id)
            .map(|i| i.is_pending())
            .unwrap_or(false);
        if !still_pending {
            return Err(DatabaseError::Conflict("invitation is no longer pending".to_string()));
        }

        // Membership first so a constraint failure leaves the invitation untouched
        let membership = tables.insert_membership(Membership {
            organization_id: invitation.organization_id,
            user_id,
            role: invitation.role,
            joined_at: at,
        })?;

        if let Some(stored) = tables.invitations.get_mut(&invitation.id) {
            stored.status = InvitationStatus::Accepted;
            stored.responded_at = Some(at);
        }
        Ok(membership)
    }

    async fn decline_invitation(&self, id: Uuid, at: DateTime<Utc>) -> Result<Invitation, DatabaseError> {
        let mut tables = self.tables.write().await;
        match tables.invitations.get_mut(&id) {
            Some(stored) if stored.is_pending() => {
                stored.status = InvitationStatus::Declined;
                stored.responded_at = Some(at);
                Ok(stored.clone())
            }
            _ => Err(DatabaseError::Conflict("invitation is no longer pending".to_string())),
        }
    }
}
