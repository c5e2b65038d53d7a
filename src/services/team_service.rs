use chrono::{Duration, Utc};
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::auth::{generate_opaque_token, hash_opaque_token};
use crate::config::AppConfig;
use crate::database::models::{Invitation, Member, Membership, User};
use crate::database::{DatabaseError, Store};
use crate::services::error::{ServiceError, ServiceResult, UNAUTHORIZED_INVITATION_DELETE};
use crate::services::mailer::{Mailer, OutgoingMail};
use crate::services::onboarding_service::OnboardingService;
use crate::services::organization_service::require_membership;
use crate::services::user_service::normalize_email;
use crate::types::{InvitationStatus, OnboardingStep, Role};

#[derive(Clone)]
pub struct TeamService {
    store: Arc<dyn Store>,
    mailer: Arc<dyn Mailer>,
    onboarding: OnboardingService,
    from_email: String,
    base_url: String,
    invitation_expiry_days: i64,
}

fn not_pending(invitation: &Invitation) -> ServiceError {
    match invitation.status {
        InvitationStatus::Accepted => ServiceError::conflict("Invitation has already been accepted"),
        InvitationStatus::Declined => ServiceError::conflict("Invitation has already been declined"),
        InvitationStatus::Pending => ServiceError::conflict("Invitation is no longer pending"),
    }
}

impl TeamService {
    pub fn new(
        store: Arc<dyn Store>,
        mailer: Arc<dyn Mailer>,
        onboarding: OnboardingService,
        config: &AppConfig,
    ) -> Self {
        Self {
            store,
            mailer,
            onboarding,
            from_email: config.mail.from_email.clone(),
            base_url: config.server.base_url.clone(),
            invitation_expiry_days: config.invitations.expiry_days,
        }
    }

    pub async fn members(&self, user_id: Uuid, organization_id: Uuid) -> ServiceResult<Vec<Member>> {
        require_membership(self.store.as_ref(), organization_id, user_id).await?;
        Ok(self.store.list_members(organization_id).await?)
    }

    pub async fn invitations(&self, user_id: Uuid, organization_id: Uuid) -> ServiceResult<Vec<Invitation>> {
        require_membership(self.store.as_ref(), organization_id, user_id).await?;
        let now = Utc::now();
        let mut invitations = self
            .store
            .pending_invitations_for_organization(organization_id)
            .await?;
        invitations.retain(|i| !i.is_expired(now));
        Ok(invitations)
    }

    /// Invite `email` to the organization and mail them the acceptance token
    pub async fn invite(
        &self,
        inviter: &User,
        organization_id: Uuid,
        email: &str,
        role: Role,
    ) -> ServiceResult<Invitation> {
        let (organization, membership) =
            require_membership(self.store.as_ref(), organization_id, inviter.id).await?;
        if !membership.role.can_manage_team() {
            warn!("User {} tried to invite without permission in {}", inviter.id, organization_id);
            return Err(ServiceError::forbidden("Only owners and admins can invite members"));
        }
        if role == Role::Owner {
            return Err(ServiceError::validation("Invitations cannot grant the owner role"));
        }

        let email = normalize_email(email)?;
        if let Some(existing) = self.store.find_user_by_email(&email).await? {
            if self.store.find_membership(organization_id, existing.id).await?.is_some() {
                return Err(ServiceError::conflict(format!(
                    "{} is already a member of this organization",
                    email
                )));
            }
        }
        let now = Utc::now();
        let previous = self
            .store
            .pending_invitations_for_organization(organization_id)
            .await?
            .into_iter()
            .filter(|i| i.email == email);
        for stale in previous {
            if !stale.is_expired(now) {
                return Err(ServiceError::conflict(format!("{} already has a pending invitation", email)));
            }
            // Clear the expired row so the pending-email index accepts the new one
            match self.store.delete_pending_invitation(stale.id).await {
                Ok(()) | Err(DatabaseError::NotFound(_)) => {}
                Err(e) => return Err(e.into()),
            }
            info!("Cleared expired invitation {} before re-inviting {}", stale.id, email);
        }

        let expires_at = Duration::try_days(self.invitation_expiry_days)
            .and_then(|ttl| now.checked_add_signed(ttl))
            .ok_or_else(|| ServiceError::Internal("Invitation expiry is out of range".to_string()))?;
        let token = generate_opaque_token();
        let invitation = self
            .store
            .insert_invitation(&Invitation {
                id: Uuid::new_v4(),
                organization_id,
                inviter_id: inviter.id,
                email: email.clone(),
                role,
                status: InvitationStatus::Pending,
                token_hash: hash_opaque_token(&token),
                created_at: now,
                expires_at,
                responded_at: None,
            })
            .await?;

        let mail = OutgoingMail {
            from: self.from_email.clone(),
            to: email,
            subject: format!("{} invited you to join {} on Bento", inviter.name, organization.name),
            body: format!(
                "{} ({}) invited you to join {} as {}.\n\n\
                 Accept the invitation: {}/invitations/accept?token={}\n\n\
                 This invitation expires on {}.\n",
                inviter.name,
                inviter.email,
                organization.name,
                role.as_str(),
                self.base_url,
                token,
                invitation.expires_at.format("%Y-%m-%d %H:%M UTC"),
            ),
        };
        if let Err(e) = self.mailer.send(mail).await {
            error!("Failed to send invitation {}: {}", invitation.id, e);
            self.store.delete_invitation(invitation.id).await?;
            return Err(ServiceError::Internal("Failed to send invitation email".to_string()));
        }

        info!(
            "User {} invited {} to organization {} as {}",
            inviter.id,
            invitation.email,
            organization_id,
            role.as_str()
        );
        self.onboarding.complete_step(inviter.id, OnboardingStep::InviteTeam).await?;
        Ok(invitation)
    }

    /// Delete an invitation. Allowed for whoever sent it and for the
    /// organization's owners and admins.
    pub async fn revoke_invitation(&self, user_id: Uuid, invitation_id: Uuid) -> ServiceResult<()> {
        let invitation = self
            .store
            .find_invitation(invitation_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Invitation not found"))?;

        let is_inviter = invitation.inviter_id == user_id;
        let is_manager = self
            .store
            .find_membership(invitation.organization_id, user_id)
            .await?
            .map(|m| m.role.can_manage_team())
            .unwrap_or(false);
        if !is_inviter && !is_manager {
            warn!("User {} denied deleting invitation {}", user_id, invitation_id);
            return Err(ServiceError::forbidden(UNAUTHORIZED_INVITATION_DELETE));
        }
        if !invitation.is_pending() {
            return Err(not_pending(&invitation));
        }

        self.store.delete_pending_invitation(invitation_id).await?;
        info!("User {} deleted invitation {}", user_id, invitation_id);
        Ok(())
    }

    /// Checks shared by accept and decline
    async fn invitation_for(&self, user: &User, token: &str) -> ServiceResult<Invitation> {
        let invitation = self
            .store
            .find_invitation_by_token(&hash_opaque_token(token.trim()))
            .await?
            .ok_or_else(|| ServiceError::not_found("Invitation not found"))?;

        if invitation.email != user.email {
            warn!("User {} presented invitation {} addressed to someone else", user.id, invitation.id);
            return Err(ServiceError::forbidden("This invitation was sent to a different email address"));
        }
        if !invitation.is_pending() {
            return Err(not_pending(&invitation));
        }
        if invitation.is_expired(Utc::now()) {
            return Err(ServiceError::Expired("Invitation has expired".to_string()));
        }
        Ok(invitation)
    }

    pub async fn accept_invitation(&self, user: &User, token: &str) -> ServiceResult<Membership> {
        let invitation = self.invitation_for(user, token).await?;
        if self
            .store
            .find_membership(invitation.organization_id, user.id)
            .await?
            .is_some()
        {
            return Err(ServiceError::conflict("You are already a member of this organization"));
        }

        let membership = self
            .store
            .accept_invitation(&invitation, user.id, Utc::now())
            .await?;
        info!(
            "User {} joined organization {} as {}",
            user.id,
            membership.organization_id,
            membership.role.as_str()
        );

        // Joining a team stands in for creating an organization
        self.onboarding.complete_step(user.id, OnboardingStep::Organization).await?;
        Ok(membership)
    }

    pub async fn decline_invitation(&self, user: &User, token: &str) -> ServiceResult<Invitation> {
        let invitation = self.invitation_for(user, token).await?;
        let declined = self.store.decline_invitation(invitation.id, Utc::now()).await?;
        info!("User {} declined invitation {}", user.id, invitation.id);
        Ok(declined)
    }
}
