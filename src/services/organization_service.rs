use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::database::models::{Membership, NewOrganization, Organization, UserOrganization};
use crate::database::Store;
use crate::services::error::{ServiceError, ServiceResult};
use crate::services::onboarding_service::OnboardingService;
use crate::types::{OnboardingStep, Role};

const MIN_NAME_LENGTH: usize = 2;
const MAX_NAME_LENGTH: usize = 100;
const MAX_SLUG_SUFFIX: u32 = 100;

#[derive(Debug, Clone, Serialize)]
pub struct OrganizationDetails {
    #[serde(flatten)]
    pub organization: Organization,
    pub role: Role,
    pub member_count: i64,
}

/// Lowercase ASCII alphanumeric runs joined by single dashes
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    if slug.is_empty() {
        slug.push_str("org");
    }
    slug
}

/// Membership of `user_id` in an existing organization.
/// `NotFound` when the organization does not exist, `Forbidden` for non-members.
pub(crate) async fn require_membership(
    store: &dyn Store,
    organization_id: Uuid,
    user_id: Uuid,
) -> ServiceResult<(Organization, Membership)> {
    let organization = store
        .find_organization(organization_id)
        .await?
        .ok_or_else(|| ServiceError::not_found("Organization not found"))?;

    match store.find_membership(organization_id, user_id).await? {
        Some(membership) => Ok((organization, membership)),
        None => {
            warn!("User {} is not a member of organization {}", user_id, organization_id);
            Err(ServiceError::forbidden("You are not a member of this organization"))
        }
    }
}

#[derive(Clone)]
pub struct OrganizationService {
    store: Arc<dyn Store>,
    onboarding: OnboardingService,
}

impl OrganizationService {
    pub fn new(store: Arc<dyn Store>, onboarding: OnboardingService) -> Self {
        Self { store, onboarding }
    }

    pub async fn create(&self, user_id: Uuid, name: &str) -> ServiceResult<OrganizationDetails> {
        let name = name.trim();
        let length = name.chars().count();
        if !(MIN_NAME_LENGTH..=MAX_NAME_LENGTH).contains(&length) {
            return Err(ServiceError::validation(format!(
                "Organization name must be between {} and {} characters",
                MIN_NAME_LENGTH, MAX_NAME_LENGTH
            )));
        }

        let slug = self.available_slug(&slugify(name)).await?;
        let organization = self
            .store
            .create_organization(NewOrganization {
                name: name.to_string(),
                slug,
                created_by: user_id,
            })
            .await?;
        info!("User {} created organization {} ({})", user_id, organization.id, organization.slug);

        self.onboarding.complete_step(user_id, OnboardingStep::Organization).await?;

        Ok(OrganizationDetails {
            organization,
            role: Role::Owner,
            member_count: 1,
        })
    }

    async fn available_slug(&self, base: &str) -> ServiceResult<String> {
        if !self.store.slug_exists(base).await? {
            return Ok(base.to_string());
        }
        for suffix in 2..=MAX_SLUG_SUFFIX {
            let candidate = format!("{}-{}", base, suffix);
            if !self.store.slug_exists(&candidate).await? {
                return Ok(candidate);
            }
        }
        let random = Uuid::new_v4().simple().to_string();
        Ok(format!("{}-{}", base, &random[..8]))
    }

    pub async fn get(&self, user_id: Uuid, organization_id: Uuid) -> ServiceResult<OrganizationDetails> {
        let (organization, membership) =
            require_membership(self.store.as_ref(), organization_id, user_id).await?;
        let member_count = self.store.count_members(organization_id).await?;
        Ok(OrganizationDetails {
            organization,
            role: membership.role,
            member_count,
        })
    }

    pub async fn list_for_user(&self, user_id: Uuid) -> ServiceResult<Vec<UserOrganization>> {
        Ok(self.store.organizations_for_user(user_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::NewUser;
    use crate::database::MemoryStore;

    #[test]
    fn slugs_collapse_punctuation() {
        assert_eq!(slugify("Acme Corp."), "acme-corp");
        assert_eq!(slugify("  --Hello,  World!! "), "hello-world");
        assert_eq!(slugify("日本"), "org");
    }

    async fn setup() -> (OrganizationService, Arc<dyn Store>, Uuid) {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let user = store
            .insert_user(NewUser {
                email: "owner@example.com".to_string(),
                name: "Owner".to_string(),
                password_hash: "hash".to_string(),
            })
            .await
            .unwrap();
        let service = OrganizationService::new(store.clone(), OnboardingService::new(store.clone()));
        (service, store, user.id)
    }

    #[tokio::test]
    async fn duplicate_names_get_suffixed_slugs() {
        let (service, _, user_id) = setup().await;
        let first = service.create(user_id, "Acme").await.unwrap();
        let second = service.create(user_id, "acme").await.unwrap();
        assert_eq!(first.organization.slug, "acme");
        assert_eq!(second.organization.slug, "acme-2");
    }

    #[tokio::test]
    async fn creating_completes_the_organization_step() {
        let (service, store, user_id) = setup().await;
        service.create(user_id, "Acme").await.unwrap();
        let user = store.find_user(user_id).await.unwrap().unwrap();
        assert!(user.onboarding_completed_steps.contains(&OnboardingStep::Organization));
    }

    #[tokio::test]
    async fn names_are_validated() {
        let (service, _, user_id) = setup().await;
        assert!(matches!(service.create(user_id, " a ").await, Err(ServiceError::Validation(_))));
    }

    #[tokio::test]
    async fn non_members_are_forbidden() {
        let (service, store, user_id) = setup().await;
        let created = service.create(user_id, "Acme").await.unwrap();
        let outsider = store
            .insert_user(NewUser {
                email: "outsider@example.com".to_string(),
                name: "Outsider".to_string(),
                password_hash: "hash".to_string(),
            })
            .await
            .unwrap();

        assert!(matches!(
            service.get(outsider.id, created.organization.id).await,
            Err(ServiceError::Forbidden(_))
        ));
        assert!(matches!(
            service.get(user_id, Uuid::new_v4()).await,
            Err(ServiceError::NotFound(_))
        ));
    }
}
