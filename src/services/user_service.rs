use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::{self, SessionClaims};
use crate::config::SecurityConfig;
use crate::database::models::{Invitation, NewUser, Session, User, UserOrganization};
use crate::database::Store;
use crate::services::error::{ServiceError, ServiceResult};

const MIN_PASSWORD_LENGTH: usize = 8;
const MAX_NAME_LENGTH: usize = 100;
const INVALID_CREDENTIALS: &str = "Invalid email or password";

/// Result of a successful register or login
#[derive(Debug, Clone, Serialize)]
pub struct AuthenticatedSession {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub user: User,
}

/// A pending invitation together with the organization it is for
#[derive(Debug, Clone, Serialize)]
pub struct ReceivedInvitation {
    #[serde(flatten)]
    pub invitation: Invitation,
    pub organization_name: String,
}

/// Trim, lowercase and sanity-check an email address
pub fn normalize_email(raw: &str) -> ServiceResult<String> {
    let email = raw.trim().to_lowercase();
    let invalid = || ServiceError::validation(format!("'{}' is not a valid email address", raw.trim()));

    if email.len() > 254 || email.chars().any(char::is_whitespace) {
        return Err(invalid());
    }
    let (local, domain) = email.split_once('@').ok_or_else(invalid)?;
    if local.is_empty() || domain.contains('@') {
        return Err(invalid());
    }
    let labels_ok = domain.split('.').all(|label| !label.is_empty());
    if !domain.contains('.') || !labels_ok {
        return Err(invalid());
    }
    Ok(email)
}

#[derive(Clone)]
pub struct UserService {
    store: Arc<dyn Store>,
    security: SecurityConfig,
}

impl UserService {
    pub fn new(store: Arc<dyn Store>, security: SecurityConfig) -> Self {
        Self { store, security }
    }

    pub async fn register(
        &self,
        email: &str,
        password: &str,
        name: Option<&str>,
    ) -> ServiceResult<AuthenticatedSession> {
        let email = normalize_email(email)?;
        if password.chars().count() < MIN_PASSWORD_LENGTH {
            return Err(ServiceError::validation(format!(
                "Password must be at least {} characters",
                MIN_PASSWORD_LENGTH
            )));
        }

        let name = match name.map(str::trim).filter(|n| !n.is_empty()) {
            Some(n) if n.chars().count() > MAX_NAME_LENGTH => {
                return Err(ServiceError::validation(format!(
                    "Name must be at most {} characters",
                    MAX_NAME_LENGTH
                )))
            }
            Some(n) => n.to_string(),
            // Default display name is the mailbox part of the address
            None => email.split('@').next().unwrap_or_default().to_string(),
        };

        if self.store.find_user_by_email(&email).await?.is_some() {
            return Err(ServiceError::conflict("An account with this email already exists"));
        }

        let password_hash = auth::hash_password(password)?;
        let user = self
            .store
            .insert_user(NewUser { email, name, password_hash })
            .await
            .map_err(|e| match ServiceError::from(e) {
                // Lost a race with a concurrent registration
                ServiceError::Conflict(_) => {
                    ServiceError::conflict("An account with this email already exists")
                }
                other => other,
            })?;

        info!("Registered user {} ({})", user.id, user.email);
        self.start_session(user).await
    }

    pub async fn login(&self, email: &str, password: &str) -> ServiceResult<AuthenticatedSession> {
        // Malformed addresses get the same answer as unknown ones
        let email = normalize_email(email)
            .map_err(|_| ServiceError::Unauthorized(INVALID_CREDENTIALS.to_string()))?;

        let user = match self.store.find_user_by_email(&email).await? {
            Some(user) => user,
            None => {
                warn!("Login failed: no account for {}", email);
                return Err(ServiceError::Unauthorized(INVALID_CREDENTIALS.to_string()));
            }
        };

        if !auth::verify_password(password, &user.password_hash)? {
            warn!("Login failed: wrong password for user {}", user.id);
            return Err(ServiceError::Unauthorized(INVALID_CREDENTIALS.to_string()));
        }

        info!("User {} logged in", user.id);
        self.start_session(user).await
    }

    async fn start_session(&self, user: User) -> ServiceResult<AuthenticatedSession> {
        let now = Utc::now();
        let expires_at = i64::try_from(self.security.session_ttl_hours)
            .ok()
            .and_then(Duration::try_hours)
            .and_then(|ttl| now.checked_add_signed(ttl))
            .ok_or_else(|| ServiceError::Internal("Session lifetime is out of range".to_string()))?;
        let session = Session {
            id: Uuid::new_v4(),
            user_id: user.id,
            created_at: now,
            expires_at,
            revoked_at: None,
        };
        self.store.insert_session(&session).await?;

        let claims = SessionClaims::new(user.id, session.id, user.email.clone(), now, expires_at);
        let token = auth::issue_token(&claims, &self.security.jwt_secret)?;

        Ok(AuthenticatedSession { token, expires_at, user })
    }

    /// Resolve a session token to its live session and user
    pub async fn authenticate(&self, token: &str) -> ServiceResult<(User, Session)> {
        let claims = auth::decode_token(token, &self.security.jwt_secret)?;
        let unauthorized = || ServiceError::Unauthorized("Invalid or expired session".to_string());

        let session = self.store.find_session(claims.sid).await?.ok_or_else(unauthorized)?;
        if session.user_id != claims.sub || !session.is_active(Utc::now()) {
            return Err(unauthorized());
        }

        let user = self.store.find_user(claims.sub).await?.ok_or_else(unauthorized)?;
        Ok((user, session))
    }

    pub async fn logout(&self, session_id: Uuid) -> ServiceResult<()> {
        self.store.revoke_session(session_id, Utc::now()).await?;
        info!("Session {} revoked", session_id);
        Ok(())
    }

    pub async fn current_user(&self, user_id: Uuid) -> ServiceResult<User> {
        self.store
            .find_user(user_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("User not found"))
    }

    pub async fn organizations(&self, user_id: Uuid) -> ServiceResult<Vec<UserOrganization>> {
        Ok(self.store.organizations_for_user(user_id).await?)
    }

    /// Pending, unexpired invitations addressed to the user's email
    pub async fn pending_invitations(&self, user: &User) -> ServiceResult<Vec<ReceivedInvitation>> {
        let now = Utc::now();
        let mut received = Vec::new();
        for invitation in self.store.pending_invitations_for_email(&user.email).await? {
            if invitation.is_expired(now) {
                continue;
            }
            let organization_name = match self.store.find_organization(invitation.organization_id).await? {
                Some(org) => org.name,
                None => continue,
            };
            received.push(ReceivedInvitation { invitation, organization_name });
        }
        Ok(received)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::database::MemoryStore;

    fn service() -> UserService {
        UserService::new(Arc::new(MemoryStore::new()), AppConfig::development().security)
    }

    #[test]
    fn normalizes_emails() {
        assert_eq!(normalize_email("  Ada@Example.COM ").unwrap(), "ada@example.com");
        assert!(normalize_email("ada").is_err());
        assert!(normalize_email("@example.com").is_err());
        assert!(normalize_email("ada@localhost").is_err());
        assert!(normalize_email("ada@example..com").is_err());
        assert!(normalize_email("a da@example.com").is_err());
    }

    #[tokio::test]
    async fn oversized_session_lifetime_is_an_error() {
        let mut security = AppConfig::development().security;
        security.session_ttl_hours = u64::MAX / 2;
        let users = UserService::new(Arc::new(MemoryStore::new()), security);
        assert!(matches!(
            users.register("long@example.com", "password123", None).await,
            Err(ServiceError::Internal(_))
        ));
    }

    #[tokio::test]
    async fn register_then_authenticate() {
        let users = service();
        let session = users.register("Ada@example.com", "password123", Some("Ada")).await.unwrap();
        assert_eq!(session.user.email, "ada@example.com");

        let (user, _) = users.authenticate(&session.token).await.unwrap();
        assert_eq!(user.id, session.user.id);
    }

    #[tokio::test]
    async fn register_defaults_name_and_rejects_duplicates() {
        let users = service();
        let session = users.register("grace@example.com", "password123", None).await.unwrap();
        assert_eq!(session.user.name, "grace");

        let err = users.register("GRACE@example.com", "password123", None).await.unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));
    }

    #[tokio::test]
    async fn short_passwords_are_rejected() {
        let users = service();
        assert!(matches!(
            users.register("a@example.com", "short", None).await,
            Err(ServiceError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn login_failures_are_indistinguishable() {
        let users = service();
        users.register("a@example.com", "password123", None).await.unwrap();

        let wrong_password = users.login("a@example.com", "nope-nope").await.unwrap_err();
        let unknown = users.login("b@example.com", "password123").await.unwrap_err();
        assert_eq!(wrong_password.to_string(), INVALID_CREDENTIALS);
        assert_eq!(unknown.to_string(), INVALID_CREDENTIALS);
    }

    #[tokio::test]
    async fn logout_invalidates_the_token() {
        let users = service();
        let session = users.register("a@example.com", "password123", None).await.unwrap();
        let (_, live) = users.authenticate(&session.token).await.unwrap();

        users.logout(live.id).await.unwrap();
        assert!(matches!(
            users.authenticate(&session.token).await,
            Err(ServiceError::Unauthorized(_))
        ));
    }
}
