pub mod password;

use chrono::{DateTime, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use uuid::Uuid;

pub use password::{hash_password, verify_password};

/// Name of the cookie that may carry the session token instead of the
/// Authorization header
pub const SESSION_COOKIE: &str = "bento_session";

/// Claims carried by a session token. `sid` points at the server-side
/// session row, which is what logout revokes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    pub sub: Uuid,
    pub sid: Uuid,
    pub email: String,
    pub iat: i64,
    pub exp: i64,
}

impl SessionClaims {
    pub fn new(
        user_id: Uuid,
        session_id: Uuid,
        email: impl Into<String>,
        issued_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            sub: user_id,
            sid: session_id,
            email: email.into(),
            iat: issued_at.timestamp(),
            exp: expires_at.timestamp(),
        }
    }
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("JWT generation error: {0}")]
    TokenGeneration(String),

    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Invalid JWT secret")]
    InvalidSecret,

    #[error("Password hashing error: {0}")]
    PasswordHash(String),
}

pub fn issue_token(claims: &SessionClaims, secret: &str) -> Result<String, AuthError> {
    if secret.is_empty() {
        return Err(AuthError::InvalidSecret);
    }

    let encoding_key = EncodingKey::from_secret(secret.as_bytes());
    encode(&Header::default(), claims, &encoding_key)
        .map_err(|e| AuthError::TokenGeneration(e.to_string()))
}

/// Verify signature and expiry and return the claims
pub fn decode_token(token: &str, secret: &str) -> Result<SessionClaims, AuthError> {
    if secret.is_empty() {
        return Err(AuthError::InvalidSecret);
    }

    let decoding_key = DecodingKey::from_secret(secret.as_bytes());
    let token_data = decode::<SessionClaims>(token, &decoding_key, &Validation::default())
        .map_err(|e| AuthError::InvalidToken(e.to_string()))?;
    Ok(token_data.claims)
}

/// Random opaque token for invitation links: two v4 UUIDs as 64 hex chars
pub fn generate_opaque_token() -> String {
    format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple())
}

/// Hex SHA-256 of an opaque token; only the digest is persisted.
pub fn hash_opaque_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    const SECRET: &str = "test-secret";

    fn claims(expires_in: Duration) -> SessionClaims {
        let now = Utc::now();
        SessionClaims::new(Uuid::new_v4(), Uuid::new_v4(), "a@example.com", now, now + expires_in)
    }

    #[test]
    fn issued_tokens_decode_with_the_same_secret() {
        let claims = claims(Duration::hours(1));
        let token = issue_token(&claims, SECRET).unwrap();
        assert_eq!(decode_token(&token, SECRET).unwrap(), claims);
    }

    #[test]
    fn rejects_foreign_signature() {
        let token = issue_token(&claims(Duration::hours(1)), SECRET).unwrap();
        assert!(matches!(
            decode_token(&token, "other-secret"),
            Err(AuthError::InvalidToken(_))
        ));
    }

    #[test]
    fn rejects_expired_tokens() {
        // Beyond the default 60s validation leeway
        let token = issue_token(&claims(Duration::minutes(-5)), SECRET).unwrap();
        assert!(matches!(decode_token(&token, SECRET), Err(AuthError::InvalidToken(_))));
    }

    #[test]
    fn empty_secret_is_refused() {
        assert!(matches!(
            issue_token(&claims(Duration::hours(1)), ""),
            Err(AuthError::InvalidSecret)
        ));
    }

    #[test]
    fn opaque_tokens_are_unique_and_hash_stably() {
        let a = generate_opaque_token();
        let b = generate_opaque_token();
        assert_ne!(a, b);
        assert_eq!(a.len(), 64);
        assert_eq!(hash_opaque_token(&a), hash_opaque_token(&a));
        assert_ne!(hash_opaque_token(&a), hash_opaque_token(&b));
    }
}
