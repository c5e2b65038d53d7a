use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{postgres::PgRow, FromRow, Row};
use uuid::Uuid;

use super::text_column;
use crate::types::{OnboardingStatus, OnboardingStep, UnknownVariant};

#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub onboarding_status: OnboardingStatus,
    pub onboarding_completed_steps: Vec<OnboardingStep>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Insert payload; email is expected to be normalized already
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub name: String,
    pub password_hash: String,
}

impl<'r> FromRow<'r, PgRow> for User {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        let raw_steps: Vec<String> = row.try_get("onboarding_completed_steps")?;
        let onboarding_completed_steps = raw_steps
            .iter()
            .map(|s| s.parse())
            .collect::<Result<Vec<OnboardingStep>, UnknownVariant>>()
            .map_err(|e| sqlx::Error::ColumnDecode {
                index: "onboarding_completed_steps".to_string(),
                source: Box::new(e),
            })?;

        Ok(Self {
            id: row.try_get("id")?,
            email: row.try_get("email")?,
            name: row.try_get("name")?,
            password_hash: row.try_get("password_hash")?,
            onboarding_status: text_column(row, "onboarding_status")?,
            onboarding_completed_steps,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}
