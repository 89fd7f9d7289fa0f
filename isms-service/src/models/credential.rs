//! Credentials registry model - who holds which access to an asset, and until when.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::str::FromStr;
use uuid::Uuid;
use validator::Validate;

use super::GrantLifecycle;

/// Access type held on an asset. Declaration order is privilege order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialAccessType {
    Read,
    Write,
    Admin,
    Full,
}

impl CredentialAccessType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CredentialAccessType::Read => "read",
            CredentialAccessType::Write => "write",
            CredentialAccessType::Admin => "admin",
            CredentialAccessType::Full => "full",
        }
    }
}

impl FromStr for CredentialAccessType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "read" => Ok(CredentialAccessType::Read),
            "write" => Ok(CredentialAccessType::Write),
            "admin" => Ok(CredentialAccessType::Admin),
            "full" => Ok(CredentialAccessType::Full),
            other => Err(format!("Unknown access type: {}", other)),
        }
    }
}

impl TryFrom<String> for CredentialAccessType {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Credential registry entry. Held by exactly one of `user_id` / `team_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct CredentialGrant {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub asset_id: Uuid,
    pub user_id: Option<Uuid>,
    pub team_id: Option<Uuid>,
    #[sqlx(try_from = "String")]
    pub access_type: CredentialAccessType,
    pub justification: String,
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub lifecycle: GrantLifecycle,
    pub created_by: Option<Uuid>,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateCredentialRequest {
    pub asset_id: Uuid,
    pub user_id: Option<Uuid>,
    pub team_id: Option<Uuid>,
    pub access_type: CredentialAccessType,
    #[validate(length(min = 10, max = 2000, message = "Justification must be at least 10 characters"))]
    pub justification: String,
    pub valid_from: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateCredentialRequest {
    pub access_type: Option<CredentialAccessType>,
    #[validate(length(min = 10, max = 2000, message = "Justification must be at least 10 characters"))]
    pub justification: Option<String>,
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_until: Option<DateTime<Utc>>,
}
