//! Privileged access model - elevated access to a system scope, subject to periodic audit.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::str::FromStr;
use uuid::Uuid;
use validator::Validate;

use super::GrantLifecycle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeType {
    System,
    Database,
    Network,
    Application,
    Infrastructure,
}

impl ScopeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScopeType::System => "system",
            ScopeType::Database => "database",
            ScopeType::Network => "network",
            ScopeType::Application => "application",
            ScopeType::Infrastructure => "infrastructure",
        }
    }
}

impl FromStr for ScopeType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "system" => Ok(ScopeType::System),
            "database" => Ok(ScopeType::Database),
            "network" => Ok(ScopeType::Network),
            "application" => Ok(ScopeType::Application),
            "infrastructure" => Ok(ScopeType::Infrastructure),
            other => Err(format!("Unknown scope type: {}", other)),
        }
    }
}

impl TryFrom<String> for ScopeType {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Privilege level. Declaration order is privilege order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrivilegedAccessLevel {
    Read,
    Write,
    Admin,
    SuperAdmin,
}

impl PrivilegedAccessLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            PrivilegedAccessLevel::Read => "read",
            PrivilegedAccessLevel::Write => "write",
            PrivilegedAccessLevel::Admin => "admin",
            PrivilegedAccessLevel::SuperAdmin => "super_admin",
        }
    }
}

impl FromStr for PrivilegedAccessLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "read" => Ok(PrivilegedAccessLevel::Read),
            "write" => Ok(PrivilegedAccessLevel::Write),
            "admin" => Ok(PrivilegedAccessLevel::Admin),
            "super_admin" => Ok(PrivilegedAccessLevel::SuperAdmin),
            other => Err(format!("Unknown access level: {}", other)),
        }
    }
}

impl TryFrom<String> for PrivilegedAccessLevel {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Privileged access record held by a single user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct PrivilegedAccess {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub user_id: Uuid,
    #[sqlx(try_from = "String")]
    pub scope_type: ScopeType,
    pub scope_id: String,
    #[sqlx(try_from = "String")]
    pub access_level: PrivilegedAccessLevel,
    pub justification: String,
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub lifecycle: GrantLifecycle,
    pub created_by: Option<Uuid>,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreatePrivilegedAccessRequest {
    pub user_id: Uuid,
    pub scope_type: ScopeType,
    #[validate(length(min = 1, max = 200, message = "Scope id is required"))]
    pub scope_id: String,
    pub access_level: PrivilegedAccessLevel,
    #[validate(length(min = 10, max = 2000, message = "Justification must be at least 10 characters"))]
    pub justification: String,
    pub valid_from: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdatePrivilegedAccessRequest {
    pub scope_type: Option<ScopeType>,
    #[validate(length(min = 1, max = 200, message = "Scope id is required"))]
    pub scope_id: Option<String>,
    pub access_level: Option<PrivilegedAccessLevel>,
    #[validate(length(min = 10, max = 2000, message = "Justification must be at least 10 characters"))]
    pub justification: Option<String>,
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_until: Option<DateTime<Utc>>,
}
