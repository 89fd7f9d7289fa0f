//! Lifecycle fields shared by every time-bounded grant.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::str::FromStr;
use uuid::Uuid;

/// Validity window, approval and audit trail of a grant.
///
/// Status is never stored here; it is derived on read from these fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct GrantLifecycle {
    pub valid_from: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
    pub is_active: bool,
    pub approved_by: Option<Uuid>,
    pub approved_at: Option<DateTime<Utc>>,
    pub last_audit_date: Option<DateTime<Utc>>,
    pub audit_notes: Option<String>,
}

impl GrantLifecycle {
    /// A fresh, unapproved grant.
    pub fn pending(valid_from: DateTime<Utc>, valid_until: DateTime<Utc>) -> Self {
        Self {
            valid_from,
            valid_until,
            is_active: true,
            approved_by: None,
            approved_at: None,
            last_audit_date: None,
            audit_notes: None,
        }
    }

    pub fn is_approved(&self) -> bool {
        self.approved_by.is_some()
    }
}

/// Derived grant status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantStatus {
    Revoked,
    Expired,
    ExpiringSoon,
    NeedsAudit,
    Active,
}

impl GrantStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            GrantStatus::Revoked => "revoked",
            GrantStatus::Expired => "expired",
            GrantStatus::ExpiringSoon => "expiring_soon",
            GrantStatus::NeedsAudit => "needs_audit",
            GrantStatus::Active => "active",
        }
    }
}

impl FromStr for GrantStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "revoked" => Ok(GrantStatus::Revoked),
            "expired" => Ok(GrantStatus::Expired),
            "expiring_soon" => Ok(GrantStatus::ExpiringSoon),
            "needs_audit" => Ok(GrantStatus::NeedsAudit),
            "active" => Ok(GrantStatus::Active),
            other => Err(format!("Unknown grant status: {}", other)),
        }
    }
}
