//! Organization model - company / department / unit / division hierarchy.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::str::FromStr;
use uuid::Uuid;
use validator::Validate;

use super::trimmed_name;

/// Organization type codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrganizationType {
    Company,
    Department,
    Unit,
    Division,
}

impl OrganizationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrganizationType::Company => "company",
            OrganizationType::Department => "department",
            OrganizationType::Unit => "unit",
            OrganizationType::Division => "division",
        }
    }

    /// Parent types this type may hang under. Empty means root only.
    pub fn allowed_parent_types(&self) -> &'static [OrganizationType] {
        match self {
            OrganizationType::Company => &[],
            OrganizationType::Department => &[OrganizationType::Company],
            OrganizationType::Unit | OrganizationType::Division => {
                &[OrganizationType::Department, OrganizationType::Company]
            }
        }
    }

    pub fn accepts_parent(&self, parent: OrganizationType) -> bool {
        self.allowed_parent_types().contains(&parent)
    }
}

impl FromStr for OrganizationType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "company" => Ok(OrganizationType::Company),
            "department" => Ok(OrganizationType::Department),
            "unit" => Ok(OrganizationType::Unit),
            "division" => Ok(OrganizationType::Division),
            other => Err(format!("Unknown organization type: {}", other)),
        }
    }
}

impl TryFrom<String> for OrganizationType {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Organization entity. `level` and `path` are maintained by the taxonomy engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Organization {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub name: String,
    #[sqlx(try_from = "String")]
    pub org_type: OrganizationType,
    pub description: Option<String>,
    pub parent_id: Option<Uuid>,
    pub level: i32,
    pub path: String,
    pub is_active: bool,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

impl Organization {
    /// Create an unplaced organization; level and path are filled in on placement.
    pub fn new(
        tenant_id: Uuid,
        name: String,
        org_type: OrganizationType,
        description: Option<String>,
        parent_id: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            tenant_id,
            name,
            org_type,
            description,
            parent_id,
            level: 0,
            path: String::new(),
            is_active: true,
            created_utc: now,
            updated_utc: now,
        }
    }

    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }
}

/// Request to create an organization.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateOrganizationRequest {
    #[validate(
        length(min = 2, max = 200, message = "Name must be 2-200 characters"),
        custom(function = "trimmed_name")
    )]
    pub name: String,
    pub org_type: OrganizationType,
    pub parent_id: Option<Uuid>,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    pub is_active: Option<bool>,
}

/// Request to update an organization. `parent_id: null` detaches the node.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateOrganizationRequest {
    #[validate(
        length(min = 2, max = 200, message = "Name must be 2-200 characters"),
        custom(function = "trimmed_name")
    )]
    pub name: Option<String>,
    pub org_type: Option<OrganizationType>,
    #[serde(default, deserialize_with = "super::double_option")]
    pub parent_id: Option<Option<Uuid>>,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    pub is_active: Option<bool>,
}
