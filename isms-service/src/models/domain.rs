//! Domain model - control domain taxonomy (up to three levels).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

use super::trimmed_name;

/// Control domain. `level` and `path` are maintained by the taxonomy engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Domain {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub name: String,
    pub description: String,
    pub parent_id: Option<Uuid>,
    pub level: i32,
    pub path: String,
    pub is_active: bool,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

impl Domain {
    pub fn new(
        tenant_id: Uuid,
        name: String,
        description: String,
        parent_id: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            tenant_id,
            name,
            description,
            parent_id,
            level: 0,
            path: String::new(),
            is_active: true,
            created_utc: now,
            updated_utc: now,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateDomainRequest {
    #[validate(
        length(min = 2, max = 200, message = "Name must be 2-200 characters"),
        custom(function = "trimmed_name")
    )]
    pub name: String,
    #[validate(length(min = 10, max = 4000, message = "Description must be at least 10 characters"))]
    pub description: String,
    pub parent_id: Option<Uuid>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateDomainRequest {
    #[validate(
        length(min = 2, max = 200, message = "Name must be 2-200 characters"),
        custom(function = "trimmed_name")
    )]
    pub name: Option<String>,
    #[validate(length(min = 10, max = 4000, message = "Description must be at least 10 characters"))]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "super::double_option")]
    pub parent_id: Option<Option<Uuid>>,
    pub is_active: Option<bool>,
}
