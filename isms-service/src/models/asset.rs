//! Asset model with confidentiality / integrity / availability rating.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::str::FromStr;
use uuid::Uuid;
use validator::Validate;

/// Asset categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetType {
    Physical,
    Digital,
    Person,
    Software,
    Infrastructure,
    Data,
}

impl AssetType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetType::Physical => "physical",
            AssetType::Digital => "digital",
            AssetType::Person => "person",
            AssetType::Software => "software",
            AssetType::Infrastructure => "infrastructure",
            AssetType::Data => "data",
        }
    }
}

impl FromStr for AssetType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "physical" => Ok(AssetType::Physical),
            "digital" => Ok(AssetType::Digital),
            "person" => Ok(AssetType::Person),
            "software" => Ok(AssetType::Software),
            "infrastructure" => Ok(AssetType::Infrastructure),
            "data" => Ok(AssetType::Data),
            other => Err(format!("Unknown asset type: {}", other)),
        }
    }
}

impl TryFrom<String> for AssetType {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Rating on one classification axis. Declaration order is severity order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassificationLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl ClassificationLevel {
    pub const ALL: [ClassificationLevel; 4] = [
        ClassificationLevel::Low,
        ClassificationLevel::Medium,
        ClassificationLevel::High,
        ClassificationLevel::Critical,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ClassificationLevel::Low => "low",
            ClassificationLevel::Medium => "medium",
            ClassificationLevel::High => "high",
            ClassificationLevel::Critical => "critical",
        }
    }

    /// Numeric score, 1 (low) through 4 (critical).
    pub fn score(&self) -> u8 {
        match self {
            ClassificationLevel::Low => 1,
            ClassificationLevel::Medium => 2,
            ClassificationLevel::High => 3,
            ClassificationLevel::Critical => 4,
        }
    }
}

impl FromStr for ClassificationLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(ClassificationLevel::Low),
            "medium" => Ok(ClassificationLevel::Medium),
            "high" => Ok(ClassificationLevel::High),
            "critical" => Ok(ClassificationLevel::Critical),
            other => Err(format!("Unknown classification level: {}", other)),
        }
    }
}

impl TryFrom<String> for ClassificationLevel {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// CIA triad rating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct AssetClassification {
    #[sqlx(try_from = "String")]
    pub confidentiality: ClassificationLevel,
    #[sqlx(try_from = "String")]
    pub integrity: ClassificationLevel,
    #[sqlx(try_from = "String")]
    pub availability: ClassificationLevel,
}

/// Information asset owned by an organization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Asset {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub name: String,
    #[sqlx(try_from = "String")]
    pub asset_type: AssetType,
    pub owner_id: Uuid,
    #[sqlx(flatten)]
    pub classification: AssetClassification,
    pub description: Option<String>,
    pub location: Option<String>,
    pub organization_id: Uuid,
    pub is_active: bool,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateAssetRequest {
    #[validate(length(min = 2, max = 200, message = "Name must be 2-200 characters"))]
    pub name: String,
    pub asset_type: AssetType,
    pub owner_id: Uuid,
    pub classification: AssetClassification,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    #[validate(length(max = 500))]
    pub location: Option<String>,
    pub organization_id: Uuid,
    pub is_active: Option<bool>,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateAssetRequest {
    #[validate(length(min = 2, max = 200, message = "Name must be 2-200 characters"))]
    pub name: Option<String>,
    pub asset_type: Option<AssetType>,
    pub owner_id: Option<Uuid>,
    pub classification: Option<AssetClassification>,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    #[validate(length(max = 500))]
    pub location: Option<String>,
    pub organization_id: Option<Uuid>,
    pub is_active: Option<bool>,
}
