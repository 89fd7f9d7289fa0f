use config::{Config as Cfg, Environment, File};
use secrecy::Secret;
use serde::Deserialize;
use service_core::config as core_config;
use service_core::error::AppError;

use crate::services::{LifecyclePolicy, DEFAULT_PATH_SEPARATOR};

#[derive(Debug, Clone, Deserialize)]
pub struct IsmsConfig {
    #[serde(default = "default_service_name")]
    pub service_name: String,

    /// Port, log level and OTLP endpoint, loaded from `APP__*`.
    #[serde(skip)]
    pub common: core_config::Config,

    /// When absent the service runs on the in-memory store.
    #[serde(default)]
    pub database: Option<DatabaseConfig>,

    #[serde(default)]
    pub lifecycle: LifecycleConfig,

    #[serde(default)]
    pub taxonomy: TaxonomyConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: Secret<String>,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LifecycleConfig {
    #[serde(default = "default_expiring_soon_days")]
    pub expiring_soon_days: i64,
    #[serde(default = "default_audit_interval_days")]
    pub audit_interval_days: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TaxonomyConfig {
    #[serde(default = "default_path_separator")]
    pub path_separator: String,
}

fn default_service_name() -> String {
    "isms-service".to_string()
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    1
}

fn default_expiring_soon_days() -> i64 {
    30
}

fn default_audit_interval_days() -> i64 {
    90
}

fn default_path_separator() -> String {
    DEFAULT_PATH_SEPARATOR.to_string()
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            expiring_soon_days: default_expiring_soon_days(),
            audit_interval_days: default_audit_interval_days(),
        }
    }
}

impl Default for TaxonomyConfig {
    fn default() -> Self {
        Self {
            path_separator: default_path_separator(),
        }
    }
}

impl Default for IsmsConfig {
    fn default() -> Self {
        Self {
            service_name: default_service_name(),
            common: core_config::Config::default(),
            database: None,
            lifecycle: LifecycleConfig::default(),
            taxonomy: TaxonomyConfig::default(),
        }
    }
}

impl IsmsConfig {
    /// Load the shared settings, then the `isms` file and `ISMS__*` variables.
    pub fn load() -> Result<Self, AppError> {
        let common = core_config::Config::load()?;

        let mut config: IsmsConfig = Cfg::builder()
            .add_source(File::with_name("isms").required(false))
            .add_source(
                Environment::with_prefix("ISMS")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        config.common = common;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.lifecycle.expiring_soon_days < 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "lifecycle.expiring_soon_days must not be negative"
            )));
        }
        if self.lifecycle.audit_interval_days < 1 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "lifecycle.audit_interval_days must be at least 1"
            )));
        }
        if self.taxonomy.path_separator.is_empty() {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "taxonomy.path_separator must not be empty"
            )));
        }
        if let Some(db) = &self.database {
            if db.min_connections > db.max_connections {
                return Err(AppError::ConfigError(anyhow::anyhow!(
                    "database.min_connections exceeds max_connections"
                )));
            }
        }
        Ok(())
    }

    pub fn lifecycle_policy(&self) -> LifecyclePolicy {
        LifecyclePolicy::from_days(
            self.lifecycle.expiring_soon_days,
            self.lifecycle.audit_interval_days,
        )
    }
}
