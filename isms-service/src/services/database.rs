//! PostgreSQL store.

use async_trait::async_trait;
use service_core::error::AppError;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{info, instrument};
use uuid::Uuid;

use super::store::IsmsStore;
use super::taxonomy::{PathUpdate, TaxonomyKind};
use crate::models::{Asset, CredentialGrant, Domain, Organization, PrivilegedAccess};

fn db_error(e: sqlx::Error) -> AppError {
    AppError::DatabaseError(anyhow::anyhow!(e))
}

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Create a new database connection pool.
    #[instrument(skip(database_url), fields(service = "isms-service"))]
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self, AppError> {
        info!(
            max_connections = max_connections,
            min_connections = min_connections,
            "Connecting to PostgreSQL"
        );

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600))
            .connect(database_url)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to connect: {}", e)))?;

        info!("PostgreSQL connection pool established");

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    #[instrument(skip(self))]
    pub async fn run_migrations(&self) -> Result<(), AppError> {
        info!("Running database migrations");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Migration failed: {}", e)))?;
        info!("Database migrations completed");
        Ok(())
    }
}

#[async_trait]
impl IsmsStore for Database {
    #[instrument(skip(self))]
    async fn health_check(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Health check failed: {}", e)))?;
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Organizations
    // -------------------------------------------------------------------------

    #[instrument(skip(self), fields(tenant_id = %tenant_id))]
    async fn list_organizations(&self, tenant_id: Uuid) -> Result<Vec<Organization>, AppError> {
        sqlx::query_as::<_, Organization>(
            "SELECT * FROM organizations WHERE tenant_id = $1 ORDER BY name, created_utc",
        )
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id))]
    async fn get_organization(&self, tenant_id: Uuid, id: Uuid) -> Result<Option<Organization>, AppError> {
        sqlx::query_as::<_, Organization>(
            "SELECT * FROM organizations WHERE tenant_id = $1 AND id = $2",
        )
        .bind(tenant_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)
    }

    #[instrument(skip(self, org), fields(tenant_id = %org.tenant_id, org_id = %org.id))]
    async fn insert_organization(&self, org: &Organization) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO organizations (id, tenant_id, name, org_type, description, parent_id, level, path, is_active, created_utc, updated_utc)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(org.id)
        .bind(org.tenant_id)
        .bind(&org.name)
        .bind(org.org_type.as_str())
        .bind(&org.description)
        .bind(org.parent_id)
        .bind(org.level)
        .bind(&org.path)
        .bind(org.is_active)
        .bind(org.created_utc)
        .bind(org.updated_utc)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(())
    }

    #[instrument(skip(self, org, descendants), fields(tenant_id = %org.tenant_id, org_id = %org.id, descendants = descendants.len()))]
    async fn update_organization(&self, org: &Organization, descendants: &[PathUpdate]) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;

        let result = sqlx::query(
            r#"
            UPDATE organizations
            SET name = $3, org_type = $4, description = $5, parent_id = $6, level = $7, path = $8,
                is_active = $9, updated_utc = $10
            WHERE tenant_id = $1 AND id = $2
            "#,
        )
        .bind(org.tenant_id)
        .bind(org.id)
        .bind(&org.name)
        .bind(org.org_type.as_str())
        .bind(&org.description)
        .bind(org.parent_id)
        .bind(org.level)
        .bind(&org.path)
        .bind(org.is_active)
        .bind(org.updated_utc)
        .execute(&mut *tx)
        .await
        .map_err(db_error)?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(anyhow::anyhow!("Organization not found")));
        }

        for update in descendants {
            sqlx::query(
                "UPDATE organizations SET level = $3, path = $4, updated_utc = $5 WHERE tenant_id = $1 AND id = $2",
            )
            .bind(org.tenant_id)
            .bind(update.id)
            .bind(update.level)
            .bind(&update.path)
            .bind(org.updated_utc)
            .execute(&mut *tx)
            .await
            .map_err(db_error)?;
        }

        tx.commit().await.map_err(db_error)?;
        Ok(())
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id))]
    async fn delete_organization(&self, tenant_id: Uuid, id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM organizations WHERE tenant_id = $1 AND id = $2")
            .bind(tenant_id)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_error)?;
        Ok(result.rows_affected() > 0)
    }

    // -------------------------------------------------------------------------
    // Domains
    // -------------------------------------------------------------------------

    #[instrument(skip(self), fields(tenant_id = %tenant_id))]
    async fn list_domains(&self, tenant_id: Uuid) -> Result<Vec<Domain>, AppError> {
        sqlx::query_as::<_, Domain>(
            "SELECT * FROM domains WHERE tenant_id = $1 ORDER BY name, created_utc",
        )
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id))]
    async fn get_domain(&self, tenant_id: Uuid, id: Uuid) -> Result<Option<Domain>, AppError> {
        sqlx::query_as::<_, Domain>("SELECT * FROM domains WHERE tenant_id = $1 AND id = $2")
            .bind(tenant_id)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)
    }

    #[instrument(skip(self, domain), fields(tenant_id = %domain.tenant_id, domain_id = %domain.id))]
    async fn insert_domain(&self, domain: &Domain) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO domains (id, tenant_id, name, description, parent_id, level, path, is_active, created_utc, updated_utc)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(domain.id)
        .bind(domain.tenant_id)
        .bind(&domain.name)
        .bind(&domain.description)
        .bind(domain.parent_id)
        .bind(domain.level)
        .bind(&domain.path)
        .bind(domain.is_active)
        .bind(domain.created_utc)
        .bind(domain.updated_utc)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(())
    }

    #[instrument(skip(self, domain, descendants), fields(tenant_id = %domain.tenant_id, domain_id = %domain.id, descendants = descendants.len()))]
    async fn update_domain(&self, domain: &Domain, descendants: &[PathUpdate]) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;

        let result = sqlx::query(
            r#"
            UPDATE domains
            SET name = $3, description = $4, parent_id = $5, level = $6, path = $7,
                is_active = $8, updated_utc = $9
            WHERE tenant_id = $1 AND id = $2
            "#,
        )
        .bind(domain.tenant_id)
        .bind(domain.id)
        .bind(&domain.name)
        .bind(&domain.description)
        .bind(domain.parent_id)
        .bind(domain.level)
        .bind(&domain.path)
        .bind(domain.is_active)
        .bind(domain.updated_utc)
        .execute(&mut *tx)
        .await
        .map_err(db_error)?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(anyhow::anyhow!("Domain not found")));
        }

        for update in descendants {
            sqlx::query(
                "UPDATE domains SET level = $3, path = $4, updated_utc = $5 WHERE tenant_id = $1 AND id = $2",
            )
            .bind(domain.tenant_id)
            .bind(update.id)
            .bind(update.level)
            .bind(&update.path)
            .bind(domain.updated_utc)
            .execute(&mut *tx)
            .await
            .map_err(db_error)?;
        }

        tx.commit().await.map_err(db_error)?;
        Ok(())
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id))]
    async fn delete_domain(&self, tenant_id: Uuid, id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM domains WHERE tenant_id = $1 AND id = $2")
            .bind(tenant_id)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_error)?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id, kind = kind.as_str()))]
    async fn dependent_counts(&self, kind: TaxonomyKind, tenant_id: Uuid) -> Result<HashMap<Uuid, i64>, AppError> {
        let sql = match kind {
            TaxonomyKind::Organization => {
                "SELECT organization_id, COUNT(*) FROM assets WHERE tenant_id = $1 GROUP BY organization_id"
            }
            TaxonomyKind::Domain => {
                "SELECT domain_id, COUNT(*) FROM controls WHERE tenant_id = $1 GROUP BY domain_id"
            }
        };
        let rows = sqlx::query_as::<_, (Uuid, i64)>(sql)
            .bind(tenant_id)
            .fetch_all(&self.pool)
            .await
            .map_err(db_error)?;
        Ok(rows.into_iter().collect())
    }

    // -------------------------------------------------------------------------
    // Assets
    // -------------------------------------------------------------------------

    #[instrument(skip(self), fields(tenant_id = %tenant_id))]
    async fn list_assets(&self, tenant_id: Uuid) -> Result<Vec<Asset>, AppError> {
        sqlx::query_as::<_, Asset>(
            "SELECT * FROM assets WHERE tenant_id = $1 ORDER BY name, created_utc",
        )
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id))]
    async fn get_asset(&self, tenant_id: Uuid, id: Uuid) -> Result<Option<Asset>, AppError> {
        sqlx::query_as::<_, Asset>("SELECT * FROM assets WHERE tenant_id = $1 AND id = $2")
            .bind(tenant_id)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)
    }

    #[instrument(skip(self, asset), fields(tenant_id = %asset.tenant_id, asset_id = %asset.id))]
    async fn insert_asset(&self, asset: &Asset) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO assets (id, tenant_id, name, asset_type, owner_id, confidentiality, integrity, availability,
                                description, location, organization_id, is_active, created_utc, updated_utc)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            "#,
        )
        .bind(asset.id)
        .bind(asset.tenant_id)
        .bind(&asset.name)
        .bind(asset.asset_type.as_str())
        .bind(asset.owner_id)
        .bind(asset.classification.confidentiality.as_str())
        .bind(asset.classification.integrity.as_str())
        .bind(asset.classification.availability.as_str())
        .bind(&asset.description)
        .bind(&asset.location)
        .bind(asset.organization_id)
        .bind(asset.is_active)
        .bind(asset.created_utc)
        .bind(asset.updated_utc)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(())
    }

    #[instrument(skip(self, asset), fields(tenant_id = %asset.tenant_id, asset_id = %asset.id))]
    async fn update_asset(&self, asset: &Asset) -> Result<(), AppError> {
        let result = sqlx::query(
            r#"
            UPDATE assets
            SET name = $3, asset_type = $4, owner_id = $5, confidentiality = $6, integrity = $7,
                availability = $8, description = $9, location = $10, organization_id = $11,
                is_active = $12, updated_utc = $13
            WHERE tenant_id = $1 AND id = $2
            "#,
        )
        .bind(asset.tenant_id)
        .bind(asset.id)
        .bind(&asset.name)
        .bind(asset.asset_type.as_str())
        .bind(asset.owner_id)
        .bind(asset.classification.confidentiality.as_str())
        .bind(asset.classification.integrity.as_str())
        .bind(asset.classification.availability.as_str())
        .bind(&asset.description)
        .bind(&asset.location)
        .bind(asset.organization_id)
        .bind(asset.is_active)
        .bind(asset.updated_utc)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(anyhow::anyhow!("Asset not found")));
        }
        Ok(())
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id))]
    async fn delete_asset(&self, tenant_id: Uuid, id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM assets WHERE tenant_id = $1 AND id = $2")
            .bind(tenant_id)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_error)?;
        Ok(result.rows_affected() > 0)
    }

    // -------------------------------------------------------------------------
    // Credentials registry
    // -------------------------------------------------------------------------

    #[instrument(skip(self), fields(tenant_id = %tenant_id))]
    async fn list_credentials(&self, tenant_id: Uuid) -> Result<Vec<CredentialGrant>, AppError> {
        sqlx::query_as::<_, CredentialGrant>(
            "SELECT * FROM credentials_registry WHERE tenant_id = $1 ORDER BY created_utc DESC, id",
        )
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id))]
    async fn get_credential(&self, tenant_id: Uuid, id: Uuid) -> Result<Option<CredentialGrant>, AppError> {
        sqlx::query_as::<_, CredentialGrant>(
            "SELECT * FROM credentials_registry WHERE tenant_id = $1 AND id = $2",
        )
        .bind(tenant_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)
    }

    #[instrument(skip(self, grant), fields(tenant_id = %grant.tenant_id, credential_id = %grant.id))]
    async fn insert_credential(&self, grant: &CredentialGrant) -> Result<(), AppError> {
        let lc = &grant.lifecycle;
        sqlx::query(
            r#"
            INSERT INTO credentials_registry (id, tenant_id, asset_id, user_id, team_id, access_type, justification,
                                              valid_from, valid_until, is_active, approved_by, approved_at,
                                              last_audit_date, audit_notes, created_by, created_utc, updated_utc)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
            "#,
        )
        .bind(grant.id)
        .bind(grant.tenant_id)
        .bind(grant.asset_id)
        .bind(grant.user_id)
        .bind(grant.team_id)
        .bind(grant.access_type.as_str())
        .bind(&grant.justification)
        .bind(lc.valid_from)
        .bind(lc.valid_until)
        .bind(lc.is_active)
        .bind(lc.approved_by)
        .bind(lc.approved_at)
        .bind(lc.last_audit_date)
        .bind(&lc.audit_notes)
        .bind(grant.created_by)
        .bind(grant.created_utc)
        .bind(grant.updated_utc)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(())
    }

    #[instrument(skip(self, grant), fields(tenant_id = %grant.tenant_id, credential_id = %grant.id))]
    async fn update_credential(&self, grant: &CredentialGrant) -> Result<(), AppError> {
        let lc = &grant.lifecycle;
        let result = sqlx::query(
            r#"
            UPDATE credentials_registry
            SET asset_id = $3, user_id = $4, team_id = $5, access_type = $6, justification = $7,
                valid_from = $8, valid_until = $9, is_active = $10, approved_by = $11, approved_at = $12,
                last_audit_date = $13, audit_notes = $14, updated_utc = $15
            WHERE tenant_id = $1 AND id = $2
            "#,
        )
        .bind(grant.tenant_id)
        .bind(grant.id)
        .bind(grant.asset_id)
        .bind(grant.user_id)
        .bind(grant.team_id)
        .bind(grant.access_type.as_str())
        .bind(&grant.justification)
        .bind(lc.valid_from)
        .bind(lc.valid_until)
        .bind(lc.is_active)
        .bind(lc.approved_by)
        .bind(lc.approved_at)
        .bind(lc.last_audit_date)
        .bind(&lc.audit_notes)
        .bind(grant.updated_utc)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(anyhow::anyhow!("Credential not found")));
        }
        Ok(())
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id))]
    async fn delete_credential(&self, tenant_id: Uuid, id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM credentials_registry WHERE tenant_id = $1 AND id = $2")
            .bind(tenant_id)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_error)?;
        Ok(result.rows_affected() > 0)
    }

    // -------------------------------------------------------------------------
    // Privileged access
    // -------------------------------------------------------------------------

    #[instrument(skip(self), fields(tenant_id = %tenant_id))]
    async fn list_privileged_access(&self, tenant_id: Uuid) -> Result<Vec<PrivilegedAccess>, AppError> {
        sqlx::query_as::<_, PrivilegedAccess>(
            "SELECT * FROM privileged_access WHERE tenant_id = $1 ORDER BY created_utc DESC, id",
        )
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id))]
    async fn get_privileged_access(&self, tenant_id: Uuid, id: Uuid) -> Result<Option<PrivilegedAccess>, AppError> {
        sqlx::query_as::<_, PrivilegedAccess>(
            "SELECT * FROM privileged_access WHERE tenant_id = $1 AND id = $2",
        )
        .bind(tenant_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)
    }

    #[instrument(skip(self, access), fields(tenant_id = %access.tenant_id, access_id = %access.id))]
    async fn insert_privileged_access(&self, access: &PrivilegedAccess) -> Result<(), AppError> {
        let lc = &access.lifecycle;
        sqlx::query(
            r#"
            INSERT INTO privileged_access (id, tenant_id, user_id, scope_type, scope_id, access_level, justification,
                                           valid_from, valid_until, is_active, approved_by, approved_at,
                                           last_audit_date, audit_notes, created_by, created_utc, updated_utc)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
            "#,
        )
        .bind(access.id)
        .bind(access.tenant_id)
        .bind(access.user_id)
        .bind(access.scope_type.as_str())
        .bind(&access.scope_id)
        .bind(access.access_level.as_str())
        .bind(&access.justification)
        .bind(lc.valid_from)
        .bind(lc.valid_until)
        .bind(lc.is_active)
        .bind(lc.approved_by)
        .bind(lc.approved_at)
        .bind(lc.last_audit_date)
        .bind(&lc.audit_notes)
        .bind(access.created_by)
        .bind(access.created_utc)
        .bind(access.updated_utc)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(())
    }

    #[instrument(skip(self, access), fields(tenant_id = %access.tenant_id, access_id = %access.id))]
    async fn update_privileged_access(&self, access: &PrivilegedAccess) -> Result<(), AppError> {
        let lc = &access.lifecycle;
        let result = sqlx::query(
            r#"
            UPDATE privileged_access
            SET user_id = $3, scope_type = $4, scope_id = $5, access_level = $6, justification = $7,
                valid_from = $8, valid_until = $9, is_active = $10, approved_by = $11, approved_at = $12,
                last_audit_date = $13, audit_notes = $14, updated_utc = $15
            WHERE tenant_id = $1 AND id = $2
            "#,
        )
        .bind(access.tenant_id)
        .bind(access.id)
        .bind(access.user_id)
        .bind(access.scope_type.as_str())
        .bind(&access.scope_id)
        .bind(access.access_level.as_str())
        .bind(&access.justification)
        .bind(lc.valid_from)
        .bind(lc.valid_until)
        .bind(lc.is_active)
        .bind(lc.approved_by)
        .bind(lc.approved_at)
        .bind(lc.last_audit_date)
        .bind(&lc.audit_notes)
        .bind(access.updated_utc)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(anyhow::anyhow!("Privileged access not found")));
        }
        Ok(())
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id))]
    async fn delete_privileged_access(&self, tenant_id: Uuid, id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM privileged_access WHERE tenant_id = $1 AND id = $2")
            .bind(tenant_id)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_error)?;
        Ok(result.rows_affected() > 0)
    }
}
