//! Persistence boundary and the in-memory implementation.

use async_trait::async_trait;
use service_core::error::AppError;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::taxonomy::{PathUpdate, TaxonomyKind};
use crate::models::{Asset, CredentialGrant, Domain, Organization, PrivilegedAccess};

/// Tenant-scoped storage used by the handlers.
///
/// Every read is filtered by tenant. Hierarchical updates write the entity
/// and all descendant path updates in one atomic step.
#[async_trait]
pub trait IsmsStore: Send + Sync {
    async fn health_check(&self) -> Result<(), AppError>;

    async fn list_organizations(&self, tenant_id: Uuid) -> Result<Vec<Organization>, AppError>;
    async fn get_organization(&self, tenant_id: Uuid, id: Uuid) -> Result<Option<Organization>, AppError>;
    async fn insert_organization(&self, org: &Organization) -> Result<(), AppError>;
    async fn update_organization(&self, org: &Organization, descendants: &[PathUpdate]) -> Result<(), AppError>;
    async fn delete_organization(&self, tenant_id: Uuid, id: Uuid) -> Result<bool, AppError>;

    async fn list_domains(&self, tenant_id: Uuid) -> Result<Vec<Domain>, AppError>;
    async fn get_domain(&self, tenant_id: Uuid, id: Uuid) -> Result<Option<Domain>, AppError>;
    async fn insert_domain(&self, domain: &Domain) -> Result<(), AppError>;
    async fn update_domain(&self, domain: &Domain, descendants: &[PathUpdate]) -> Result<(), AppError>;
    async fn delete_domain(&self, tenant_id: Uuid, id: Uuid) -> Result<bool, AppError>;

    /// Dependent resource counts per node: assets per organization, controls per domain.
    async fn dependent_counts(&self, kind: TaxonomyKind, tenant_id: Uuid) -> Result<HashMap<Uuid, i64>, AppError>;

    async fn list_assets(&self, tenant_id: Uuid) -> Result<Vec<Asset>, AppError>;
    async fn get_asset(&self, tenant_id: Uuid, id: Uuid) -> Result<Option<Asset>, AppError>;
    async fn insert_asset(&self, asset: &Asset) -> Result<(), AppError>;
    async fn update_asset(&self, asset: &Asset) -> Result<(), AppError>;
    /// Deleting an asset also deletes the credentials registered against it.
    async fn delete_asset(&self, tenant_id: Uuid, id: Uuid) -> Result<bool, AppError>;

    async fn list_credentials(&self, tenant_id: Uuid) -> Result<Vec<CredentialGrant>, AppError>;
    async fn get_credential(&self, tenant_id: Uuid, id: Uuid) -> Result<Option<CredentialGrant>, AppError>;
    async fn insert_credential(&self, grant: &CredentialGrant) -> Result<(), AppError>;
    async fn update_credential(&self, grant: &CredentialGrant) -> Result<(), AppError>;
    async fn delete_credential(&self, tenant_id: Uuid, id: Uuid) -> Result<bool, AppError>;

    async fn list_privileged_access(&self, tenant_id: Uuid) -> Result<Vec<PrivilegedAccess>, AppError>;
    async fn get_privileged_access(&self, tenant_id: Uuid, id: Uuid) -> Result<Option<PrivilegedAccess>, AppError>;
    async fn insert_privileged_access(&self, access: &PrivilegedAccess) -> Result<(), AppError>;
    async fn update_privileged_access(&self, access: &PrivilegedAccess) -> Result<(), AppError>;
    async fn delete_privileged_access(&self, tenant_id: Uuid, id: Uuid) -> Result<bool, AppError>;
}

#[derive(Default)]
struct Tables {
    organizations: HashMap<Uuid, Organization>,
    domains: HashMap<Uuid, Domain>,
    assets: HashMap<Uuid, Asset>,
    credentials: HashMap<Uuid, CredentialGrant>,
    privileged_access: HashMap<Uuid, PrivilegedAccess>,
    /// Controls per domain, keyed by (tenant, domain).
    controls: HashMap<(Uuid, Uuid), i64>,
}

/// Store backed by process memory. Used when no database is configured and in tests.
#[derive(Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `count` controls against a domain so the delete guard sees them.
    pub async fn attach_controls(&self, tenant_id: Uuid, domain_id: Uuid, count: i64) {
        let mut tables = self.tables.write().await;
        *tables.controls.entry((tenant_id, domain_id)).or_default() += count;
    }
}

fn not_found(what: &str) -> AppError {
    AppError::NotFound(anyhow::anyhow!("{} not found", what))
}

fn tenant_rows<T: Clone>(rows: &HashMap<Uuid, T>, tenant_of: impl Fn(&T) -> Uuid, tenant_id: Uuid) -> Vec<T> {
    rows.values()
        .filter(|row| tenant_of(*row) == tenant_id)
        .cloned()
        .collect()
}

fn tenant_row<T: Clone>(rows: &HashMap<Uuid, T>, tenant_of: impl Fn(&T) -> Uuid, tenant_id: Uuid, id: Uuid) -> Option<T> {
    rows.get(&id).filter(|row| tenant_of(*row) == tenant_id).cloned()
}

fn remove_tenant_row<T>(rows: &mut HashMap<Uuid, T>, tenant_of: impl Fn(&T) -> Uuid, tenant_id: Uuid, id: Uuid) -> bool {
    match rows.get(&id) {
        Some(row) if tenant_of(row) == tenant_id => rows.remove(&id).is_some(),
        _ => false,
    }
}

fn replace_tenant_row<T>(rows: &mut HashMap<Uuid, T>, tenant_of: impl Fn(&T) -> Uuid, id: Uuid, row: T, what: &str) -> Result<(), AppError> {
    match rows.get_mut(&id) {
        Some(existing) if tenant_of(&*existing) == tenant_of(&row) => {
            *existing = row;
            Ok(())
        }
        _ => Err(not_found(what)),
    }
}

#[async_trait]
impl IsmsStore for InMemoryStore {
    async fn health_check(&self) -> Result<(), AppError> {
        Ok(())
    }

    async fn list_organizations(&self, tenant_id: Uuid) -> Result<Vec<Organization>, AppError> {
        let tables = self.tables.read().await;
        let mut rows = tenant_rows(&tables.organizations, |o| o.tenant_id, tenant_id);
        rows.sort_by(|a, b| a.name.cmp(&b.name).then(a.created_utc.cmp(&b.created_utc)));
        Ok(rows)
    }

    async fn get_organization(&self, tenant_id: Uuid, id: Uuid) -> Result<Option<Organization>, AppError> {
        let tables = self.tables.read().await;
        Ok(tenant_row(&tables.organizations, |o| o.tenant_id, tenant_id, id))
    }

    async fn insert_organization(&self, org: &Organization) -> Result<(), AppError> {
        let mut tables = self.tables.write().await;
        tables.organizations.insert(org.id, org.clone());
        Ok(())
    }

    async fn update_organization(&self, org: &Organization, descendants: &[PathUpdate]) -> Result<(), AppError> {
        let mut tables = self.tables.write().await;
        replace_tenant_row(&mut tables.organizations, |o| o.tenant_id, org.id, org.clone(), "Organization")?;
        for update in descendants {
            if let Some(node) = tables.organizations.get_mut(&update.id) {
                if node.tenant_id == org.tenant_id {
                    node.level = update.level;
                    node.path = update.path.clone();
                    node.updated_utc = org.updated_utc;
                }
            }
        }
        Ok(())
    }

    async fn delete_organization(&self, tenant_id: Uuid, id: Uuid) -> Result<bool, AppError> {
        let mut tables = self.tables.write().await;
        Ok(remove_tenant_row(&mut tables.organizations, |o| o.tenant_id, tenant_id, id))
    }

    async fn list_domains(&self, tenant_id: Uuid) -> Result<Vec<Domain>, AppError> {
        let tables = self.tables.read().await;
        let mut rows = tenant_rows(&tables.domains, |d| d.tenant_id, tenant_id);
        rows.sort_by(|a, b| a.name.cmp(&b.name).then(a.created_utc.cmp(&b.created_utc)));
        Ok(rows)
    }

    async fn get_domain(&self, tenant_id: Uuid, id: Uuid) -> Result<Option<Domain>, AppError> {
        let tables = self.tables.read().await;
        Ok(tenant_row(&tables.domains, |d| d.tenant_id, tenant_id, id))
    }

    async fn insert_domain(&self, domain: &Domain) -> Result<(), AppError> {
        let mut tables = self.tables.write().await;
        tables.domains.insert(domain.id, domain.clone());
        Ok(())
    }

    async fn update_domain(&self, domain: &Domain, descendants: &[PathUpdate]) -> Result<(), AppError> {
        let mut tables = self.tables.write().await;
        replace_tenant_row(&mut tables.domains, |d| d.tenant_id, domain.id, domain.clone(), "Domain")?;
        for update in descendants {
            if let Some(node) = tables.domains.get_mut(&update.id) {
                if node.tenant_id == domain.tenant_id {
                    node.level = update.level;
                    node.path = update.path.clone();
                    node.updated_utc = domain.updated_utc;
                }
            }
        }
        Ok(())
    }

    async fn delete_domain(&self, tenant_id: Uuid, id: Uuid) -> Result<bool, AppError> {
        let mut tables = self.tables.write().await;
        let removed = remove_tenant_row(&mut tables.domains, |d| d.tenant_id, tenant_id, id);
        if removed {
            tables.controls.remove(&(tenant_id, id));
        }
        Ok(removed)
    }

    async fn dependent_counts(&self, kind: TaxonomyKind, tenant_id: Uuid) -> Result<HashMap<Uuid, i64>, AppError> {
        let tables = self.tables.read().await;
        let mut counts: HashMap<Uuid, i64> = HashMap::new();
        match kind {
            TaxonomyKind::Organization => {
                for asset in tables.assets.values().filter(|a| a.tenant_id == tenant_id) {
                    *counts.entry(asset.organization_id).or_default() += 1;
                }
            }
            TaxonomyKind::Domain => {
                for ((tenant, domain_id), count) in &tables.controls {
                    if *tenant == tenant_id && *count > 0 {
                        counts.insert(*domain_id, *count);
                    }
                }
            }
        }
        Ok(counts)
    }

    async fn list_assets(&self, tenant_id: Uuid) -> Result<Vec<Asset>, AppError> {
        let tables = self.tables.read().await;
        let mut rows = tenant_rows(&tables.assets, |a| a.tenant_id, tenant_id);
        rows.sort_by(|a, b| a.name.cmp(&b.name).then(a.created_utc.cmp(&b.created_utc)));
        Ok(rows)
    }

    async fn get_asset(&self, tenant_id: Uuid, id: Uuid) -> Result<Option<Asset>, AppError> {
        let tables = self.tables.read().await;
        Ok(tenant_row(&tables.assets, |a| a.tenant_id, tenant_id, id))
    }

    async fn insert_asset(&self, asset: &Asset) -> Result<(), AppError> {
        let mut tables = self.tables.write().await;
        tables.assets.insert(asset.id, asset.clone());
        Ok(())
    }

    async fn update_asset(&self, asset: &Asset) -> Result<(), AppError> {
        let mut tables = self.tables.write().await;
        replace_tenant_row(&mut tables.assets, |a| a.tenant_id, asset.id, asset.clone(), "Asset")
    }

    async fn delete_asset(&self, tenant_id: Uuid, id: Uuid) -> Result<bool, AppError> {
        let mut tables = self.tables.write().await;
        let removed = remove_tenant_row(&mut tables.assets, |a| a.tenant_id, tenant_id, id);
        if removed {
            tables.credentials.retain(|_, c| c.asset_id != id);
        }
        Ok(removed)
    }

    async fn list_credentials(&self, tenant_id: Uuid) -> Result<Vec<CredentialGrant>, AppError> {
        let tables = self.tables.read().await;
        let mut rows = tenant_rows(&tables.credentials, |c| c.tenant_id, tenant_id);
        rows.sort_by(|a, b| b.created_utc.cmp(&a.created_utc).then(a.id.cmp(&b.id)));
        Ok(rows)
    }

    async fn get_credential(&self, tenant_id: Uuid, id: Uuid) -> Result<Option<CredentialGrant>, AppError> {
        let tables = self.tables.read().await;
        Ok(tenant_row(&tables.credentials, |c| c.tenant_id, tenant_id, id))
    }

    async fn insert_credential(&self, grant: &CredentialGrant) -> Result<(), AppError> {
        let mut tables = self.tables.write().await;
        tables.credentials.insert(grant.id, grant.clone());
        Ok(())
    }

    async fn update_credential(&self, grant: &CredentialGrant) -> Result<(), AppError> {
        let mut tables = self.tables.write().await;
        replace_tenant_row(&mut tables.credentials, |c| c.tenant_id, grant.id, grant.clone(), "Credential")
    }

    async fn delete_credential(&self, tenant_id: Uuid, id: Uuid) -> Result<bool, AppError> {
        let mut tables = self.tables.write().await;
        Ok(remove_tenant_row(&mut tables.credentials, |c| c.tenant_id, tenant_id, id))
    }

    async fn list_privileged_access(&self, tenant_id: Uuid) -> Result<Vec<PrivilegedAccess>, AppError> {
        let tables = self.tables.read().await;
        let mut rows = tenant_rows(&tables.privileged_access, |p| p.tenant_id, tenant_id);
        rows.sort_by(|a, b| b.created_utc.cmp(&a.created_utc).then(a.id.cmp(&b.id)));
        Ok(rows)
    }

    async fn get_privileged_access(&self, tenant_id: Uuid, id: Uuid) -> Result<Option<PrivilegedAccess>, AppError> {
        let tables = self.tables.read().await;
        Ok(tenant_row(&tables.privileged_access, |p| p.tenant_id, tenant_id, id))
    }

    async fn insert_privileged_access(&self, access: &PrivilegedAccess) -> Result<(), AppError> {
        let mut tables = self.tables.write().await;
        tables.privileged_access.insert(access.id, access.clone());
        Ok(())
    }

    async fn update_privileged_access(&self, access: &PrivilegedAccess) -> Result<(), AppError> {
        let mut tables = self.tables.write().await;
        replace_tenant_row(&mut tables.privileged_access, |p| p.tenant_id, access.id, access.clone(), "Privileged access")
    }

    async fn delete_privileged_access(&self, tenant_id: Uuid, id: Uuid) -> Result<bool, AppError> {
        let mut tables = self.tables.write().await;
        Ok(remove_tenant_row(&mut tables.privileged_access, |p| p.tenant_id, tenant_id, id))
    }
}
