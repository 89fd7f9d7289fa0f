//! Organization handlers.

use axum::{
    extract::{Json, Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;
use service_core::error::AppError;
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

use super::hierarchy::{check_deletable, find_node, place_node};
use super::{matches_search, paginate, Page};
use crate::middleware::TenantContext;
use crate::models::{
    CreateOrganizationRequest, Organization, OrganizationType, UpdateOrganizationRequest,
};
use crate::services::taxonomy::build_tree;
use crate::services::{TaxonomyKind, TreeNode};
use crate::startup::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct OrganizationListQuery {
    pub search: Option<String>,
    pub org_type: Option<OrganizationType>,
    pub parent_id: Option<Uuid>,
    pub is_active: Option<bool>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

/// GET /organizations
#[instrument(skip(state, query), fields(tenant_id = %tenant.tenant_id))]
pub async fn list_organizations(
    State(state): State<AppState>,
    tenant: TenantContext,
    Query(query): Query<OrganizationListQuery>,
) -> Result<Json<Page<Organization>>, AppError> {
    let orgs = state.store.list_organizations(tenant.tenant_id).await?;

    let filtered: Vec<Organization> = orgs
        .into_iter()
        .filter(|o| {
            matches_search(
                query.search.as_deref(),
                &[o.name.as_str(), o.description.as_deref().unwrap_or_default(), o.path.as_str()],
            )
        })
        .filter(|o| query.org_type.map_or(true, |t| o.org_type == t))
        .filter(|o| query.parent_id.map_or(true, |p| o.parent_id == Some(p)))
        .filter(|o| query.is_active.map_or(true, |a| o.is_active == a))
        .collect();

    Ok(Json(paginate(filtered, query.page, query.limit)))
}

/// GET /organizations/tree
#[instrument(skip(state), fields(tenant_id = %tenant.tenant_id))]
pub async fn organization_tree(
    State(state): State<AppState>,
    tenant: TenantContext,
) -> Result<Json<Vec<TreeNode<Organization>>>, AppError> {
    let orgs = state.store.list_organizations(tenant.tenant_id).await?;
    Ok(Json(build_tree(orgs)))
}

/// GET /organizations/:id
#[instrument(skip(state), fields(tenant_id = %tenant.tenant_id))]
pub async fn get_organization(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(id): Path<Uuid>,
) -> Result<Json<Organization>, AppError> {
    let org = state
        .store
        .get_organization(tenant.tenant_id, id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Organization not found")))?;
    Ok(Json(org))
}

/// POST /organizations
#[instrument(skip(state, req), fields(tenant_id = %tenant.tenant_id))]
pub async fn create_organization(
    State(state): State<AppState>,
    tenant: TenantContext,
    Json(req): Json<CreateOrganizationRequest>,
) -> Result<(StatusCode, Json<Organization>), AppError> {
    req.validate()?;
    let _writes = state.hierarchy_writes.lock().await;

    let all = state.store.list_organizations(tenant.tenant_id).await?;
    let mut org = Organization::new(
        tenant.tenant_id,
        req.name.trim().to_string(),
        req.org_type,
        req.description,
        req.parent_id,
        state.clock.now(),
    );
    if let Some(active) = req.is_active {
        org.is_active = active;
    }

    place_node(&mut org, &all, state.separator())?;
    state.store.insert_organization(&org).await?;

    info!(org_id = %org.id, path = %org.path, level = org.level, "Organization created");
    Ok((StatusCode::CREATED, Json(org)))
}

/// PUT /organizations/:id
///
/// Renames and re-parents rewrite the path of every descendant in the same
/// store transaction.
#[instrument(skip(state, req), fields(tenant_id = %tenant.tenant_id))]
pub async fn update_organization(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateOrganizationRequest>,
) -> Result<Json<Organization>, AppError> {
    req.validate()?;
    let _writes = state.hierarchy_writes.lock().await;

    let all = state.store.list_organizations(tenant.tenant_id).await?;
    let mut org = find_node(&all, id, "Organization")?;

    if let Some(name) = req.name {
        org.name = name.trim().to_string();
    }
    if let Some(org_type) = req.org_type {
        org.org_type = org_type;
    }
    if let Some(parent_id) = req.parent_id {
        org.parent_id = parent_id;
    }
    if let Some(description) = req.description {
        org.description = Some(description);
    }
    if let Some(active) = req.is_active {
        org.is_active = active;
    }
    org.updated_utc = state.clock.now();

    let descendants = place_node(&mut org, &all, state.separator())?;
    state.store.update_organization(&org, &descendants).await?;

    info!(
        org_id = %org.id,
        path = %org.path,
        descendants = descendants.len(),
        "Organization updated"
    );
    Ok(Json(org))
}

/// DELETE /organizations/:id
///
/// Refused while the organization has children or owns assets.
#[instrument(skip(state), fields(tenant_id = %tenant.tenant_id))]
pub async fn delete_organization(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    let _writes = state.hierarchy_writes.lock().await;
    let all = state.store.list_organizations(tenant.tenant_id).await?;
    let org = find_node(&all, id, "Organization")?;

    let counts = state
        .store
        .dependent_counts(TaxonomyKind::Organization, tenant.tenant_id)
        .await?;
    check_deletable(&org, &all, &counts)?;

    state.store.delete_organization(tenant.tenant_id, id).await?;
    info!(org_id = %id, "Organization deleted");
    Ok(StatusCode::NO_CONTENT)
}
