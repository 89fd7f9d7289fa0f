//! Control domain handlers.

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
use crate::models::{CreateDomainRequest, Domain, UpdateDomainRequest};
use crate::services::taxonomy::build_tree;
use crate::services::{TaxonomyKind, TreeNode};
use crate::startup::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct DomainListQuery {
    pub search: Option<String>,
    pub parent_id: Option<Uuid>,
    pub level: Option<i32>,
    pub is_active: Option<bool>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

/// GET /domains
#[instrument(skip(state, query), fields(tenant_id = %tenant.tenant_id))]
pub async fn list_domains(
    State(state): State<AppState>,
    tenant: TenantContext,
    Query(query): Query<DomainListQuery>,
) -> Result<Json<Page<Domain>>, AppError> {
    let domains = state.store.list_domains(tenant.tenant_id).await?;

    let filtered: Vec<Domain> = domains
        .into_iter()
        .filter(|d| {
            matches_search(
                query.search.as_deref(),
                &[d.name.as_str(), d.description.as_str(), d.path.as_str()],
            )
        })
        .filter(|d| query.parent_id.map_or(true, |p| d.parent_id == Some(p)))
        .filter(|d| query.level.map_or(true, |l| d.level == l))
        .filter(|d| query.is_active.map_or(true, |a| d.is_active == a))
        .collect();

    Ok(Json(paginate(filtered, query.page, query.limit)))
}

/// GET /domains/tree
#[instrument(skip(state), fields(tenant_id = %tenant.tenant_id))]
pub async fn domain_tree(
    State(state): State<AppState>,
    tenant: TenantContext,
) -> Result<Json<Vec<TreeNode<Domain>>>, AppError> {
    let domains = state.store.list_domains(tenant.tenant_id).await?;
    Ok(Json(build_tree(domains)))
}

/// GET /domains/:id
#[instrument(skip(state), fields(tenant_id = %tenant.tenant_id))]
pub async fn get_domain(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(id): Path<Uuid>,
) -> Result<Json<Domain>, AppError> {
    let domain = state
        .store
        .get_domain(tenant.tenant_id, id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Domain not found")))?;
    Ok(Json(domain))
}

/// POST /domains
#[instrument(skip(state, req), fields(tenant_id = %tenant.tenant_id))]
pub async fn create_domain(
    State(state): State<AppState>,
    tenant: TenantContext,
    Json(req): Json<CreateDomainRequest>,
) -> Result<(StatusCode, Json<Domain>), AppError> {
    req.validate()?;
    let _writes = state.hierarchy_writes.lock().await;

    let all = state.store.list_domains(tenant.tenant_id).await?;
    let mut domain = Domain::new(
        tenant.tenant_id,
        req.name.trim().to_string(),
        req.description,
        req.parent_id,
        state.clock.now(),
    );
    if let Some(active) = req.is_active {
        domain.is_active = active;
    }

    place_node(&mut domain, &all, state.separator())?;
    state.store.insert_domain(&domain).await?;

    info!(domain_id = %domain.id, path = %domain.path, level = domain.level, "Domain created");
    Ok((StatusCode::CREATED, Json(domain)))
}

/// PUT /domains/:id
#[instrument(skip(state, req), fields(tenant_id = %tenant.tenant_id))]
pub async fn update_domain(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateDomainRequest>,
) -> Result<Json<Domain>, AppError> {
    req.validate()?;
    let _writes = state.hierarchy_writes.lock().await;

    let all = state.store.list_domains(tenant.tenant_id).await?;
    let mut domain = find_node(&all, id, "Domain")?;

    if let Some(name) = req.name {
        domain.name = name.trim().to_string();
    }
    if let Some(description) = req.description {
        domain.description = description;
    }
    if let Some(parent_id) = req.parent_id {
        domain.parent_id = parent_id;
    }
    if let Some(active) = req.is_active {
        domain.is_active = active;
    }
    domain.updated_utc = state.clock.now();

    let descendants = place_node(&mut domain, &all, state.separator())?;
    state.store.update_domain(&domain, &descendants).await?;

    info!(
        domain_id = %domain.id,
        path = %domain.path,
        descendants = descendants.len(),
        "Domain updated"
    );
    Ok(Json(domain))
}

/// DELETE /domains/:id
///
/// Refused while the domain has sub-domains or controls.
#[instrument(skip(state), fields(tenant_id = %tenant.tenant_id))]
pub async fn delete_domain(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    let _writes = state.hierarchy_writes.lock().await;
    let all = state.store.list_domains(tenant.tenant_id).await?;
    let domain = find_node(&all, id, "Domain")?;

    let counts = state
        .store
        .dependent_counts(TaxonomyKind::Domain, tenant.tenant_id)
        .await?;
    check_deletable(&domain, &all, &counts)?;

    state.store.delete_domain(tenant.tenant_id, id).await?;
    info!(domain_id = %id, "Domain deleted");
    Ok(StatusCode::NO_CONTENT)
}
