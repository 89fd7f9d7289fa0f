//! Credentials registry handlers.

use axum::{
    extract::{Json, Path, Query, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};
use service_core::error::AppError;
use std::collections::BTreeMap;
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

use super::grants::{self, load_grant, view, AuditRequest, RenewRequest};
use super::{matches_search, paginate, GrantView, Page};
use crate::middleware::TenantContext;
use crate::models::{
    CreateCredentialRequest, CredentialAccessType, CredentialGrant, GrantLifecycle, GrantStatus,
    UpdateCredentialRequest,
};
use crate::services::metrics::record_lifecycle_transition;
use crate::services::{lifecycle, LifecycleError, TimeBoundGrant};
use crate::startup::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct CredentialListQuery {
    pub search: Option<String>,
    pub asset_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    pub team_id: Option<Uuid>,
    pub access_type: Option<CredentialAccessType>,
    pub is_active: Option<bool>,
    pub status: Option<GrantStatus>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct CredentialStats {
    pub total: usize,
    pub active: usize,
    pub pending_approval: usize,
    pub expiring_soon: usize,
    pub expired: usize,
    pub by_access_type: BTreeMap<&'static str, usize>,
    pub by_asset: BTreeMap<Uuid, usize>,
}

/// GET /credentials
#[instrument(skip(state, query), fields(tenant_id = %tenant.tenant_id))]
pub async fn list_credentials(
    State(state): State<AppState>,
    tenant: TenantContext,
    Query(query): Query<CredentialListQuery>,
) -> Result<Json<Page<GrantView<CredentialGrant>>>, AppError> {
    let records = state.store.list_credentials(tenant.tenant_id).await?;

    let filtered: Vec<GrantView<CredentialGrant>> = records
        .into_iter()
        .filter(|g| matches_search(query.search.as_deref(), &[g.justification.as_str()]))
        .filter(|g| query.asset_id.map_or(true, |a| g.asset_id == a))
        .filter(|g| query.user_id.map_or(true, |u| g.user_id == Some(u)))
        .filter(|g| query.team_id.map_or(true, |t| g.team_id == Some(t)))
        .filter(|g| query.access_type.map_or(true, |t| g.access_type == t))
        .filter(|g| query.is_active.map_or(true, |a| g.lifecycle.is_active == a))
        .map(|g| view(&state, g))
        .filter(|v| query.status.map_or(true, |s| v.status == s))
        .collect();

    Ok(Json(paginate(filtered, query.page, query.limit)))
}

/// GET /credentials/stats
#[instrument(skip(state), fields(tenant_id = %tenant.tenant_id))]
pub async fn credential_stats(
    State(state): State<AppState>,
    tenant: TenantContext,
) -> Result<Json<CredentialStats>, AppError> {
    let records = state.store.list_credentials(tenant.tenant_id).await?;
    let now = state.clock.now();

    let mut stats = CredentialStats {
        total: records.len(),
        active: 0,
        pending_approval: 0,
        expiring_soon: 0,
        expired: 0,
        by_access_type: BTreeMap::new(),
        by_asset: BTreeMap::new(),
    };

    for grant in &records {
        match lifecycle::status(grant, &state.policy, now) {
            GrantStatus::Revoked => {}
            GrantStatus::Expired => stats.expired += 1,
            GrantStatus::ExpiringSoon => {
                stats.active += 1;
                stats.expiring_soon += 1;
            }
            GrantStatus::NeedsAudit | GrantStatus::Active => stats.active += 1,
        }
        if grant.lifecycle.is_active && !grant.lifecycle.is_approved() {
            stats.pending_approval += 1;
        }
        *stats.by_access_type.entry(grant.access_type.as_str()).or_default() += 1;
        *stats.by_asset.entry(grant.asset_id).or_default() += 1;
    }

    Ok(Json(stats))
}

/// GET /credentials/:id
#[instrument(skip(state), fields(tenant_id = %tenant.tenant_id))]
pub async fn get_credential(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(id): Path<Uuid>,
) -> Result<Json<GrantView<CredentialGrant>>, AppError> {
    let grant: CredentialGrant = load_grant(&state, tenant.tenant_id, id).await?;
    Ok(Json(view(&state, grant)))
}

/// POST /credentials
///
/// New grants start unapproved.
#[instrument(skip(state, req), fields(tenant_id = %tenant.tenant_id))]
pub async fn create_credential(
    State(state): State<AppState>,
    tenant: TenantContext,
    Json(req): Json<CreateCredentialRequest>,
) -> Result<(StatusCode, Json<GrantView<CredentialGrant>>), AppError> {
    req.validate()?;
    lifecycle::validate_holder(req.user_id, req.team_id)?;
    lifecycle::validate_window(req.valid_from, req.valid_until)?;

    state
        .store
        .get_asset(tenant.tenant_id, req.asset_id)
        .await?
        .ok_or_else(|| AppError::BadRequest(anyhow::anyhow!("Asset {} not found", req.asset_id)))?;

    let now = state.clock.now();
    let grant = CredentialGrant {
        id: Uuid::new_v4(),
        tenant_id: tenant.tenant_id,
        asset_id: req.asset_id,
        user_id: req.user_id,
        team_id: req.team_id,
        access_type: req.access_type,
        justification: req.justification,
        lifecycle: GrantLifecycle::pending(req.valid_from, req.valid_until),
        created_by: tenant.user_id,
        created_utc: now,
        updated_utc: now,
    };
    state.store.insert_credential(&grant).await?;
    record_lifecycle_transition(CredentialGrant::KIND, "create");

    info!(credential_id = %grant.id, asset_id = %grant.asset_id, "Credential registered");
    Ok((StatusCode::CREATED, Json(view(&state, grant))))
}

/// PUT /credentials/:id
///
/// Revoked grants are terminal and cannot be edited.
#[instrument(skip(state, req), fields(tenant_id = %tenant.tenant_id))]
pub async fn update_credential(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateCredentialRequest>,
) -> Result<Json<GrantView<CredentialGrant>>, AppError> {
    req.validate()?;

    let mut grant: CredentialGrant = load_grant(&state, tenant.tenant_id, id).await?;
    if !grant.lifecycle.is_active {
        return Err(LifecycleError::NotActive.into());
    }

    if let Some(access_type) = req.access_type {
        grant.access_type = access_type;
    }
    if let Some(justification) = req.justification {
        grant.justification = justification;
    }
    if let Some(valid_from) = req.valid_from {
        grant.lifecycle.valid_from = valid_from;
    }
    if let Some(valid_until) = req.valid_until {
        grant.lifecycle.valid_until = valid_until;
    }
    lifecycle::validate_window(grant.lifecycle.valid_from, grant.lifecycle.valid_until)?;
    grant.updated_utc = state.clock.now();

    state.store.update_credential(&grant).await?;
    info!(credential_id = %grant.id, "Credential updated");
    Ok(Json(view(&state, grant)))
}

/// DELETE /credentials/:id
#[instrument(skip(state), fields(tenant_id = %tenant.tenant_id))]
pub async fn delete_credential(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    if !state.store.delete_credential(tenant.tenant_id, id).await? {
        return Err(AppError::NotFound(anyhow::anyhow!("Credential not found")));
    }
    info!(credential_id = %id, "Credential deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// POST /credentials/:id/approve
pub async fn approve_credential(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(id): Path<Uuid>,
) -> Result<Json<GrantView<CredentialGrant>>, AppError> {
    Ok(Json(grants::approve::<CredentialGrant>(&state, tenant, id).await?))
}

/// POST /credentials/:id/revoke
pub async fn revoke_credential(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(id): Path<Uuid>,
) -> Result<Json<GrantView<CredentialGrant>>, AppError> {
    Ok(Json(grants::revoke::<CredentialGrant>(&state, tenant, id).await?))
}

/// POST /credentials/:id/renew
pub async fn renew_credential(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(id): Path<Uuid>,
    Json(req): Json<RenewRequest>,
) -> Result<Json<GrantView<CredentialGrant>>, AppError> {
    Ok(Json(grants::renew::<CredentialGrant>(&state, tenant, id, req).await?))
}

/// POST /credentials/:id/audit
pub async fn audit_credential(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(id): Path<Uuid>,
    Json(req): Json<AuditRequest>,
) -> Result<Json<GrantView<CredentialGrant>>, AppError> {
    Ok(Json(grants::audit::<CredentialGrant>(&state, tenant, id, req).await?))
}
