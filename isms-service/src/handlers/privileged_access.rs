//! Privileged access handlers.

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
    CreatePrivilegedAccessRequest, GrantLifecycle, GrantStatus, PrivilegedAccess,
    PrivilegedAccessLevel, ScopeType, UpdatePrivilegedAccessRequest,
};
use crate::services::metrics::record_lifecycle_transition;
use crate::services::{lifecycle, LifecycleError, TimeBoundGrant};
use crate::startup::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct PrivilegedAccessListQuery {
    pub search: Option<String>,
    pub user_id: Option<Uuid>,
    pub scope_type: Option<ScopeType>,
    pub scope_id: Option<String>,
    pub access_level: Option<PrivilegedAccessLevel>,
    pub is_active: Option<bool>,
    pub status: Option<GrantStatus>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct PrivilegedAccessStats {
    pub total: usize,
    pub active: usize,
    pub pending_approval: usize,
    pub needs_audit: usize,
    pub expiring_soon: usize,
    pub expired: usize,
    pub by_scope_type: BTreeMap<&'static str, usize>,
    pub by_access_level: BTreeMap<&'static str, usize>,
}

/// GET /privileged-access
#[instrument(skip(state, query), fields(tenant_id = %tenant.tenant_id))]
pub async fn list_privileged_access(
    State(state): State<AppState>,
    tenant: TenantContext,
    Query(query): Query<PrivilegedAccessListQuery>,
) -> Result<Json<Page<GrantView<PrivilegedAccess>>>, AppError> {
    let records = state.store.list_privileged_access(tenant.tenant_id).await?;

    let filtered: Vec<GrantView<PrivilegedAccess>> = records
        .into_iter()
        .filter(|p| {
            matches_search(
                query.search.as_deref(),
                &[p.scope_id.as_str(), p.justification.as_str()],
            )
        })
        .filter(|p| query.user_id.map_or(true, |u| p.user_id == u))
        .filter(|p| query.scope_type.map_or(true, |s| p.scope_type == s))
        .filter(|p| query.scope_id.as_deref().map_or(true, |s| p.scope_id == s))
        .filter(|p| query.access_level.map_or(true, |l| p.access_level == l))
        .filter(|p| query.is_active.map_or(true, |a| p.lifecycle.is_active == a))
        .map(|p| view(&state, p))
        .filter(|v| query.status.map_or(true, |s| v.status == s))
        .collect();

    Ok(Json(paginate(filtered, query.page, query.limit)))
}

/// GET /privileged-access/stats
#[instrument(skip(state), fields(tenant_id = %tenant.tenant_id))]
pub async fn privileged_access_stats(
    State(state): State<AppState>,
    tenant: TenantContext,
) -> Result<Json<PrivilegedAccessStats>, AppError> {
    let records = state.store.list_privileged_access(tenant.tenant_id).await?;
    let now = state.clock.now();

    let mut stats = PrivilegedAccessStats {
        total: records.len(),
        active: 0,
        pending_approval: 0,
        needs_audit: 0,
        expiring_soon: 0,
        expired: 0,
        by_scope_type: BTreeMap::new(),
        by_access_level: BTreeMap::new(),
    };

    for access in &records {
        match lifecycle::status(access, &state.policy, now) {
            GrantStatus::Revoked => {}
            GrantStatus::Expired => stats.expired += 1,
            GrantStatus::ExpiringSoon => {
                stats.active += 1;
                stats.expiring_soon += 1;
            }
            GrantStatus::NeedsAudit | GrantStatus::Active => stats.active += 1,
        }
        // Counted apart from status so expiring or expired grants still show as due.
        if lifecycle::audit_due(access, &state.policy, now) {
            stats.needs_audit += 1;
        }
        if access.lifecycle.is_active && !access.lifecycle.is_approved() {
            stats.pending_approval += 1;
        }
        *stats.by_scope_type.entry(access.scope_type.as_str()).or_default() += 1;
        *stats.by_access_level.entry(access.access_level.as_str()).or_default() += 1;
    }

    Ok(Json(stats))
}

/// GET /privileged-access/:id
#[instrument(skip(state), fields(tenant_id = %tenant.tenant_id))]
pub async fn get_privileged_access(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(id): Path<Uuid>,
) -> Result<Json<GrantView<PrivilegedAccess>>, AppError> {
    let access: PrivilegedAccess = load_grant(&state, tenant.tenant_id, id).await?;
    Ok(Json(view(&state, access)))
}

/// POST /privileged-access
#[instrument(skip(state, req), fields(tenant_id = %tenant.tenant_id))]
pub async fn create_privileged_access(
    State(state): State<AppState>,
    tenant: TenantContext,
    Json(req): Json<CreatePrivilegedAccessRequest>,
) -> Result<(StatusCode, Json<GrantView<PrivilegedAccess>>), AppError> {
    req.validate()?;
    lifecycle::validate_window(req.valid_from, req.valid_until)?;

    let now = state.clock.now();
    let access = PrivilegedAccess {
        id: Uuid::new_v4(),
        tenant_id: tenant.tenant_id,
        user_id: req.user_id,
        scope_type: req.scope_type,
        scope_id: req.scope_id.trim().to_string(),
        access_level: req.access_level,
        justification: req.justification,
        lifecycle: GrantLifecycle::pending(req.valid_from, req.valid_until),
        created_by: tenant.user_id,
        created_utc: now,
        updated_utc: now,
    };
    state.store.insert_privileged_access(&access).await?;
    record_lifecycle_transition(PrivilegedAccess::KIND, "create");

    info!(
        access_id = %access.id,
        scope_type = access.scope_type.as_str(),
        access_level = access.access_level.as_str(),
        "Privileged access granted"
    );
    Ok((StatusCode::CREATED, Json(view(&state, access))))
}

/// PUT /privileged-access/:id
#[instrument(skip(state, req), fields(tenant_id = %tenant.tenant_id))]
pub async fn update_privileged_access(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdatePrivilegedAccessRequest>,
) -> Result<Json<GrantView<PrivilegedAccess>>, AppError> {
    req.validate()?;

    let mut access: PrivilegedAccess = load_grant(&state, tenant.tenant_id, id).await?;
    if !access.lifecycle.is_active {
        return Err(LifecycleError::NotActive.into());
    }

    if let Some(scope_type) = req.scope_type {
        access.scope_type = scope_type;
    }
    if let Some(scope_id) = req.scope_id {
        access.scope_id = scope_id.trim().to_string();
    }
    if let Some(access_level) = req.access_level {
        access.access_level = access_level;
    }
    if let Some(justification) = req.justification {
        access.justification = justification;
    }
    if let Some(valid_from) = req.valid_from {
        access.lifecycle.valid_from = valid_from;
    }
    if let Some(valid_until) = req.valid_until {
        access.lifecycle.valid_until = valid_until;
    }
    lifecycle::validate_window(access.lifecycle.valid_from, access.lifecycle.valid_until)?;
    access.updated_utc = state.clock.now();

    state.store.update_privileged_access(&access).await?;
    info!(access_id = %access.id, "Privileged access updated");
    Ok(Json(view(&state, access)))
}

/// DELETE /privileged-access/:id
#[instrument(skip(state), fields(tenant_id = %tenant.tenant_id))]
pub async fn delete_privileged_access(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    if !state.store.delete_privileged_access(tenant.tenant_id, id).await? {
        return Err(AppError::NotFound(anyhow::anyhow!("Privileged access not found")));
    }
    info!(access_id = %id, "Privileged access deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// POST /privileged-access/:id/approve
pub async fn approve_privileged_access(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(id): Path<Uuid>,
) -> Result<Json<GrantView<PrivilegedAccess>>, AppError> {
    Ok(Json(grants::approve::<PrivilegedAccess>(&state, tenant, id).await?))
}

/// POST /privileged-access/:id/revoke
pub async fn revoke_privileged_access(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(id): Path<Uuid>,
) -> Result<Json<GrantView<PrivilegedAccess>>, AppError> {
    Ok(Json(grants::revoke::<PrivilegedAccess>(&state, tenant, id).await?))
}

/// POST /privileged-access/:id/renew
pub async fn renew_privileged_access(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(id): Path<Uuid>,
    Json(req): Json<RenewRequest>,
) -> Result<Json<GrantView<PrivilegedAccess>>, AppError> {
    Ok(Json(grants::renew::<PrivilegedAccess>(&state, tenant, id, req).await?))
}

/// POST /privileged-access/:id/audit
///
/// Records the periodic review; clears the needs-audit status for another interval.
pub async fn audit_privileged_access(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(id): Path<Uuid>,
    Json(req): Json<AuditRequest>,
) -> Result<Json<GrantView<PrivilegedAccess>>, AppError> {
    Ok(Json(grants::audit::<PrivilegedAccess>(&state, tenant, id, req).await?))
}
