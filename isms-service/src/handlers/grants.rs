//! Lifecycle transitions shared by the credential and privileged-access routes.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use service_core::error::AppError;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use super::GrantView;
use crate::middleware::TenantContext;
use crate::models::{not_blank, CredentialGrant, PrivilegedAccess};
use crate::services::metrics::record_lifecycle_transition;
use crate::services::{lifecycle, IsmsStore, LifecycleError, TimeBoundGrant};
use crate::startup::AppState;

/// Body of POST …/renew.
#[derive(Debug, Deserialize)]
pub struct RenewRequest {
    pub valid_until: DateTime<Utc>,
}

/// Body of POST …/audit.
#[derive(Debug, Deserialize, Validate)]
pub struct AuditRequest {
    #[validate(
        length(min = 1, max = 2000, message = "Audit notes are required"),
        custom(function = "not_blank")
    )]
    pub notes: String,
}

/// Storage access for a grant kind.
#[async_trait]
pub(crate) trait GrantRecord: TimeBoundGrant + Serialize + Send + Sync + 'static {
    const LABEL: &'static str;

    async fn load(store: &dyn IsmsStore, tenant_id: Uuid, id: Uuid) -> Result<Option<Self>, AppError>;
    async fn save(store: &dyn IsmsStore, grant: &Self) -> Result<(), AppError>;
}

#[async_trait]
impl GrantRecord for CredentialGrant {
    const LABEL: &'static str = "Credential";

    async fn load(store: &dyn IsmsStore, tenant_id: Uuid, id: Uuid) -> Result<Option<Self>, AppError> {
        store.get_credential(tenant_id, id).await
    }

    async fn save(store: &dyn IsmsStore, grant: &Self) -> Result<(), AppError> {
        store.update_credential(grant).await
    }
}

#[async_trait]
impl GrantRecord for PrivilegedAccess {
    const LABEL: &'static str = "Privileged access";

    async fn load(store: &dyn IsmsStore, tenant_id: Uuid, id: Uuid) -> Result<Option<Self>, AppError> {
        store.get_privileged_access(tenant_id, id).await
    }

    async fn save(store: &dyn IsmsStore, grant: &Self) -> Result<(), AppError> {
        store.update_privileged_access(grant).await
    }
}

pub(crate) async fn load_grant<G: GrantRecord>(
    state: &AppState,
    tenant_id: Uuid,
    id: Uuid,
) -> Result<G, AppError> {
    G::load(state.store.as_ref(), tenant_id, id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("{} not found", G::LABEL)))
}

pub(crate) fn view<G: GrantRecord>(state: &AppState, grant: G) -> GrantView<G> {
    GrantView::new(grant, &state.policy, state.clock.now())
}

fn rejected<G: GrantRecord>(operation: &'static str, err: LifecycleError) -> AppError {
    tracing::warn!(kind = G::KIND.as_str(), operation, error = %err, "Lifecycle transition rejected");
    err.into()
}

async fn commit<G: GrantRecord>(
    state: &AppState,
    grant: G,
    operation: &'static str,
) -> Result<GrantView<G>, AppError> {
    G::save(state.store.as_ref(), &grant).await?;
    record_lifecycle_transition(G::KIND, operation);
    Ok(view(state, grant))
}

pub(crate) async fn approve<G: GrantRecord>(
    state: &AppState,
    tenant: TenantContext,
    id: Uuid,
) -> Result<GrantView<G>, AppError> {
    let approver = tenant.require_user()?;
    let grant: G = load_grant(state, tenant.tenant_id, id).await?;
    let approved = lifecycle::approve(&grant, approver, state.clock.now())
        .map_err(|e| rejected::<G>("approve", e))?;
    info!(grant_id = %id, approver = %approver, kind = G::KIND.as_str(), "Grant approved");
    commit(state, approved, "approve").await
}

/// Revoking an already revoked grant returns it unchanged without writing.
pub(crate) async fn revoke<G: GrantRecord>(
    state: &AppState,
    tenant: TenantContext,
    id: Uuid,
) -> Result<GrantView<G>, AppError> {
    let grant: G = load_grant(state, tenant.tenant_id, id).await?;
    if !grant.lifecycle().is_active {
        return Ok(view(state, grant));
    }
    let revoked = lifecycle::revoke(&grant, state.clock.now());
    info!(grant_id = %id, kind = G::KIND.as_str(), "Grant revoked");
    commit(state, revoked, "revoke").await
}

pub(crate) async fn renew<G: GrantRecord>(
    state: &AppState,
    tenant: TenantContext,
    id: Uuid,
    req: RenewRequest,
) -> Result<GrantView<G>, AppError> {
    let grant: G = load_grant(state, tenant.tenant_id, id).await?;
    let renewed = lifecycle::renew(&grant, req.valid_until, state.clock.now())
        .map_err(|e| rejected::<G>("renew", e))?;
    info!(grant_id = %id, valid_until = %req.valid_until, kind = G::KIND.as_str(), "Grant renewed");
    commit(state, renewed, "renew").await
}

pub(crate) async fn audit<G: GrantRecord>(
    state: &AppState,
    tenant: TenantContext,
    id: Uuid,
    req: AuditRequest,
) -> Result<GrantView<G>, AppError> {
    req.validate()?;
    let grant: G = load_grant(state, tenant.tenant_id, id).await?;
    let audited = lifecycle::update_audit(&grant, &req.notes, state.clock.now())
        .map_err(|e| rejected::<G>("audit", e))?;
    info!(grant_id = %id, kind = G::KIND.as_str(), "Grant audited");
    commit(state, audited, "audit").await
}
