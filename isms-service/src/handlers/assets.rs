//! Asset inventory handlers.

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

use super::{matches_search, paginate, AssetView, Page};
use crate::middleware::TenantContext;
use crate::models::{
    Asset, AssetType, ClassificationLevel, CreateAssetRequest, UpdateAssetRequest,
};
use crate::services::{severity, severity_breakdown};
use crate::startup::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct AssetListQuery {
    pub search: Option<String>,
    pub asset_type: Option<AssetType>,
    pub organization_id: Option<Uuid>,
    pub severity: Option<ClassificationLevel>,
    pub is_active: Option<bool>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct AssetStats {
    pub total: usize,
    pub active: usize,
    pub by_type: BTreeMap<&'static str, usize>,
    pub by_severity: BTreeMap<ClassificationLevel, usize>,
}

async fn ensure_organization(state: &AppState, tenant_id: Uuid, organization_id: Uuid) -> Result<(), AppError> {
    state
        .store
        .get_organization(tenant_id, organization_id)
        .await?
        .map(|_| ())
        .ok_or_else(|| {
            AppError::BadRequest(anyhow::anyhow!("Organization {} not found", organization_id))
        })
}

/// GET /assets
#[instrument(skip(state, query), fields(tenant_id = %tenant.tenant_id))]
pub async fn list_assets(
    State(state): State<AppState>,
    tenant: TenantContext,
    Query(query): Query<AssetListQuery>,
) -> Result<Json<Page<AssetView>>, AppError> {
    let assets = state.store.list_assets(tenant.tenant_id).await?;

    let filtered: Vec<AssetView> = assets
        .into_iter()
        .filter(|a| {
            matches_search(
                query.search.as_deref(),
                &[
                    a.name.as_str(),
                    a.description.as_deref().unwrap_or_default(),
                    a.location.as_deref().unwrap_or_default(),
                ],
            )
        })
        .filter(|a| query.asset_type.map_or(true, |t| a.asset_type == t))
        .filter(|a| query.organization_id.map_or(true, |o| a.organization_id == o))
        .filter(|a| query.severity.map_or(true, |s| severity(&a.classification) == s))
        .filter(|a| query.is_active.map_or(true, |active| a.is_active == active))
        .map(AssetView::from)
        .collect();

    Ok(Json(paginate(filtered, query.page, query.limit)))
}

/// GET /assets/stats
#[instrument(skip(state), fields(tenant_id = %tenant.tenant_id))]
pub async fn asset_stats(
    State(state): State<AppState>,
    tenant: TenantContext,
) -> Result<Json<AssetStats>, AppError> {
    let assets = state.store.list_assets(tenant.tenant_id).await?;

    let mut by_type: BTreeMap<&'static str, usize> = BTreeMap::new();
    for asset in &assets {
        *by_type.entry(asset.asset_type.as_str()).or_default() += 1;
    }

    Ok(Json(AssetStats {
        total: assets.len(),
        active: assets.iter().filter(|a| a.is_active).count(),
        by_type,
        by_severity: severity_breakdown(&assets),
    }))
}

/// GET /assets/:id
#[instrument(skip(state), fields(tenant_id = %tenant.tenant_id))]
pub async fn get_asset(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(id): Path<Uuid>,
) -> Result<Json<AssetView>, AppError> {
    let asset = state
        .store
        .get_asset(tenant.tenant_id, id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Asset not found")))?;
    Ok(Json(AssetView::from(asset)))
}

/// POST /assets
#[instrument(skip(state, req), fields(tenant_id = %tenant.tenant_id))]
pub async fn create_asset(
    State(state): State<AppState>,
    tenant: TenantContext,
    Json(req): Json<CreateAssetRequest>,
) -> Result<(StatusCode, Json<AssetView>), AppError> {
    req.validate()?;
    ensure_organization(&state, tenant.tenant_id, req.organization_id).await?;

    let now = state.clock.now();
    let asset = Asset {
        id: Uuid::new_v4(),
        tenant_id: tenant.tenant_id,
        name: req.name.trim().to_string(),
        asset_type: req.asset_type,
        owner_id: req.owner_id,
        classification: req.classification,
        description: req.description,
        location: req.location,
        organization_id: req.organization_id,
        is_active: req.is_active.unwrap_or(true),
        created_utc: now,
        updated_utc: now,
    };
    state.store.insert_asset(&asset).await?;

    let view = AssetView::from(asset);
    info!(asset_id = %view.asset.id, severity = view.severity.as_str(), "Asset created");
    Ok((StatusCode::CREATED, Json(view)))
}

/// PUT /assets/:id
#[instrument(skip(state, req), fields(tenant_id = %tenant.tenant_id))]
pub async fn update_asset(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateAssetRequest>,
) -> Result<Json<AssetView>, AppError> {
    req.validate()?;

    let mut asset = state
        .store
        .get_asset(tenant.tenant_id, id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Asset not found")))?;

    if let Some(organization_id) = req.organization_id {
        if organization_id != asset.organization_id {
            ensure_organization(&state, tenant.tenant_id, organization_id).await?;
        }
        asset.organization_id = organization_id;
    }
    if let Some(name) = req.name {
        asset.name = name.trim().to_string();
    }
    if let Some(asset_type) = req.asset_type {
        asset.asset_type = asset_type;
    }
    if let Some(owner_id) = req.owner_id {
        asset.owner_id = owner_id;
    }
    if let Some(classification) = req.classification {
        asset.classification = classification;
    }
    if let Some(description) = req.description {
        asset.description = Some(description);
    }
    if let Some(location) = req.location {
        asset.location = Some(location);
    }
    if let Some(active) = req.is_active {
        asset.is_active = active;
    }
    asset.updated_utc = state.clock.now();

    state.store.update_asset(&asset).await?;
    info!(asset_id = %asset.id, "Asset updated");
    Ok(Json(AssetView::from(asset)))
}

/// DELETE /assets/:id
#[instrument(skip(state), fields(tenant_id = %tenant.tenant_id))]
pub async fn delete_asset(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    if !state.store.delete_asset(tenant.tenant_id, id).await? {
        return Err(AppError::NotFound(anyhow::anyhow!("Asset not found")));
    }
    info!(asset_id = %id, "Asset deleted");
    Ok(StatusCode::NO_CONTENT)
}
