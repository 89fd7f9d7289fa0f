//! HTTP handlers for isms-service.

pub mod assets;
pub mod credentials;
pub mod domains;
mod grants;
mod hierarchy;
pub mod organizations;
pub mod privileged_access;

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;

use crate::models::{Asset, ClassificationLevel, GrantStatus};
use crate::services::{get_metrics, lifecycle, severity, LifecyclePolicy, TimeBoundGrant};
use crate::startup::AppState;

pub const DEFAULT_PAGE_LIMIT: u32 = 10;
pub const MAX_PAGE_LIMIT: u32 = 100;

/// Health check endpoint for liveness probes.
pub async fn health_check() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(json!({
            "status": "ok",
            "service": "isms-service",
            "version": env!("CARGO_PKG_VERSION")
        })),
    )
}

/// Readiness check: the store must answer.
pub async fn readiness_check(State(state): State<AppState>) -> impl IntoResponse {
    match state.store.health_check().await {
        Ok(()) => (StatusCode::OK, Json(json!({ "status": "ready" }))),
        Err(e) => {
            tracing::warn!(error = %e, "Readiness check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "status": "unavailable" })),
            )
        }
    }
}

/// Prometheus metrics endpoint.
pub async fn metrics_endpoint() -> impl IntoResponse {
    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        get_metrics(),
    )
}

/// One page of a filtered listing.
#[derive(Debug, Serialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub total: usize,
    pub page: u32,
    pub limit: u32,
    pub total_pages: u32,
}

/// Slice `items` into the requested page. Page is 1-based; limit is clamped to 1..=100.
pub fn paginate<T>(items: Vec<T>, page: Option<u32>, limit: Option<u32>) -> Page<T> {
    let page = page.unwrap_or(1).max(1);
    let limit = limit.unwrap_or(DEFAULT_PAGE_LIMIT).clamp(1, MAX_PAGE_LIMIT);
    let total = items.len();
    let total_pages = total.div_ceil(limit as usize) as u32;
    let offset = (page as usize - 1).saturating_mul(limit as usize);

    let data = items
        .into_iter()
        .skip(offset)
        .take(limit as usize)
        .collect();

    Page {
        data,
        total,
        page,
        limit,
        total_pages,
    }
}

/// Case-insensitive substring match against any of `fields`.
pub(crate) fn matches_search(search: Option<&str>, fields: &[&str]) -> bool {
    match search.map(str::trim) {
        None | Some("") => true,
        Some(term) => {
            let term = term.to_lowercase();
            fields.iter().any(|f| f.to_lowercase().contains(&term))
        }
    }
}

/// A grant rendered with its derived lifecycle state.
#[derive(Debug, Serialize)]
pub struct GrantView<G> {
    #[serde(flatten)]
    pub grant: G,
    pub status: GrantStatus,
    pub days_until_expiry: i64,
    pub approved: bool,
}

impl<G: TimeBoundGrant> GrantView<G> {
    pub fn new(grant: G, policy: &LifecyclePolicy, now: DateTime<Utc>) -> Self {
        let status = lifecycle::status(&grant, policy, now);
        let days_until_expiry = lifecycle::days_until_expiry(grant.lifecycle().valid_until, now);
        let approved = grant.lifecycle().is_approved();
        Self {
            grant,
            status,
            days_until_expiry,
            approved,
        }
    }
}

/// An asset rendered with its severity tier.
#[derive(Debug, Serialize)]
pub struct AssetView {
    #[serde(flatten)]
    pub asset: Asset,
    pub severity: ClassificationLevel,
}

impl From<Asset> for AssetView {
    fn from(asset: Asset) -> Self {
        let severity = severity(&asset.classification);
        Self { asset, severity }
    }
}
