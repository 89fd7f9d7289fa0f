//! Tenant context extraction.
//!
//! The gateway authenticates the caller and forwards the tenant and acting
//! user as headers. Every business route requires the tenant header.

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use service_core::error::AppError;
use uuid::Uuid;

pub const TENANT_HEADER: &str = "X-Tenant-ID";
pub const USER_HEADER: &str = "X-User-ID";

/// Tenant and acting user of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TenantContext {
    pub tenant_id: Uuid,
    /// Acting user. Required for operations that record an actor.
    pub user_id: Option<Uuid>,
}

impl TenantContext {
    pub fn new(tenant_id: Uuid, user_id: Option<Uuid>) -> Self {
        Self { tenant_id, user_id }
    }

    pub fn require_user(&self) -> Result<Uuid, AppError> {
        self.user_id.ok_or_else(|| {
            AppError::Unauthorized(anyhow::anyhow!("Missing {} header", USER_HEADER))
        })
    }
}

fn header_uuid(parts: &Parts, name: &str) -> Result<Option<Uuid>, AppError> {
    match parts.headers.get(name) {
        None => Ok(None),
        Some(value) => value
            .to_str()
            .ok()
            .and_then(|s| Uuid::parse_str(s.trim()).ok())
            .map(Some)
            .ok_or_else(|| AppError::BadRequest(anyhow::anyhow!("Invalid {} header", name))),
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for TenantContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let tenant_id = header_uuid(parts, TENANT_HEADER)?.ok_or_else(|| {
            AppError::Unauthorized(anyhow::anyhow!("Missing {} header", TENANT_HEADER))
        })?;
        let user_id = header_uuid(parts, USER_HEADER)?;

        // Extraction runs inside the TraceLayer `http_request` span, before any
        // handler span exists, so this fills that span's empty fields. Handler
        // spans carry their own tenant_id for logs emitted below them.
        let span = tracing::Span::current();
        span.record("tenant_id", tracing::field::display(tenant_id));
        if let Some(uid) = user_id {
            span.record("user_id", tracing::field::display(uid));
        }

        Ok(TenantContext::new(tenant_id, user_id))
    }
}
