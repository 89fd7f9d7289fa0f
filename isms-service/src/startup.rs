//! Application startup and lifecycle management.

use axum::{
    http::Request,
    middleware,
    routing::{get, post},
    Router,
};
use secrecy::ExposeSecret;
use service_core::error::AppError;
use service_core::middleware::{
    metrics::metrics_middleware,
    tracing::{request_id_middleware, REQUEST_ID_HEADER},
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tower_http::trace::{DefaultOnResponse, TraceLayer};
use tracing::Level;

use crate::config::IsmsConfig;
use crate::handlers::{
    assets, credentials, domains, health_check, metrics_endpoint, organizations,
    privileged_access, readiness_check,
};
use crate::services::{Clock, Database, InMemoryStore, IsmsStore, LifecyclePolicy, SystemClock};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<IsmsConfig>,
    pub store: Arc<dyn IsmsStore>,
    pub clock: Arc<dyn Clock>,
    pub policy: LifecyclePolicy,
    /// Held across the read-validate-write of organization and domain
    /// mutations so concurrent re-parents cannot both pass the cycle check.
    pub hierarchy_writes: Arc<Mutex<()>>,
}

impl AppState {
    pub fn new(config: IsmsConfig, store: Arc<dyn IsmsStore>, clock: Arc<dyn Clock>) -> Self {
        let policy = config.lifecycle_policy();
        Self {
            config: Arc::new(config),
            store,
            clock,
            policy,
            hierarchy_writes: Arc::new(Mutex::new(())),
        }
    }

    /// Separator used when building materialized paths.
    pub fn separator(&self) -> &str {
        &self.config.taxonomy.path_separator
    }
}

/// Build the HTTP router over the given state.
pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route(
            "/organizations",
            get(organizations::list_organizations).post(organizations::create_organization),
        )
        .route("/organizations/tree", get(organizations::organization_tree))
        .route(
            "/organizations/:id",
            get(organizations::get_organization)
                .put(organizations::update_organization)
                .delete(organizations::delete_organization),
        )
        .route(
            "/domains",
            get(domains::list_domains).post(domains::create_domain),
        )
        .route("/domains/tree", get(domains::domain_tree))
        .route(
            "/domains/:id",
            get(domains::get_domain)
                .put(domains::update_domain)
                .delete(domains::delete_domain),
        )
        .route("/assets", get(assets::list_assets).post(assets::create_asset))
        .route("/assets/stats", get(assets::asset_stats))
        .route(
            "/assets/:id",
            get(assets::get_asset)
                .put(assets::update_asset)
                .delete(assets::delete_asset),
        )
        .route(
            "/credentials",
            get(credentials::list_credentials).post(credentials::create_credential),
        )
        .route("/credentials/stats", get(credentials::credential_stats))
        .route(
            "/credentials/:id",
            get(credentials::get_credential)
                .put(credentials::update_credential)
                .delete(credentials::delete_credential),
        )
        .route("/credentials/:id/approve", post(credentials::approve_credential))
        .route("/credentials/:id/revoke", post(credentials::revoke_credential))
        .route("/credentials/:id/renew", post(credentials::renew_credential))
        .route("/credentials/:id/audit", post(credentials::audit_credential))
        .route(
            "/privileged-access",
            get(privileged_access::list_privileged_access)
                .post(privileged_access::create_privileged_access),
        )
        .route(
            "/privileged-access/stats",
            get(privileged_access::privileged_access_stats),
        )
        .route(
            "/privileged-access/:id",
            get(privileged_access::get_privileged_access)
                .put(privileged_access::update_privileged_access)
                .delete(privileged_access::delete_privileged_access),
        )
        .route(
            "/privileged-access/:id/approve",
            post(privileged_access::approve_privileged_access),
        )
        .route(
            "/privileged-access/:id/revoke",
            post(privileged_access::revoke_privileged_access),
        )
        .route(
            "/privileged-access/:id/renew",
            post(privileged_access::renew_privileged_access),
        )
        .route(
            "/privileged-access/:id/audit",
            post(privileged_access::audit_privileged_access),
        );

    Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .route("/metrics", get(metrics_endpoint))
        .merge(api)
        .route_layer(middleware::from_fn(metrics_middleware))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &Request<_>| {
                    let request_id = request
                        .headers()
                        .get(REQUEST_ID_HEADER)
                        .and_then(|value| value.to_str().ok())
                        .unwrap_or("-");

                    // tenant_id and user_id are filled in by the TenantContext extractor.
                    tracing::info_span!(
                        "http_request",
                        request_id = %request_id,
                        method = %request.method(),
                        uri = %request.uri(),
                        tenant_id = tracing::field::Empty,
                        user_id = tracing::field::Empty,
                    )
                })
                .on_response(DefaultOnResponse::new().level(Level::DEBUG)),
        )
        .layer(middleware::from_fn(request_id_middleware))
        .with_state(state)
}

/// Application container for managing server lifecycle.
pub struct Application {
    port: u16,
    listener: TcpListener,
    state: AppState,
}

impl Application {
    /// Build the application, connecting to PostgreSQL when a database is
    /// configured and falling back to the in-memory store otherwise.
    pub async fn build(config: IsmsConfig) -> Result<Self, AppError> {
        let store: Arc<dyn IsmsStore> = match &config.database {
            Some(db) => {
                let database =
                    Database::new(db.url.expose_secret(), db.max_connections, db.min_connections)
                        .await
                        .map_err(|e| {
                            tracing::error!("Failed to connect to PostgreSQL: {}", e);
                            e
                        })?;
                database.run_migrations().await?;
                Arc::new(database)
            }
            None => {
                tracing::warn!("No database configured; using the in-memory store");
                Arc::new(InMemoryStore::new())
            }
        };

        Self::build_with(config, store, Arc::new(SystemClock)).await
    }

    /// Build the application over an explicit store and clock.
    pub async fn build_with(
        config: IsmsConfig,
        store: Arc<dyn IsmsStore>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, AppError> {
        // Port 0 = random port for testing
        let addr = SocketAddr::from(([0, 0, 0, 0], config.common.port));
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!("Failed to bind HTTP listener to {}: {}", addr, e);
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!(service = %config.service_name, port, "ISMS service listening");

        Ok(Self {
            port,
            listener,
            state: AppState::new(config, store, clock),
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn state(&self) -> AppState {
        self.state.clone()
    }

    /// Serve until the process is stopped.
    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        axum::serve(self.listener, router(self.state)).await
    }

    /// Serve until `shutdown` resolves, then drain in-flight requests.
    pub async fn run_with_shutdown<F>(self, shutdown: F) -> std::io::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        axum::serve(self.listener, router(self.state))
            .with_graceful_shutdown(shutdown)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use tower::ServiceExt;

    fn state() -> AppState {
        AppState::new(
            IsmsConfig::default(),
            Arc::new(InMemoryStore::new()),
            Arc::new(SystemClock),
        )
    }

    #[tokio::test]
    async fn health_is_public() {
        let response = router(state())
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), 200);
    }

    #[tokio::test]
    async fn tenant_scoped_route_answers() {
        let response = router(state())
            .oneshot(
                Request::builder()
                    .uri("/organizations")
                    .header("X-Tenant-ID", uuid::Uuid::new_v4().to_string())
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), 200);
    }

    #[tokio::test]
    async fn unknown_route_is_404() {
        let response = router(state())
            .oneshot(Request::builder().uri("/nope").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), 404);
    }

    #[test]
    fn state_uses_configured_separator() {
        let mut config = IsmsConfig::default();
        config.taxonomy.path_separator = " / ".to_string();
        let state = AppState::new(config, Arc::new(InMemoryStore::new()), Arc::new(SystemClock));
        assert_eq!(state.separator(), " / ");
    }
}
