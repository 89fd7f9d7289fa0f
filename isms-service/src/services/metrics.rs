use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;

use super::lifecycle::GrantKind;
use super::taxonomy::TaxonomyKind;

pub static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the Prometheus recorder. Calling this twice is a no-op.
pub fn init_metrics() -> anyhow::Result<()> {
    if METRICS_HANDLE.get().is_some() {
        return Ok(());
    }

    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| anyhow::anyhow!("failed to install Prometheus recorder: {}", e))?;

    if METRICS_HANDLE.set(handle).is_err() {
        tracing::warn!("Metrics handle was already initialized");
    }
    Ok(())
}

pub fn get_metrics() -> String {
    METRICS_HANDLE
        .get()
        .map(|handle| handle.render())
        .unwrap_or_else(|| "# Metrics recorder not initialized\n".to_string())
}

/// Count a hierarchy mutation rejected by the taxonomy rules.
pub fn record_taxonomy_rejection(kind: TaxonomyKind, reason: &'static str) {
    metrics::counter!(
        "isms_taxonomy_rejections_total",
        "kind" => kind.as_str(),
        "reason" => reason
    )
    .increment(1);
}

/// Count descendant rows rewritten after a rename or re-parent.
pub fn record_path_updates(kind: TaxonomyKind, count: usize) {
    metrics::counter!("isms_path_updates_total", "kind" => kind.as_str())
        .increment(count as u64);
}

/// Count a grant lifecycle transition (create, approve, revoke, renew, audit).
pub fn record_lifecycle_transition(kind: GrantKind, operation: &'static str) {
    metrics::counter!(
        "isms_lifecycle_transitions_total",
        "kind" => kind.as_str(),
        "operation" => operation
    )
    .increment(1);
}
