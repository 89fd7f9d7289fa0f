//! Taxonomy plumbing shared by the organization and domain handlers.

use service_core::error::AppError;
use std::collections::HashMap;
use uuid::Uuid;

use crate::services::metrics::{record_path_updates, record_taxonomy_rejection};
use crate::services::taxonomy::{self, PathUpdate, TaxonomyNode};
use crate::services::TaxonomyError;

fn reject<N: TaxonomyNode>(err: TaxonomyError) -> AppError {
    tracing::warn!(
        kind = N::KIND.as_str(),
        reason = err.reason(),
        error = %err,
        "Hierarchy change rejected"
    );
    record_taxonomy_rejection(N::KIND, err.reason());
    err.into()
}

/// Validate `node` against the snapshot and fill in its level and path.
/// Returns the path updates its descendants need.
pub(crate) fn place_node<N: TaxonomyNode>(
    node: &mut N,
    all: &[N],
    separator: &str,
) -> Result<Vec<PathUpdate>, AppError> {
    let updates = taxonomy::place(node, all, separator).map_err(reject::<N>)?;
    if !updates.is_empty() {
        record_path_updates(N::KIND, updates.len());
    }
    Ok(updates)
}

pub(crate) fn check_deletable<N: TaxonomyNode>(
    node: &N,
    all: &[N],
    dependent_counts: &HashMap<Uuid, i64>,
) -> Result<(), AppError> {
    taxonomy::ensure_deletable(node, all, dependent_counts).map_err(reject::<N>)
}

pub(crate) fn find_node<N: TaxonomyNode>(all: &[N], id: Uuid, label: &str) -> Result<N, AppError> {
    all.iter()
        .find(|n| n.id() == id)
        .cloned()
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("{} not found", label)))
}
