use service_core::error::AppError;
use thiserror::Error;
use uuid::Uuid;

/// Rejections raised by the taxonomy engine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TaxonomyError {
    #[error("Hierarchy depth limit of {max} levels exceeded")]
    DepthExceeded { max: i32 },

    #[error("An entity cannot be its own parent")]
    SelfParent,

    #[error("Parent assignment would create a cycle")]
    CycleDetected,

    #[error("A {child} cannot be placed under a {parent}")]
    IncompatibleParentType { child: String, parent: String },

    #[error("Parent {0} not found")]
    ParentNotFound(Uuid),

    #[error("A {0} must have a parent")]
    ParentRequired(String),

    #[error("Cannot delete: {children} child node(s) and {resources} dependent resource(s)")]
    HasDependents { children: usize, resources: i64 },
}

impl TaxonomyError {
    /// Stable label used for metrics.
    pub fn reason(&self) -> &'static str {
        match self {
            TaxonomyError::DepthExceeded { .. } => "depth_exceeded",
            TaxonomyError::SelfParent => "self_parent",
            TaxonomyError::CycleDetected => "cycle_detected",
            TaxonomyError::IncompatibleParentType { .. } => "incompatible_parent_type",
            TaxonomyError::ParentNotFound(_) => "parent_not_found",
            TaxonomyError::ParentRequired(_) => "parent_required",
            TaxonomyError::HasDependents { .. } => "has_dependents",
        }
    }
}

/// Rejections raised by the lifecycle engine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LifecycleError {
    #[error("valid_until must be after valid_from")]
    InvalidWindow,

    #[error("Grant is already approved")]
    AlreadyApproved,

    #[error("Grant is not active")]
    NotActive,

    #[error("Exactly one of user_id or team_id must be set")]
    InvalidHolder,
}

impl From<TaxonomyError> for AppError {
    fn from(err: TaxonomyError) -> Self {
        match err {
            TaxonomyError::HasDependents { .. } => AppError::Conflict(anyhow::anyhow!(err)),
            _ => AppError::BadRequest(anyhow::anyhow!(err)),
        }
    }
}

impl From<LifecycleError> for AppError {
    fn from(err: LifecycleError) -> Self {
        match err {
            LifecycleError::AlreadyApproved | LifecycleError::NotActive => {
                AppError::Conflict(anyhow::anyhow!(err))
            }
            LifecycleError::InvalidWindow | LifecycleError::InvalidHolder => {
                AppError::BadRequest(anyhow::anyhow!(err))
            }
        }
    }
}
