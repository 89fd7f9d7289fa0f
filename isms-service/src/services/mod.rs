//! Engines, persistence and metrics for isms-service.

pub mod classification;
mod clock;
mod database;
pub mod error;
pub mod lifecycle;
pub mod metrics;
mod store;
pub mod taxonomy;

pub use classification::{severity, severity_breakdown};
pub use clock::{Clock, FixedClock, SystemClock};
pub use database::Database;
pub use error::{LifecycleError, TaxonomyError};
pub use lifecycle::{GrantKind, LifecyclePolicy, TimeBoundGrant};
pub use metrics::{get_metrics, init_metrics};
pub use store::{InMemoryStore, IsmsStore};
pub use taxonomy::{PathUpdate, TaxonomyKind, TaxonomyNode, TreeNode, DEFAULT_PATH_SEPARATOR, MAX_LEVEL};
