//! ISMS taxonomy and access-lifecycle service.
//!
//! Organizations and control domains form tenant-scoped hierarchies with
//! materialized paths. Credentials and privileged access are time-bound
//! grants with an approve / revoke / renew / audit lifecycle.

pub mod config;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod startup;

pub use startup::{AppState, Application};
