//! Domain models for isms-service.

mod asset;
mod credential;
mod domain;
mod grant;
mod organization;
mod privileged_access;

pub use asset::{
    Asset, AssetClassification, AssetType, ClassificationLevel, CreateAssetRequest,
    UpdateAssetRequest,
};
pub use credential::{
    CreateCredentialRequest, CredentialAccessType, CredentialGrant, UpdateCredentialRequest,
};
pub use domain::{CreateDomainRequest, Domain, UpdateDomainRequest};
pub use grant::{GrantLifecycle, GrantStatus};
pub use organization::{
    CreateOrganizationRequest, Organization, OrganizationType, UpdateOrganizationRequest,
};
pub use privileged_access::{
    CreatePrivilegedAccessRequest, PrivilegedAccess, PrivilegedAccessLevel, ScopeType,
    UpdatePrivilegedAccessRequest,
};

use serde::{Deserialize, Deserializer};
use std::borrow::Cow;
use validator::ValidationError;

/// Distinguishes an absent field (`None`) from an explicit `null` (`Some(None)`).
pub(crate) fn double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Taxonomy names must keep at least two characters once trimmed.
pub(crate) fn trimmed_name(value: &str) -> Result<(), ValidationError> {
    if value.trim().chars().count() < 2 {
        let mut err = ValidationError::new("blank_name");
        err.message = Some(Cow::from("Name must be 2-200 characters"));
        return Err(err);
    }
    Ok(())
}

pub(crate) fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut err = ValidationError::new("blank");
        err.message = Some(Cow::from("Value must not be blank"));
        return Err(err);
    }
    Ok(())
}
