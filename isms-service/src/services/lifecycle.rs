//! Validity windows, approval and audit for time-bounded grants.
//!
//! Status is derived from the stored fields and an explicit `now`. Nothing in
//! here reads the wall clock.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::error::LifecycleError;
use crate::models::{CredentialGrant, GrantLifecycle, GrantStatus, PrivilegedAccess};

const MILLIS_PER_DAY: i64 = 86_400_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantKind {
    Credential,
    PrivilegedAccess,
}

impl GrantKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            GrantKind::Credential => "credential",
            GrantKind::PrivilegedAccess => "privileged_access",
        }
    }
}

/// A record carrying a [`GrantLifecycle`].
pub trait TimeBoundGrant: Clone {
    const KIND: GrantKind;
    /// Whether the grant must be re-audited periodically.
    const AUDITED: bool;

    fn lifecycle(&self) -> &GrantLifecycle;
    fn lifecycle_mut(&mut self) -> &mut GrantLifecycle;
    fn touch(&mut self, now: DateTime<Utc>);
}

impl TimeBoundGrant for CredentialGrant {
    const KIND: GrantKind = GrantKind::Credential;
    const AUDITED: bool = false;

    fn lifecycle(&self) -> &GrantLifecycle {
        &self.lifecycle
    }

    fn lifecycle_mut(&mut self) -> &mut GrantLifecycle {
        &mut self.lifecycle
    }

    fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_utc = now;
    }
}

impl TimeBoundGrant for PrivilegedAccess {
    const KIND: GrantKind = GrantKind::PrivilegedAccess;
    const AUDITED: bool = true;

    fn lifecycle(&self) -> &GrantLifecycle {
        &self.lifecycle
    }

    fn lifecycle_mut(&mut self) -> &mut GrantLifecycle {
        &mut self.lifecycle
    }

    fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_utc = now;
    }
}

/// Status thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LifecyclePolicy {
    pub expiring_soon_window: Duration,
    pub audit_interval: Duration,
}

impl LifecyclePolicy {
    pub fn from_days(expiring_soon_days: i64, audit_interval_days: i64) -> Self {
        Self {
            expiring_soon_window: Duration::days(expiring_soon_days),
            audit_interval: Duration::days(audit_interval_days),
        }
    }
}

impl Default for LifecyclePolicy {
    fn default() -> Self {
        Self::from_days(30, 90)
    }
}

/// Whole days until `valid_until`, rounded up. Negative once expired.
pub fn days_until_expiry(valid_until: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    let millis = (valid_until - now).num_milliseconds();
    if millis > 0 {
        (millis + MILLIS_PER_DAY - 1) / MILLIS_PER_DAY
    } else {
        // Integer division truncates toward zero, which is the ceiling here.
        millis / MILLIS_PER_DAY
    }
}

/// Derived status. The first matching rule wins:
/// revoked, expired, expiring soon, needs audit, active.
pub fn status<G: TimeBoundGrant>(grant: &G, policy: &LifecyclePolicy, now: DateTime<Utc>) -> GrantStatus {
    let lc = grant.lifecycle();
    if !lc.is_active {
        return GrantStatus::Revoked;
    }
    if now > lc.valid_until {
        return GrantStatus::Expired;
    }
    if lc.valid_until - now <= policy.expiring_soon_window {
        return GrantStatus::ExpiringSoon;
    }
    if audit_due(grant, policy, now) {
        return GrantStatus::NeedsAudit;
    }
    GrantStatus::Active
}

/// An unrevoked audited grant never reviewed, or last reviewed more than one
/// audit interval ago. Independent of expiry, unlike [`status`].
pub fn audit_due<G: TimeBoundGrant>(grant: &G, policy: &LifecyclePolicy, now: DateTime<Utc>) -> bool {
    let lc = grant.lifecycle();
    G::AUDITED
        && lc.is_active
        && lc
            .last_audit_date
            .map_or(true, |audited| audited < now - policy.audit_interval)
}

pub fn validate_window(
    valid_from: DateTime<Utc>,
    valid_until: DateTime<Utc>,
) -> Result<(), LifecycleError> {
    if valid_until <= valid_from {
        return Err(LifecycleError::InvalidWindow);
    }
    Ok(())
}

/// Exactly one of user or team must hold a credential.
pub fn validate_holder(user_id: Option<Uuid>, team_id: Option<Uuid>) -> Result<(), LifecycleError> {
    match (user_id, team_id) {
        (Some(_), None) | (None, Some(_)) => Ok(()),
        _ => Err(LifecycleError::InvalidHolder),
    }
}

pub fn approve<G: TimeBoundGrant>(
    grant: &G,
    approver_id: Uuid,
    now: DateTime<Utc>,
) -> Result<G, LifecycleError> {
    let lc = grant.lifecycle();
    if !lc.is_active {
        return Err(LifecycleError::NotActive);
    }
    if lc.approved_by.is_some() {
        return Err(LifecycleError::AlreadyApproved);
    }

    let mut approved = grant.clone();
    let lc = approved.lifecycle_mut();
    lc.approved_by = Some(approver_id);
    lc.approved_at = Some(now);
    approved.touch(now);
    Ok(approved)
}

/// Terminal. Revoking a revoked grant returns it unchanged.
pub fn revoke<G: TimeBoundGrant>(grant: &G, now: DateTime<Utc>) -> G {
    let mut revoked = grant.clone();
    if revoked.lifecycle().is_active {
        revoked.lifecycle_mut().is_active = false;
        revoked.touch(now);
    }
    revoked
}

/// Record an audit and append a dated line to the notes.
pub fn update_audit<G: TimeBoundGrant>(
    grant: &G,
    notes: &str,
    now: DateTime<Utc>,
) -> Result<G, LifecycleError> {
    if !grant.lifecycle().is_active {
        return Err(LifecycleError::NotActive);
    }

    let mut audited = grant.clone();
    let lc = audited.lifecycle_mut();
    lc.last_audit_date = Some(now);

    let notes = notes.trim();
    if !notes.is_empty() {
        let line = format!("[{}] {}", now.format("%Y-%m-%d"), notes);
        lc.audit_notes = Some(match lc.audit_notes.take() {
            Some(existing) if !existing.is_empty() => format!("{}\n{}", existing, line),
            _ => line,
        });
    }
    audited.touch(now);
    Ok(audited)
}

/// Move the end of the window. The new end must lie after both the start
/// of the window and `now`.
pub fn renew<G: TimeBoundGrant>(
    grant: &G,
    new_valid_until: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Result<G, LifecycleError> {
    let lc = grant.lifecycle();
    if !lc.is_active {
        return Err(LifecycleError::NotActive);
    }
    validate_window(lc.valid_from, new_valid_until)?;
    if new_valid_until <= now {
        return Err(LifecycleError::InvalidWindow);
    }

    let mut renewed = grant.clone();
    renewed.lifecycle_mut().valid_until = new_valid_until;
    renewed.touch(now);
    Ok(renewed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CredentialAccessType, PrivilegedAccessLevel, ScopeType};
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()
    }

    fn credential(valid_from: DateTime<Utc>, valid_until: DateTime<Utc>) -> CredentialGrant {
        CredentialGrant {
            id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            asset_id: Uuid::new_v4(),
            user_id: Some(Uuid::new_v4()),
            team_id: None,
            access_type: CredentialAccessType::Read,
            justification: "quarterly reporting".to_string(),
            lifecycle: GrantLifecycle::pending(valid_from, valid_until),
            created_by: None,
            created_utc: valid_from,
            updated_utc: valid_from,
        }
    }

    fn privileged(valid_from: DateTime<Utc>, valid_until: DateTime<Utc>) -> PrivilegedAccess {
        PrivilegedAccess {
            id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            scope_type: ScopeType::Database,
            scope_id: "db-prod-01".to_string(),
            access_level: PrivilegedAccessLevel::Admin,
            justification: "database administration".to_string(),
            lifecycle: GrantLifecycle::pending(valid_from, valid_until),
            created_by: None,
            created_utc: valid_from,
            updated_utc: valid_from,
        }
    }

    #[test]
    fn days_until_expiry_rounds_up() {
        let now = t0();
        assert_eq!(days_until_expiry(now + Duration::days(10), now), 10);
        assert_eq!(days_until_expiry(now + Duration::hours(1), now), 1);
        assert_eq!(days_until_expiry(now + Duration::hours(36), now), 2);
        assert_eq!(days_until_expiry(now, now), 0);
        assert_eq!(days_until_expiry(now - Duration::hours(36), now), -1);
        assert_eq!(days_until_expiry(now - Duration::days(3), now), -3);
    }

    #[test]
    fn credential_status_progression() {
        let policy = LifecyclePolicy::default();
        let grant = credential(t0(), t0() + Duration::days(100));

        assert_eq!(status(&grant, &policy, t0()), GrantStatus::Active);
        assert_eq!(
            status(&grant, &policy, t0() + Duration::days(70)),
            GrantStatus::ExpiringSoon
        );
        assert_eq!(
            status(&grant, &policy, t0() + Duration::days(100)),
            GrantStatus::ExpiringSoon
        );
        assert_eq!(
            status(&grant, &policy, t0() + Duration::days(101)),
            GrantStatus::Expired
        );
        let revoked = revoke(&grant, t0());
        assert_eq!(
            status(&revoked, &policy, t0() + Duration::days(101)),
            GrantStatus::Revoked
        );
    }

    #[test]
    fn expiry_is_relative_to_now_not_creation() {
        let policy = LifecyclePolicy::default();
        let grant = credential(t0(), t0() + Duration::days(10));
        assert_eq!(status(&grant, &policy, t0() + Duration::days(11)), GrantStatus::Expired);
        assert_eq!(status(&grant, &policy, t0()), GrantStatus::ExpiringSoon);
    }

    #[test]
    fn status_is_deterministic() {
        let policy = LifecyclePolicy::default();
        let grant = privileged(t0(), t0() + Duration::days(200));
        let now = t0() + Duration::days(5);
        assert_eq!(status(&grant, &policy, now), status(&grant, &policy, now));
    }

    #[test]
    fn privileged_access_needs_audit() {
        let policy = LifecyclePolicy::default();
        let grant = privileged(t0(), t0() + Duration::days(365));

        assert_eq!(status(&grant, &policy, t0()), GrantStatus::NeedsAudit);

        let audited = update_audit(&grant, "reviewed by CISO", t0()).unwrap();
        assert_eq!(status(&audited, &policy, t0() + Duration::days(90)), GrantStatus::Active);
        assert_eq!(
            status(&audited, &policy, t0() + Duration::days(91)),
            GrantStatus::NeedsAudit
        );
    }

    #[test]
    fn expiring_soon_outranks_needs_audit() {
        let policy = LifecyclePolicy::default();
        let grant = privileged(t0(), t0() + Duration::days(20));
        assert_eq!(status(&grant, &policy, t0()), GrantStatus::ExpiringSoon);
    }

    #[test]
    fn audit_due_ignores_expiry() {
        let policy = LifecyclePolicy::default();
        let grant = privileged(t0(), t0() + Duration::days(20));
        assert!(audit_due(&grant, &policy, t0()));
        assert!(audit_due(&grant, &policy, t0() + Duration::days(30)));

        let audited = update_audit(&grant, "reviewed", t0()).unwrap();
        assert!(!audit_due(&audited, &policy, t0() + Duration::days(10)));
        assert!(!audit_due(&revoke(&grant, t0()), &policy, t0()));
        assert!(!audit_due(&credential(t0(), t0() + Duration::days(200)), &policy, t0()));
    }

    #[test]
    fn custom_policy_thresholds() {
        let policy = LifecyclePolicy::from_days(7, 30);
        let grant = credential(t0(), t0() + Duration::days(20));
        assert_eq!(status(&grant, &policy, t0()), GrantStatus::Active);
        assert_eq!(status(&grant, &policy, t0() + Duration::days(13)), GrantStatus::ExpiringSoon);
    }

    #[test]
    fn window_must_be_strictly_increasing() {
        assert_eq!(validate_window(t0(), t0()), Err(LifecycleError::InvalidWindow));
        assert_eq!(
            validate_window(t0(), t0() - Duration::seconds(1)),
            Err(LifecycleError::InvalidWindow)
        );
        assert_eq!(validate_window(t0(), t0() + Duration::seconds(1)), Ok(()));
    }

    #[test]
    fn holder_is_exactly_one_of_user_or_team() {
        let id = Some(Uuid::new_v4());
        assert_eq!(validate_holder(id, None), Ok(()));
        assert_eq!(validate_holder(None, id), Ok(()));
        assert_eq!(validate_holder(None, None), Err(LifecycleError::InvalidHolder));
        assert_eq!(validate_holder(id, id), Err(LifecycleError::InvalidHolder));
    }

    #[test]
    fn approve_once() {
        let grant = credential(t0(), t0() + Duration::days(100));
        let approver = Uuid::new_v4();
        let now = t0() + Duration::hours(2);

        let approved = approve(&grant, approver, now).unwrap();
        assert_eq!(approved.lifecycle.approved_by, Some(approver));
        assert_eq!(approved.lifecycle.approved_at, Some(now));
        assert_eq!(approved.updated_utc, now);

        assert_eq!(
            approve(&approved, approver, now),
            Err(LifecycleError::AlreadyApproved)
        );
    }

    #[test]
    fn revoked_grants_reject_transitions() {
        let grant = revoke(&credential(t0(), t0() + Duration::days(100)), t0());
        let now = t0() + Duration::days(1);
        assert_eq!(approve(&grant, Uuid::new_v4(), now), Err(LifecycleError::NotActive));
        assert_eq!(update_audit(&grant, "late", now), Err(LifecycleError::NotActive));
        assert_eq!(
            renew(&grant, t0() + Duration::days(200), now),
            Err(LifecycleError::NotActive)
        );
    }

    #[test]
    fn revoke_is_idempotent() {
        let grant = credential(t0(), t0() + Duration::days(100));
        let once = revoke(&grant, t0() + Duration::days(1));
        let twice = revoke(&once, t0() + Duration::days(2));
        assert_eq!(once, twice);
        assert!(!twice.lifecycle.is_active);
    }

    #[test]
    fn audit_notes_accumulate_dated_lines() {
        let grant = privileged(t0(), t0() + Duration::days(365));
        let first = update_audit(&grant, "initial review", t0()).unwrap();
        let second = update_audit(&first, "  quarterly review ", t0() + Duration::days(92)).unwrap();

        assert_eq!(
            second.lifecycle.audit_notes.as_deref(),
            Some("[2025-01-01] initial review\n[2025-04-03] quarterly review")
        );
        assert_eq!(second.lifecycle.last_audit_date, Some(t0() + Duration::days(92)));
    }

    #[test]
    fn renew_moves_the_window_end() {
        let grant = credential(t0(), t0() + Duration::days(10));
        let now = t0() + Duration::days(9);

        let renewed = renew(&grant, t0() + Duration::days(60), now).unwrap();
        assert_eq!(renewed.lifecycle.valid_until, t0() + Duration::days(60));

        assert_eq!(
            renew(&grant, now - Duration::days(1), now),
            Err(LifecycleError::InvalidWindow)
        );
        assert_eq!(
            renew(&grant, t0() - Duration::days(1), now),
            Err(LifecycleError::InvalidWindow)
        );
    }
}
