//! Time-bounded bundles of table-level capabilities.
//!
//! A grant starts `Active`. It degrades to `Expired` lazily once the current
//! date passes `expire_date`, or to `ForceRevoked` through an explicit
//! administrative revoke. Both degraded states are terminal.

use std::collections::BTreeSet;

use chrono::{DateTime, Days, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tablegate_core::{AppError, AppResult};

use crate::UserId;

/// Default grant lifetime, half a year rounded up.
pub const DEFAULT_GRANT_LIFETIME_DAYS: u64 = 183;

/// Capability type that denotes read access to one data table.
pub const DATASOURCE_ACCESS_PERMISSION: &str = "datasource_access";

const INVALID_TRANSITION_MESSAGE: &str =
    "modification on expired/force terminated permission is not allowed";
const DELETE_ACTIVE_MESSAGE: &str = "delete active permission is prohibited; revoke before delete";

/// Identifier of a capability record in the authorization store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CapabilityId(i64);

impl CapabilityId {
    /// Creates a capability identifier from its stored value.
    #[must_use]
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    /// Returns the stored integer value.
    #[must_use]
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for CapabilityId {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// Identifier of a permission grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GrantId(i64);

impl GrantId {
    /// Creates a grant identifier from its stored value.
    #[must_use]
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    /// Returns the stored integer value.
    #[must_use]
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for GrantId {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// Table-level access right from the authorization store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Capability {
    /// Stable capability identifier.
    pub id: CapabilityId,
    /// Capability type, e.g. `datasource_access`.
    pub permission_name: String,
    /// Resource covered by the capability, e.g. `[warehouse].[orders](id:3)`.
    pub resource_name: String,
}

impl Capability {
    /// Returns a human-readable label used in audit messages.
    #[must_use]
    pub fn label(&self) -> String {
        format!("{} on {}", self.permission_name, self.resource_name)
    }
}

/// Derived lifecycle status of a grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GrantStatus {
    /// Grant is in effect.
    Active,
    /// Grant was terminated early by an administrator.
    ForceRevoked,
    /// Grant passed its expiration date.
    Expired,
}

impl GrantStatus {
    /// Returns the label shown to administrators.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "Active",
            Self::ForceRevoked => "Force Revoked",
            Self::Expired => "Expired",
        }
    }
}

impl std::fmt::Display for GrantStatus {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Validated input for a new grant, before it is persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionGrantDraft {
    user_id: UserId,
    apply_date: NaiveDate,
    expire_date: NaiveDate,
    capability_ids: Vec<CapabilityId>,
}

impl PermissionGrantDraft {
    /// Builds a draft, defaulting `expire_date` to `apply_date + lifetime_days`.
    pub fn new(
        user_id: UserId,
        apply_date: NaiveDate,
        expire_date: Option<NaiveDate>,
        capability_ids: impl IntoIterator<Item = CapabilityId>,
        lifetime_days: u64,
    ) -> AppResult<Self> {
        let capability_ids: Vec<CapabilityId> = capability_ids
            .into_iter()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        if capability_ids.is_empty() {
            return Err(AppError::Validation(
                "a permission grant requires at least one capability".to_owned(),
            ));
        }

        let expire_date = match expire_date {
            Some(expire_date) => expire_date,
            None => apply_date
                .checked_add_days(Days::new(lifetime_days))
                .ok_or_else(|| {
                    AppError::Validation(format!(
                        "grant lifetime of {lifetime_days} days overflows the calendar"
                    ))
                })?,
        };

        if expire_date < apply_date {
            return Err(AppError::Validation(format!(
                "expire_date {expire_date} must not precede apply_date {apply_date}"
            )));
        }

        Ok(Self {
            user_id,
            apply_date,
            expire_date,
            capability_ids,
        })
    }

    /// Returns the owning principal.
    #[must_use]
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    /// Returns the effective date.
    #[must_use]
    pub fn apply_date(&self) -> NaiveDate {
        self.apply_date
    }

    /// Returns the soft expiration date.
    #[must_use]
    pub fn expire_date(&self) -> NaiveDate {
        self.expire_date
    }

    /// Returns the deduplicated capability references.
    #[must_use]
    pub fn capability_ids(&self) -> &[CapabilityId] {
        &self.capability_ids
    }
}

/// Persisted grant of table-level capabilities to one principal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionGrant {
    id: GrantId,
    user_id: UserId,
    apply_date: NaiveDate,
    expire_date: NaiveDate,
    force_terminate_at: Option<DateTime<Utc>>,
    is_active: bool,
    capabilities: Vec<Capability>,
}

impl PermissionGrant {
    /// Rebuilds a grant from stored state.
    #[must_use]
    pub fn restore(
        id: GrantId,
        user_id: UserId,
        apply_date: NaiveDate,
        expire_date: NaiveDate,
        force_terminate_at: Option<DateTime<Utc>>,
        is_active: bool,
        capabilities: Vec<Capability>,
    ) -> Self {
        Self {
            id,
            user_id,
            apply_date,
            expire_date,
            force_terminate_at,
            is_active,
            capabilities,
        }
    }

    /// Returns the grant identifier.
    #[must_use]
    pub fn id(&self) -> GrantId {
        self.id
    }

    /// Returns the owning principal.
    #[must_use]
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    /// Returns the effective date.
    #[must_use]
    pub fn apply_date(&self) -> NaiveDate {
        self.apply_date
    }

    /// Returns the soft expiration date.
    #[must_use]
    pub fn expire_date(&self) -> NaiveDate {
        self.expire_date
    }

    /// Returns the forced termination timestamp, when revoked.
    #[must_use]
    pub fn force_terminate_at(&self) -> Option<DateTime<Utc>> {
        self.force_terminate_at
    }

    /// Returns the stored active flag.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.is_active
    }

    /// Returns the granted capabilities.
    #[must_use]
    pub fn capabilities(&self) -> &[Capability] {
        &self.capabilities
    }

    /// Evaluates the lifecycle status on the given date.
    #[must_use]
    pub fn status(&self, today: NaiveDate) -> GrantStatus {
        if self.force_terminate_at.is_some() {
            return GrantStatus::ForceRevoked;
        }

        if self.is_active && today <= self.expire_date {
            return GrantStatus::Active;
        }

        GrantStatus::Expired
    }

    /// Returns the expiry date, or the forced termination timestamp marked as forced.
    #[must_use]
    pub fn exp_or_terminate_date(&self) -> String {
        match self.force_terminate_at {
            Some(terminated_at) => {
                format!("{} (forced)", terminated_at.format("%Y-%m-%d %H:%M:%S"))
            }
            None => self.expire_date.format("%Y-%m-%d").to_string(),
        }
    }

    /// Returns the capability labels joined for audit messages.
    #[must_use]
    pub fn capability_summary(&self) -> String {
        self.capabilities
            .iter()
            .map(Capability::label)
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Fails unless the grant is still active at `now`.
    pub fn ensure_mutable(&self, now: DateTime<Utc>) -> AppResult<()> {
        if self.status(now.date_naive()) != GrantStatus::Active {
            return Err(AppError::InvalidStateTransition(
                INVALID_TRANSITION_MESSAGE.to_owned(),
            ));
        }

        Ok(())
    }

    /// Terminates an active grant immediately. Irreversible.
    pub fn force_revoke(&mut self, now: DateTime<Utc>) -> AppResult<()> {
        self.ensure_mutable(now)?;
        self.is_active = false;
        self.force_terminate_at = Some(now);
        Ok(())
    }

    /// Clears the active flag once `today` is past `expire_date`.
    ///
    /// Returns whether the flag changed.
    pub fn mark_expired(&mut self, today: NaiveDate) -> bool {
        if self.is_active && self.force_terminate_at.is_none() && today > self.expire_date {
            self.is_active = false;
            return true;
        }

        false
    }

    /// Fails while the stored active flag is still set.
    pub fn ensure_deletable(&self) -> AppResult<()> {
        if self.is_active {
            return Err(AppError::DeleteOfActiveGrant(
                DELETE_ACTIVE_MESSAGE.to_owned(),
            ));
        }

        Ok(())
    }
}
