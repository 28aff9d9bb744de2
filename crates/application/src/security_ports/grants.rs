use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use tablegate_core::AppResult;
use tablegate_domain::{
    Capability, CapabilityId, GrantId, PermissionGrant, PermissionGrantDraft, UserId,
};

/// Read port over the external authorization store.
#[async_trait]
pub trait CapabilityRepository: Send + Sync {
    /// Lists `datasource_access` capabilities covering registered data tables.
    async fn list_grantable_capabilities(&self) -> AppResult<Vec<Capability>>;

    /// Returns the grantable capabilities among `capability_ids`.
    async fn find_grantable_capabilities(
        &self,
        capability_ids: &[CapabilityId],
    ) -> AppResult<Vec<Capability>>;
}

/// Query parameters for grant listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionGrantQuery {
    /// Optional owner filter.
    pub user_id: Option<UserId>,
    /// Whether to return only grants active on `as_of`.
    pub active_only: bool,
    /// Date used for the active filter.
    pub as_of: NaiveDate,
    /// Maximum rows returned.
    pub limit: usize,
    /// Number of rows skipped for pagination.
    pub offset: usize,
}

/// Persistence port for permission grants.
#[async_trait]
pub trait PermissionGrantRepository: Send + Sync {
    /// Persists a new active grant with its capability links.
    async fn create_grant(
        &self,
        draft: &PermissionGrantDraft,
        created_by: UserId,
    ) -> AppResult<PermissionGrant>;

    /// Finds one grant with its capabilities.
    async fn find_grant(&self, grant_id: GrantId) -> AppResult<Option<PermissionGrant>>;

    /// Lists grants ordered by owner then newest first.
    async fn list_grants(&self, query: PermissionGrantQuery) -> AppResult<Vec<PermissionGrant>>;

    /// Force revokes a grant only if it is still active on `revoked_at`'s date.
    ///
    /// Returns `None` when the grant is missing or no longer active, so at most
    /// one concurrent caller observes the transition.
    async fn force_revoke_grant(
        &self,
        grant_id: GrantId,
        revoked_at: DateTime<Utc>,
        revoked_by: UserId,
    ) -> AppResult<Option<PermissionGrant>>;

    /// Deletes a grant and its capability links only if it is inactive.
    ///
    /// Returns whether a row was removed.
    async fn delete_inactive_grant(&self, grant_id: GrantId) -> AppResult<bool>;

    /// Clears the active flag on grants whose `expire_date` precedes `today`.
    async fn deactivate_expired_grants(&self, today: NaiveDate) -> AppResult<u64>;

    /// Lists capabilities from the principal's grants that are active on `today`.
    async fn list_active_capabilities(
        &self,
        user_id: UserId,
        today: NaiveDate,
    ) -> AppResult<Vec<Capability>>;
}
