use async_trait::async_trait;

use tablegate_core::AppResult;
use tablegate_domain::{AccessKey, AccessKeyRecord, Principal, UserId};

/// Access key record joined with its owner, read in one snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyedPrincipal {
    /// Matched access key record.
    pub record: AccessKeyRecord,
    /// Owning principal with roles, absent when the identity was removed.
    pub principal: Option<Principal>,
}

/// Access key projection for administrative listings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessKeyListing {
    /// Stored record.
    pub record: AccessKeyRecord,
    /// Canonical display name of the owner.
    pub display_name: String,
    /// Display name of the administrator that last changed the record.
    pub changed_by_name: Option<String>,
}

/// Persistence port for per-user access keys.
#[async_trait]
pub trait AccessKeyRepository: Send + Sync {
    /// Resolves a token to its record and owner.
    ///
    /// Implementations must read the record, the principal and its roles
    /// from a single consistent snapshot.
    async fn resolve_access_key(&self, access_key: &str) -> AppResult<Option<KeyedPrincipal>>;

    /// Finds the record owned by a principal.
    async fn find_access_key(&self, user_id: UserId) -> AppResult<Option<AccessKeyRecord>>;

    /// Lists every record, most recently changed first.
    async fn list_access_keys(&self) -> AppResult<Vec<AccessKeyListing>>;

    /// Creates a record. Fails with `Conflict` when the owner or token is taken.
    async fn create_access_key(
        &self,
        user_id: UserId,
        access_key: &AccessKey,
        changed_by: UserId,
    ) -> AppResult<AccessKeyRecord>;

    /// Replaces the token in a single update. Returns `None` when no record exists.
    async fn rotate_access_key(
        &self,
        user_id: UserId,
        access_key: &AccessKey,
        changed_by: UserId,
    ) -> AppResult<Option<AccessKeyRecord>>;

    /// Removes a record. Returns the removed record, if any.
    async fn delete_access_key(&self, user_id: UserId) -> AppResult<Option<AccessKeyRecord>>;
}
