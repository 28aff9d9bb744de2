use async_trait::async_trait;

use tablegate_core::AppResult;
use tablegate_domain::{Principal, UserId};

/// Read port over the external identity store.
#[async_trait]
pub trait PrincipalRepository: Send + Sync {
    /// Finds a principal and its role memberships by id.
    async fn find_principal(&self, user_id: UserId) -> AppResult<Option<Principal>>;

    /// Lists active principals that do not own an access key yet.
    async fn list_access_key_candidates(&self) -> AppResult<Vec<Principal>>;
}
