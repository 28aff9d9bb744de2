use std::sync::Arc;

use serde_json::json;
use tracing::warn;

use tablegate_core::{AppError, AppResult};
use tablegate_domain::{AccessKey, AccessKeyRecord, AuditAction, Principal, UserId};

use crate::authorization::require_admin;
use crate::{AccessKeyListing, AccessKeyRepository, AuditExtra, EventLogger, PrincipalRepository};

/// Input payload for issuing an access key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssueAccessKeyInput {
    /// Principal receiving the key.
    pub user_id: UserId,
    /// Administrator-supplied token; generated when absent.
    pub access_key: Option<String>,
}

/// Application service for access key administration.
#[derive(Clone)]
pub struct AccessKeyService {
    principals: Arc<dyn PrincipalRepository>,
    access_keys: Arc<dyn AccessKeyRepository>,
    event_logger: EventLogger,
}

impl AccessKeyService {
    /// Creates a new service from required dependencies.
    #[must_use]
    pub fn new(
        principals: Arc<dyn PrincipalRepository>,
        access_keys: Arc<dyn AccessKeyRepository>,
        event_logger: EventLogger,
    ) -> Self {
        Self {
            principals,
            access_keys,
            event_logger,
        }
    }

    /// Lists every access key with its owner's display name.
    pub async fn list_access_keys(&self, actor: &Principal) -> AppResult<Vec<AccessKeyListing>> {
        require_admin(actor)?;
        self.access_keys.list_access_keys().await
    }

    /// Lists active principals eligible for a new access key.
    pub async fn list_access_key_candidates(&self, actor: &Principal) -> AppResult<Vec<Principal>> {
        require_admin(actor)?;
        self.principals.list_access_key_candidates().await
    }

    /// Returns a fresh token an administrator can confirm as a rotation.
    pub fn preview_rotation_key(&self, actor: &Principal) -> AppResult<AccessKey> {
        require_admin(actor)?;
        Ok(AccessKey::generate())
    }

    /// Issues an access key to a principal that has none.
    pub async fn issue_access_key(
        &self,
        actor: &Principal,
        input: IssueAccessKeyInput,
    ) -> AppResult<AccessKeyRecord> {
        require_admin(actor)?;

        let records = json!({ "user_id": input.user_id.as_i64() });
        self.event_logger
            .log_this(AuditAction::AccessKeyCreated, Some(actor.id()), records, async {
                let principal = self.require_principal(input.user_id).await?;
                if !principal.is_active() {
                    warn!(user = %principal, "access key requested for inactive user");
                    return Err(AppError::Validation(format!(
                        "cannot issue an access key to inactive user {principal}"
                    )));
                }

                let access_key = match input.access_key {
                    Some(value) => AccessKey::new(value)?,
                    None => AccessKey::generate(),
                };

                let record = self
                    .access_keys
                    .create_access_key(principal.id(), &access_key, actor.id())
                    .await?;

                let log_msg = format!(
                    "create access key {} for {}",
                    access_key.masked(),
                    principal.display_name()
                );
                Ok((record, AuditExtra::message(log_msg)))
            })
            .await
    }

    /// Replaces a principal's token in one atomic update.
    pub async fn rotate_access_key(
        &self,
        actor: &Principal,
        user_id: UserId,
        access_key: Option<String>,
    ) -> AppResult<AccessKeyRecord> {
        require_admin(actor)?;

        let records = json!({ "user_id": user_id.as_i64() });
        self.event_logger
            .log_this(AuditAction::AccessKeyRenewed, Some(actor.id()), records, async {
                let current = self.access_keys.find_access_key(user_id).await?.ok_or_else(
                    || AppError::NotFound(format!("access key for user {user_id} not found")),
                )?;

                let display_name = self.display_name(user_id).await?;
                let access_key = match access_key {
                    Some(value) => AccessKey::new(value)?,
                    None => AccessKey::generate(),
                };

                if access_key == current.access_key {
                    warn!(%user_id, "access key rotation supplied the current key");
                    return Err(AppError::NothingChanged(
                        "new access key matches the current one".to_owned(),
                    ));
                }

                let record = self
                    .access_keys
                    .rotate_access_key(user_id, &access_key, actor.id())
                    .await?
                    .ok_or_else(|| {
                        AppError::NotFound(format!("access key for user {user_id} not found"))
                    })?;

                let log_msg = format!(
                    "renew access key {} of {}",
                    access_key.masked(),
                    display_name
                );
                Ok((record, AuditExtra::message(log_msg)))
            })
            .await
    }

    /// Removes a principal's access key, revoking bearer access immediately.
    pub async fn revoke_access_key(&self, actor: &Principal, user_id: UserId) -> AppResult<()> {
        require_admin(actor)?;

        let records = json!({ "user_id": user_id.as_i64() });
        self.event_logger
            .log_this(AuditAction::AccessKeyRevoked, Some(actor.id()), records, async {
                let display_name = self.display_name(user_id).await?;
                let removed = self
                    .access_keys
                    .delete_access_key(user_id)
                    .await?
                    .ok_or_else(|| {
                        AppError::NotFound(format!("access key for user {user_id} not found"))
                    })?;

                let log_msg = format!(
                    "revoke access key {} of {}",
                    removed.access_key.masked(),
                    display_name
                );
                Ok(((), AuditExtra::message(log_msg)))
            })
            .await
    }

    async fn require_principal(&self, user_id: UserId) -> AppResult<Principal> {
        self.principals
            .find_principal(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("user {user_id} not found")))
    }

    async fn display_name(&self, user_id: UserId) -> AppResult<String> {
        Ok(self
            .principals
            .find_principal(user_id)
            .await?
            .map_or_else(|| format!("user {user_id}"), |principal| principal.display_name()))
    }
}
