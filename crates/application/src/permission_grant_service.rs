use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use serde_json::json;
use tracing::warn;

use tablegate_core::{AppError, AppResult};
use tablegate_domain::{
    AuditAction, Capability, CapabilityId, DEFAULT_GRANT_LIFETIME_DAYS, GrantId, GrantStatus,
    PermissionGrant, PermissionGrantDraft, Principal, UserId,
};

use crate::authorization::require_admin;
use crate::{
    AuditExtra, CapabilityRepository, Clock, EventLogger, PermissionGrantQuery,
    PermissionGrantRepository, PrincipalRepository,
};

/// Input payload for granting table permissions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatePermissionGrantInput {
    /// Principal receiving the grant.
    pub user_id: UserId,
    /// Capabilities to attach.
    pub capability_ids: Vec<CapabilityId>,
    /// Effective date; defaults to today.
    pub apply_date: Option<NaiveDate>,
    /// Soft expiration date; defaults to the configured lifetime.
    pub expire_date: Option<NaiveDate>,
}

/// Input payload for administrative grant updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdatePermissionGrantInput {
    /// Whether the administrator asked to terminate the grant now.
    pub force_revoke: bool,
}

/// Listing filters for grants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionGrantListQuery {
    /// Optional owner filter.
    pub user_id: Option<UserId>,
    /// Whether to return only currently active grants.
    pub active_only: bool,
    /// Maximum rows returned.
    pub limit: usize,
    /// Number of rows skipped for pagination.
    pub offset: usize,
}

/// Grant projection with its derived status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionGrantView {
    /// Stored grant.
    pub grant: PermissionGrant,
    /// Status evaluated at read time.
    pub status: GrantStatus,
    /// Expiry date, or the forced termination timestamp marked as forced.
    pub exp_or_terminate_date: String,
    /// Canonical display name of the owner.
    pub display_name: String,
}

/// Application service for the permission grant lifecycle.
#[derive(Clone)]
pub struct PermissionGrantService {
    principals: Arc<dyn PrincipalRepository>,
    capabilities: Arc<dyn CapabilityRepository>,
    grants: Arc<dyn PermissionGrantRepository>,
    event_logger: EventLogger,
    clock: Arc<dyn Clock>,
    lifetime_days: u64,
}

impl PermissionGrantService {
    /// Creates a new service using the default grant lifetime.
    #[must_use]
    pub fn new(
        principals: Arc<dyn PrincipalRepository>,
        capabilities: Arc<dyn CapabilityRepository>,
        grants: Arc<dyn PermissionGrantRepository>,
        event_logger: EventLogger,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            principals,
            capabilities,
            grants,
            event_logger,
            clock,
            lifetime_days: DEFAULT_GRANT_LIFETIME_DAYS,
        }
    }

    /// Overrides the lifetime applied when no expiry date is supplied.
    #[must_use]
    pub fn with_lifetime_days(mut self, lifetime_days: u64) -> Self {
        self.lifetime_days = lifetime_days;
        self
    }

    /// Lists capabilities that may be granted.
    pub async fn list_grantable_capabilities(&self, actor: &Principal) -> AppResult<Vec<Capability>> {
        require_admin(actor)?;
        self.capabilities.list_grantable_capabilities().await
    }

    /// Lists grants with derived status.
    pub async fn list_grants(
        &self,
        actor: &Principal,
        query: PermissionGrantListQuery,
    ) -> AppResult<Vec<PermissionGrantView>> {
        require_admin(actor)?;

        let now = self.clock.now();
        let grants = self
            .grants
            .list_grants(PermissionGrantQuery {
                user_id: query.user_id,
                active_only: query.active_only,
                as_of: now.date_naive(),
                limit: query.limit.clamp(1, 200),
                offset: query.offset,
            })
            .await?;

        let mut display_names: BTreeMap<UserId, String> = BTreeMap::new();
        let mut views = Vec::with_capacity(grants.len());
        for grant in grants {
            let display_name = match display_names.get(&grant.user_id()) {
                Some(display_name) => display_name.clone(),
                None => {
                    let display_name = self.display_name(grant.user_id()).await?;
                    display_names.insert(grant.user_id(), display_name.clone());
                    display_name
                }
            };
            views.push(view(grant, display_name, now));
        }

        Ok(views)
    }

    /// Returns one grant with derived status.
    pub async fn get_grant(
        &self,
        actor: &Principal,
        grant_id: GrantId,
    ) -> AppResult<PermissionGrantView> {
        require_admin(actor)?;

        let grant = self.require_grant(grant_id).await?;
        let display_name = self.display_name(grant.user_id()).await?;
        Ok(view(grant, display_name, self.clock.now()))
    }

    /// Grants a set of table capabilities to a principal.
    pub async fn create_grant(
        &self,
        actor: &Principal,
        input: CreatePermissionGrantInput,
    ) -> AppResult<PermissionGrantView> {
        require_admin(actor)?;

        let records = json!({
            "user_id": input.user_id.as_i64(),
            "capability_ids": input
                .capability_ids
                .iter()
                .map(CapabilityId::as_i64)
                .collect::<Vec<_>>(),
            "apply_date": input.apply_date.map(|date| date.to_string()),
            "expire_date": input.expire_date.map(|date| date.to_string()),
        });

        self.event_logger
            .log_this(
                AuditAction::PermissionGrantCreated,
                Some(actor.id()),
                records,
                async {
                    let principal = self
                        .principals
                        .find_principal(input.user_id)
                        .await?
                        .ok_or_else(|| {
                            AppError::NotFound(format!("user {} not found", input.user_id))
                        })?;

                    if !principal.is_active() {
                        warn!(user = %principal, "table permissions requested for inactive user");
                        return Err(AppError::Validation(format!(
                            "cannot grant table permissions to inactive user {principal}"
                        )));
                    }

                    let now = self.clock.now();
                    let draft = PermissionGrantDraft::new(
                        principal.id(),
                        input.apply_date.unwrap_or_else(|| now.date_naive()),
                        input.expire_date,
                        input.capability_ids,
                        self.lifetime_days,
                    )?;

                    self.ensure_grantable(draft.capability_ids()).await?;

                    let grant = self.grants.create_grant(&draft, actor.id()).await?;
                    let display_name = principal.display_name();
                    let log_msg = format!(
                        "grant permissions of tables: {} to {} til {}",
                        grant.capability_summary(),
                        display_name,
                        grant.expire_date()
                    );

                    Ok((view(grant, display_name, now), AuditExtra::message(log_msg)))
                },
            )
            .await
    }

    /// Applies an administrative update; only force revocation is accepted.
    pub async fn update_grant(
        &self,
        actor: &Principal,
        grant_id: GrantId,
        input: UpdatePermissionGrantInput,
    ) -> AppResult<PermissionGrantView> {
        require_admin(actor)?;

        let records = json!({
            "grant_id": grant_id.as_i64(),
            "force_revoke": input.force_revoke,
        });

        self.event_logger
            .log_this(
                AuditAction::PermissionGrantForceRevoked,
                Some(actor.id()),
                records,
                async {
                    let grant = self.require_grant(grant_id).await?;
                    let now = self.clock.now();

                    if let Err(error) = grant.ensure_mutable(now) {
                        warn!(%grant_id, status = %grant.status(now.date_naive()), "{error}");
                        return Err(error);
                    }

                    if !input.force_revoke {
                        warn!(%grant_id, "grant update requested without force revoke");
                        return Err(AppError::NothingChanged("Nothing Changed".to_owned()));
                    }

                    self.force_revoke_active(actor, grant, now).await
                },
            )
            .await
    }

    /// Terminates an active grant immediately. Irreversible.
    pub async fn force_revoke(
        &self,
        actor: &Principal,
        grant_id: GrantId,
    ) -> AppResult<PermissionGrantView> {
        self.update_grant(
            actor,
            grant_id,
            UpdatePermissionGrantInput { force_revoke: true },
        )
        .await
    }

    /// Permanently removes an inactive grant and its capability links.
    pub async fn delete_grant(&self, actor: &Principal, grant_id: GrantId) -> AppResult<()> {
        require_admin(actor)?;

        let records = json!({ "grant_id": grant_id.as_i64() });
        self.event_logger
            .log_this(
                AuditAction::PermissionGrantDeleted,
                Some(actor.id()),
                records,
                async {
                    let grant = self.require_grant(grant_id).await?;
                    if let Err(error) = grant.ensure_deletable() {
                        warn!(%grant_id, "{error}");
                        return Err(error);
                    }
                    let display_name = self.display_name(grant.user_id()).await?;

                    if !self.grants.delete_inactive_grant(grant_id).await? {
                        return Err(self.explain_failed_delete(grant_id).await);
                    }

                    let log_msg = format!(
                        "delete expired/revoked permissions of tables: {} of {}",
                        grant.capability_summary(),
                        display_name
                    );
                    Ok(((), AuditExtra::message(log_msg)))
                },
            )
            .await
    }

    /// Clears the active flag on every grant past its expiry date.
    pub async fn expire_lapsed_grants(&self, actor: &Principal) -> AppResult<u64> {
        require_admin(actor)?;

        let today = self.clock.now().date_naive();
        let records = json!({ "as_of": today.to_string() });
        self.event_logger
            .log_this(
                AuditAction::PermissionGrantsExpired,
                Some(actor.id()),
                records,
                async {
                    let expired = self.grants.deactivate_expired_grants(today).await?;
                    let log_msg =
                        format!("deactivate {expired} lapsed permission grants as of {today}");
                    Ok((expired, AuditExtra::message(log_msg)))
                },
            )
            .await
    }

    /// Lists the capabilities a principal currently holds through active grants.
    pub async fn list_effective_capabilities(
        &self,
        principal: &Principal,
    ) -> AppResult<Vec<Capability>> {
        let today = self.clock.now().date_naive();
        let capabilities = self
            .grants
            .list_active_capabilities(principal.id(), today)
            .await?;

        let mut by_id = BTreeMap::new();
        for capability in capabilities {
            by_id.entry(capability.id).or_insert(capability);
        }

        Ok(by_id.into_values().collect())
    }

    async fn force_revoke_active(
        &self,
        actor: &Principal,
        grant: PermissionGrant,
        now: DateTime<Utc>,
    ) -> AppResult<(PermissionGrantView, AuditExtra)> {
        let grant_id = grant.id();
        let display_name = self.display_name(grant.user_id()).await?;
        let revoked = self
            .grants
            .force_revoke_grant(grant_id, now, actor.id())
            .await?
            .ok_or_else(|| {
                warn!(%grant_id, "force revoke lost a concurrent transition");
                AppError::InvalidStateTransition(format!(
                    "permission grant {grant_id} was terminated concurrently"
                ))
            })?;

        let log_msg = format!(
            "force revoke permissions of tables: {} of {}",
            revoked.capability_summary(),
            display_name
        );

        Ok((
            view(revoked, display_name, now),
            AuditExtra::message(log_msg),
        ))
    }

    async fn ensure_grantable(&self, capability_ids: &[CapabilityId]) -> AppResult<()> {
        let found = self
            .capabilities
            .find_grantable_capabilities(capability_ids)
            .await?;

        let missing: Vec<String> = capability_ids
            .iter()
            .filter(|id| !found.iter().any(|capability| capability.id == **id))
            .map(ToString::to_string)
            .collect();

        if !missing.is_empty() {
            warn!(missing = ?missing, "grant requested non-grantable capabilities");
            return Err(AppError::Validation(format!(
                "capabilities are not grantable table permissions: {}",
                missing.join(", ")
            )));
        }

        Ok(())
    }

    async fn explain_failed_delete(&self, grant_id: GrantId) -> AppError {
        match self.grants.find_grant(grant_id).await {
            Ok(Some(current)) => current.ensure_deletable().err().unwrap_or_else(|| {
                AppError::Conflict(format!(
                    "permission grant {grant_id} changed while deleting"
                ))
            }),
            Ok(None) => AppError::NotFound(format!("permission grant {grant_id} not found")),
            Err(error) => error,
        }
    }

    async fn require_grant(&self, grant_id: GrantId) -> AppResult<PermissionGrant> {
        self.grants
            .find_grant(grant_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("permission grant {grant_id} not found")))
    }

    async fn display_name(&self, user_id: UserId) -> AppResult<String> {
        Ok(self
            .principals
            .find_principal(user_id)
            .await?
            .map_or_else(|| format!("user {user_id}"), |principal| principal.display_name()))
    }
}

fn view(grant: PermissionGrant, display_name: String, now: DateTime<Utc>) -> PermissionGrantView {
    PermissionGrantView {
        status: grant.status(now.date_naive()),
        exp_or_terminate_date: grant.exp_or_terminate_date(),
        display_name,
        grant,
    }
}

#[cfg(test)]
mod tests;
