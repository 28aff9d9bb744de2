use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use tokio::sync::RwLock;

use tablegate_application::{
    AccessKeyListing, AccessKeyRepository, AuditEvent, AuditLogEntry, AuditLogQuery,
    AuditLogRepository, AuditRepository, CapabilityRepository, KeyedPrincipal,
    PermissionGrantQuery, PermissionGrantRepository, PrincipalRepository,
};
use tablegate_core::{AppError, AppResult};
use tablegate_domain::{
    AccessKey, AccessKeyRecord, Capability, CapabilityId, DATASOURCE_ACCESS_PERMISSION, GrantId,
    GrantStatus, PermissionGrant, PermissionGrantDraft, Principal, UserId,
};

#[derive(Debug, Default)]
struct SecurityState {
    principals: BTreeMap<UserId, Principal>,
    access_keys: BTreeMap<UserId, AccessKeyRecord>,
    capabilities: BTreeMap<CapabilityId, Capability>,
    grants: BTreeMap<GrantId, PermissionGrant>,
    audit_log: Vec<(AuditEvent, DateTime<Utc>)>,
    next_grant_id: i64,
}

/// In-memory implementation of every security port.
///
/// All state sits behind one lock, so each port call observes a single
/// consistent snapshot.
#[derive(Debug, Default)]
pub struct InMemorySecurityStore {
    state: RwLock<SecurityState>,
}

impl InMemorySecurityStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a principal.
    pub async fn insert_principal(&self, principal: Principal) {
        self.state
            .write()
            .await
            .principals
            .insert(principal.id(), principal);
    }

    /// Assigns a token to a principal, replacing any existing key.
    pub async fn insert_access_key(&self, user_id: UserId, access_key: AccessKey) {
        let now = Utc::now();
        self.state.write().await.access_keys.insert(
            user_id,
            AccessKeyRecord {
                user_id,
                access_key,
                created_at: now,
                changed_at: now,
                changed_by: None,
            },
        );
    }

    /// Registers a grantable `datasource_access` capability for a data table.
    pub async fn insert_table_capability(&self, capability_id: CapabilityId, resource_name: &str) {
        self.state.write().await.capabilities.insert(
            capability_id,
            Capability {
                id: capability_id,
                permission_name: DATASOURCE_ACCESS_PERMISSION.to_owned(),
                resource_name: resource_name.to_owned(),
            },
        );
    }

    /// Returns every appended audit event in order.
    pub async fn audit_events(&self) -> Vec<AuditEvent> {
        self.state
            .read()
            .await
            .audit_log
            .iter()
            .map(|(event, _)| event.clone())
            .collect()
    }
}

#[async_trait]
impl PrincipalRepository for InMemorySecurityStore {
    async fn find_principal(&self, user_id: UserId) -> AppResult<Option<Principal>> {
        Ok(self.state.read().await.principals.get(&user_id).cloned())
    }

    async fn list_access_key_candidates(&self) -> AppResult<Vec<Principal>> {
        let state = self.state.read().await;
        let mut candidates: Vec<Principal> = state
            .principals
            .values()
            .filter(|principal| {
                principal.is_active() && !state.access_keys.contains_key(&principal.id())
            })
            .cloned()
            .collect();
        candidates.sort_by(|left, right| left.username().cmp(right.username()));
        Ok(candidates)
    }
}

#[async_trait]
impl AccessKeyRepository for InMemorySecurityStore {
    async fn resolve_access_key(&self, access_key: &str) -> AppResult<Option<KeyedPrincipal>> {
        let state = self.state.read().await;
        Ok(state
            .access_keys
            .values()
            .find(|record| record.access_key.as_str() == access_key)
            .map(|record| KeyedPrincipal {
                record: record.clone(),
                principal: state.principals.get(&record.user_id).cloned(),
            }))
    }

    async fn find_access_key(&self, user_id: UserId) -> AppResult<Option<AccessKeyRecord>> {
        Ok(self.state.read().await.access_keys.get(&user_id).cloned())
    }

    async fn list_access_keys(&self) -> AppResult<Vec<AccessKeyListing>> {
        let state = self.state.read().await;
        let display_name = |user_id: UserId| {
            state
                .principals
                .get(&user_id)
                .map_or_else(|| format!("user {user_id}"), Principal::display_name)
        };

        let mut listings: Vec<AccessKeyListing> = state
            .access_keys
            .values()
            .map(|record| AccessKeyListing {
                record: record.clone(),
                display_name: display_name(record.user_id),
                changed_by_name: record.changed_by.map(display_name),
            })
            .collect();
        listings.sort_by(|left, right| right.record.changed_at.cmp(&left.record.changed_at));
        Ok(listings)
    }

    async fn create_access_key(
        &self,
        user_id: UserId,
        access_key: &AccessKey,
        changed_by: UserId,
    ) -> AppResult<AccessKeyRecord> {
        let mut state = self.state.write().await;
        if !state.principals.contains_key(&user_id) {
            return Err(AppError::NotFound(format!("user '{user_id}' not found")));
        }
        if state.access_keys.contains_key(&user_id) {
            return Err(AppError::Conflict(format!(
                "user '{user_id}' already owns an access key"
            )));
        }
        if state
            .access_keys
            .values()
            .any(|record| record.access_key == *access_key)
        {
            return Err(AppError::Conflict(
                "access key is already assigned to another user".to_owned(),
            ));
        }

        let now = Utc::now();
        let record = AccessKeyRecord {
            user_id,
            access_key: access_key.clone(),
            created_at: now,
            changed_at: now,
            changed_by: Some(changed_by),
        };
        state.access_keys.insert(user_id, record.clone());
        Ok(record)
    }

    async fn rotate_access_key(
        &self,
        user_id: UserId,
        access_key: &AccessKey,
        changed_by: UserId,
    ) -> AppResult<Option<AccessKeyRecord>> {
        let mut state = self.state.write().await;
        if state
            .access_keys
            .values()
            .any(|record| record.user_id != user_id && record.access_key == *access_key)
        {
            return Err(AppError::Conflict(
                "access key is already assigned to another user".to_owned(),
            ));
        }

        let Some(record) = state.access_keys.get_mut(&user_id) else {
            return Ok(None);
        };
        record.access_key = access_key.clone();
        record.changed_at = Utc::now();
        record.changed_by = Some(changed_by);
        Ok(Some(record.clone()))
    }

    async fn delete_access_key(&self, user_id: UserId) -> AppResult<Option<AccessKeyRecord>> {
        Ok(self.state.write().await.access_keys.remove(&user_id))
    }
}

#[async_trait]
impl CapabilityRepository for InMemorySecurityStore {
    async fn list_grantable_capabilities(&self) -> AppResult<Vec<Capability>> {
        let mut capabilities: Vec<Capability> =
            self.state.read().await.capabilities.values().cloned().collect();
        capabilities.sort_by(|left, right| left.resource_name.cmp(&right.resource_name));
        Ok(capabilities)
    }

    async fn find_grantable_capabilities(
        &self,
        capability_ids: &[CapabilityId],
    ) -> AppResult<Vec<Capability>> {
        let state = self.state.read().await;
        Ok(capability_ids
            .iter()
            .filter_map(|capability_id| state.capabilities.get(capability_id).cloned())
            .collect())
    }
}

#[async_trait]
impl PermissionGrantRepository for InMemorySecurityStore {
    async fn create_grant(
        &self,
        draft: &PermissionGrantDraft,
        _created_by: UserId,
    ) -> AppResult<PermissionGrant> {
        let mut state = self.state.write().await;
        let capabilities = draft
            .capability_ids()
            .iter()
            .map(|capability_id| {
                state.capabilities.get(capability_id).cloned().ok_or_else(|| {
                    AppError::Validation(format!("capability '{capability_id}' does not exist"))
                })
            })
            .collect::<AppResult<Vec<_>>>()?;

        state.next_grant_id += 1;
        let grant = PermissionGrant::restore(
            GrantId::new(state.next_grant_id),
            draft.user_id(),
            draft.apply_date(),
            draft.expire_date(),
            None,
            true,
            capabilities,
        );
        state.grants.insert(grant.id(), grant.clone());
        Ok(grant)
    }

    async fn find_grant(&self, grant_id: GrantId) -> AppResult<Option<PermissionGrant>> {
        Ok(self.state.read().await.grants.get(&grant_id).cloned())
    }

    async fn list_grants(&self, query: PermissionGrantQuery) -> AppResult<Vec<PermissionGrant>> {
        let state = self.state.read().await;
        let mut grants: Vec<PermissionGrant> = state
            .grants
            .values()
            .filter(|grant| query.user_id.is_none_or(|user_id| grant.user_id() == user_id))
            .filter(|grant| !query.active_only || grant.status(query.as_of) == GrantStatus::Active)
            .cloned()
            .collect();
        grants.sort_by(|left, right| {
            left.user_id()
                .cmp(&right.user_id())
                .then_with(|| right.id().cmp(&left.id()))
        });

        Ok(grants
            .into_iter()
            .skip(query.offset)
            .take(query.limit)
            .collect())
    }

    async fn force_revoke_grant(
        &self,
        grant_id: GrantId,
        revoked_at: DateTime<Utc>,
        _revoked_by: UserId,
    ) -> AppResult<Option<PermissionGrant>> {
        let mut state = self.state.write().await;
        let Some(grant) = state.grants.get_mut(&grant_id) else {
            return Ok(None);
        };

        if grant.force_revoke(revoked_at).is_err() {
            return Ok(None);
        }
        Ok(Some(grant.clone()))
    }

    async fn delete_inactive_grant(&self, grant_id: GrantId) -> AppResult<bool> {
        let mut state = self.state.write().await;
        let deletable = state
            .grants
            .get(&grant_id)
            .is_some_and(|grant| !grant.is_active());
        if deletable {
            state.grants.remove(&grant_id);
        }
        Ok(deletable)
    }

    async fn deactivate_expired_grants(&self, today: NaiveDate) -> AppResult<u64> {
        let mut state = self.state.write().await;
        let mut changed = 0;
        for grant in state.grants.values_mut() {
            if grant.mark_expired(today) {
                changed += 1;
            }
        }
        Ok(changed)
    }

    async fn list_active_capabilities(
        &self,
        user_id: UserId,
        today: NaiveDate,
    ) -> AppResult<Vec<Capability>> {
        let state = self.state.read().await;
        let mut capabilities: BTreeMap<CapabilityId, Capability> = BTreeMap::new();
        for grant in state.grants.values().filter(|grant| {
            grant.user_id() == user_id && grant.status(today) == GrantStatus::Active
        }) {
            for capability in grant.capabilities() {
                capabilities
                    .entry(capability.id)
                    .or_insert_with(|| capability.clone());
            }
        }
        Ok(capabilities.into_values().collect())
    }
}

#[async_trait]
impl AuditRepository for InMemorySecurityStore {
    async fn append_event(&self, event: AuditEvent) -> AppResult<()> {
        self.state.write().await.audit_log.push((event, Utc::now()));
        Ok(())
    }
}

#[async_trait]
impl AuditLogRepository for InMemorySecurityStore {
    async fn list_recent_entries(&self, query: AuditLogQuery) -> AppResult<Vec<AuditLogEntry>> {
        let state = self.state.read().await;
        Ok(state
            .audit_log
            .iter()
            .enumerate()
            .rev()
            .filter(|(_, (event, _))| {
                query
                    .action
                    .as_deref()
                    .is_none_or(|action| event.action.as_str() == action)
            })
            .filter(|(_, (event, _))| {
                query
                    .actor_id
                    .is_none_or(|actor_id| event.actor_id == Some(actor_id))
            })
            .skip(query.offset)
            .take(query.limit)
            .map(|(index, (event, created_at))| AuditLogEntry {
                event_id: i64::try_from(index + 1).unwrap_or(i64::MAX),
                action: event.action.as_str().to_owned(),
                actor_id: event.actor_id,
                duration_ms: i64::try_from(event.duration_ms).unwrap_or(i64::MAX),
                payload: event.payload.clone(),
                error: event.error.clone(),
                created_at: *created_at,
            })
            .collect())
    }
}
