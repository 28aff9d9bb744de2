//! Fake adapters shared by service tests.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use tokio::sync::Mutex;

use tablegate_core::{AppError, AppResult};
use tablegate_domain::{
    AccessKey, AccessKeyRecord, Capability, CapabilityId, GrantId, GrantStatus, PermissionGrant,
    PermissionGrantDraft, Principal, UserId,
};

use crate::{
    AccessKeyListing, AccessKeyRepository, AuditEvent, AuditLogEntry, AuditLogQuery,
    AuditLogRepository, AuditRepository, CapabilityRepository, Clock, KeyedPrincipal,
    PermissionGrantQuery, PermissionGrantRepository, PrincipalRepository,
};

pub(crate) struct FixedClock(pub DateTime<Utc>);

impl FixedClock {
    pub(crate) fn at(year: i32, month: u32, day: u32) -> Self {
        match Utc.with_ymd_and_hms(year, month, day, 12, 0, 0).single() {
            Some(now) => Self(now),
            None => panic!("invalid fixed clock date {year}-{month}-{day}"),
        }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

#[derive(Default)]
pub(crate) struct FakeSecurityStore {
    pub principals: Mutex<BTreeMap<UserId, Principal>>,
    pub access_keys: Mutex<BTreeMap<UserId, AccessKeyRecord>>,
    pub capabilities: Mutex<Vec<Capability>>,
    pub grants: Mutex<BTreeMap<GrantId, PermissionGrant>>,
    pub events: Mutex<Vec<AuditEvent>>,
    pub principals_unavailable: Mutex<bool>,
    pub audit_unavailable: Mutex<bool>,
}

impl FakeSecurityStore {
    pub(crate) async fn add_principal(&self, principal: Principal) {
        self.principals.lock().await.insert(principal.id(), principal);
    }

    pub(crate) async fn add_key(&self, user_id: UserId, token: &str) {
        let Ok(access_key) = AccessKey::new(token) else {
            panic!("invalid fixture token {token}");
        };
        let now = Utc::now();
        self.access_keys.lock().await.insert(
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

    pub(crate) async fn add_capability(&self, id: i64, resource_name: &str) {
        self.capabilities.lock().await.push(Capability {
            id: CapabilityId::new(id),
            permission_name: "datasource_access".to_owned(),
            resource_name: resource_name.to_owned(),
        });
    }
}

#[async_trait]
impl PrincipalRepository for FakeSecurityStore {
    async fn find_principal(&self, user_id: UserId) -> AppResult<Option<Principal>> {
        if *self.principals_unavailable.lock().await {
            return Err(AppError::Internal("principal store down".to_owned()));
        }
        Ok(self.principals.lock().await.get(&user_id).cloned())
    }

    async fn list_access_key_candidates(&self) -> AppResult<Vec<Principal>> {
        let access_keys = self.access_keys.lock().await;
        Ok(self
            .principals
            .lock()
            .await
            .values()
            .filter(|principal| principal.is_active() && !access_keys.contains_key(&principal.id()))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl AccessKeyRepository for FakeSecurityStore {
    async fn resolve_access_key(&self, access_key: &str) -> AppResult<Option<KeyedPrincipal>> {
        let access_keys = self.access_keys.lock().await;
        let principals = self.principals.lock().await;

        Ok(access_keys
            .values()
            .find(|record| record.access_key.as_str() == access_key)
            .map(|record| KeyedPrincipal {
                record: record.clone(),
                principal: principals.get(&record.user_id).cloned(),
            }))
    }

    async fn find_access_key(&self, user_id: UserId) -> AppResult<Option<AccessKeyRecord>> {
        Ok(self.access_keys.lock().await.get(&user_id).cloned())
    }

    async fn list_access_keys(&self) -> AppResult<Vec<AccessKeyListing>> {
        let access_keys = self.access_keys.lock().await;
        let principals = self.principals.lock().await;
        Ok(access_keys
            .values()
            .map(|record| AccessKeyListing {
                record: record.clone(),
                display_name: principals
                    .get(&record.user_id)
                    .map(Principal::display_name)
                    .unwrap_or_default(),
                changed_by_name: None,
            })
            .collect())
    }

    async fn create_access_key(
        &self,
        user_id: UserId,
        access_key: &AccessKey,
        changed_by: UserId,
    ) -> AppResult<AccessKeyRecord> {
        let mut access_keys = self.access_keys.lock().await;
        if access_keys.contains_key(&user_id)
            || access_keys
                .values()
                .any(|record| record.access_key == *access_key)
        {
            return Err(AppError::Conflict("access key already exists".to_owned()));
        }

        let now = Utc::now();
        let record = AccessKeyRecord {
            user_id,
            access_key: access_key.clone(),
            created_at: now,
            changed_at: now,
            changed_by: Some(changed_by),
        };
        access_keys.insert(user_id, record.clone());
        Ok(record)
    }

    async fn rotate_access_key(
        &self,
        user_id: UserId,
        access_key: &AccessKey,
        changed_by: UserId,
    ) -> AppResult<Option<AccessKeyRecord>> {
        let mut access_keys = self.access_keys.lock().await;
        let Some(record) = access_keys.get_mut(&user_id) else {
            return Ok(None);
        };

        record.access_key = access_key.clone();
        record.changed_at = Utc::now();
        record.changed_by = Some(changed_by);
        Ok(Some(record.clone()))
    }

    async fn delete_access_key(&self, user_id: UserId) -> AppResult<Option<AccessKeyRecord>> {
        Ok(self.access_keys.lock().await.remove(&user_id))
    }
}

#[async_trait]
impl CapabilityRepository for FakeSecurityStore {
    async fn list_grantable_capabilities(&self) -> AppResult<Vec<Capability>> {
        Ok(self.capabilities.lock().await.clone())
    }

    async fn find_grantable_capabilities(
        &self,
        capability_ids: &[CapabilityId],
    ) -> AppResult<Vec<Capability>> {
        Ok(self
            .capabilities
            .lock()
            .await
            .iter()
            .filter(|capability| capability_ids.contains(&capability.id))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl PermissionGrantRepository for FakeSecurityStore {
    async fn create_grant(
        &self,
        draft: &PermissionGrantDraft,
        _created_by: UserId,
    ) -> AppResult<PermissionGrant> {
        let capabilities = self
            .find_grantable_capabilities(draft.capability_ids())
            .await?;
        let mut grants = self.grants.lock().await;
        let next_id = grants.keys().last().map_or(1, |id| id.as_i64() + 1);
        let grant = PermissionGrant::restore(
            GrantId::new(next_id),
            draft.user_id(),
            draft.apply_date(),
            draft.expire_date(),
            None,
            true,
            capabilities,
        );
        grants.insert(grant.id(), grant.clone());
        Ok(grant)
    }

    async fn find_grant(&self, grant_id: GrantId) -> AppResult<Option<PermissionGrant>> {
        Ok(self.grants.lock().await.get(&grant_id).cloned())
    }

    async fn list_grants(&self, query: PermissionGrantQuery) -> AppResult<Vec<PermissionGrant>> {
        Ok(self
            .grants
            .lock()
            .await
            .values()
            .filter(|grant| query.user_id.is_none_or(|user_id| grant.user_id() == user_id))
            .filter(|grant| {
                !query.active_only || grant.status(query.as_of) == GrantStatus::Active
            })
            .skip(query.offset)
            .take(query.limit)
            .cloned()
            .collect())
    }

    async fn force_revoke_grant(
        &self,
        grant_id: GrantId,
        revoked_at: DateTime<Utc>,
        _revoked_by: UserId,
    ) -> AppResult<Option<PermissionGrant>> {
        let mut grants = self.grants.lock().await;
        let Some(grant) = grants.get_mut(&grant_id) else {
            return Ok(None);
        };

        if grant.force_revoke(revoked_at).is_err() {
            return Ok(None);
        }

        Ok(Some(grant.clone()))
    }

    async fn delete_inactive_grant(&self, grant_id: GrantId) -> AppResult<bool> {
        let mut grants = self.grants.lock().await;
        match grants.get(&grant_id) {
            Some(grant) if !grant.is_active() => Ok(grants.remove(&grant_id).is_some()),
            _ => Ok(false),
        }
    }

    async fn deactivate_expired_grants(&self, today: NaiveDate) -> AppResult<u64> {
        let mut grants = self.grants.lock().await;
        let changed = grants
            .values_mut()
            .map(|grant| grant.mark_expired(today))
            .filter(|changed| *changed)
            .count();
        Ok(changed as u64)
    }

    async fn list_active_capabilities(
        &self,
        user_id: UserId,
        today: NaiveDate,
    ) -> AppResult<Vec<Capability>> {
        Ok(self
            .grants
            .lock()
            .await
            .values()
            .filter(|grant| grant.user_id() == user_id && grant.status(today) == GrantStatus::Active)
            .flat_map(|grant| grant.capabilities().to_vec())
            .collect())
    }
}

#[async_trait]
impl AuditRepository for FakeSecurityStore {
    async fn append_event(&self, event: AuditEvent) -> AppResult<()> {
        if *self.audit_unavailable.lock().await {
            return Err(AppError::Internal("audit sink down".to_owned()));
        }
        self.events.lock().await.push(event);
        Ok(())
    }
}

#[async_trait]
impl AuditLogRepository for FakeSecurityStore {
    async fn list_recent_entries(&self, query: AuditLogQuery) -> AppResult<Vec<AuditLogEntry>> {
        Ok(self
            .events
            .lock()
            .await
            .iter()
            .enumerate()
            .rev()
            .map(|(index, event)| AuditLogEntry {
                event_id: index as i64 + 1,
                action: event.action.as_str().to_owned(),
                actor_id: event.actor_id,
                duration_ms: event.duration_ms as i64,
                payload: event.payload.clone(),
                error: event.error.clone(),
                created_at: Utc::now(),
            })
            .filter(|entry| {
                query
                    .action
                    .as_deref()
                    .is_none_or(|action| entry.action == action)
            })
            .filter(|entry| query.actor_id.is_none_or(|actor_id| entry.actor_id == Some(actor_id)))
            .skip(query.offset)
            .take(query.limit)
            .collect())
    }
}
