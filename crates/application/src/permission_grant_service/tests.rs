use std::sync::Arc;

use chrono::NaiveDate;

use tablegate_core::AppError;
use tablegate_domain::{AuditAction, CapabilityId, GrantId, GrantStatus, Principal, UserId};

use crate::test_support::{FakeSecurityStore, FixedClock};
use crate::{Clock, EventLogger};

use super::{
    CreatePermissionGrantInput, PermissionGrantListQuery, PermissionGrantService,
    UpdatePermissionGrantInput,
};

fn admin() -> Principal {
    Principal::new(UserId::new(1), "root", "Ada", "Admin", true).with_roles(["Admin"])
}

fn analyst() -> Principal {
    Principal::new(UserId::new(2), "analyst", "Ann", "Lyst", true).with_roles(["Gamma"])
}

fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap_or_default()
}

async fn store() -> Arc<FakeSecurityStore> {
    let store = Arc::new(FakeSecurityStore::default());
    store.add_principal(admin()).await;
    store.add_principal(analyst()).await;
    store
        .add_principal(Principal::new(UserId::new(3), "gone", "Old", "Timer", false))
        .await;
    store.add_capability(11, "[warehouse].[orders](id:3)").await;
    store.add_capability(12, "[warehouse].[customers](id:4)").await;
    store
}

fn service_at(store: &Arc<FakeSecurityStore>, clock: FixedClock) -> PermissionGrantService {
    let clock: Arc<dyn Clock> = Arc::new(clock);
    PermissionGrantService::new(
        store.clone(),
        store.clone(),
        store.clone(),
        EventLogger::new(store.clone()),
        clock,
    )
}

fn grant_input(capability_ids: &[i64]) -> CreatePermissionGrantInput {
    CreatePermissionGrantInput {
        user_id: UserId::new(2),
        capability_ids: capability_ids.iter().copied().map(CapabilityId::new).collect(),
        apply_date: None,
        expire_date: None,
    }
}

async fn create_on(store: &Arc<FakeSecurityStore>, clock: FixedClock) -> GrantId {
    let created = service_at(store, clock)
        .create_grant(&admin(), grant_input(&[11, 12]))
        .await;

    match created {
        Ok(view) => view.grant.id(),
        Err(error) => panic!("grant creation failed: {error}"),
    }
}

#[tokio::test]
async fn create_defaults_expiry_and_audits_summary() {
    let store = store().await;
    let service = service_at(&store, FixedClock::at(2024, 1, 1));

    let created = service.create_grant(&admin(), grant_input(&[11])).await;

    let Ok(view) = created else {
        panic!("expected grant");
    };
    assert_eq!(view.grant.apply_date(), date(2024, 1, 1));
    assert_eq!(view.grant.expire_date(), date(2024, 7, 2));
    assert_eq!(view.status, GrantStatus::Active);
    assert_eq!(view.display_name, "Ann Lyst (analyst)");

    let events = store.events.lock().await;
    assert_eq!(events[0].action, AuditAction::PermissionGrantCreated);
    assert_eq!(
        events[0].payload["log_msg"],
        "grant permissions of tables: datasource_access on [warehouse].[orders](id:3) \
         to Ann Lyst (analyst) til 2024-07-02"
    );
}

#[tokio::test]
async fn create_rejects_unknown_capabilities_and_inactive_users() {
    let store = store().await;
    let service = service_at(&store, FixedClock::at(2024, 1, 1));

    let unknown = service.create_grant(&admin(), grant_input(&[11, 99])).await;
    assert!(matches!(unknown, Err(AppError::Validation(ref message)) if message.contains("99")));

    let mut inactive = grant_input(&[11]);
    inactive.user_id = UserId::new(3);
    let inactive = service.create_grant(&admin(), inactive).await;
    assert!(matches!(inactive, Err(AppError::Validation(_))));

    assert!(store.grants.lock().await.is_empty());
}

#[tokio::test]
async fn create_requires_admin() {
    let store = store().await;
    let service = service_at(&store, FixedClock::at(2024, 1, 1));

    let result = service.create_grant(&analyst(), grant_input(&[11])).await;

    assert!(matches!(result, Err(AppError::Forbidden(_))));
}

#[tokio::test]
async fn grant_read_after_expiry_reports_expired() {
    let store = store().await;
    let grant_id = create_on(&store, FixedClock::at(2024, 1, 1)).await;

    let later = service_at(&store, FixedClock::at(2024, 8, 1));
    let view = later.get_grant(&admin(), grant_id).await;

    assert!(matches!(view, Ok(ref view) if view.status == GrantStatus::Expired));
}

#[tokio::test]
async fn force_revoke_marks_grant_and_second_call_fails() {
    let store = store().await;
    let grant_id = create_on(&store, FixedClock::at(2024, 1, 1)).await;
    let service = service_at(&store, FixedClock::at(2024, 3, 1));

    let revoked = service.force_revoke(&admin(), grant_id).await;
    let Ok(revoked) = revoked else {
        panic!("expected revoke");
    };
    assert_eq!(revoked.status, GrantStatus::ForceRevoked);
    assert!(!revoked.grant.is_active());
    assert_eq!(revoked.exp_or_terminate_date, "2024-03-01 12:00:00 (forced)");

    let again = service.force_revoke(&admin(), grant_id).await;
    assert!(matches!(again, Err(AppError::InvalidStateTransition(_))));

    let view = service_at(&store, FixedClock::at(2024, 5, 1))
        .get_grant(&admin(), grant_id)
        .await;
    assert!(matches!(view, Ok(ref view) if view.status == GrantStatus::ForceRevoked));
}

#[tokio::test]
async fn force_revoke_succeeds_when_the_audit_sink_fails() {
    let store = store().await;
    let grant_id = create_on(&store, FixedClock::at(2024, 1, 1)).await;
    let service = service_at(&store, FixedClock::at(2024, 3, 1));
    *store.audit_unavailable.lock().await = true;

    let revoked = service.force_revoke(&admin(), grant_id).await;
    assert!(matches!(revoked, Ok(ref view) if view.status == GrantStatus::ForceRevoked));

    let stored = store.grants.lock().await.get(&grant_id).cloned();
    assert!(stored.is_some_and(|grant| !grant.is_active()));
}

#[tokio::test]
async fn failed_owner_lookup_aborts_before_revoking_or_deleting() {
    let store = store().await;
    let grant_id = create_on(&store, FixedClock::at(2024, 1, 1)).await;
    let service = service_at(&store, FixedClock::at(2024, 3, 1));
    *store.principals_unavailable.lock().await = true;

    let revoked = service.force_revoke(&admin(), grant_id).await;
    assert!(matches!(revoked, Err(AppError::Internal(_))));
    let stored = store.grants.lock().await.get(&grant_id).cloned();
    assert!(stored.is_some_and(|grant| grant.is_active()));

    *store.principals_unavailable.lock().await = false;
    assert!(service.force_revoke(&admin(), grant_id).await.is_ok());
    *store.principals_unavailable.lock().await = true;

    let deleted = service.delete_grant(&admin(), grant_id).await;
    assert!(matches!(deleted, Err(AppError::Internal(_))));
    assert!(store.grants.lock().await.contains_key(&grant_id));
}

#[tokio::test]
async fn update_without_force_revoke_changes_nothing() {
    let store = store().await;
    let grant_id = create_on(&store, FixedClock::at(2024, 1, 1)).await;
    let service = service_at(&store, FixedClock::at(2024, 2, 1));

    let result = service
        .update_grant(
            &admin(),
            grant_id,
            UpdatePermissionGrantInput {
                force_revoke: false,
            },
        )
        .await;

    assert!(matches!(result, Err(AppError::NothingChanged(_))));
    let stored = store.grants.lock().await;
    assert!(stored.get(&grant_id).is_some_and(|grant| grant.is_active()));
}

#[tokio::test]
async fn update_of_expired_grant_is_an_invalid_transition() {
    let store = store().await;
    let grant_id = create_on(&store, FixedClock::at(2024, 1, 1)).await;
    let service = service_at(&store, FixedClock::at(2024, 8, 1));

    let result = service
        .update_grant(
            &admin(),
            grant_id,
            UpdatePermissionGrantInput {
                force_revoke: false,
            },
        )
        .await;

    assert!(matches!(result, Err(AppError::InvalidStateTransition(_))));
}

#[tokio::test]
async fn delete_requires_revocation_first() {
    let store = store().await;
    let grant_id = create_on(&store, FixedClock::at(2024, 1, 1)).await;
    let service = service_at(&store, FixedClock::at(2024, 3, 1));

    let blocked = service.delete_grant(&admin(), grant_id).await;
    assert!(matches!(blocked, Err(AppError::DeleteOfActiveGrant(_))));

    assert!(service.force_revoke(&admin(), grant_id).await.is_ok());
    assert!(service.delete_grant(&admin(), grant_id).await.is_ok());
    assert!(store.grants.lock().await.is_empty());

    let events = store.events.lock().await;
    let last = events.last().map(|event| event.action);
    assert_eq!(last, Some(AuditAction::PermissionGrantDeleted));
}

#[tokio::test]
async fn expiry_sweep_makes_lapsed_grants_deletable() {
    let store = store().await;
    let grant_id = create_on(&store, FixedClock::at(2024, 1, 1)).await;
    let service = service_at(&store, FixedClock::at(2024, 8, 1));

    let blocked = service.delete_grant(&admin(), grant_id).await;
    assert!(matches!(blocked, Err(AppError::DeleteOfActiveGrant(_))));

    let expired = service.expire_lapsed_grants(&admin()).await;
    assert!(matches!(expired, Ok(1)));
    assert!(service.delete_grant(&admin(), grant_id).await.is_ok());
}

#[tokio::test]
async fn effective_capabilities_follow_active_grants() {
    let store = store().await;
    let grant_id = create_on(&store, FixedClock::at(2024, 1, 1)).await;
    let service = service_at(&store, FixedClock::at(2024, 2, 1));

    let held = service.list_effective_capabilities(&analyst()).await;
    assert!(matches!(held, Ok(ref held) if held.len() == 2));

    assert!(service.force_revoke(&admin(), grant_id).await.is_ok());
    let held = service.list_effective_capabilities(&analyst()).await;
    assert!(matches!(held, Ok(ref held) if held.is_empty()));
}

#[tokio::test]
async fn list_filters_active_grants() {
    let store = store().await;
    let revoked_id = create_on(&store, FixedClock::at(2024, 1, 1)).await;
    let _active_id = create_on(&store, FixedClock::at(2024, 1, 1)).await;
    let service = service_at(&store, FixedClock::at(2024, 2, 1));
    assert!(service.force_revoke(&admin(), revoked_id).await.is_ok());

    let all = service
        .list_grants(
            &admin(),
            PermissionGrantListQuery {
                user_id: Some(UserId::new(2)),
                active_only: false,
                limit: 50,
                offset: 0,
            },
        )
        .await;
    let active = service
        .list_grants(
            &admin(),
            PermissionGrantListQuery {
                user_id: None,
                active_only: true,
                limit: 50,
                offset: 0,
            },
        )
        .await;

    assert!(matches!(all, Ok(ref all) if all.len() == 2));
    assert!(matches!(
        active,
        Ok(ref active) if active.len() == 1 && active[0].status == GrantStatus::Active
    ));
}
