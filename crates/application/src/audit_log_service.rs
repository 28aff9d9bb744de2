use std::sync::Arc;

use tablegate_core::AppResult;
use tablegate_domain::Principal;

use crate::authorization::require_admin;
use crate::{AuditLogEntry, AuditLogQuery, AuditLogRepository};

/// Read side of the audit log.
#[derive(Clone)]
pub struct AuditLogService {
    audit_log_repository: Arc<dyn AuditLogRepository>,
}

impl AuditLogService {
    /// Creates a new service from its repository.
    #[must_use]
    pub fn new(audit_log_repository: Arc<dyn AuditLogRepository>) -> Self {
        Self {
            audit_log_repository,
        }
    }

    /// Returns recent audit entries, newest first.
    pub async fn list_audit_log(
        &self,
        actor: &Principal,
        query: AuditLogQuery,
    ) -> AppResult<Vec<AuditLogEntry>> {
        require_admin(actor)?;
        self.audit_log_repository
            .list_recent_entries(AuditLogQuery {
                limit: query.limit.clamp(1, 200),
                ..query
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use tablegate_core::AppError;
    use tablegate_domain::{AuditAction, Principal, UserId};

    use crate::test_support::FakeSecurityStore;
    use crate::{AuditEvent, AuditLogQuery, EventLogger};

    use super::AuditLogService;

    fn query(action: Option<&str>) -> AuditLogQuery {
        AuditLogQuery {
            limit: 0,
            offset: 0,
            action: action.map(str::to_owned),
            actor_id: None,
        }
    }

    #[tokio::test]
    async fn lists_newest_entries_for_admins_only() {
        let store = Arc::new(FakeSecurityStore::default());
        let logger = EventLogger::new(store.clone());
        for action in [AuditAction::AccessKeyCreated, AuditAction::AccessKeyRevoked] {
            let recorded = logger
                .record(AuditEvent {
                    action,
                    actor_id: Some(UserId::new(1)),
                    duration_ms: 3,
                    payload: json!({ "log_msg": action.as_str() }),
                    error: None,
                })
                .await;
            assert!(recorded.is_ok());
        }

        let service = AuditLogService::new(store);
        let admin =
            Principal::new(UserId::new(1), "root", "Ada", "Admin", true).with_roles(["Admin"]);
        let analyst = Principal::new(UserId::new(2), "analyst", "Ann", "Lyst", true);

        let denied = service.list_audit_log(&analyst, query(None)).await;
        assert!(matches!(denied, Err(AppError::Forbidden(_))));

        let newest = service.list_audit_log(&admin, query(None)).await;
        assert!(matches!(
            newest,
            Ok(ref entries)
                if entries.len() == 1 && entries[0].action == "security.access_key.revoked"
        ));

        let filtered = service
            .list_audit_log(&admin, query(Some("security.access_key.created")))
            .await;
        assert!(matches!(filtered, Ok(ref entries) if entries.len() == 1));
    }
}
