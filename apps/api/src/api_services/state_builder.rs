use std::sync::Arc;

use sqlx::PgPool;
use tablegate_application::{
    AccessKeyGate, AccessKeyRepository, AccessKeyService, AuditLogRepository, AuditLogService,
    AuditRepository, CapabilityRepository, Clock, EventLogger, PermissionGrantRepository,
    PermissionGrantService, PrincipalRepository,
};
use tablegate_infrastructure::{
    PostgresAccessKeyRepository, PostgresAuditLogRepository, PostgresAuditRepository,
    PostgresCapabilityRepository, PostgresPermissionGrantRepository, PostgresPrincipalRepository,
};

use crate::api_config::ApiConfig;
use crate::state::AppState;

/// Port implementations backing every service in [`AppState`].
pub struct SecurityPorts {
    pub principals: Arc<dyn PrincipalRepository>,
    pub access_keys: Arc<dyn AccessKeyRepository>,
    pub capabilities: Arc<dyn CapabilityRepository>,
    pub grants: Arc<dyn PermissionGrantRepository>,
    pub audit: Arc<dyn AuditRepository>,
    pub audit_log: Arc<dyn AuditLogRepository>,
}

impl SecurityPorts {
    pub fn postgres(pool: &PgPool) -> Self {
        Self {
            principals: Arc::new(PostgresPrincipalRepository::new(pool.clone())),
            access_keys: Arc::new(PostgresAccessKeyRepository::new(pool.clone())),
            capabilities: Arc::new(PostgresCapabilityRepository::new(pool.clone())),
            grants: Arc::new(PostgresPermissionGrantRepository::new(pool.clone())),
            audit: Arc::new(PostgresAuditRepository::new(pool.clone())),
            audit_log: Arc::new(PostgresAuditLogRepository::new(pool.clone())),
        }
    }
}

pub fn build_app_state(ports: SecurityPorts, clock: Arc<dyn Clock>, config: &ApiConfig) -> AppState {
    let event_logger = EventLogger::new(ports.audit);

    AppState {
        access_key_gate: AccessKeyGate::new(ports.access_keys.clone()),
        access_key_service: AccessKeyService::new(
            ports.principals.clone(),
            ports.access_keys,
            event_logger.clone(),
        ),
        permission_grant_service: PermissionGrantService::new(
            ports.principals,
            ports.capabilities,
            ports.grants,
            event_logger.clone(),
            clock,
        )
        .with_lifetime_days(config.grant_lifetime_days),
        audit_log_service: AuditLogService::new(ports.audit_log),
        event_logger,
        sso_fallback_email_domain: config.sso_fallback_email_domain.clone(),
    }
}
