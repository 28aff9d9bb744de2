use tablegate_application::{
    AccessKeyGate, AccessKeyService, AuditLogService, EventLogger, PermissionGrantService,
};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub access_key_gate: AccessKeyGate,
    pub event_logger: EventLogger,
    pub access_key_service: AccessKeyService,
    pub permission_grant_service: PermissionGrantService,
    pub audit_log_service: AuditLogService,
    pub sso_fallback_email_domain: String,
}
