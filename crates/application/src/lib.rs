//! Application services and ports.

#![forbid(unsafe_code)]

mod access_key_gate;
mod access_key_service;
mod audit_log_service;
mod authorization;
mod event_logger;
mod permission_grant_service;
mod security_ports;
mod sso_identity;

#[cfg(test)]
mod test_support;

pub use access_key_gate::{
    AccessKeyGate, GateError, GateRejection, GateRejectionKind, GateRequest,
};
pub use access_key_service::{AccessKeyService, IssueAccessKeyInput};
pub use audit_log_service::AuditLogService;
pub use authorization::require_admin;
pub use event_logger::{AuditExtra, EventLogger};
pub use permission_grant_service::{
    CreatePermissionGrantInput, PermissionGrantListQuery, PermissionGrantService,
    PermissionGrantView, UpdatePermissionGrantInput,
};
pub use security_ports::{
    AccessKeyListing, AccessKeyRepository, AuditEvent, AuditLogEntry, AuditLogQuery,
    AuditLogRepository, AuditRepository, CapabilityRepository, Clock, KeyedPrincipal,
    PermissionGrantQuery, PermissionGrantRepository, PrincipalRepository, SystemClock,
};
pub use sso_identity::{MappedIdentity, OAuthProvider, map_provider_identity};
