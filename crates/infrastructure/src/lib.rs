//! Infrastructure adapters for application ports.

#![forbid(unsafe_code)]

mod in_memory_security_store;
mod postgres_access_key_repository;
mod postgres_audit_log_repository;
mod postgres_audit_repository;
mod postgres_capability_repository;
mod postgres_permission_grant_repository;
mod postgres_principal_repository;

#[cfg(test)]
mod postgres_test_support;

pub use in_memory_security_store::InMemorySecurityStore;
pub use postgres_access_key_repository::PostgresAccessKeyRepository;
pub use postgres_audit_log_repository::PostgresAuditLogRepository;
pub use postgres_audit_repository::PostgresAuditRepository;
pub use postgres_capability_repository::PostgresCapabilityRepository;
pub use postgres_permission_grant_repository::PostgresPermissionGrantRepository;
pub use postgres_principal_repository::PostgresPrincipalRepository;
