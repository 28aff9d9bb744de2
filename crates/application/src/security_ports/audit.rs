use async_trait::async_trait;
use chrono::{DateTime, Utc};

use tablegate_core::AppResult;
use tablegate_domain::{AuditAction, UserId};

/// Immutable audit event produced by the event logger.
#[derive(Debug, Clone, PartialEq)]
pub struct AuditEvent {
    /// Stable audit action identifier.
    pub action: AuditAction,
    /// Principal that performed the action, when known.
    pub actor_id: Option<UserId>,
    /// Wall time spent in the audited operation.
    pub duration_ms: u64,
    /// Structured payload: request records plus `log_msg`.
    pub payload: serde_json::Value,
    /// Failure message when the operation was rejected.
    pub error: Option<String>,
}

impl AuditEvent {
    /// Returns whether the audited operation succeeded.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Port for persisting append-only audit events.
#[async_trait]
pub trait AuditRepository: Send + Sync {
    /// Persists one audit event.
    async fn append_event(&self, event: AuditEvent) -> AppResult<()>;
}

/// Audit log entry projection for administrative views.
#[derive(Debug, Clone, PartialEq)]
pub struct AuditLogEntry {
    /// Stable event identifier.
    pub event_id: i64,
    /// Stable action identifier.
    pub action: String,
    /// Actor, when known.
    pub actor_id: Option<UserId>,
    /// Operation duration in milliseconds.
    pub duration_ms: i64,
    /// Structured payload.
    pub payload: serde_json::Value,
    /// Failure message, when present.
    pub error: Option<String>,
    /// Event timestamp.
    pub created_at: DateTime<Utc>,
}

/// Query parameters for audit log listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditLogQuery {
    /// Maximum rows returned.
    pub limit: usize,
    /// Number of rows skipped for offset pagination.
    pub offset: usize,
    /// Optional action filter.
    pub action: Option<String>,
    /// Optional actor filter.
    pub actor_id: Option<UserId>,
}

/// Repository port for reading audit logs.
#[async_trait]
pub trait AuditLogRepository: Send + Sync {
    /// Lists most recent audit entries.
    async fn list_recent_entries(&self, query: AuditLogQuery) -> AppResult<Vec<AuditLogEntry>>;
}
