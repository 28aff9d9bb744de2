use serde::Serialize;
use tablegate_application::AuditLogEntry;
use ts_rs::TS;

/// API representation of an audit log entry.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/audit-log-entry-response.ts"
)]
pub struct AuditLogEntryResponse {
    pub event_id: i64,
    pub action: String,
    pub actor_id: Option<i64>,
    pub duration_ms: i64,
    pub success: bool,
    #[ts(type = "unknown")]
    pub payload: serde_json::Value,
    pub error: Option<String>,
    pub created_at: String,
}

impl From<AuditLogEntry> for AuditLogEntryResponse {
    fn from(value: AuditLogEntry) -> Self {
        Self {
            event_id: value.event_id,
            action: value.action,
            actor_id: value.actor_id.map(|actor_id| actor_id.as_i64()),
            duration_ms: value.duration_ms,
            success: value.error.is_none(),
            payload: value.payload,
            error: value.error,
            created_at: value.created_at.to_rfc3339(),
        }
    }
}
