use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};

use tablegate_application::{AuditLogEntry, AuditLogQuery, AuditLogRepository};
use tablegate_core::{AppError, AppResult};
use tablegate_domain::UserId;

/// PostgreSQL-backed repository for audit log read models.
#[derive(Clone)]
pub struct PostgresAuditLogRepository {
    pool: PgPool,
}

impl PostgresAuditLogRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct AuditLogRow {
    event_id: i64,
    action: String,
    actor_id: Option<i64>,
    duration_ms: i64,
    payload: serde_json::Value,
    error: Option<String>,
    created_at: DateTime<Utc>,
}

#[async_trait]
impl AuditLogRepository for PostgresAuditLogRepository {
    async fn list_recent_entries(&self, query: AuditLogQuery) -> AppResult<Vec<AuditLogEntry>> {
        let capped_limit = query.limit.clamp(1, 200) as i64;
        let capped_offset = query.offset.min(5_000) as i64;
        let rows = sqlx::query_as::<_, AuditLogRow>(
            r#"
            SELECT
                id AS event_id,
                action,
                actor_id,
                duration_ms,
                payload,
                error,
                created_at
            FROM audit_log_entries
            WHERE ($1::TEXT IS NULL OR action = $1)
                AND ($2::BIGINT IS NULL OR actor_id = $2)
            ORDER BY created_at DESC, id DESC
            LIMIT $3
            OFFSET $4
            "#,
        )
        .bind(query.action)
        .bind(query.actor_id.map(|actor_id| actor_id.as_i64()))
        .bind(capped_limit)
        .bind(capped_offset)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to list audit log entries: {error}"))
        })?;

        Ok(rows
            .into_iter()
            .map(|row| AuditLogEntry {
                event_id: row.event_id,
                action: row.action,
                actor_id: row.actor_id.map(UserId::new),
                duration_ms: row.duration_ms,
                payload: row.payload,
                error: row.error,
                created_at: row.created_at,
            })
            .collect())
    }
}
