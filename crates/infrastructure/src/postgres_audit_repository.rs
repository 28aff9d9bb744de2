use async_trait::async_trait;
use sqlx::PgPool;

use tablegate_application::{AuditEvent, AuditRepository};
use tablegate_core::{AppError, AppResult};

/// PostgreSQL-backed append-only audit repository.
#[derive(Clone)]
pub struct PostgresAuditRepository {
    pool: PgPool,
}

impl PostgresAuditRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuditRepository for PostgresAuditRepository {
    async fn append_event(&self, event: AuditEvent) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO audit_log_entries (
                action,
                actor_id,
                duration_ms,
                payload,
                error
            )
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(event.action.as_str())
        .bind(event.actor_id.map(|actor_id| actor_id.as_i64()))
        .bind(i64::try_from(event.duration_ms).unwrap_or(i64::MAX))
        .bind(event.payload)
        .bind(event.error)
        .execute(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to append audit event: {error}")))?;

        Ok(())
    }
}
