use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{FromRow, PgConnection, PgPool};
use tracing::debug;

use tablegate_application::{PermissionGrantQuery, PermissionGrantRepository};
use tablegate_core::{AppError, AppResult};
use tablegate_domain::{Capability, GrantId, PermissionGrant, PermissionGrantDraft, UserId};

use crate::postgres_capability_repository::CapabilityRow;

/// PostgreSQL-backed repository for permission grants.
#[derive(Clone)]
pub struct PostgresPermissionGrantRepository {
    pool: PgPool,
}

impl PostgresPermissionGrantRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct PermissionGrantRow {
    grant_id: i64,
    user_id: i64,
    apply_date: NaiveDate,
    expire_date: NaiveDate,
    force_terminate_at: Option<DateTime<Utc>>,
    is_active: bool,
}

#[derive(Debug, FromRow)]
struct GrantCapabilityRow {
    grant_id: i64,
    #[sqlx(flatten)]
    capability: CapabilityRow,
}

async fn load_capabilities(
    connection: &mut PgConnection,
    grant_ids: &[i64],
) -> AppResult<HashMap<i64, Vec<Capability>>> {
    let rows = sqlx::query_as::<_, GrantCapabilityRow>(
        r#"
        SELECT
            links.grant_id,
            capabilities.id AS capability_id,
            capabilities.permission_name,
            capabilities.resource_name
        FROM permission_grant_capabilities AS links
        INNER JOIN capabilities ON capabilities.id = links.capability_id
        WHERE links.grant_id = ANY($1)
        ORDER BY links.grant_id, capabilities.resource_name
        "#,
    )
    .bind(grant_ids)
    .fetch_all(&mut *connection)
    .await
    .map_err(|error| {
        AppError::Internal(format!("failed to load permission grant capabilities: {error}"))
    })?;

    let mut by_grant: HashMap<i64, Vec<Capability>> = HashMap::new();
    for row in rows {
        by_grant
            .entry(row.grant_id)
            .or_default()
            .push(Capability::from(row.capability));
    }

    Ok(by_grant)
}

fn assemble(
    rows: Vec<PermissionGrantRow>,
    mut capabilities: HashMap<i64, Vec<Capability>>,
) -> Vec<PermissionGrant> {
    rows.into_iter()
        .map(|row| {
            PermissionGrant::restore(
                GrantId::new(row.grant_id),
                UserId::new(row.user_id),
                row.apply_date,
                row.expire_date,
                row.force_terminate_at,
                row.is_active,
                capabilities.remove(&row.grant_id).unwrap_or_default(),
            )
        })
        .collect()
}

impl PostgresPermissionGrantRepository {
    async fn connection(&self) -> AppResult<sqlx::pool::PoolConnection<sqlx::Postgres>> {
        self.pool.acquire().await.map_err(|error| {
            AppError::Internal(format!("failed to acquire database connection: {error}"))
        })
    }

    async fn with_capabilities(
        &self,
        rows: Vec<PermissionGrantRow>,
    ) -> AppResult<Vec<PermissionGrant>> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let grant_ids: Vec<i64> = rows.iter().map(|row| row.grant_id).collect();
        let mut connection = self.connection().await?;
        let capabilities = load_capabilities(&mut *connection, &grant_ids).await?;
        Ok(assemble(rows, capabilities))
    }
}

#[async_trait]
impl PermissionGrantRepository for PostgresPermissionGrantRepository {
    async fn create_grant(
        &self,
        draft: &PermissionGrantDraft,
        created_by: UserId,
    ) -> AppResult<PermissionGrant> {
        let mut transaction =
            self.pool.begin().await.map_err(|error| {
                AppError::Internal(format!("failed to begin transaction: {error}"))
            })?;

        let row = sqlx::query_as::<_, PermissionGrantRow>(
            r#"
            INSERT INTO permission_grants (
                user_id,
                apply_date,
                expire_date,
                is_active,
                created_by,
                changed_by
            )
            VALUES ($1, $2, $3, TRUE, $4, $4)
            RETURNING
                id AS grant_id,
                user_id,
                apply_date,
                expire_date,
                force_terminate_at,
                is_active
            "#,
        )
        .bind(draft.user_id().as_i64())
        .bind(draft.apply_date())
        .bind(draft.expire_date())
        .bind(created_by.as_i64())
        .fetch_one(&mut *transaction)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to create permission grant: {error}"))
        })?;

        let capability_ids: Vec<i64> = draft
            .capability_ids()
            .iter()
            .map(|capability_id| capability_id.as_i64())
            .collect();

        sqlx::query(
            r#"
            INSERT INTO permission_grant_capabilities (grant_id, capability_id)
            SELECT $1, capability_id
            FROM UNNEST($2::BIGINT[]) AS requested (capability_id)
            ON CONFLICT (grant_id, capability_id) DO NOTHING
            "#,
        )
        .bind(row.grant_id)
        .bind(&capability_ids)
        .execute(&mut *transaction)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to persist permission grant capabilities: {error}"
            ))
        })?;

        let capabilities = load_capabilities(&mut *transaction, &[row.grant_id]).await?;

        transaction.commit().await.map_err(|error| {
            AppError::Internal(format!("failed to commit transaction: {error}"))
        })?;

        assemble(vec![row], capabilities)
            .into_iter()
            .next()
            .ok_or_else(|| AppError::Internal("created permission grant vanished".to_owned()))
    }

    async fn find_grant(&self, grant_id: GrantId) -> AppResult<Option<PermissionGrant>> {
        let row = sqlx::query_as::<_, PermissionGrantRow>(
            r#"
            SELECT
                id AS grant_id,
                user_id,
                apply_date,
                expire_date,
                force_terminate_at,
                is_active
            FROM permission_grants
            WHERE id = $1
            "#,
        )
        .bind(grant_id.as_i64())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to find permission grant '{grant_id}': {error}"))
        })?;

        let Some(row) = row else {
            return Ok(None);
        };

        Ok(self.with_capabilities(vec![row]).await?.into_iter().next())
    }

    async fn list_grants(&self, query: PermissionGrantQuery) -> AppResult<Vec<PermissionGrant>> {
        let capped_limit = query.limit.clamp(1, 200) as i64;
        let capped_offset = query.offset.min(5_000) as i64;

        let rows = sqlx::query_as::<_, PermissionGrantRow>(
            r#"
            SELECT
                id AS grant_id,
                user_id,
                apply_date,
                expire_date,
                force_terminate_at,
                is_active
            FROM permission_grants
            WHERE ($1::BIGINT IS NULL OR user_id = $1)
              AND (
                  NOT $2
                  OR (is_active AND force_terminate_at IS NULL AND expire_date >= $3)
              )
            ORDER BY user_id, id DESC
            LIMIT $4
            OFFSET $5
            "#,
        )
        .bind(query.user_id.map(|user_id| user_id.as_i64()))
        .bind(query.active_only)
        .bind(query.as_of)
        .bind(capped_limit)
        .bind(capped_offset)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to list permission grants: {error}"))
        })?;

        self.with_capabilities(rows).await
    }

    async fn force_revoke_grant(
        &self,
        grant_id: GrantId,
        revoked_at: DateTime<Utc>,
        revoked_by: UserId,
    ) -> AppResult<Option<PermissionGrant>> {
        // Compare-and-set: only the caller whose update matches an active row wins.
        let row = sqlx::query_as::<_, PermissionGrantRow>(
            r#"
            UPDATE permission_grants
            SET is_active = FALSE,
                force_terminate_at = $2,
                changed_at = $2,
                changed_by = $3
            WHERE id = $1
              AND is_active
              AND force_terminate_at IS NULL
              AND expire_date >= $4
            RETURNING
                id AS grant_id,
                user_id,
                apply_date,
                expire_date,
                force_terminate_at,
                is_active
            "#,
        )
        .bind(grant_id.as_i64())
        .bind(revoked_at)
        .bind(revoked_by.as_i64())
        .bind(revoked_at.date_naive())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to force revoke permission grant '{grant_id}': {error}"
            ))
        })?;

        let Some(row) = row else {
            return Ok(None);
        };

        Ok(self.with_capabilities(vec![row]).await?.into_iter().next())
    }

    async fn delete_inactive_grant(&self, grant_id: GrantId) -> AppResult<bool> {
        let rows_affected = sqlx::query(
            r#"
            DELETE FROM permission_grants
            WHERE id = $1
              AND is_active = FALSE
            "#,
        )
        .bind(grant_id.as_i64())
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to delete permission grant '{grant_id}': {error}"
            ))
        })?
        .rows_affected();

        Ok(rows_affected > 0)
    }

    async fn deactivate_expired_grants(&self, today: NaiveDate) -> AppResult<u64> {
        let rows_affected = sqlx::query(
            r#"
            UPDATE permission_grants
            SET is_active = FALSE,
                changed_at = now()
            WHERE is_active
              AND force_terminate_at IS NULL
              AND expire_date < $1
            "#,
        )
        .bind(today)
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to deactivate expired permission grants: {error}"))
        })?
        .rows_affected();

        debug!(%today, rows_affected, "deactivated lapsed permission grants");
        Ok(rows_affected)
    }

    async fn list_active_capabilities(
        &self,
        user_id: UserId,
        today: NaiveDate,
    ) -> AppResult<Vec<Capability>> {
        let rows = sqlx::query_as::<_, CapabilityRow>(
            r#"
            SELECT DISTINCT
                capabilities.id AS capability_id,
                capabilities.permission_name,
                capabilities.resource_name
            FROM permission_grants AS grants
            INNER JOIN permission_grant_capabilities AS links ON links.grant_id = grants.id
            INNER JOIN capabilities ON capabilities.id = links.capability_id
            WHERE grants.user_id = $1
              AND grants.is_active
              AND grants.force_terminate_at IS NULL
              AND grants.expire_date >= $2
            ORDER BY capabilities.resource_name
            "#,
        )
        .bind(user_id.as_i64())
        .bind(today)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to list active capabilities of user '{user_id}': {error}"
            ))
        })?;

        Ok(rows.into_iter().map(Capability::from).collect())
    }
}
