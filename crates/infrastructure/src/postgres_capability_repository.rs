use async_trait::async_trait;
use sqlx::{FromRow, PgPool};

use tablegate_application::CapabilityRepository;
use tablegate_core::{AppError, AppResult};
use tablegate_domain::{Capability, CapabilityId, DATASOURCE_ACCESS_PERMISSION};

/// PostgreSQL-backed read adapter over the authorization store.
#[derive(Clone)]
pub struct PostgresCapabilityRepository {
    pool: PgPool,
}

impl PostgresCapabilityRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
pub(crate) struct CapabilityRow {
    pub(crate) capability_id: i64,
    pub(crate) permission_name: String,
    pub(crate) resource_name: String,
}

impl From<CapabilityRow> for Capability {
    fn from(row: CapabilityRow) -> Self {
        Self {
            id: CapabilityId::new(row.capability_id),
            permission_name: row.permission_name,
            resource_name: row.resource_name,
        }
    }
}

#[async_trait]
impl CapabilityRepository for PostgresCapabilityRepository {
    async fn list_grantable_capabilities(&self) -> AppResult<Vec<Capability>> {
        let rows = sqlx::query_as::<_, CapabilityRow>(
            r#"
            SELECT
                capabilities.id AS capability_id,
                capabilities.permission_name,
                capabilities.resource_name
            FROM capabilities
            INNER JOIN data_tables ON data_tables.perm = capabilities.resource_name
            WHERE capabilities.permission_name = $1
            ORDER BY capabilities.resource_name
            "#,
        )
        .bind(DATASOURCE_ACCESS_PERMISSION)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to list grantable capabilities: {error}"))
        })?;

        Ok(rows.into_iter().map(Capability::from).collect())
    }

    async fn find_grantable_capabilities(
        &self,
        capability_ids: &[CapabilityId],
    ) -> AppResult<Vec<Capability>> {
        let ids: Vec<i64> = capability_ids.iter().map(CapabilityId::as_i64).collect();
        let rows = sqlx::query_as::<_, CapabilityRow>(
            r#"
            SELECT
                capabilities.id AS capability_id,
                capabilities.permission_name,
                capabilities.resource_name
            FROM capabilities
            INNER JOIN data_tables ON data_tables.perm = capabilities.resource_name
            WHERE capabilities.permission_name = $1
              AND capabilities.id = ANY($2)
            ORDER BY capabilities.resource_name
            "#,
        )
        .bind(DATASOURCE_ACCESS_PERMISSION)
        .bind(ids)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to find grantable capabilities: {error}"))
        })?;

        Ok(rows.into_iter().map(Capability::from).collect())
    }
}
