use async_trait::async_trait;
use sqlx::{FromRow, PgPool};

use tablegate_application::PrincipalRepository;
use tablegate_core::{AppError, AppResult};
use tablegate_domain::{Principal, UserId};

/// PostgreSQL-backed read adapter over the identity store.
#[derive(Clone)]
pub struct PostgresPrincipalRepository {
    pool: PgPool,
}

impl PostgresPrincipalRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
pub(crate) struct PrincipalRow {
    pub(crate) id: i64,
    pub(crate) username: String,
    pub(crate) first_name: String,
    pub(crate) last_name: String,
    pub(crate) email: Option<String>,
    pub(crate) active: bool,
    pub(crate) roles: Vec<String>,
}

impl From<PrincipalRow> for Principal {
    fn from(row: PrincipalRow) -> Self {
        let principal = Principal::new(
            UserId::new(row.id),
            row.username,
            row.first_name,
            row.last_name,
            row.active,
        )
        .with_roles(row.roles);

        match row.email {
            Some(email) => principal.with_email(email),
            None => principal,
        }
    }
}

#[async_trait]
impl PrincipalRepository for PostgresPrincipalRepository {
    async fn find_principal(&self, user_id: UserId) -> AppResult<Option<Principal>> {
        let row = sqlx::query_as::<_, PrincipalRow>(
            r#"
            SELECT
                users.id,
                users.username,
                users.first_name,
                users.last_name,
                users.email,
                users.active,
                COALESCE(
                    array_agg(roles.name ORDER BY roles.name)
                        FILTER (WHERE roles.name IS NOT NULL),
                    ARRAY[]::TEXT[]
                ) AS roles
            FROM users
            LEFT JOIN user_roles ON user_roles.user_id = users.id
            LEFT JOIN roles ON roles.id = user_roles.role_id
            WHERE users.id = $1
            GROUP BY users.id
            "#,
        )
        .bind(user_id.as_i64())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to find user '{user_id}': {error}"))
        })?;

        Ok(row.map(Principal::from))
    }

    async fn list_access_key_candidates(&self) -> AppResult<Vec<Principal>> {
        let rows = sqlx::query_as::<_, PrincipalRow>(
            r#"
            SELECT
                users.id,
                users.username,
                users.first_name,
                users.last_name,
                users.email,
                users.active,
                COALESCE(
                    array_agg(roles.name ORDER BY roles.name)
                        FILTER (WHERE roles.name IS NOT NULL),
                    ARRAY[]::TEXT[]
                ) AS roles
            FROM users
            LEFT JOIN user_roles ON user_roles.user_id = users.id
            LEFT JOIN roles ON roles.id = user_roles.role_id
            WHERE users.active
              AND NOT EXISTS (
                  SELECT 1
                  FROM user_attributes
                  WHERE user_attributes.user_id = users.id
                    AND user_attributes.access_key IS NOT NULL
              )
            GROUP BY users.id
            ORDER BY users.username
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to list access key candidates: {error}"))
        })?;

        Ok(rows.into_iter().map(Principal::from).collect())
    }
}
