use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};

use tablegate_application::{AccessKeyListing, AccessKeyRepository, KeyedPrincipal};
use tablegate_core::{AppError, AppResult};
use tablegate_domain::{AccessKey, AccessKeyRecord, Principal, UserId};

use crate::postgres_principal_repository::PrincipalRow;

/// PostgreSQL-backed repository for per-user access keys.
///
/// Keys live in the nullable `user_attributes.access_key` column; a row with a
/// null key does not count as a record.
#[derive(Clone)]
pub struct PostgresAccessKeyRepository {
    pool: PgPool,
}

impl PostgresAccessKeyRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct AccessKeyRow {
    user_id: i64,
    access_key: String,
    created_at: DateTime<Utc>,
    changed_at: DateTime<Utc>,
    changed_by: Option<i64>,
}

impl TryFrom<AccessKeyRow> for AccessKeyRecord {
    type Error = AppError;

    fn try_from(row: AccessKeyRow) -> AppResult<Self> {
        let access_key = AccessKey::new(row.access_key).map_err(|error| {
            AppError::Internal(format!(
                "stored access key for user '{}' is invalid: {error}",
                row.user_id
            ))
        })?;

        Ok(Self {
            user_id: UserId::new(row.user_id),
            access_key,
            created_at: row.created_at,
            changed_at: row.changed_at,
            changed_by: row.changed_by.map(UserId::new),
        })
    }
}

#[derive(Debug, FromRow)]
struct KeyedPrincipalRow {
    user_id: i64,
    access_key: String,
    created_at: DateTime<Utc>,
    changed_at: DateTime<Utc>,
    changed_by: Option<i64>,
    principal_id: Option<i64>,
    username: Option<String>,
    first_name: Option<String>,
    last_name: Option<String>,
    email: Option<String>,
    active: Option<bool>,
    roles: Vec<String>,
}

#[derive(Debug, FromRow)]
struct AccessKeyListingRow {
    user_id: i64,
    access_key: String,
    created_at: DateTime<Utc>,
    changed_at: DateTime<Utc>,
    changed_by: Option<i64>,
    owner_username: String,
    owner_first_name: String,
    owner_last_name: String,
    changer_username: Option<String>,
    changer_first_name: Option<String>,
    changer_last_name: Option<String>,
}

fn is_unique_violation(error: &sqlx::Error) -> bool {
    matches!(
        error,
        sqlx::Error::Database(database_error) if database_error.code().as_deref() == Some("23505")
    )
}

fn is_foreign_key_violation(error: &sqlx::Error) -> bool {
    matches!(
        error,
        sqlx::Error::Database(database_error) if database_error.code().as_deref() == Some("23503")
    )
}

#[async_trait]
impl AccessKeyRepository for PostgresAccessKeyRepository {
    async fn resolve_access_key(&self, access_key: &str) -> AppResult<Option<KeyedPrincipal>> {
        // One statement, so record, user and roles come from the same snapshot.
        let row = sqlx::query_as::<_, KeyedPrincipalRow>(
            r#"
            SELECT
                attributes.user_id,
                attributes.access_key,
                attributes.created_at,
                attributes.changed_at,
                attributes.changed_by,
                users.id AS principal_id,
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
            FROM user_attributes AS attributes
            LEFT JOIN users ON users.id = attributes.user_id
            LEFT JOIN user_roles ON user_roles.user_id = users.id
            LEFT JOIN roles ON roles.id = user_roles.role_id
            WHERE attributes.access_key = $1
            GROUP BY attributes.id, users.id
            "#,
        )
        .bind(access_key)
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to resolve access key: {error}")))?;

        let Some(row) = row else {
            return Ok(None);
        };

        let principal = match (row.principal_id, row.username) {
            (Some(id), Some(username)) => Some(Principal::from(PrincipalRow {
                id,
                username,
                first_name: row.first_name.unwrap_or_default(),
                last_name: row.last_name.unwrap_or_default(),
                email: row.email,
                active: row.active.unwrap_or(false),
                roles: row.roles,
            })),
            _ => None,
        };

        let record = AccessKeyRecord::try_from(AccessKeyRow {
            user_id: row.user_id,
            access_key: row.access_key,
            created_at: row.created_at,
            changed_at: row.changed_at,
            changed_by: row.changed_by,
        })?;

        Ok(Some(KeyedPrincipal { record, principal }))
    }

    async fn find_access_key(&self, user_id: UserId) -> AppResult<Option<AccessKeyRecord>> {
        let row = sqlx::query_as::<_, AccessKeyRow>(
            r#"
            SELECT user_id, access_key, created_at, changed_at, changed_by
            FROM user_attributes
            WHERE user_id = $1
              AND access_key IS NOT NULL
            "#,
        )
        .bind(user_id.as_i64())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to find access key of user '{user_id}': {error}"))
        })?;

        row.map(AccessKeyRecord::try_from).transpose()
    }

    async fn list_access_keys(&self) -> AppResult<Vec<AccessKeyListing>> {
        let rows = sqlx::query_as::<_, AccessKeyListingRow>(
            r#"
            SELECT
                attributes.user_id,
                attributes.access_key,
                attributes.created_at,
                attributes.changed_at,
                attributes.changed_by,
                owners.username AS owner_username,
                owners.first_name AS owner_first_name,
                owners.last_name AS owner_last_name,
                changers.username AS changer_username,
                changers.first_name AS changer_first_name,
                changers.last_name AS changer_last_name
            FROM user_attributes AS attributes
            INNER JOIN users AS owners ON owners.id = attributes.user_id
            LEFT JOIN users AS changers ON changers.id = attributes.changed_by
            WHERE attributes.access_key IS NOT NULL
            ORDER BY attributes.changed_at DESC, attributes.user_id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to list access keys: {error}")))?;

        rows.into_iter()
            .map(|row| {
                let display_name = Principal::new(
                    UserId::new(row.user_id),
                    row.owner_username,
                    row.owner_first_name,
                    row.owner_last_name,
                    true,
                )
                .display_name();

                let changed_by_name = match (row.changed_by, row.changer_username) {
                    (Some(id), Some(username)) => Some(
                        Principal::new(
                            UserId::new(id),
                            username,
                            row.changer_first_name.unwrap_or_default(),
                            row.changer_last_name.unwrap_or_default(),
                            true,
                        )
                        .display_name(),
                    ),
                    _ => None,
                };

                let record = AccessKeyRecord::try_from(AccessKeyRow {
                    user_id: row.user_id,
                    access_key: row.access_key,
                    created_at: row.created_at,
                    changed_at: row.changed_at,
                    changed_by: row.changed_by,
                })?;

                Ok(AccessKeyListing {
                    record,
                    display_name,
                    changed_by_name,
                })
            })
            .collect()
    }

    async fn create_access_key(
        &self,
        user_id: UserId,
        access_key: &AccessKey,
        changed_by: UserId,
    ) -> AppResult<AccessKeyRecord> {
        // An attributes row may exist without a key; only fill it when the key is absent.
        let result = sqlx::query_as::<_, AccessKeyRow>(
            r#"
            INSERT INTO user_attributes (user_id, access_key, created_by, changed_by)
            VALUES ($1, $2, $3, $3)
            ON CONFLICT (user_id) DO UPDATE
            SET access_key = EXCLUDED.access_key,
                changed_at = now(),
                changed_by = EXCLUDED.changed_by
            WHERE user_attributes.access_key IS NULL
            RETURNING user_id, access_key, created_at, changed_at, changed_by
            "#,
        )
        .bind(user_id.as_i64())
        .bind(access_key.as_str())
        .bind(changed_by.as_i64())
        .fetch_optional(&self.pool)
        .await;

        match result {
            Ok(Some(row)) => AccessKeyRecord::try_from(row),
            Ok(None) => Err(AppError::Conflict(format!(
                "user '{user_id}' already owns an access key"
            ))),
            Err(error) if is_unique_violation(&error) => Err(AppError::Conflict(
                "access key is already assigned to another user".to_owned(),
            )),
            Err(error) if is_foreign_key_violation(&error) => {
                Err(AppError::NotFound(format!("user '{user_id}' not found")))
            }
            Err(error) => Err(AppError::Internal(format!(
                "failed to create access key for user '{user_id}': {error}"
            ))),
        }
    }

    async fn rotate_access_key(
        &self,
        user_id: UserId,
        access_key: &AccessKey,
        changed_by: UserId,
    ) -> AppResult<Option<AccessKeyRecord>> {
        let result = sqlx::query_as::<_, AccessKeyRow>(
            r#"
            UPDATE user_attributes
            SET access_key = $2,
                changed_at = now(),
                changed_by = $3
            WHERE user_id = $1
              AND access_key IS NOT NULL
            RETURNING user_id, access_key, created_at, changed_at, changed_by
            "#,
        )
        .bind(user_id.as_i64())
        .bind(access_key.as_str())
        .bind(changed_by.as_i64())
        .fetch_optional(&self.pool)
        .await;

        match result {
            Ok(row) => row.map(AccessKeyRecord::try_from).transpose(),
            Err(error) if is_unique_violation(&error) => Err(AppError::Conflict(
                "access key is already assigned to another user".to_owned(),
            )),
            Err(error) => Err(AppError::Internal(format!(
                "failed to rotate access key of user '{user_id}': {error}"
            ))),
        }
    }

    async fn delete_access_key(&self, user_id: UserId) -> AppResult<Option<AccessKeyRecord>> {
        let row = sqlx::query_as::<_, AccessKeyRow>(
            r#"
            DELETE FROM user_attributes
            WHERE user_id = $1
              AND access_key IS NOT NULL
            RETURNING user_id, access_key, created_at, changed_at, changed_by
            "#,
        )
        .bind(user_id.as_i64())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to delete access key of user '{user_id}': {error}"
            ))
        })?;

        row.map(AccessKeyRecord::try_from).transpose()
    }
}
