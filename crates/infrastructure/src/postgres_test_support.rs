//! Shared PostgreSQL fixtures for adapter tests.

use sqlx::PgPool;
use sqlx::migrate::Migrator;
use sqlx::postgres::PgPoolOptions;

use tablegate_domain::{AccessKey, CapabilityId, DATASOURCE_ACCESS_PERMISSION, UserId};

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Returns a migrated pool, or `None` when `DATABASE_URL` is unset.
pub(crate) async fn test_pool() -> Option<PgPool> {
    let Ok(database_url) = std::env::var("DATABASE_URL") else {
        return None;
    };

    let pool = match PgPoolOptions::new()
        .max_connections(2)
        .connect(database_url.as_str())
        .await
    {
        Ok(pool) => pool,
        Err(error) => panic!("failed to connect to DATABASE_URL in test: {error}"),
    };

    if let Err(error) = MIGRATOR.run(&pool).await {
        panic!("failed to run migrations for postgres adapter tests: {error}");
    }

    Some(pool)
}

pub(crate) fn unique_name(prefix: &str) -> String {
    format!("{prefix}-{}", AccessKey::generate())
}

pub(crate) async fn insert_user(pool: &PgPool, prefix: &str, active: bool, roles: &[&str]) -> UserId {
    let user_id = sqlx::query_scalar::<_, i64>(
        r#"
            INSERT INTO users (username, first_name, last_name, active)
            VALUES ($1, 'Test', 'User', $2)
            RETURNING id
            "#,
    )
    .bind(unique_name(prefix))
    .bind(active)
    .fetch_one(pool)
    .await;

    let user_id = match user_id {
        Ok(user_id) => user_id,
        Err(error) => panic!("failed to insert test user: {error}"),
    };

    for role in roles {
        let assigned = sqlx::query(
            r#"
                WITH role AS (
                    INSERT INTO roles (name)
                    VALUES ($2)
                    ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name
                    RETURNING id
                )
                INSERT INTO user_roles (user_id, role_id)
                SELECT $1, role.id FROM role
                "#,
        )
        .bind(user_id)
        .bind(*role)
        .execute(pool)
        .await;
        assert!(assigned.is_ok());
    }

    UserId::new(user_id)
}

/// Registers a data table and the `datasource_access` capability covering it.
pub(crate) async fn insert_table_capability(pool: &PgPool, table_name: &str) -> CapabilityId {
    let table_name = unique_name(table_name);
    let resource_name = format!("[warehouse].[{table_name}]");

    let table = sqlx::query(
        r#"
            INSERT INTO data_tables (database_name, table_name, perm)
            VALUES ('warehouse', $1, $2)
            "#,
    )
    .bind(table_name.as_str())
    .bind(resource_name.as_str())
    .execute(pool)
    .await;
    assert!(table.is_ok());

    let capability_id = sqlx::query_scalar::<_, i64>(
        r#"
            INSERT INTO capabilities (permission_name, resource_name)
            VALUES ($1, $2)
            RETURNING id
            "#,
    )
    .bind(DATASOURCE_ACCESS_PERMISSION)
    .bind(resource_name.as_str())
    .fetch_one(pool)
    .await;

    match capability_id {
        Ok(capability_id) => CapabilityId::new(capability_id),
        Err(error) => panic!("failed to insert test capability: {error}"),
    }
}
