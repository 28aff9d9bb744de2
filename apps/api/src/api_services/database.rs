use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tablegate_core::AppError;
use tracing::debug;

use crate::api_config::ApiConfig;

/// Opens the pool and applies pending migrations, including the additive
/// `user_attributes.access_key` column.
pub async fn connect_and_migrate(config: &ApiConfig) -> Result<PgPool, AppError> {
    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(config.database_url.as_str())
        .await
        .map_err(|error| AppError::Internal(format!("failed to connect to database: {error}")))?;

    sqlx::migrate!("../../crates/infrastructure/migrations")
        .run(&pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to run migrations: {error}")))?;

    debug!(
        max_connections = config.database_max_connections,
        "tablegate schema is up to date"
    );

    Ok(pool)
}
