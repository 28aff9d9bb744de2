use axum::Router;
use axum::middleware::from_fn_with_state;
use axum::routing::{get, post, put};
use tablegate_core::AppError;
use tower_http::trace::TraceLayer;

use crate::state::AppState;
use crate::{handlers, middleware};

mod cors;

#[cfg(test)]
mod tests;

pub fn build_router(app_state: AppState, frontend_url: &str) -> Result<Router, AppError> {
    let guarded_routes = Router::new()
        .route("/api/v1/me", post(handlers::me::me_handler))
        .route(
            "/api/v1/table-permissions",
            post(handlers::me::table_permissions_handler),
        )
        .route_layer(from_fn_with_state(
            app_state.clone(),
            middleware::require_access_key,
        ));

    let admin_routes = Router::new()
        .route(
            "/api/admin/access-keys",
            get(handlers::access_keys::list_access_keys_handler)
                .post(handlers::access_keys::issue_access_key_handler),
        )
        .route(
            "/api/admin/access-keys/candidates",
            get(handlers::access_keys::list_access_key_candidates_handler),
        )
        .route(
            "/api/admin/access-keys/rotation-preview",
            get(handlers::access_keys::rotation_preview_handler),
        )
        .route(
            "/api/admin/access-keys/{user_id}",
            put(handlers::access_keys::rotate_access_key_handler)
                .delete(handlers::access_keys::revoke_access_key_handler),
        )
        .route(
            "/api/admin/permission-grants",
            get(handlers::permission_grants::list_permission_grants_handler)
                .post(handlers::permission_grants::create_permission_grant_handler),
        )
        .route(
            "/api/admin/permission-grants/capabilities",
            get(handlers::permission_grants::list_grantable_capabilities_handler),
        )
        .route(
            "/api/admin/permission-grants/expire",
            post(handlers::permission_grants::expire_permission_grants_handler),
        )
        .route(
            "/api/admin/permission-grants/{grant_id}",
            get(handlers::permission_grants::get_permission_grant_handler)
                .put(handlers::permission_grants::update_permission_grant_handler)
                .delete(handlers::permission_grants::delete_permission_grant_handler),
        )
        .route(
            "/api/admin/audit-log",
            get(handlers::audit::list_audit_log_handler),
        )
        .route_layer(from_fn_with_state(
            app_state.clone(),
            middleware::require_admin_access_key,
        ));

    Ok(Router::new()
        .route("/health", get(handlers::health::health_handler))
        .route(
            "/auth/oauth/{provider}/user-info",
            post(handlers::oauth::oauth_user_info_handler),
        )
        .merge(guarded_routes)
        .merge(admin_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors::build_cors_layer(frontend_url)?)
        .with_state(app_state))
}
