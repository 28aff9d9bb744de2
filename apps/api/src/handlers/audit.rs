use axum::Json;
use axum::extract::{Extension, Query, State};
use tablegate_domain::{Principal, UserId};

use crate::dto::AuditLogEntryResponse;
use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Debug, serde::Deserialize)]
pub struct AuditLogQuery {
    pub limit: Option<usize>,
    pub offset: Option<usize>,
    pub action: Option<String>,
    pub actor_id: Option<i64>,
}

pub async fn list_audit_log_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<Principal>,
    Query(query): Query<AuditLogQuery>,
) -> ApiResult<Json<Vec<AuditLogEntryResponse>>> {
    let entries = state
        .audit_log_service
        .list_audit_log(
            &actor,
            tablegate_application::AuditLogQuery {
                limit: query.limit.unwrap_or(50),
                offset: query.offset.unwrap_or(0),
                action: query.action,
                actor_id: query.actor_id.map(UserId::new),
            },
        )
        .await?
        .into_iter()
        .map(AuditLogEntryResponse::from)
        .collect();

    Ok(Json(entries))
}
