use axum::Json;
use axum::extract::{Extension, State};
use tablegate_domain::Principal;

use crate::dto::{CapabilityResponse, PrincipalResponse};
use crate::error::ApiResult;
use crate::state::AppState;

pub async fn me_handler(Extension(principal): Extension<Principal>) -> Json<PrincipalResponse> {
    Json(PrincipalResponse::from(principal))
}

pub async fn table_permissions_handler(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> ApiResult<Json<Vec<CapabilityResponse>>> {
    let capabilities = state
        .permission_grant_service
        .list_effective_capabilities(&principal)
        .await?
        .into_iter()
        .map(CapabilityResponse::from)
        .collect();

    Ok(Json(capabilities))
}
