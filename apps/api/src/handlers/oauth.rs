use axum::Json;
use axum::extract::{Path, State};
use serde_json::Value;
use tablegate_application::map_provider_identity;

use crate::dto::OAuthUserInfoResponse;
use crate::error::ApiResult;
use crate::state::AppState;

/// Maps a provider profile onto the local username and email.
pub async fn oauth_user_info_handler(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    Json(profile): Json<Value>,
) -> ApiResult<Json<OAuthUserInfoResponse>> {
    let identity = map_provider_identity(
        provider.as_str(),
        &profile,
        state.sso_fallback_email_domain.as_str(),
    )?;

    Ok(Json(OAuthUserInfoResponse::from(identity)))
}
