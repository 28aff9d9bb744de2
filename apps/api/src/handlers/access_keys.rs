use axum::Json;
use axum::body::Bytes;
use axum::extract::{Extension, Path, State};
use axum::http::StatusCode;
use tablegate_application::IssueAccessKeyInput;
use tablegate_domain::{Principal, UserId};

use crate::dto::{
    AccessKeyCandidateResponse, AccessKeyRecordResponse, AccessKeyResponse,
    IssueAccessKeyRequest, RotateAccessKeyRequest, RotationPreviewResponse,
};
use crate::error::ApiResult;
use crate::handlers::json_body;
use crate::state::AppState;

pub async fn list_access_keys_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<Principal>,
) -> ApiResult<Json<Vec<AccessKeyResponse>>> {
    let access_keys = state
        .access_key_service
        .list_access_keys(&actor)
        .await?
        .into_iter()
        .map(AccessKeyResponse::from)
        .collect();

    Ok(Json(access_keys))
}

pub async fn list_access_key_candidates_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<Principal>,
) -> ApiResult<Json<Vec<AccessKeyCandidateResponse>>> {
    let candidates = state
        .access_key_service
        .list_access_key_candidates(&actor)
        .await?
        .into_iter()
        .map(AccessKeyCandidateResponse::from)
        .collect();

    Ok(Json(candidates))
}

pub async fn rotation_preview_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<Principal>,
) -> ApiResult<Json<RotationPreviewResponse>> {
    let access_key = state.access_key_service.preview_rotation_key(&actor)?;
    Ok(Json(RotationPreviewResponse::from(access_key)))
}

pub async fn issue_access_key_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<Principal>,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<AccessKeyRecordResponse>)> {
    let payload: IssueAccessKeyRequest = json_body(&body, "access key issue")?;
    let record = state
        .access_key_service
        .issue_access_key(
            &actor,
            IssueAccessKeyInput {
                user_id: UserId::new(payload.user_id),
                access_key: payload.new_access_key,
            },
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(AccessKeyRecordResponse::from(record)),
    ))
}

pub async fn rotate_access_key_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<Principal>,
    Path(user_id): Path<i64>,
    body: Bytes,
) -> ApiResult<Json<AccessKeyRecordResponse>> {
    let payload: RotateAccessKeyRequest = json_body(&body, "access key rotation")?;
    let record = state
        .access_key_service
        .rotate_access_key(&actor, UserId::new(user_id), payload.new_access_key)
        .await?;

    Ok(Json(AccessKeyRecordResponse::from(record)))
}

pub async fn revoke_access_key_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<Principal>,
    Path(user_id): Path<i64>,
) -> ApiResult<StatusCode> {
    state
        .access_key_service
        .revoke_access_key(&actor, UserId::new(user_id))
        .await?;

    Ok(StatusCode::NO_CONTENT)
}
