use axum::Json;
use axum::body::Bytes;
use axum::extract::{Extension, Path, Query, State};
use axum::http::StatusCode;
use chrono::NaiveDate;
use tablegate_application::{
    CreatePermissionGrantInput, PermissionGrantListQuery, UpdatePermissionGrantInput,
};
use tablegate_core::AppError;
use tablegate_domain::{CapabilityId, GrantId, Principal, UserId};

use crate::dto::{
    CapabilityResponse, CreatePermissionGrantRequest, ExpiredGrantsResponse,
    PermissionGrantResponse, UpdatePermissionGrantRequest,
};
use crate::error::ApiResult;
use crate::handlers::json_body;
use crate::state::AppState;

#[derive(Debug, serde::Deserialize)]
pub struct PermissionGrantQuery {
    pub user_id: Option<i64>,
    pub active_only: Option<bool>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

pub async fn list_grantable_capabilities_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<Principal>,
) -> ApiResult<Json<Vec<CapabilityResponse>>> {
    let capabilities = state
        .permission_grant_service
        .list_grantable_capabilities(&actor)
        .await?
        .into_iter()
        .map(CapabilityResponse::from)
        .collect();

    Ok(Json(capabilities))
}

pub async fn list_permission_grants_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<Principal>,
    Query(query): Query<PermissionGrantQuery>,
) -> ApiResult<Json<Vec<PermissionGrantResponse>>> {
    let grants = state
        .permission_grant_service
        .list_grants(
            &actor,
            PermissionGrantListQuery {
                user_id: query.user_id.map(UserId::new),
                active_only: query.active_only.unwrap_or(false),
                limit: query.limit.unwrap_or(50),
                offset: query.offset.unwrap_or(0),
            },
        )
        .await?
        .into_iter()
        .map(PermissionGrantResponse::from)
        .collect();

    Ok(Json(grants))
}

pub async fn get_permission_grant_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<Principal>,
    Path(grant_id): Path<i64>,
) -> ApiResult<Json<PermissionGrantResponse>> {
    let grant = state
        .permission_grant_service
        .get_grant(&actor, GrantId::new(grant_id))
        .await?;

    Ok(Json(PermissionGrantResponse::from(grant)))
}

pub async fn create_permission_grant_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<Principal>,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<PermissionGrantResponse>)> {
    let payload: CreatePermissionGrantRequest = json_body(&body, "permission grant")?;
    let grant = state
        .permission_grant_service
        .create_grant(
            &actor,
            CreatePermissionGrantInput {
                user_id: UserId::new(payload.user_id),
                capability_ids: payload
                    .capability_ids
                    .into_iter()
                    .map(CapabilityId::new)
                    .collect(),
                apply_date: parse_date("apply_date", payload.apply_date.as_deref())?,
                expire_date: parse_date("expire_date", payload.expire_date.as_deref())?,
            },
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(PermissionGrantResponse::from(grant)),
    ))
}

pub async fn update_permission_grant_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<Principal>,
    Path(grant_id): Path<i64>,
    body: Bytes,
) -> ApiResult<Json<PermissionGrantResponse>> {
    let payload: UpdatePermissionGrantRequest = json_body(&body, "permission grant update")?;
    let grant = state
        .permission_grant_service
        .update_grant(
            &actor,
            GrantId::new(grant_id),
            UpdatePermissionGrantInput {
                force_revoke: payload.force_revoke,
            },
        )
        .await?;

    Ok(Json(PermissionGrantResponse::from(grant)))
}

pub async fn delete_permission_grant_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<Principal>,
    Path(grant_id): Path<i64>,
) -> ApiResult<StatusCode> {
    state
        .permission_grant_service
        .delete_grant(&actor, GrantId::new(grant_id))
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn expire_permission_grants_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<Principal>,
) -> ApiResult<Json<ExpiredGrantsResponse>> {
    let expired_count = state
        .permission_grant_service
        .expire_lapsed_grants(&actor)
        .await?;

    Ok(Json(ExpiredGrantsResponse { expired_count }))
}

fn parse_date(field: &str, value: Option<&str>) -> Result<Option<NaiveDate>, AppError> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(|value| {
            NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|error| {
                AppError::Validation(format!("{field} must be YYYY-MM-DD, got '{value}': {error}"))
            })
        })
        .transpose()
}
