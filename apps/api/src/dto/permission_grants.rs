use serde::{Deserialize, Serialize};
use tablegate_application::PermissionGrantView;
use ts_rs::TS;

use super::CapabilityResponse;

/// Incoming payload for granting table capabilities.
///
/// Dates use `YYYY-MM-DD`; a missing apply date means today and a missing
/// expiry date means the configured default lifetime.
#[derive(Debug, Deserialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/create-permission-grant-request.ts"
)]
pub struct CreatePermissionGrantRequest {
    pub user_id: i64,
    pub capability_ids: Vec<i64>,
    pub apply_date: Option<String>,
    pub expire_date: Option<String>,
}

/// Incoming payload for administrative grant updates.
#[derive(Debug, Deserialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/update-permission-grant-request.ts"
)]
pub struct UpdatePermissionGrantRequest {
    #[serde(default)]
    pub force_revoke: bool,
}

/// API representation of a permission grant with derived status.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/permission-grant-response.ts"
)]
pub struct PermissionGrantResponse {
    pub grant_id: i64,
    pub user_id: i64,
    pub display_name: String,
    pub apply_date: String,
    pub expire_date: String,
    pub force_terminate_at: Option<String>,
    pub is_active: bool,
    pub status: String,
    pub exp_or_terminate_date: String,
    pub capabilities: Vec<CapabilityResponse>,
}

impl From<PermissionGrantView> for PermissionGrantResponse {
    fn from(value: PermissionGrantView) -> Self {
        let grant = value.grant;
        Self {
            grant_id: grant.id().as_i64(),
            user_id: grant.user_id().as_i64(),
            display_name: value.display_name,
            apply_date: grant.apply_date().to_string(),
            expire_date: grant.expire_date().to_string(),
            force_terminate_at: grant
                .force_terminate_at()
                .map(|terminated_at| terminated_at.to_rfc3339()),
            is_active: grant.is_active(),
            status: value.status.as_str().to_owned(),
            exp_or_terminate_date: value.exp_or_terminate_date,
            capabilities: grant
                .capabilities()
                .iter()
                .cloned()
                .map(CapabilityResponse::from)
                .collect(),
        }
    }
}
