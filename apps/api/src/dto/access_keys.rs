use serde::{Deserialize, Serialize};
use tablegate_application::AccessKeyListing;
use tablegate_domain::{AccessKey, AccessKeyRecord, Principal};
use ts_rs::TS;

/// Incoming payload for issuing an access key.
///
/// The administrator's own credential travels in `access_key`, so the issued
/// token is named `new_access_key`.
#[derive(Debug, Deserialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/issue-access-key-request.ts"
)]
pub struct IssueAccessKeyRequest {
    pub user_id: i64,
    pub new_access_key: Option<String>,
}

/// Incoming payload for rotating an access key.
#[derive(Debug, Default, Deserialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/rotate-access-key-request.ts"
)]
pub struct RotateAccessKeyRequest {
    #[serde(default)]
    pub new_access_key: Option<String>,
}

/// API representation of an access key with its owner.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/access-key-response.ts"
)]
pub struct AccessKeyResponse {
    pub user_id: i64,
    pub display_name: String,
    pub access_key: String,
    pub created_at: String,
    pub changed_at: String,
    pub changed_by: Option<String>,
}

impl From<AccessKeyListing> for AccessKeyResponse {
    fn from(value: AccessKeyListing) -> Self {
        Self {
            user_id: value.record.user_id.as_i64(),
            display_name: value.display_name,
            access_key: value.record.access_key.into(),
            created_at: value.record.created_at.to_rfc3339(),
            changed_at: value.record.changed_at.to_rfc3339(),
            changed_by: value.changed_by_name,
        }
    }
}

/// API representation of a freshly written access key record.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/access-key-record-response.ts"
)]
pub struct AccessKeyRecordResponse {
    pub user_id: i64,
    pub access_key: String,
    pub created_at: String,
    pub changed_at: String,
    pub changed_by: Option<i64>,
}

impl From<AccessKeyRecord> for AccessKeyRecordResponse {
    fn from(value: AccessKeyRecord) -> Self {
        Self {
            user_id: value.user_id.as_i64(),
            access_key: value.access_key.into(),
            created_at: value.created_at.to_rfc3339(),
            changed_at: value.changed_at.to_rfc3339(),
            changed_by: value.changed_by.map(|user_id| user_id.as_i64()),
        }
    }
}

/// Principal eligible for a new access key.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/access-key-candidate-response.ts"
)]
pub struct AccessKeyCandidateResponse {
    pub user_id: i64,
    pub display_name: String,
}

impl From<Principal> for AccessKeyCandidateResponse {
    fn from(value: Principal) -> Self {
        Self {
            user_id: value.id().as_i64(),
            display_name: value.display_name(),
        }
    }
}

/// Candidate token for the rotation form.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/rotation-preview-response.ts"
)]
pub struct RotationPreviewResponse {
    pub access_key: String,
}

impl From<AccessKey> for RotationPreviewResponse {
    fn from(value: AccessKey) -> Self {
        Self {
            access_key: value.into(),
        }
    }
}
