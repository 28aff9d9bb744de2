mod access_keys;
mod audit;
mod common;
mod identity;
mod permission_grants;

pub use access_keys::{
    AccessKeyCandidateResponse, AccessKeyRecordResponse, AccessKeyResponse,
    IssueAccessKeyRequest, RotateAccessKeyRequest, RotationPreviewResponse,
};
pub use audit::AuditLogEntryResponse;
pub use common::{CapabilityResponse, ExpiredGrantsResponse, HealthResponse};
pub use identity::{OAuthUserInfoResponse, PrincipalResponse};
pub use permission_grants::{
    CreatePermissionGrantRequest, PermissionGrantResponse, UpdatePermissionGrantRequest,
};
