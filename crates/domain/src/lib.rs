//! Domain entities and invariants.

#![forbid(unsafe_code)]

mod access_key;
mod permission_grant;
mod security;
mod user;

pub use access_key::{ACCESS_KEY_MAX_LENGTH, AccessKey, AccessKeyRecord};
pub use permission_grant::{
    Capability, CapabilityId, DATASOURCE_ACCESS_PERMISSION, DEFAULT_GRANT_LIFETIME_DAYS, GrantId,
    GrantStatus, PermissionGrant, PermissionGrantDraft,
};
pub use security::AuditAction;
pub use user::{ADMIN_ROLE_NAME, Principal, UserId};
