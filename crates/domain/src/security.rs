use serde::{Deserialize, Serialize};

/// Stable audit actions emitted by application use-cases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    /// Emitted when the access-key gate rejects a request.
    AccessKeyRejected,
    /// Emitted when an administrator issues an access key.
    AccessKeyCreated,
    /// Emitted when an access key is rotated.
    AccessKeyRenewed,
    /// Emitted when an access key is removed.
    AccessKeyRevoked,
    /// Emitted when table permissions are granted.
    PermissionGrantCreated,
    /// Emitted when a grant is force revoked.
    PermissionGrantForceRevoked,
    /// Emitted when an inactive grant is deleted.
    PermissionGrantDeleted,
    /// Emitted when lapsed grants are deactivated.
    PermissionGrantsExpired,
}

impl AuditAction {
    /// Returns a stable storage value for this action.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AccessKeyRejected => "security.access_key.rejected",
            Self::AccessKeyCreated => "security.access_key.created",
            Self::AccessKeyRenewed => "security.access_key.renewed",
            Self::AccessKeyRevoked => "security.access_key.revoked",
            Self::PermissionGrantCreated => "security.table_permission.granted",
            Self::PermissionGrantForceRevoked => "security.table_permission.force_revoked",
            Self::PermissionGrantDeleted => "security.table_permission.deleted",
            Self::PermissionGrantsExpired => "security.table_permission.expired",
        }
    }
}

impl std::fmt::Display for AuditAction {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.as_str())
    }
}
