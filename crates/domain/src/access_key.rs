//! Per-user bearer credentials.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tablegate_core::{AppError, AppResult};
use uuid::Uuid;

use crate::UserId;

/// Width of the persisted `access_key` column.
pub const ACCESS_KEY_MAX_LENGTH: usize = 36;

/// Opaque bearer token issued to one principal.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccessKey(String);

impl AccessKey {
    /// Validates an administrator-supplied token.
    pub fn new(value: impl Into<String>) -> AppResult<Self> {
        let value = value.into();
        let trimmed = value.trim();

        if trimmed.is_empty() {
            return Err(AppError::Validation(
                "access key must not be empty".to_owned(),
            ));
        }

        if trimmed.chars().count() > ACCESS_KEY_MAX_LENGTH {
            return Err(AppError::Validation(format!(
                "access key must not exceed {ACCESS_KEY_MAX_LENGTH} characters"
            )));
        }

        Ok(Self(trimmed.to_owned()))
    }

    /// Generates a random token in hyphenated UUID form.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Returns the token string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Returns the token with all but the last four characters hidden.
    #[must_use]
    pub fn masked(&self) -> String {
        let visible: String = self
            .0
            .chars()
            .rev()
            .take(4)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect();
        format!("****{visible}")
    }
}

// Tokens are credentials; keep them out of debug output.
impl std::fmt::Debug for AccessKey {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter.write_str("AccessKey(..)")
    }
}

impl std::fmt::Display for AccessKey {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.0.as_str())
    }
}

impl From<AccessKey> for String {
    fn from(value: AccessKey) -> Self {
        value.0
    }
}

/// Stored access key owned by exactly one principal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessKeyRecord {
    /// Owning principal, unique across records.
    pub user_id: UserId,
    /// Current bearer token, unique across records.
    pub access_key: AccessKey,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last issue or rotation timestamp.
    pub changed_at: DateTime<Utc>,
    /// Administrator that last changed the record.
    pub changed_by: Option<UserId>,
}
