//! Bearer-token authentication for guarded operations.
//!
//! The gate performs one lookup per call: token to access key record to
//! principal, then an optional administrative role check. Rejections carry an
//! audit payload for the caller's logging layer; the gate never writes audit
//! records itself.

use std::sync::Arc;

use serde_json::{Value, json};
use thiserror::Error;
use tracing::warn;

use tablegate_core::AppError;
use tablegate_domain::{Principal, UserId};

use crate::AccessKeyRepository;

/// Credential and request snapshot presented to the gate.
#[derive(Debug, Clone, PartialEq)]
pub struct GateRequest {
    /// Bearer token, absent when the caller supplied none.
    pub access_key: Option<String>,
    /// Request body as received, kept for audit.
    pub payload: Value,
}

impl GateRequest {
    /// Extracts the `access_key` field from a JSON request body.
    #[must_use]
    pub fn from_json_body(payload: Value) -> Self {
        let access_key = payload
            .get("access_key")
            .and_then(Value::as_str)
            .map(str::to_owned);

        Self {
            access_key,
            payload,
        }
    }
}

/// Why the gate rejected a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateRejectionKind {
    /// Token absent or unknown.
    InvalidCredential,
    /// Token valid but the owning identity is missing or disabled.
    InactivePrincipal,
    /// Administrative role required but not held.
    PermissionDenied,
}

/// Terminal rejection of one guarded request.
#[derive(Debug, Clone, PartialEq)]
pub struct GateRejection {
    /// Rejection category.
    pub kind: GateRejectionKind,
    /// Diagnostic message naming the offending token or principal.
    pub message: String,
    /// Request snapshot that triggered the rejection.
    pub offending_request: Value,
    /// Principal resolved before the rejection, when any.
    pub user_id: Option<UserId>,
}

impl GateRejection {
    /// Returns the structured payload merged into the caller's audit trail.
    #[must_use]
    pub fn audit_payload(&self) -> Value {
        json!({
            "error_message": self.message,
            "offending_request": self.offending_request,
        })
    }
}

impl std::fmt::Display for GateRejection {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.message.as_str())
    }
}

/// Failure of a gate pass.
#[derive(Debug, Error)]
pub enum GateError {
    /// Request rejected by policy.
    #[error("{0}")]
    Rejected(GateRejection),
    /// Backing store failed.
    #[error(transparent)]
    Store(#[from] AppError),
}

impl From<GateError> for AppError {
    fn from(value: GateError) -> Self {
        match value {
            GateError::Rejected(rejection) => match rejection.kind {
                GateRejectionKind::InvalidCredential | GateRejectionKind::InactivePrincipal => {
                    AppError::Unauthorized(rejection.message)
                }
                GateRejectionKind::PermissionDenied => AppError::Forbidden(rejection.message),
            },
            GateError::Store(error) => error,
        }
    }
}

/// Access-key gate resolving bearer tokens to principals.
#[derive(Clone)]
pub struct AccessKeyGate {
    access_keys: Arc<dyn AccessKeyRepository>,
}

impl AccessKeyGate {
    /// Creates a gate over the access key store.
    #[must_use]
    pub fn new(access_keys: Arc<dyn AccessKeyRepository>) -> Self {
        Self { access_keys }
    }

    /// Authenticates a request and, when `require_admin` is set, authorizes it
    /// as administrative.
    pub async fn authenticate(
        &self,
        request: &GateRequest,
        require_admin: bool,
    ) -> Result<Principal, GateError> {
        let token = request
            .access_key
            .as_deref()
            .filter(|token| !token.is_empty());

        let Some(token) = token else {
            return Err(reject(
                request,
                GateRejectionKind::InvalidCredential,
                "Invalid access_key: None".to_owned(),
                None,
            ));
        };

        let Some(keyed) = self.access_keys.resolve_access_key(token).await? else {
            return Err(reject(
                request,
                GateRejectionKind::InvalidCredential,
                format!("Invalid access_key: {token}"),
                None,
            ));
        };

        let user_id = keyed.record.user_id;
        let principal = match keyed.principal {
            Some(principal) if principal.is_active() => principal,
            Some(principal) => {
                return Err(reject(
                    request,
                    GateRejectionKind::InactivePrincipal,
                    format!("Invalid user: {principal} is inactive"),
                    Some(user_id),
                ));
            }
            None => {
                return Err(reject(
                    request,
                    GateRejectionKind::InactivePrincipal,
                    format!("Invalid user: id {user_id} does not exist"),
                    Some(user_id),
                ));
            }
        };

        if require_admin && !principal.is_admin() {
            return Err(reject(
                request,
                GateRejectionKind::PermissionDenied,
                format!("Permission denied: {principal} is not Admin"),
                Some(user_id),
            ));
        }

        Ok(principal)
    }
}

fn reject(
    request: &GateRequest,
    kind: GateRejectionKind,
    message: String,
    user_id: Option<UserId>,
) -> GateError {
    warn!(
        kind = ?kind,
        request = %request.payload,
        "{message}"
    );

    GateError::Rejected(GateRejection {
        kind,
        message,
        offending_request: request.payload.clone(),
        user_id,
    })
}
