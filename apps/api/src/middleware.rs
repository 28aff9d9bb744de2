use axum::body::{Body, Bytes};
use axum::extract::{Request, State};
use axum::http::{HeaderMap, header};
use axum::middleware::Next;
use axum::response::Response;
use serde_json::{Map, Value};
use tablegate_application::{AuditEvent, GateError, GateRequest};
use tablegate_core::AppError;
use tablegate_domain::AuditAction;
use tracing::warn;

use crate::error::ApiResult;
use crate::state::AppState;

const MAX_GATED_BODY_BYTES: usize = 1024 * 1024;

/// Admits any active principal presenting a valid access key.
pub async fn require_access_key(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> ApiResult<Response> {
    gate(&state, request, next, false).await
}

/// Admits active principals holding the administrative role.
pub async fn require_admin_access_key(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> ApiResult<Response> {
    gate(&state, request, next, true).await
}

async fn gate(
    state: &AppState,
    request: Request,
    next: Next,
    require_admin: bool,
) -> ApiResult<Response> {
    let (mut parts, body) = request.into_parts();
    let bytes = axum::body::to_bytes(body, MAX_GATED_BODY_BYTES)
        .await
        .map_err(|error| AppError::Validation(format!("failed to read request body: {error}")))?;

    let mut gate_request = GateRequest::from_json_body(parse_payload(&bytes)?);
    if gate_request.access_key.is_none() {
        gate_request.access_key = bearer_token(&parts.headers);
    }

    match state
        .access_key_gate
        .authenticate(&gate_request, require_admin)
        .await
    {
        Ok(principal) => {
            parts.extensions.insert(principal);
            let request = Request::from_parts(parts, Body::from(bytes));
            Ok(next.run(request).await)
        }
        Err(GateError::Rejected(rejection)) => {
            let event = AuditEvent {
                action: AuditAction::AccessKeyRejected,
                actor_id: rejection.user_id,
                duration_ms: 0,
                payload: rejection.audit_payload(),
                error: Some(rejection.message.clone()),
            };

            if let Err(error) = state.event_logger.record(event).await {
                warn!(%error, "failed to append audit event for gate rejection");
            }

            Err(AppError::from(GateError::Rejected(rejection)).into())
        }
        Err(error) => Err(AppError::from(error).into()),
    }
}

fn parse_payload(bytes: &Bytes) -> Result<Value, AppError> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Object(Map::new()));
    }

    serde_json::from_slice(bytes)
        .map_err(|error| AppError::Validation(format!("request body must be JSON: {error}")))
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_owned)
}
