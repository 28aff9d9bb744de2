use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use serde_json::{Value, json};
use tracing::{info, warn};

use tablegate_core::AppResult;
use tablegate_domain::{AuditAction, UserId};

use crate::{AuditEvent, AuditRepository};

/// Extra information an audited operation reports back to the logger.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuditExtra {
    /// Human-readable summary of what the operation did.
    pub log_msg: Option<String>,
    /// Non-fatal problem the operation ran into while still succeeding.
    pub err_msg: Option<String>,
    /// Actor resolved inside the operation, used when the caller had none.
    pub user_id: Option<UserId>,
}

impl AuditExtra {
    /// Creates extra info carrying only a summary message.
    #[must_use]
    pub fn message(log_msg: impl Into<String>) -> Self {
        Self {
            log_msg: Some(log_msg.into()),
            err_msg: None,
            user_id: None,
        }
    }

    /// Attaches a non-fatal error detail to the audit payload.
    #[must_use]
    pub fn with_err_msg(mut self, err_msg: impl Into<String>) -> Self {
        self.err_msg = Some(err_msg.into());
        self
    }
}

/// Wraps operations so each one produces exactly one audit event.
#[derive(Clone)]
pub struct EventLogger {
    audit_repository: Arc<dyn AuditRepository>,
}

impl EventLogger {
    /// Creates an event logger writing to the provided audit repository.
    #[must_use]
    pub fn new(audit_repository: Arc<dyn AuditRepository>) -> Self {
        Self { audit_repository }
    }

    /// Runs `operation`, timing it and auditing its outcome.
    ///
    /// `records` is the request snapshot stored with the event. Failed
    /// operations are audited with `error` set and their error is returned
    /// unchanged. An audit append failure is logged and never changes the
    /// operation's result.
    pub async fn log_this<T, F>(
        &self,
        action: AuditAction,
        actor_id: Option<UserId>,
        records: Value,
        operation: F,
    ) -> AppResult<T>
    where
        F: Future<Output = AppResult<(T, AuditExtra)>>,
    {
        let started = Instant::now();
        let outcome = operation.await;
        let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        match outcome {
            Ok((value, extra)) => {
                let event = AuditEvent {
                    action,
                    actor_id: actor_id.or(extra.user_id),
                    duration_ms,
                    payload: audit_payload(records, extra.log_msg, extra.err_msg),
                    error: None,
                };

                if let Err(audit_error) = self.record(event).await {
                    warn!(
                        action = action.as_str(),
                        error = %audit_error,
                        "failed to append audit event for completed operation"
                    );
                }

                Ok(value)
            }
            Err(error) => {
                let event = AuditEvent {
                    action,
                    actor_id,
                    duration_ms,
                    payload: audit_payload(records, None, None),
                    error: Some(error.to_string()),
                };

                if let Err(audit_error) = self.record(event).await {
                    warn!(
                        action = action.as_str(),
                        error = %audit_error,
                        "failed to append audit event for rejected operation"
                    );
                }

                Err(error)
            }
        }
    }

    /// Emits the structured audit trace and persists the event.
    pub async fn record(&self, event: AuditEvent) -> AppResult<()> {
        info!(
            target: "audit",
            action = event.action.as_str(),
            actor_id = ?event.actor_id.map(|id| id.as_i64()),
            duration_ms = event.duration_ms,
            success = event.is_success(),
            payload = %event.payload,
            error = ?event.error,
            "audit event"
        );

        self.audit_repository.append_event(event).await
    }
}

fn audit_payload(records: Value, log_msg: Option<String>, err_msg: Option<String>) -> Value {
    let mut payload = json!({ "records": records });
    if let Some(log_msg) = log_msg {
        payload["log_msg"] = Value::String(log_msg);
    }
    if let Some(err_msg) = err_msg {
        payload["err_msg"] = Value::String(err_msg);
    }
    payload
}
