use tracing::warn;

use tablegate_core::{AppError, AppResult};
use tablegate_domain::Principal;

/// Ensures the acting principal is an active administrator.
pub fn require_admin(actor: &Principal) -> AppResult<()> {
    if actor.is_active() && actor.is_admin() {
        return Ok(());
    }

    warn!(actor = %actor, "administrative operation rejected");
    Err(AppError::Forbidden(format!(
        "Permission denied: {actor} is not Admin"
    )))
}
