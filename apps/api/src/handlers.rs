pub mod access_keys;
pub mod audit;
pub mod health;
pub mod me;
pub mod oauth;
pub mod permission_grants;

use axum::body::Bytes;
use serde::de::DeserializeOwned;
use tablegate_core::AppError;

/// Decodes a gated request body regardless of its content type.
///
/// The access key gate already accepted the body as JSON, so handlers read
/// the same bytes. A blank body decodes as `{}`.
pub(crate) fn json_body<T: DeserializeOwned>(body: &Bytes, label: &str) -> Result<T, AppError> {
    let bytes: &[u8] = if body.iter().all(u8::is_ascii_whitespace) {
        b"{}"
    } else {
        body
    };

    serde_json::from_slice(bytes)
        .map_err(|error| AppError::Validation(format!("invalid {label} payload: {error}")))
}
