use super::{require_identity, AuthError};
use crate::models::Design;
use axum::http::HeaderMap;

/// Check that the caller owns `design`.
///
/// Returns the caller's user id on success. A missing design is reported as
/// `Forbidden`, never as a distinct error, so ownership checks do not leak
/// which ids exist.
pub fn authorize(headers: &HeaderMap, design: Option<&Design>) -> Result<String, AuthError> {
    let user_id = require_identity(headers)?;

    match design {
        Some(design) if design.user_id == user_id => Ok(user_id),
        _ => Err(AuthError::Forbidden),
    }
}
