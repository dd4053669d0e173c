use crate::auth::require_identity;
use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use service_core::error::AppError;

/// Authenticated caller, resolved from the platform's client principal header.
///
/// Rejects with 401 when the header is missing, malformed, or names no user.
/// Handlers that must validate their input before authenticating read the
/// headers themselves instead.
#[derive(Debug, Clone)]
pub struct Caller(pub String);

#[async_trait]
impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = require_identity(&parts.headers)?;

        // Record on the request span
        tracing::Span::current().record("user_id", user_id.as_str());

        Ok(Caller(user_id))
    }
}
