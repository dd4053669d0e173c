//! Caller identity and document ownership.
//!
//! Authentication itself happens upstream: the hosting platform validates the
//! user and injects a base64-encoded JSON principal into every request. This
//! module only decodes that principal and enforces that the caller owns the
//! design they are touching.

pub mod identity;
pub mod ownership;

pub use identity::{require_identity, resolve_identity, CLIENT_PRINCIPAL_HEADER};
pub use ownership::authorize;

use service_core::error::AppError;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    /// No usable identity: header absent or principal carries no user id.
    #[error("Unauthorized: {0}")]
    Unauthenticated(&'static str),

    /// Header present but not base64-encoded JSON.
    #[error("Error parsing authentication data: {0}")]
    MalformedIdentity(String),

    /// Identity resolved but does not own the document.
    #[error("Forbidden: You do not have access to this document.")]
    Forbidden,
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Unauthenticated(_) | AuthError::MalformedIdentity(_) => {
                AppError::Unauthorized(anyhow::Error::new(err))
            }
            AuthError::Forbidden => AppError::Forbidden(anyhow::Error::new(err)),
        }
    }
}
