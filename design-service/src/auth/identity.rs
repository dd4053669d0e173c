use super::AuthError;
use axum::http::HeaderMap;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine;
use serde_json::Value;

/// Header the hosting platform fills with the authenticated principal.
pub const CLIENT_PRINCIPAL_HEADER: &str = "x-ms-client-principal";

const LENIENT: GeneralPurposeConfig =
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent);
const STANDARD_LENIENT: GeneralPurpose = GeneralPurpose::new(&alphabet::STANDARD, LENIENT);
const URL_SAFE_LENIENT: GeneralPurpose = GeneralPurpose::new(&alphabet::URL_SAFE, LENIENT);

/// Resolve the caller's user id from the client principal header.
///
/// Returns `Ok(None)` when the principal decodes but names no user; callers
/// that need an owner must treat that as unauthenticated.
pub fn resolve_identity(headers: &HeaderMap) -> Result<Option<String>, AuthError> {
    let raw = headers
        .get(CLIENT_PRINCIPAL_HEADER)
        .ok_or(AuthError::Unauthenticated(
            "Missing user authentication data.",
        ))?
        .to_str()
        .map_err(|_| AuthError::MalformedIdentity("header is not valid text".to_string()))?
        .trim();

    let decoded = STANDARD_LENIENT
        .decode(raw)
        .or_else(|_| URL_SAFE_LENIENT.decode(raw))
        .map_err(|e| AuthError::MalformedIdentity(e.to_string()))?;

    let principal: Value =
        serde_json::from_slice(&decoded).map_err(|e| AuthError::MalformedIdentity(e.to_string()))?;

    // Valid JSON without claims (a string, an array, ...) names nobody.
    let Value::Object(claims) = principal else {
        return Ok(None);
    };

    // `userId` wins whenever it is present and non-null, even if empty.
    let claim = match claims.get("userId") {
        Some(v) if !v.is_null() => Some(v),
        _ => claims.get("user_id"),
    };

    Ok(claim.and_then(claim_to_id))
}

/// Like [`resolve_identity`], but a principal without a user id is an error.
pub fn require_identity(headers: &HeaderMap) -> Result<String, AuthError> {
    resolve_identity(headers)?.ok_or(AuthError::Unauthenticated(
        "Unable to determine user identity.",
    ))
}

fn claim_to_id(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
