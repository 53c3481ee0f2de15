use crate::error::ApiError;
use crate::server::IncomingRequest;
use base64::{engine::general_purpose, Engine as _};
use serde_json::Value;
use tracing::debug;

/// Token from an `Authorization: Bearer <token>` header.
#[must_use]
pub fn bearer_token(req: &IncomingRequest) -> Option<&str> {
    let header = req.header("authorization")?;
    let (scheme, token) = header.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

/// Decode the claims of a `header.payload.signature` token.
///
/// The signature is not verified; hooks that need verification must do it
/// themselves. Any structural problem is a `JwtParseError` (400).
pub fn decode_jwt_claims(token: &str) -> Result<Value, ApiError> {
    let mut parts = token.split('.');
    let (Some(_header), Some(payload), Some(_signature), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        debug!("JWT parse failed: token does not have three segments");
        return Err(ApiError::jwt_parse("malformed token"));
    };

    let bytes = general_purpose::URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|e| {
            debug!(error = %e, "JWT parse failed: payload is not base64url");
            ApiError::jwt_parse("malformed token payload").with_source(e)
        })?;

    let claims: Value = serde_json::from_slice(&bytes).map_err(|e| {
        debug!(error = %e, "JWT parse failed: payload is not JSON");
        ApiError::jwt_parse("malformed token payload").with_source(e)
    })?;

    if !claims.is_object() {
        return Err(ApiError::jwt_parse("token claims must be a JSON object"));
    }
    Ok(claims)
}
