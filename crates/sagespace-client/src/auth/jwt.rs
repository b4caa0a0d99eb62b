/*
[INPUT]:  Access tokens issued by the auth provider (JWT)
[OUTPUT]: Decoded claims (subject, email, expiry)
[POS]:    Auth layer - token inspection without signature verification
[UPDATE]: When the provider's token claims change
*/

use base64::{
    Engine as _,
    engine::general_purpose::{URL_SAFE, URL_SAFE_NO_PAD},
};
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::auth::{AuthError, Result};

/// Subset of the access-token claims the client relies on.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct JwtClaims {
    #[serde(default)]
    pub sub: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub exp: Option<i64>,
    #[serde(default)]
    pub role: Option<String>,
}

impl JwtClaims {
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.exp.and_then(|exp| DateTime::from_timestamp(exp, 0))
    }
}

/// Decode the payload segment of a JWT. The signature is not checked; the
/// server does that on every request.
pub fn decode_claims(token: &str) -> Result<JwtClaims> {
    let token = token.trim();
    let payload_b64 = token
        .split('.')
        .nth(1)
        .ok_or_else(|| AuthError::InvalidResponse("access token is not a valid JWT".to_string()))?;

    let payload_bytes = URL_SAFE_NO_PAD
        .decode(payload_b64)
        .or_else(|_| URL_SAFE.decode(payload_b64))
        .map_err(|e| AuthError::InvalidResponse(format!("invalid JWT payload base64: {e}")))?;

    serde_json::from_slice(&payload_bytes)
        .map_err(|e| AuthError::InvalidResponse(format!("invalid JWT claims: {e}")))
}

#[cfg(test)]
pub(crate) fn make_test_jwt(claims: serde_json::Value) -> String {
    let header = serde_json::json!({"alg": "none", "typ": "JWT"});
    let header_b64 = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&header).unwrap());
    let payload_b64 = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims).unwrap());
    format!("{header_b64}.{payload_b64}.signature")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_claims() {
        let token = make_test_jwt(serde_json::json!({
            "sub": "user-1",
            "email": "ada@example.com",
            "exp": 1_700_000_000
        }));

        let claims = decode_claims(&token).unwrap();
        assert_eq!(claims.sub.as_deref(), Some("user-1"));
        assert_eq!(claims.email.as_deref(), Some("ada@example.com"));
        assert_eq!(claims.expires_at().unwrap().timestamp(), 1_700_000_000);
    }

    #[test]
    fn test_decode_claims_rejects_opaque_token() {
        let err = decode_claims("opaque-token").unwrap_err();
        assert!(matches!(err, AuthError::InvalidResponse(_)));
    }
}
