use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{TimeZone, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use shared_models::auth::{JwtClaims, JwtHeader, Role, User};

type HmacSha256 = Hmac<Sha256>;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum TokenError {
    #[error("JWT secret is not set")]
    MissingSecret,

    #[error("Invalid token format")]
    Malformed,

    #[error("Unsupported signing algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("Invalid token signature")]
    BadSignature,

    #[error("Invalid claims: {0}")]
    InvalidClaims(String),

    #[error("Token expired")]
    Expired,
}

fn decode_segment(segment: &str) -> Result<Vec<u8>, TokenError> {
    URL_SAFE_NO_PAD.decode(segment).map_err(|e| {
        debug!("Failed to decode token segment: {}", e);
        TokenError::Malformed
    })
}

/// Validates an HS256 token and turns its claims into a [`User`].
///
/// `sub` must be a UUID and `role` one of patient, doctor or admin; a missing
/// role is treated as patient.
pub fn validate_token(token: &str, jwt_secret: &str) -> Result<User, TokenError> {
    if jwt_secret.is_empty() {
        return Err(TokenError::MissingSecret);
    }

    let mut parts = token.split('.');
    let (Some(header_b64), Some(claims_b64), Some(signature_b64), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(TokenError::Malformed);
    };

    let header: JwtHeader = serde_json::from_slice(&decode_segment(header_b64)?)
        .map_err(|_| TokenError::Malformed)?;
    if header.alg != "HS256" {
        return Err(TokenError::UnsupportedAlgorithm(header.alg));
    }

    let signature = decode_segment(signature_b64)?;
    let mut mac = HmacSha256::new_from_slice(jwt_secret.as_bytes())
        .map_err(|_| TokenError::MissingSecret)?;
    mac.update(format!("{}.{}", header_b64, claims_b64).as_bytes());
    if mac.verify_slice(&signature).is_err() {
        debug!("Token signature verification failed");
        return Err(TokenError::BadSignature);
    }

    let claims: JwtClaims = serde_json::from_slice(&decode_segment(claims_b64)?)
        .map_err(|e| TokenError::InvalidClaims(e.to_string()))?;

    if let Some(exp) = claims.exp {
        let now = Utc::now().timestamp().max(0) as u64;
        if exp < now {
            debug!("Token expired at {} (now: {})", exp, now);
            return Err(TokenError::Expired);
        }
    }

    let id = Uuid::parse_str(&claims.sub)
        .map_err(|_| TokenError::InvalidClaims(format!("subject '{}' is not a UUID", claims.sub)))?;

    let role = match claims.role.as_deref() {
        None => Role::Patient,
        Some(raw) => Role::parse(raw)
            .ok_or_else(|| TokenError::InvalidClaims(format!("unknown role '{}'", raw)))?,
    };

    let created_at = claims
        .iat
        .and_then(|iat| Utc.timestamp_opt(iat as i64, 0).single());

    debug!("Token validated for user {} ({})", id, role);
    Ok(User {
        id,
        email: claims.email,
        role,
        created_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{JwtTestUtils, TestUser};
    use assert_matches::assert_matches;

    const SECRET: &str = "unit-test-secret";

    #[test]
    fn accepts_valid_token() {
        let doctor = TestUser::doctor("doc@example.com");
        let token = JwtTestUtils::create_test_token(&doctor, SECRET, Some(1));

        let user = validate_token(&token, SECRET).unwrap();
        assert_eq!(user.id, doctor.id);
        assert_eq!(user.role, Role::Doctor);
        assert_eq!(user.email.as_deref(), Some("doc@example.com"));
    }

    #[test]
    fn rejects_wrong_secret() {
        let token = JwtTestUtils::create_invalid_signature_token(&TestUser::default());
        assert_matches!(validate_token(&token, SECRET), Err(TokenError::BadSignature));
    }

    #[test]
    fn rejects_expired_token() {
        let token = JwtTestUtils::create_expired_token(&TestUser::default(), SECRET);
        assert_matches!(validate_token(&token, SECRET), Err(TokenError::Expired));
    }

    #[test]
    fn rejects_malformed_token() {
        assert_matches!(
            validate_token(&JwtTestUtils::create_malformed_token(), SECRET),
            Err(TokenError::Malformed)
        );
        assert_matches!(validate_token("a.b.c.d", SECRET), Err(TokenError::Malformed));
    }

    #[test]
    fn requires_secret() {
        assert_matches!(validate_token("a.b.c", ""), Err(TokenError::MissingSecret));
    }
}
