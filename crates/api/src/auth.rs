//! Bearer-token identity resolution.
//!
//! The identity provider is external to the engine; this module is the API's
//! edge of that boundary. Tokens are minted out-of-band (production identity
//! service, or `stride-cli token issue` for development) in the form
//!
//! ```text
//! v1.<user_id>.<role>.<expires_unix>.<hex hmac-sha256>
//! ```
//!
//! where the signature covers everything before it. Verification is
//! constant-time through the `hmac` crate. Handlers receive an
//! [`stride_core::Identity`]; the engine never sees a token.

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use thiserror::Error;

use stride_core::{Identity, Role, UserId};

use crate::error::ApiError;
use crate::state::AppState;

type HmacSha256 = Hmac<Sha256>;

/// Token format version.
const TOKEN_VERSION: &str = "v1";

/// Token verification failures.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("malformed token")]
    Malformed,
    #[error("bad signature")]
    BadSignature,
    #[error("token expired")]
    Expired,
}

/// Mint a signed bearer token.
#[must_use]
pub fn mint_token(
    secret: &SecretString,
    user: UserId,
    role: Role,
    expires_at: DateTime<Utc>,
) -> String {
    let payload = format!(
        "{TOKEN_VERSION}.{}.{}.{}",
        user.as_i32(),
        role.as_str(),
        expires_at.timestamp()
    );
    let signature = sign(secret, &payload);
    format!("{payload}.{signature}")
}

/// Verify a bearer token and resolve the caller's identity.
///
/// # Errors
///
/// - `Malformed` - wrong shape, version, or unparseable fields
/// - `BadSignature` - HMAC mismatch
/// - `Expired` - expiry in the past
pub fn verify_token(
    secret: &SecretString,
    token: &str,
    now: DateTime<Utc>,
) -> Result<Identity, AuthError> {
    let parts: Vec<&str> = token.split('.').collect();
    let &[version, user_id, role, expires, signature] = parts.as_slice() else {
        return Err(AuthError::Malformed);
    };
    if version != TOKEN_VERSION {
        return Err(AuthError::Malformed);
    }

    let payload = format!("{version}.{user_id}.{role}.{expires}");
    let mut mac = mac_for(secret);
    mac.update(payload.as_bytes());
    let raw = hex::decode(signature).map_err(|_| AuthError::BadSignature)?;
    mac.verify_slice(&raw).map_err(|_| AuthError::BadSignature)?;

    let user_id: i32 = user_id.parse().map_err(|_| AuthError::Malformed)?;
    let role = Role::parse(role).ok_or(AuthError::Malformed)?;
    let expires: i64 = expires.parse().map_err(|_| AuthError::Malformed)?;
    if expires < now.timestamp() {
        return Err(AuthError::Expired);
    }

    Ok(Identity::new(UserId::new(user_id), role))
}

fn sign(secret: &SecretString, payload: &str) -> String {
    let mut mac = mac_for(secret);
    mac.update(payload.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

fn mac_for(secret: &SecretString) -> HmacSha256 {
    HmacSha256::new_from_slice(secret.expose_secret().as_bytes())
        .expect("HMAC accepts any key length")
}

/// Extractor that requires an authenticated caller.
pub struct CurrentUser(pub Identity);

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ApiError::Unauthorized("missing bearer token".into()))?;
        let token = header
            .strip_prefix("Bearer ")
            .ok_or_else(|| ApiError::Unauthorized("missing bearer token".into()))?;

        let identity = verify_token(&state.config().auth_secret, token, Utc::now())
            .map_err(|e| ApiError::Unauthorized(e.to_string()))?;
        Ok(Self(identity))
    }
}

/// Extractor that requires the administrative capability.
pub struct RequireAdmin(pub Identity);

impl FromRequestParts<AppState> for RequireAdmin {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let CurrentUser(identity) = CurrentUser::from_request_parts(parts, state).await?;
        if !identity.is_admin() {
            return Err(ApiError::Engine(stride_engine::EngineError::NotAuthorized));
        }
        Ok(Self(identity))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn secret() -> SecretString {
        SecretString::from("kq84nDh2pLw9xRv31TgZc6mJfY5sB0aU")
    }

    #[test]
    fn test_token_round_trip() {
        let now = Utc::now();
        let token = mint_token(&secret(), UserId::new(7), Role::Member, now + Duration::hours(1));

        let identity = verify_token(&secret(), &token, now).expect("valid token");
        assert_eq!(identity.user_id, UserId::new(7));
        assert_eq!(identity.role, Role::Member);
    }

    #[test]
    fn test_expired_token() {
        let now = Utc::now();
        let token = mint_token(&secret(), UserId::new(7), Role::Member, now - Duration::hours(1));
        assert_eq!(verify_token(&secret(), &token, now), Err(AuthError::Expired));
    }

    #[test]
    fn test_tampered_token() {
        let now = Utc::now();
        let token = mint_token(&secret(), UserId::new(7), Role::Member, now + Duration::hours(1));

        // Escalate the role without re-signing.
        let tampered = token.replace(".member.", ".admin.");
        assert_eq!(
            verify_token(&secret(), &tampered, now),
            Err(AuthError::BadSignature)
        );
    }

    #[test]
    fn test_wrong_secret() {
        let now = Utc::now();
        let token = mint_token(&secret(), UserId::new(7), Role::Admin, now + Duration::hours(1));
        let other = SecretString::from("uB0sB5YfJm6cZgT13vRx9wLp2hDn48qk");
        assert_eq!(
            verify_token(&other, &token, now),
            Err(AuthError::BadSignature)
        );
    }

    #[test]
    fn test_malformed_tokens() {
        let now = Utc::now();
        assert_eq!(
            verify_token(&secret(), "not-a-token", now),
            Err(AuthError::Malformed)
        );
        assert_eq!(
            verify_token(&secret(), "v2.1.member.0.abcd", now),
            Err(AuthError::Malformed)
        );
    }
}
