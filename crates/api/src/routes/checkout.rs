//! Basket checkout route.

use axum::{
    Json,
    extract::State,
    http::{HeaderMap, StatusCode},
};
use serde::Deserialize;
use uuid::Uuid;

use stride_engine::{BasketLine, CheckoutOutcome};

use crate::auth::CurrentUser;
use crate::error::ApiError;
use crate::state::AppState;

/// Idempotency header for blind retries of the same checkout.
const IDEMPOTENCY_KEY: &str = "idempotency-key";

#[derive(Debug, Deserialize)]
pub struct CheckoutRequest {
    pub lines: Vec<BasketLine>,
}

/// `POST /checkout`
///
/// An optional `Idempotency-Key` header (UUID) makes a double-tapped
/// submission return the original orders instead of spending twice.
pub async fn checkout(
    State(state): State<AppState>,
    CurrentUser(identity): CurrentUser,
    headers: HeaderMap,
    Json(body): Json<CheckoutRequest>,
) -> Result<(StatusCode, Json<CheckoutOutcome>), ApiError> {
    let idempotency_key = parse_idempotency_key(&headers)?;
    let outcome = state
        .engine()
        .checkout(identity.user_id, &body.lines, idempotency_key)
        .await?;
    let status = if outcome.replayed {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };
    Ok((status, Json(outcome)))
}

fn parse_idempotency_key(headers: &HeaderMap) -> Result<Option<Uuid>, ApiError> {
    let Some(value) = headers.get(IDEMPOTENCY_KEY) else {
        return Ok(None);
    };
    let value = value
        .to_str()
        .map_err(|_| ApiError::BadRequest("invalid idempotency key".into()))?;
    Uuid::parse_str(value)
        .map(Some)
        .map_err(|_| ApiError::BadRequest("idempotency key must be a UUID".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_idempotency_key() {
        let mut headers = HeaderMap::new();
        assert_eq!(parse_idempotency_key(&headers).expect("absent is fine"), None);

        headers.insert(IDEMPOTENCY_KEY, "not-a-uuid".parse().expect("header"));
        assert!(parse_idempotency_key(&headers).is_err());

        let key = Uuid::new_v4();
        headers.insert(
            IDEMPOTENCY_KEY,
            key.to_string().parse().expect("header"),
        );
        assert_eq!(parse_idempotency_key(&headers).expect("valid"), Some(key));
    }
}
