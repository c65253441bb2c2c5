//! Unified error handling for the API.
//!
//! Engine failures are expected outcomes: they map to precise statuses and a
//! machine-readable kind the client branches on. Insufficient funds/stock
//! are non-retryable basket-editing prompts; a raced atomic unit is
//! retryable with fresh reads. Backend and integrity failures are the only
//! 5xx paths and never leak detail to clients.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use stride_engine::EngineError;

/// Application-level error type for the API.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Typed engine outcome.
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// Missing or invalid bearer token.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Malformed request outside the engine's taxonomy.
    #[error("Bad request: {0}")]
    BadRequest(String),
}

/// Wire shape of an error response.
#[derive(Debug, Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
    /// Whether retrying with fresh reads can succeed.
    retryable: bool,
}

impl ApiError {
    fn kind(&self) -> &'static str {
        match self {
            Self::Engine(err) => match err {
                EngineError::InsufficientPoints { .. } => "insufficient_points",
                EngineError::OutOfStock { .. } => "out_of_stock",
                EngineError::AlreadyValidated => "already_validated",
                EngineError::InvalidAmount => "invalid_amount",
                EngineError::StaleDate => "stale_date",
                EngineError::NotAuthorized => "not_authorized",
                EngineError::NotFound(_) => "not_found",
                EngineError::ConcurrentConflict => "conflict",
                EngineError::Integrity(_) => "integrity",
                EngineError::Store(_) => "internal",
            },
            Self::Unauthorized(_) => "unauthorized",
            Self::BadRequest(_) => "bad_request",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::Engine(err) => match err {
                EngineError::InsufficientPoints { .. } | EngineError::OutOfStock { .. } => {
                    StatusCode::UNPROCESSABLE_ENTITY
                }
                EngineError::AlreadyValidated | EngineError::ConcurrentConflict => {
                    StatusCode::CONFLICT
                }
                EngineError::InvalidAmount | EngineError::StaleDate => StatusCode::BAD_REQUEST,
                EngineError::NotAuthorized => StatusCode::FORBIDDEN,
                EngineError::NotFound(_) => StatusCode::NOT_FOUND,
                EngineError::Integrity(_) | EngineError::Store(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Backend and integrity failures are the only paths worth paging on.
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "API request error"
            );
        }

        // Don't expose internal error details to clients
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            "Internal server error".to_owned()
        } else {
            self.to_string()
        };

        let retryable = matches!(
            &self,
            Self::Engine(err) if err.is_retryable()
        );

        let body = ErrorBody {
            error: self.kind(),
            message,
            retryable,
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stride_core::Points;
    use stride_engine::Entity;

    fn get_status(err: ApiError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn test_engine_error_status_codes() {
        assert_eq!(
            get_status(ApiError::Engine(EngineError::InsufficientPoints {
                available: Points::new(10),
                requested: Points::new(20),
            })),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            get_status(ApiError::Engine(EngineError::ConcurrentConflict)),
            StatusCode::CONFLICT
        );
        assert_eq!(
            get_status(ApiError::Engine(EngineError::NotFound(Entity::Order))),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(ApiError::Engine(EngineError::NotAuthorized)),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            get_status(ApiError::Engine(EngineError::StaleDate)),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(ApiError::Unauthorized("no token".into())),
            StatusCode::UNAUTHORIZED
        );
    }

    #[test]
    fn test_retryable_flag() {
        let conflict = ApiError::Engine(EngineError::ConcurrentConflict);
        assert_eq!(conflict.kind(), "conflict");
        assert!(matches!(
            conflict,
            ApiError::Engine(ref e) if e.is_retryable()
        ));

        let out_of_stock = ApiError::Engine(EngineError::OutOfStock {
            item_id: stride_core::CatalogItemId::new(4),
        });
        assert!(matches!(
            out_of_stock,
            ApiError::Engine(ref e) if !e.is_retryable()
        ));
    }
}
