//! Typed failure taxonomy for the ledger engine.
//!
//! Every operation the engine exposes returns one of these kinds; callers
//! branch on the kind and present a localized message. None of them are
//! panics or opaque strings. The only fatal kind is [`EngineError::Integrity`],
//! raised when the store's atomicity guarantee itself appears broken.

use thiserror::Error;

use stride_core::{CatalogItemId, Points};

use crate::store::StoreError;

/// Entity names carried by `NotFound` failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    User,
    CatalogItem,
    Order,
    Transfer,
    Institute,
    EarningRecord,
}

impl std::fmt::Display for Entity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::User => "user",
            Self::CatalogItem => "catalog item",
            Self::Order => "order",
            Self::Transfer => "transfer",
            Self::Institute => "institute",
            Self::EarningRecord => "earning record",
        };
        f.write_str(name)
    }
}

/// Expected failure outcomes of ledger operations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The caller's derived balance cannot cover the requested spend.
    #[error("insufficient points: {available} available, {requested} requested")]
    InsufficientPoints {
        available: Points,
        requested: Points,
    },

    /// A bounded-stock item cannot cover the requested quantity.
    #[error("out of stock: item {item_id}")]
    OutOfStock { item_id: CatalogItemId },

    /// Today's earning record was already validated.
    #[error("daily earning already validated")]
    AlreadyValidated,

    /// Non-positive amount or quantity, or an empty basket.
    #[error("invalid amount")]
    InvalidAmount,

    /// Steps reported for a date other than the current day.
    #[error("steps can only be reported for the current day")]
    StaleDate,

    /// Caller lacks the capability the operation requires.
    #[error("not authorized")]
    NotAuthorized,

    /// Referenced entity does not exist.
    #[error("{0} not found")]
    NotFound(Entity),

    /// The atomic unit aborted because a precondition raced; retry with
    /// fresh reads rather than replaying the same stale request.
    #[error("concurrent conflict, retry with fresh state")]
    ConcurrentConflict,

    /// The store's atomicity guarantee was observed broken (e.g. a derived
    /// balance below zero). Unrecoverable; never retried silently.
    #[error("ledger integrity violation: {0}")]
    Integrity(String),

    /// Backend failure from the persistent store.
    #[error("store error: {0}")]
    Store(StoreError),
}

impl EngineError {
    /// Whether the caller should retry the operation with fresh reads.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::ConcurrentConflict)
    }
}

impl From<StoreError> for EngineError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::InsufficientPoints {
                available,
                requested,
            } => Self::InsufficientPoints {
                available,
                requested,
            },
            StoreError::OutOfStock { item_id } => Self::OutOfStock { item_id },
            StoreError::AlreadyValidated => Self::AlreadyValidated,
            StoreError::NotFound(entity) => Self::NotFound(entity),
            StoreError::Conflict => Self::ConcurrentConflict,
            StoreError::Corrupt(detail) => Self::Integrity(detail),
            StoreError::Backend(_) => Self::Store(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stride_core::UserId;

    #[test]
    fn test_store_error_mapping() {
        let err: EngineError = StoreError::OutOfStock {
            item_id: CatalogItemId::new(9),
        }
        .into();
        assert!(matches!(
            err,
            EngineError::OutOfStock { item_id } if item_id == CatalogItemId::new(9)
        ));

        let err: EngineError = StoreError::Conflict.into();
        assert!(err.is_retryable());

        let err: EngineError = StoreError::Backend("connection reset".into()).into();
        assert!(matches!(err, EngineError::Store(_)));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_display_messages() {
        let err = EngineError::InsufficientPoints {
            available: Points::new(120),
            requested: Points::new(130),
        };
        assert_eq!(
            err.to_string(),
            "insufficient points: 120 pts available, 130 pts requested"
        );

        let _ = UserId::new(1); // ids are display-tested in stride-core
        assert_eq!(
            EngineError::NotFound(Entity::Institute).to_string(),
            "institute not found"
        );
    }
}
