//! `PostgreSQL` persistence for the ledger.
//!
//! # Tables
//!
//! - `users` - registry of identity-provider user ids
//! - `daily_earnings` - one row per user per date, append-only
//! - `catalog_items` - seller-owned items (NULL stock = unbounded)
//! - `orders` / `order_lines` - committed checkouts
//! - `transfers` - two-phase gifts
//! - `institutes` / `donations` - campaign pooling
//! - `grants` - administrative issuance audit trail
//! - `checkout_receipts` - idempotency keys to order ids
//!
//! # Migrations
//!
//! Migrations live in `crates/api/migrations/` and run via:
//! ```bash
//! cargo run -p stride-cli -- migrate
//! ```

mod store;

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

use stride_engine::store::StoreError;

pub use store::PgStore;

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// Embedded migrations for the ledger schema.
#[must_use]
pub fn migrator() -> sqlx::migrate::Migrator {
    sqlx::migrate!("./migrations")
}

/// Map a sqlx failure onto the store taxonomy. Serialization and deadlock
/// aborts become `Conflict` so callers retry with fresh reads.
fn map_sqlx(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db) = &err
        && let Some(code) = db.code()
        && (code == "40001" || code == "40P01")
    {
        return StoreError::Conflict;
    }
    StoreError::Backend(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_sqlx_classifies_plain_errors_as_backend() {
        let err = map_sqlx(sqlx::Error::PoolTimedOut);
        assert!(matches!(err, StoreError::Backend(_)));
    }
}
