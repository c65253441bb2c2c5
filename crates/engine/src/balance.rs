//! Balance derivation.
//!
//! The single place that turns the store's credit/debit aggregates into a
//! user-facing balance. No other component computes a balance on its own.
//! A value returned here is advisory: every debit re-derives the balance
//! inside the atomic unit that commits it.

use stride_core::{Points, UserId};

use crate::error::EngineError;
use crate::store::LedgerStore;

/// A user's points balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Balance {
    /// Spendable now: cumulative credits minus committed debits.
    pub available: Points,
    /// Lifetime credits, monotonically non-decreasing.
    pub cumulative: Points,
}

/// Read-only, side-effect-free balance reads.
pub struct BalanceAccessor<'a, S> {
    store: &'a S,
}

impl<'a, S: LedgerStore> BalanceAccessor<'a, S> {
    /// Create the accessor over a store.
    #[must_use]
    pub const fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Derive the balance for a user.
    ///
    /// A user with no records has a zero balance; that is not an error.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Integrity` if the derived available balance is
    /// negative - committed state violating the ledger invariant means a
    /// partial commit was observed, which this engine cannot repair.
    pub async fn get(&self, user: UserId) -> Result<Balance, EngineError> {
        let summary = self.store.points_summary(user).await?;
        let available = summary
            .cumulative
            .checked_sub(summary.spent)
            .map_err(|e| EngineError::Integrity(format!("balance derivation overflow: {e}")))?;

        if available.is_negative() {
            return Err(EngineError::Integrity(format!(
                "negative available balance for user {user}: {available}"
            )));
        }

        Ok(Balance {
            available,
            cumulative: summary.cumulative,
        })
    }
}
