//! Two-phase peer-to-peer gifting.
//!
//! `propose` creates a pending transfer and moves nothing; the sender's
//! balance check at proposal time is advisory and places no hold. Points
//! move only when the receiver accepts, and the sender's balance is
//! re-derived inside the accepting unit - the sender may have spent the
//! points in the meantime. That acceptance-time re-check is load-bearing:
//! a debit-on-propose design would freeze funds for an arbitrarily long
//! pending window.

use tracing::instrument;

use stride_core::{Points, TransferId, TransferStatus, UserId};

use crate::balance::BalanceAccessor;
use crate::clock::Clock;
use crate::error::{EngineError, Entity};
use crate::store::{LedgerStore, PointTransfer};

/// Proposes and resolves point gifts.
pub struct TransferWorkflow<'a, S> {
    store: &'a S,
    clock: &'a dyn Clock,
}

impl<'a, S: LedgerStore> TransferWorkflow<'a, S> {
    /// Create the workflow over a store and clock.
    #[must_use]
    pub const fn new(store: &'a S, clock: &'a dyn Clock) -> Self {
        Self { store, clock }
    }

    /// Propose a gift. No balance effect.
    ///
    /// # Errors
    ///
    /// - `InvalidAmount` - non-positive amount, or sender gifting themselves
    /// - `NotFound(User)` - unregistered receiver
    /// - `InsufficientPoints` - advisory check against the sender's current
    ///   balance; a proposal the sender cannot cover right now is rejected
    ///   early rather than left to fail at acceptance
    #[instrument(skip(self), fields(sender = %sender, receiver = %receiver))]
    pub async fn propose(
        &self,
        sender: UserId,
        receiver: UserId,
        amount: Points,
    ) -> Result<PointTransfer, EngineError> {
        if !amount.is_positive() || sender == receiver {
            return Err(EngineError::InvalidAmount);
        }
        if self.store.user(receiver).await?.is_none() {
            return Err(EngineError::NotFound(Entity::User));
        }

        let balance = BalanceAccessor::new(self.store).get(sender).await?;
        if amount > balance.available {
            return Err(EngineError::InsufficientPoints {
                available: balance.available,
                requested: amount,
            });
        }

        self.store.ensure_user(sender, self.clock.now()).await?;
        Ok(self
            .store
            .insert_transfer(sender, receiver, amount, self.clock.now())
            .await?)
    }

    /// Resolve a pending transfer as its receiver.
    ///
    /// Rejection is terminal with no balance effect. Acceptance re-derives
    /// the sender's balance inside the committing unit; if the sender can no
    /// longer cover the amount, the call fails `InsufficientPoints` and the
    /// transfer stays pending for a later retry.
    ///
    /// # Errors
    ///
    /// - `NotFound(Transfer)` - unknown transfer id
    /// - `NotAuthorized` - caller is not the transfer's receiver
    /// - `ConcurrentConflict` - the transfer is no longer pending
    /// - `InsufficientPoints` - acceptance-time re-check failed
    #[instrument(skip(self), fields(actor = %actor, transfer = %transfer_id))]
    pub async fn respond(
        &self,
        actor: UserId,
        transfer_id: TransferId,
        accept: bool,
    ) -> Result<PointTransfer, EngineError> {
        let transfer = self
            .store
            .transfer(transfer_id)
            .await?
            .ok_or(EngineError::NotFound(Entity::Transfer))?;
        if transfer.receiver_id != actor {
            return Err(EngineError::NotAuthorized);
        }
        if transfer.status != TransferStatus::Pending {
            return Err(EngineError::ConcurrentConflict);
        }

        let resolved = if accept {
            self.store.commit_transfer_accept(transfer_id).await?
        } else {
            self.store.commit_transfer_reject(transfer_id).await?
        };
        tracing::info!(
            transfer = %transfer_id,
            status = ?resolved.status,
            amount = %resolved.amount,
            "transfer resolved"
        );
        Ok(resolved)
    }

    /// All transfers a user sent or received. Read-only.
    pub async fn for_user(&self, user: UserId) -> Result<Vec<PointTransfer>, EngineError> {
        Ok(self.store.transfers_for_user(user).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::store::MemoryStore;
    use chrono::{TimeZone, Utc};

    fn clock() -> ManualClock {
        ManualClock::new(
            Utc.with_ymd_and_hms(2026, 3, 14, 8, 0, 0)
                .single()
                .expect("valid timestamp"),
        )
    }

    async fn seeded(user: UserId, points: i64) -> MemoryStore {
        let store = MemoryStore::new();
        store.ensure_user(user, Utc::now()).await.expect("user");
        if points > 0 {
            store
                .commit_grant(UserId::new(999), user, Points::new(points), "seed", Utc::now())
                .await
                .expect("grant");
        }
        store
    }

    #[tokio::test]
    async fn test_propose_validations() {
        let sender = UserId::new(1);
        let receiver = UserId::new(2);
        let store = seeded(sender, 100).await;
        store.ensure_user(receiver, Utc::now()).await.expect("user");
        let clock = clock();
        let workflow = TransferWorkflow::new(&store, &clock);

        assert!(matches!(
            workflow.propose(sender, receiver, Points::ZERO).await,
            Err(EngineError::InvalidAmount)
        ));
        assert!(matches!(
            workflow.propose(sender, sender, Points::new(10)).await,
            Err(EngineError::InvalidAmount)
        ));
        assert!(matches!(
            workflow.propose(sender, UserId::new(77), Points::new(10)).await,
            Err(EngineError::NotFound(Entity::User))
        ));
        assert!(matches!(
            workflow.propose(sender, receiver, Points::new(101)).await,
            Err(EngineError::InsufficientPoints { .. })
        ));
    }

    #[tokio::test]
    async fn test_propose_moves_nothing() {
        let sender = UserId::new(1);
        let receiver = UserId::new(2);
        let store = seeded(sender, 100).await;
        store.ensure_user(receiver, Utc::now()).await.expect("user");
        let clock = clock();
        let workflow = TransferWorkflow::new(&store, &clock);

        let transfer = workflow
            .propose(sender, receiver, Points::new(60))
            .await
            .expect("propose");
        assert_eq!(transfer.status, TransferStatus::Pending);

        let sender_balance = BalanceAccessor::new(&store).get(sender).await.expect("balance");
        let receiver_balance = BalanceAccessor::new(&store).get(receiver).await.expect("balance");
        assert_eq!(sender_balance.available, Points::new(100));
        assert_eq!(receiver_balance.available, Points::ZERO);
    }

    #[tokio::test]
    async fn test_only_receiver_may_respond() {
        let sender = UserId::new(1);
        let receiver = UserId::new(2);
        let store = seeded(sender, 100).await;
        store.ensure_user(receiver, Utc::now()).await.expect("user");
        let clock = clock();
        let workflow = TransferWorkflow::new(&store, &clock);

        let transfer = workflow
            .propose(sender, receiver, Points::new(30))
            .await
            .expect("propose");

        assert!(matches!(
            workflow.respond(sender, transfer.id, true).await,
            Err(EngineError::NotAuthorized)
        ));
    }

    #[tokio::test]
    async fn test_accept_moves_points() {
        let sender = UserId::new(1);
        let receiver = UserId::new(2);
        let store = seeded(sender, 100).await;
        store.ensure_user(receiver, Utc::now()).await.expect("user");
        let clock = clock();
        let workflow = TransferWorkflow::new(&store, &clock);

        let transfer = workflow
            .propose(sender, receiver, Points::new(60))
            .await
            .expect("propose");
        let resolved = workflow
            .respond(receiver, transfer.id, true)
            .await
            .expect("accept");
        assert_eq!(resolved.status, TransferStatus::Accepted);

        let accessor = BalanceAccessor::new(&store);
        assert_eq!(
            accessor.get(sender).await.expect("balance").available,
            Points::new(40)
        );
        let receiver_balance = accessor.get(receiver).await.expect("balance");
        assert_eq!(receiver_balance.available, Points::new(60));
        assert_eq!(receiver_balance.cumulative, Points::new(60));
    }

    #[tokio::test]
    async fn test_reject_is_terminal() {
        let sender = UserId::new(1);
        let receiver = UserId::new(2);
        let store = seeded(sender, 100).await;
        store.ensure_user(receiver, Utc::now()).await.expect("user");
        let clock = clock();
        let workflow = TransferWorkflow::new(&store, &clock);

        let transfer = workflow
            .propose(sender, receiver, Points::new(30))
            .await
            .expect("propose");
        workflow
            .respond(receiver, transfer.id, false)
            .await
            .expect("reject");

        assert!(matches!(
            workflow.respond(receiver, transfer.id, true).await,
            Err(EngineError::ConcurrentConflict)
        ));
        assert_eq!(
            BalanceAccessor::new(&store)
                .get(sender)
                .await
                .expect("balance")
                .available,
            Points::new(100)
        );
    }
}
