//! Administrative issuance.
//!
//! The only mutation path with no symmetric debit anywhere in the system:
//! pure issuance, gated on the administrative capability resolved by the
//! external identity boundary, and fully audited (actor, target, amount,
//! reason, timestamp) both in the store and in the structured log.

use tracing::instrument;

use stride_core::{Identity, Points, UserId};

use crate::clock::Clock;
use crate::error::{EngineError, Entity};
use crate::store::{GrantRecord, LedgerStore};

/// Issues audited administrative grants.
pub struct AdminGrant<'a, S> {
    store: &'a S,
    clock: &'a dyn Clock,
}

impl<'a, S: LedgerStore> AdminGrant<'a, S> {
    /// Create the granter over a store and clock.
    #[must_use]
    pub const fn new(store: &'a S, clock: &'a dyn Clock) -> Self {
        Self { store, clock }
    }

    /// Grant points to a user.
    ///
    /// No upper bound is enforced here; a policy layer above the engine may
    /// impose one.
    ///
    /// # Errors
    ///
    /// - `NotAuthorized` - `actor` lacks the administrative capability
    /// - `InvalidAmount` - non-positive amount
    /// - `NotFound(User)` - unregistered target
    #[instrument(skip(self, reason), fields(actor = %actor.user_id, target = %target))]
    pub async fn grant(
        &self,
        actor: Identity,
        target: UserId,
        amount: Points,
        reason: &str,
    ) -> Result<GrantRecord, EngineError> {
        if !actor.is_admin() {
            return Err(EngineError::NotAuthorized);
        }
        if !amount.is_positive() {
            return Err(EngineError::InvalidAmount);
        }
        if self.store.user(target).await?.is_none() {
            return Err(EngineError::NotFound(Entity::User));
        }
        self.store.ensure_user(actor.user_id, self.clock.now()).await?;

        let record = self
            .store
            .commit_grant(actor.user_id, target, amount, reason, self.clock.now())
            .await?;
        tracing::info!(
            grant = %record.id,
            actor = %record.actor_id,
            target = %record.target_id,
            amount = %record.amount,
            reason = %record.reason,
            granted_at = %record.granted_at,
            "admin grant issued"
        );
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::balance::BalanceAccessor;
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

    #[tokio::test]
    async fn test_grant_requires_admin() {
        let store = MemoryStore::new();
        let target = UserId::new(2);
        store.ensure_user(target, Utc::now()).await.expect("user");
        let clock = clock();
        let granter = AdminGrant::new(&store, &clock);

        let result = granter
            .grant(Identity::member(UserId::new(1)), target, Points::new(50), "promo")
            .await;
        assert!(matches!(result, Err(EngineError::NotAuthorized)));
    }

    #[tokio::test]
    async fn test_grant_credits_target() {
        let store = MemoryStore::new();
        let target = UserId::new(2);
        store.ensure_user(target, Utc::now()).await.expect("user");
        let clock = clock();
        let granter = AdminGrant::new(&store, &clock);

        let record = granter
            .grant(
                Identity::admin(UserId::new(1)),
                target,
                Points::new(500),
                "launch promotion",
            )
            .await
            .expect("grant");
        assert_eq!(record.amount, Points::new(500));
        assert_eq!(record.reason, "launch promotion");

        let balance = BalanceAccessor::new(&store).get(target).await.expect("balance");
        assert_eq!(balance.available, Points::new(500));
        assert_eq!(balance.cumulative, Points::new(500));
    }

    #[tokio::test]
    async fn test_grant_validations() {
        let store = MemoryStore::new();
        let clock = clock();
        let granter = AdminGrant::new(&store, &clock);
        let admin = Identity::admin(UserId::new(1));

        assert!(matches!(
            granter.grant(admin, UserId::new(2), Points::ZERO, "x").await,
            Err(EngineError::InvalidAmount)
        ));
        assert!(matches!(
            granter.grant(admin, UserId::new(2), Points::new(10), "x").await,
            Err(EngineError::NotFound(Entity::User))
        ));
    }
}
