//! Pooled donations toward campaign goals.
//!
//! A donation debits the donor and increments the institute's pooled total
//! in one unit. Goal detection is evaluated post-increment and is advisory
//! only: the institute is not locked or archived on reaching its goal, and
//! its pooled total never decreases (there is no withdrawal path).

use tracing::instrument;

use stride_core::{InstituteId, Points, UserId};

use crate::clock::Clock;
use crate::error::EngineError;
use crate::store::{Donation, Institute, LedgerStore};

/// Result of a committed donation.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct DonationOutcome {
    pub donation: Donation,
    /// Institute state after the increment.
    pub institute: Institute,
    /// Whether the pooled total reached the campaign goal, evaluated
    /// post-increment. Informational; forces no state transition.
    pub goal_reached: bool,
}

/// Commits donations against the ledger store.
pub struct DonationPool<'a, S> {
    store: &'a S,
    clock: &'a dyn Clock,
}

impl<'a, S: LedgerStore> DonationPool<'a, S> {
    /// Create the pool over a store and clock.
    #[must_use]
    pub const fn new(store: &'a S, clock: &'a dyn Clock) -> Self {
        Self { store, clock }
    }

    /// Donate points to an institute.
    ///
    /// # Errors
    ///
    /// - `InvalidAmount` - non-positive amount
    /// - `NotFound(Institute)` - unknown institute
    /// - `InsufficientPoints` - balance re-derived inside the unit cannot
    ///   cover the amount
    #[instrument(skip(self), fields(user = %user, institute = %institute))]
    pub async fn donate(
        &self,
        user: UserId,
        institute: InstituteId,
        amount: Points,
    ) -> Result<DonationOutcome, EngineError> {
        if !amount.is_positive() {
            return Err(EngineError::InvalidAmount);
        }
        self.store.ensure_user(user, self.clock.now()).await?;

        let receipt = self
            .store
            .commit_donation(user, institute, amount, self.clock.now())
            .await?;
        let goal_reached = receipt.institute.current_points >= receipt.institute.points_goal;
        if goal_reached {
            tracing::info!(
                institute = %receipt.institute.id,
                pooled = %receipt.institute.current_points,
                goal = %receipt.institute.points_goal,
                "campaign goal reached"
            );
        }
        Ok(DonationOutcome {
            donation: receipt.donation,
            institute: receipt.institute,
            goal_reached,
        })
    }

    /// One institute's current state. Read-only.
    pub async fn institute(&self, id: InstituteId) -> Result<Option<Institute>, EngineError> {
        Ok(self.store.institute(id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::store::{MemoryStore, NewInstitute};
    use chrono::{TimeZone, Utc};

    fn clock() -> ManualClock {
        ManualClock::new(
            Utc.with_ymd_and_hms(2026, 3, 14, 8, 0, 0)
                .single()
                .expect("valid timestamp"),
        )
    }

    async fn seeded(user: UserId, points: i64, goal: i64) -> (MemoryStore, InstituteId) {
        let store = MemoryStore::new();
        store.ensure_user(user, Utc::now()).await.expect("user");
        store
            .commit_grant(UserId::new(999), user, Points::new(points), "seed", Utc::now())
            .await
            .expect("grant");
        let institute = store
            .insert_institute(NewInstitute {
                name: "Clean Rivers".to_owned(),
                points_goal: Points::new(goal),
            })
            .await
            .expect("institute");
        (store, institute.id)
    }

    #[tokio::test]
    async fn test_donate_requires_positive_amount() {
        let user = UserId::new(1);
        let (store, institute) = seeded(user, 100, 1000).await;
        let clock = clock();
        let pool = DonationPool::new(&store, &clock);

        assert!(matches!(
            pool.donate(user, institute, Points::ZERO).await,
            Err(EngineError::InvalidAmount)
        ));
        assert!(matches!(
            pool.donate(user, institute, Points::new(-5)).await,
            Err(EngineError::InvalidAmount)
        ));
    }

    #[tokio::test]
    async fn test_donate_moves_points_and_detects_goal() {
        let user = UserId::new(1);
        let (store, institute) = seeded(user, 200, 120).await;
        let clock = clock();
        let pool = DonationPool::new(&store, &clock);

        let first = pool
            .donate(user, institute, Points::new(80))
            .await
            .expect("donation");
        assert!(!first.goal_reached);
        assert_eq!(first.institute.current_points, Points::new(80));

        let second = pool
            .donate(user, institute, Points::new(40))
            .await
            .expect("donation");
        assert!(second.goal_reached);
        assert_eq!(second.institute.current_points, Points::new(120));

        let balance = crate::balance::BalanceAccessor::new(&store)
            .get(user)
            .await
            .expect("balance");
        assert_eq!(balance.available, Points::new(80));
    }

    #[tokio::test]
    async fn test_donation_insufficiency_is_checked_in_unit() {
        let user = UserId::new(1);
        let (store, institute) = seeded(user, 30, 1000).await;
        let clock = clock();
        let pool = DonationPool::new(&store, &clock);

        let result = pool.donate(user, institute, Points::new(40)).await;
        assert!(matches!(
            result,
            Err(EngineError::InsufficientPoints { .. })
        ));

        let unchanged = store.institute(institute).await.expect("read").expect("row");
        assert_eq!(unchanged.current_points, Points::ZERO);
    }
}
