//! Daily step earning.
//!
//! Per (user, date) the state machine is `Unvalidated -> Validated`, terminal
//! for that date. Reports are accepted for the current day only - there is no
//! backfilling - and validation converts the recorded steps into points
//! exactly once: one point per 100 steps, integer division.

use chrono::NaiveDate;
use tracing::instrument;

use stride_core::UserId;

use crate::clock::Clock;
use crate::error::EngineError;
use crate::store::{DailyEarningRecord, LedgerStore};

/// Records step counts and validates them into earnings.
pub struct StepValidator<'a, S> {
    store: &'a S,
    clock: &'a dyn Clock,
}

impl<'a, S: LedgerStore> StepValidator<'a, S> {
    /// Create the validator over a store and clock.
    #[must_use]
    pub const fn new(store: &'a S, clock: &'a dyn Clock) -> Self {
        Self { store, clock }
    }

    /// Record the step count for `date`.
    ///
    /// Repeated reports for the same day overwrite the count while the day
    /// is unvalidated; the client reports a running total, not a delta.
    ///
    /// # Errors
    ///
    /// - `StaleDate` - `date` is not the current day
    /// - `AlreadyValidated` - the day was already validated
    #[instrument(skip(self), fields(user = %user))]
    pub async fn report_steps(
        &self,
        user: UserId,
        date: NaiveDate,
        steps: u32,
    ) -> Result<DailyEarningRecord, EngineError> {
        if date != self.clock.today() {
            return Err(EngineError::StaleDate);
        }
        self.store.ensure_user(user, self.clock.now()).await?;
        Ok(self.store.record_steps(user, date, steps).await?)
    }

    /// Validate today's record, converting steps into points exactly once.
    ///
    /// A zero step count validates successfully for zero points.
    ///
    /// # Errors
    ///
    /// - `NotFound(EarningRecord)` - no steps reported today
    /// - `AlreadyValidated` - today was already validated
    #[instrument(skip(self), fields(user = %user))]
    pub async fn validate(&self, user: UserId) -> Result<DailyEarningRecord, EngineError> {
        let record = self
            .store
            .commit_validation(user, self.clock.today(), self.clock.now())
            .await?;
        tracing::info!(
            user = %user,
            date = %record.date,
            steps = record.steps_count,
            points = %record.points_earned,
            "daily earning validated"
        );
        Ok(record)
    }

    /// Today's record, if any. Read-only.
    pub async fn today_record(
        &self,
        user: UserId,
    ) -> Result<Option<DailyEarningRecord>, EngineError> {
        Ok(self
            .store
            .earning_record(user, self.clock.today())
            .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::store::MemoryStore;
    use chrono::{Duration, TimeZone, Utc};
    use stride_core::Points;

    fn clock() -> ManualClock {
        ManualClock::new(
            Utc.with_ymd_and_hms(2026, 3, 14, 8, 0, 0)
                .single()
                .expect("valid timestamp"),
        )
    }

    #[tokio::test]
    async fn test_report_rejects_other_days() {
        let store = MemoryStore::new();
        let clock = clock();
        let validator = StepValidator::new(&store, &clock);
        let user = UserId::new(1);

        let yesterday = clock.today() - Duration::days(1);
        let tomorrow = clock.today() + Duration::days(1);
        assert!(matches!(
            validator.report_steps(user, yesterday, 500).await,
            Err(EngineError::StaleDate)
        ));
        assert!(matches!(
            validator.report_steps(user, tomorrow, 500).await,
            Err(EngineError::StaleDate)
        ));
    }

    #[tokio::test]
    async fn test_validate_converts_steps_once() {
        let store = MemoryStore::new();
        let clock = clock();
        let validator = StepValidator::new(&store, &clock);
        let user = UserId::new(1);

        validator
            .report_steps(user, clock.today(), 1250)
            .await
            .expect("report");
        let record = validator.validate(user).await.expect("validate");
        assert_eq!(record.points_earned, Points::new(12));

        assert!(matches!(
            validator.validate(user).await,
            Err(EngineError::AlreadyValidated)
        ));
    }

    #[tokio::test]
    async fn test_validate_without_report_is_not_found() {
        let store = MemoryStore::new();
        let clock = clock();
        let validator = StepValidator::new(&store, &clock);

        assert!(matches!(
            validator.validate(UserId::new(1)).await,
            Err(EngineError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_zero_steps_validate_to_zero_points() {
        let store = MemoryStore::new();
        let clock = clock();
        let validator = StepValidator::new(&store, &clock);
        let user = UserId::new(1);

        validator
            .report_steps(user, clock.today(), 0)
            .await
            .expect("report");
        let record = validator.validate(user).await.expect("validate");
        assert_eq!(record.points_earned, Points::ZERO);
        assert!(record.validated_at.is_some());
    }

    #[tokio::test]
    async fn test_next_day_starts_fresh() {
        let store = MemoryStore::new();
        let clock = clock();
        let validator = StepValidator::new(&store, &clock);
        let user = UserId::new(1);

        validator
            .report_steps(user, clock.today(), 300)
            .await
            .expect("report");
        validator.validate(user).await.expect("validate");

        clock.advance(Duration::days(1));
        validator
            .report_steps(user, clock.today(), 800)
            .await
            .expect("report");
        let record = validator.validate(user).await.expect("validate");
        assert_eq!(record.points_earned, Points::new(8));
    }
}
