//! Daily earning: step reports, once-per-day validation, day boundaries.

use chrono::Duration;

use stride_core::{Points, UserId};
use stride_engine::EngineError;
use stride_engine::clock::Clock;
use stride_integration_tests::TestContext;

// =============================================================================
// Validation
// =============================================================================

/// 1250 steps validate to 12 points (one point per 100 steps, floored).
#[tokio::test]
async fn test_steps_convert_at_one_point_per_hundred() {
    let ctx = TestContext::new();
    let user = UserId::new(1);
    ctx.register(user).await;

    ctx.engine
        .report_steps(user, ctx.clock.today(), 1250)
        .await
        .expect("report");
    let record = ctx.engine.validate_steps(user).await.expect("validate");

    assert_eq!(record.points_earned, Points::new(12));
    assert!(record.validated_at.is_some());

    let balance = ctx.engine.get_balance(user).await.expect("balance");
    assert_eq!(balance.available, Points::new(12));
    assert_eq!(balance.cumulative, Points::new(12));
}

/// A second validation the same day earns nothing and fails typed.
#[tokio::test]
async fn test_double_validation_earns_once() {
    let ctx = TestContext::new();
    let user = UserId::new(1);
    ctx.register(user).await;

    ctx.engine
        .report_steps(user, ctx.clock.today(), 2000)
        .await
        .expect("report");
    ctx.engine.validate_steps(user).await.expect("first validate");

    let second = ctx.engine.validate_steps(user).await;
    assert!(matches!(second, Err(EngineError::AlreadyValidated)));

    assert_eq!(ctx.available(user).await, Points::new(20));
}

#[tokio::test]
async fn test_zero_steps_validate_without_error() {
    let ctx = TestContext::new();
    let user = UserId::new(1);
    ctx.register(user).await;

    ctx.engine
        .report_steps(user, ctx.clock.today(), 0)
        .await
        .expect("report");
    let record = ctx.engine.validate_steps(user).await.expect("validate");
    assert_eq!(record.points_earned, Points::ZERO);
}

#[tokio::test]
async fn test_validate_without_any_report_fails() {
    let ctx = TestContext::new();
    let user = UserId::new(1);
    ctx.register(user).await;

    assert!(matches!(
        ctx.engine.validate_steps(user).await,
        Err(EngineError::NotFound(_))
    ));
}

// =============================================================================
// Reports
// =============================================================================

/// Reports carry a running total: the last report before validation wins.
#[tokio::test]
async fn test_repeated_reports_overwrite_until_validated() {
    let ctx = TestContext::new();
    let user = UserId::new(1);
    ctx.register(user).await;
    let today = ctx.clock.today();

    ctx.engine.report_steps(user, today, 400).await.expect("report");
    ctx.engine.report_steps(user, today, 900).await.expect("report");
    let record = ctx.engine.validate_steps(user).await.expect("validate");
    assert_eq!(record.steps_count, 900);
    assert_eq!(record.points_earned, Points::new(9));

    let late = ctx.engine.report_steps(user, today, 5000).await;
    assert!(matches!(late, Err(EngineError::AlreadyValidated)));
}

/// No backfilling: only today's date is accepted.
#[tokio::test]
async fn test_reports_for_other_days_are_rejected() {
    let ctx = TestContext::new();
    let user = UserId::new(1);
    ctx.register(user).await;
    let today = ctx.clock.today();

    assert!(matches!(
        ctx.engine
            .report_steps(user, today - Duration::days(1), 600)
            .await,
        Err(EngineError::StaleDate)
    ));
    assert!(matches!(
        ctx.engine
            .report_steps(user, today + Duration::days(1), 600)
            .await,
        Err(EngineError::StaleDate)
    ));
}

/// Each calendar day is its own earning record.
#[tokio::test]
async fn test_earning_across_days_accumulates() {
    let ctx = TestContext::new();
    let user = UserId::new(1);
    ctx.register(user).await;

    assert_eq!(ctx.earn_steps(user, 1000).await, Points::new(10));

    ctx.clock.advance(Duration::days(1));
    assert_eq!(ctx.earn_steps(user, 2500).await, Points::new(25));

    let balance = ctx.engine.get_balance(user).await.expect("balance");
    assert_eq!(balance.cumulative, Points::new(35));
}
