//! Integration test harness for the ledger engine.
//!
//! The suites run the real [`Engine`] over the in-memory store with a
//! manual clock, so day boundaries and concurrent commits are exercised
//! deterministically and without a database.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p stride-integration-tests
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::sync::Arc;

use chrono::{TimeZone, Utc};

use stride_core::{Identity, ItemKind, Points, SellerId, StockLevel, UserId};
use stride_engine::clock::{Clock, ManualClock};
use stride_engine::store::{CatalogItem, Institute, MemoryStore, NewCatalogItem, NewInstitute};
use stride_engine::{Engine, LedgerStore};

/// Admin identity used for seeding and privileged calls.
pub const ADMIN: Identity = Identity::admin(UserId::new(900));

/// An engine over a fresh in-memory store plus a handle to its clock.
pub struct TestContext {
    pub engine: Engine<MemoryStore>,
    pub clock: Arc<ManualClock>,
}

impl TestContext {
    /// Fresh context pinned to a fixed instant.
    #[must_use]
    pub fn new() -> Self {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2026, 6, 1, 8, 0, 0)
                .single()
                .expect("valid timestamp"),
        ));
        let engine = Engine::with_clock(MemoryStore::new(), clock.clone());
        Self { engine, clock }
    }

    /// Register a user with no balance.
    pub async fn register(&self, user: UserId) {
        self.engine
            .store()
            .ensure_user(user, self.clock.now())
            .await
            .expect("register user");
    }

    /// Register a user and grant a starting balance.
    pub async fn fund(&self, user: UserId, amount: i64) {
        self.register(user).await;
        self.engine
            .grant(ADMIN, user, Points::new(amount), "test funding")
            .await
            .expect("fund user");
    }

    /// Create a catalog item.
    pub async fn seed_item(
        &self,
        seller: i32,
        kind: ItemKind,
        unit_cost: i64,
        stock: StockLevel,
    ) -> CatalogItem {
        self.engine
            .create_catalog_item(
                ADMIN,
                NewCatalogItem {
                    seller_id: SellerId::new(seller),
                    kind,
                    unit_cost: Points::new(unit_cost),
                    stock,
                },
            )
            .await
            .expect("seed item")
    }

    /// Create an institute with a campaign goal.
    pub async fn seed_institute(&self, goal: i64) -> Institute {
        self.engine
            .create_institute(
                ADMIN,
                NewInstitute {
                    name: "Test Campaign".to_owned(),
                    points_goal: Points::new(goal),
                },
            )
            .await
            .expect("seed institute")
    }

    /// Current available balance.
    pub async fn available(&self, user: UserId) -> Points {
        self.engine
            .get_balance(user)
            .await
            .expect("balance")
            .available
    }

    /// Report and validate today's steps for a user.
    pub async fn earn_steps(&self, user: UserId, steps: u32) -> Points {
        let today = self.clock.today();
        self.engine
            .report_steps(user, today, steps)
            .await
            .expect("report steps");
        self.engine
            .validate_steps(user)
            .await
            .expect("validate steps")
            .points_earned
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}
