//! Engine facade.
//!
//! One handle over a store, a clock, and the change-notification signal.
//! The API layer calls these methods; each mutating method delegates to its
//! service component and publishes the affected entity ids after the commit.

use std::sync::Arc;

use chrono::NaiveDate;
use tokio::sync::broadcast;
use uuid::Uuid;

use stride_core::{
    ChangedEntity, Identity, InstituteId, OrderId, OrderStatus, Points, TransferId, UserId,
};

use crate::balance::{Balance, BalanceAccessor};
use crate::checkout::{BasketLine, CheckoutOutcome, RedemptionTransaction};
use crate::clock::{Clock, SystemClock};
use crate::donation::{DonationOutcome, DonationPool};
use crate::error::{EngineError, Entity};
use crate::grant::AdminGrant;
use crate::notify::ChangeNotifier;
use crate::steps::StepValidator;
use crate::store::{
    CatalogItem, DailyEarningRecord, GrantRecord, Institute, LedgerStore, NewCatalogItem,
    NewInstitute, Order, OrderWithLines, PointTransfer,
};
use crate::transfer::TransferWorkflow;

/// The points ledger and redemption engine.
pub struct Engine<S> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
    notifier: ChangeNotifier,
}

impl<S> Clone for Engine<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            clock: Arc::clone(&self.clock),
            notifier: self.notifier.clone(),
        }
    }
}

impl<S: LedgerStore> Engine<S> {
    /// Create an engine over a store with the system clock.
    #[must_use]
    pub fn new(store: S) -> Self {
        Self::with_clock(store, Arc::new(SystemClock))
    }

    /// Create an engine with an explicit clock (tests keep a handle to a
    /// manual one and advance it across day boundaries).
    #[must_use]
    pub fn with_clock(store: S, clock: Arc<dyn Clock>) -> Self {
        Self {
            store: Arc::new(store),
            clock,
            notifier: ChangeNotifier::new(),
        }
    }

    /// Subscribe to committed-change events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ChangedEntity> {
        self.notifier.subscribe()
    }

    /// The underlying store.
    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    // ---- balances ----

    /// Current balance for a user. Advisory; never gates a commit.
    pub async fn get_balance(&self, user: UserId) -> Result<Balance, EngineError> {
        BalanceAccessor::new(self.store.as_ref()).get(user).await
    }

    // ---- daily earnings ----

    /// Record today's step count.
    pub async fn report_steps(
        &self,
        user: UserId,
        date: NaiveDate,
        steps: u32,
    ) -> Result<DailyEarningRecord, EngineError> {
        StepValidator::new(self.store.as_ref(), self.clock.as_ref())
            .report_steps(user, date, steps)
            .await
    }

    /// Validate today's steps into points, exactly once per day.
    pub async fn validate_steps(&self, user: UserId) -> Result<DailyEarningRecord, EngineError> {
        let record = StepValidator::new(self.store.as_ref(), self.clock.as_ref())
            .validate(user)
            .await?;
        self.notifier.publish(ChangedEntity::Account(user));
        Ok(record)
    }

    /// Today's earning record, if any.
    pub async fn today_earning(
        &self,
        user: UserId,
    ) -> Result<Option<DailyEarningRecord>, EngineError> {
        StepValidator::new(self.store.as_ref(), self.clock.as_ref())
            .today_record(user)
            .await
    }

    // ---- catalog ----

    /// All catalog items.
    pub async fn catalog(&self) -> Result<Vec<CatalogItem>, EngineError> {
        Ok(self.store.catalog_items().await?)
    }

    /// Create a catalog item (admin).
    pub async fn create_catalog_item(
        &self,
        actor: Identity,
        item: NewCatalogItem,
    ) -> Result<CatalogItem, EngineError> {
        if !actor.is_admin() {
            return Err(EngineError::NotAuthorized);
        }
        Ok(self.store.insert_catalog_item(item).await?)
    }

    // ---- checkout & orders ----

    /// Check out a basket; one order per seller partition, all or nothing.
    pub async fn checkout(
        &self,
        user: UserId,
        basket: &[BasketLine],
        idempotency_key: Option<Uuid>,
    ) -> Result<CheckoutOutcome, EngineError> {
        self.store.ensure_user(user, self.clock.now()).await?;
        let outcome = RedemptionTransaction::new(self.store.as_ref(), self.clock.as_ref())
            .checkout(user, basket, idempotency_key)
            .await?;
        if !outcome.replayed {
            self.notifier.publish(ChangedEntity::Account(user));
            for order in &outcome.orders {
                self.notifier.publish(ChangedEntity::Order(order.order.id));
            }
        }
        Ok(outcome)
    }

    /// All orders of a user, newest first.
    pub async fn orders(&self, user: UserId) -> Result<Vec<Order>, EngineError> {
        Ok(self.store.orders_for_user(user).await?)
    }

    /// One order with lines. Owners see their own orders; admins see all.
    pub async fn order(
        &self,
        actor: Identity,
        id: OrderId,
    ) -> Result<OrderWithLines, EngineError> {
        let order = self
            .store
            .order_with_lines(id)
            .await?
            .ok_or(EngineError::NotFound(Entity::Order))?;
        if order.order.user_id != actor.user_id && !actor.is_admin() {
            return Err(EngineError::NotFound(Entity::Order));
        }
        Ok(order)
    }

    /// Advance an order's status (admin). Transitions are append-only;
    /// cancellation restores neither points nor stock.
    pub async fn update_order_status(
        &self,
        actor: Identity,
        id: OrderId,
        next: OrderStatus,
    ) -> Result<Order, EngineError> {
        if !actor.is_admin() {
            return Err(EngineError::NotAuthorized);
        }
        let order = self.store.commit_order_status(id, next).await?;
        self.notifier.publish(ChangedEntity::Order(order.id));
        Ok(order)
    }

    // ---- transfers ----

    /// Propose a point gift. No balance effect until acceptance.
    pub async fn propose_transfer(
        &self,
        sender: UserId,
        receiver: UserId,
        amount: Points,
    ) -> Result<PointTransfer, EngineError> {
        TransferWorkflow::new(self.store.as_ref(), self.clock.as_ref())
            .propose(sender, receiver, amount)
            .await
    }

    /// Accept or reject a pending transfer as its receiver.
    pub async fn respond_transfer(
        &self,
        actor: UserId,
        transfer_id: TransferId,
        accept: bool,
    ) -> Result<PointTransfer, EngineError> {
        let resolved = TransferWorkflow::new(self.store.as_ref(), self.clock.as_ref())
            .respond(actor, transfer_id, accept)
            .await?;
        if accept {
            self.notifier
                .publish(ChangedEntity::Account(resolved.sender_id));
            self.notifier
                .publish(ChangedEntity::Account(resolved.receiver_id));
        }
        Ok(resolved)
    }

    /// All transfers a user sent or received.
    pub async fn transfers(&self, user: UserId) -> Result<Vec<PointTransfer>, EngineError> {
        TransferWorkflow::new(self.store.as_ref(), self.clock.as_ref())
            .for_user(user)
            .await
    }

    // ---- donations ----

    /// Donate points toward an institute's campaign goal.
    pub async fn donate(
        &self,
        user: UserId,
        institute: InstituteId,
        amount: Points,
    ) -> Result<DonationOutcome, EngineError> {
        let outcome = DonationPool::new(self.store.as_ref(), self.clock.as_ref())
            .donate(user, institute, amount)
            .await?;
        self.notifier.publish(ChangedEntity::Account(user));
        self.notifier
            .publish(ChangedEntity::Institute(outcome.institute.id));
        Ok(outcome)
    }

    /// One institute's current state.
    pub async fn institute(&self, id: InstituteId) -> Result<Institute, EngineError> {
        DonationPool::new(self.store.as_ref(), self.clock.as_ref())
            .institute(id)
            .await?
            .ok_or(EngineError::NotFound(Entity::Institute))
    }

    /// Create an institute (admin).
    pub async fn create_institute(
        &self,
        actor: Identity,
        institute: NewInstitute,
    ) -> Result<Institute, EngineError> {
        if !actor.is_admin() {
            return Err(EngineError::NotAuthorized);
        }
        Ok(self.store.insert_institute(institute).await?)
    }

    // ---- grants ----

    /// Issue an audited administrative grant.
    pub async fn grant(
        &self,
        actor: Identity,
        target: UserId,
        amount: Points,
        reason: &str,
    ) -> Result<GrantRecord, EngineError> {
        let record = AdminGrant::new(self.store.as_ref(), self.clock.as_ref())
            .grant(actor, target, amount, reason)
            .await?;
        self.notifier.publish(ChangedEntity::Account(target));
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use stride_core::{ItemKind, StockLevel};

    async fn engine_with_user(user: UserId, points: i64) -> Engine<MemoryStore> {
        let engine = Engine::new(MemoryStore::new());
        let admin = Identity::admin(UserId::new(999));
        engine
            .store()
            .ensure_user(user, chrono::Utc::now())
            .await
            .expect("user");
        if points > 0 {
            engine
                .grant(admin, user, Points::new(points), "seed")
                .await
                .expect("grant");
        }
        engine
    }

    #[tokio::test]
    async fn test_checkout_publishes_account_and_order_events() {
        let user = UserId::new(1);
        let engine = engine_with_user(user, 100).await;
        let admin = Identity::admin(UserId::new(999));
        let item = engine
            .create_catalog_item(
                admin,
                NewCatalogItem {
                    seller_id: stride_core::SellerId::new(1),
                    kind: ItemKind::Reward,
                    unit_cost: Points::new(25),
                    stock: StockLevel::Bounded(4),
                },
            )
            .await
            .expect("item");

        let mut rx = engine.subscribe();
        let outcome = engine
            .checkout(
                user,
                &[BasketLine {
                    item_id: item.id,
                    quantity: 2,
                }],
                None,
            )
            .await
            .expect("checkout");
        assert_eq!(outcome.orders.len(), 1);

        assert_eq!(
            rx.recv().await.expect("event"),
            ChangedEntity::Account(user)
        );
        assert_eq!(
            rx.recv().await.expect("event"),
            ChangedEntity::Order(outcome.orders[0].order.id)
        );
    }

    #[tokio::test]
    async fn test_order_visibility() {
        let user = UserId::new(1);
        let engine = engine_with_user(user, 100).await;
        let admin = Identity::admin(UserId::new(999));
        let item = engine
            .create_catalog_item(
                admin,
                NewCatalogItem {
                    seller_id: stride_core::SellerId::new(1),
                    kind: ItemKind::Product,
                    unit_cost: Points::new(10),
                    stock: StockLevel::Unbounded,
                },
            )
            .await
            .expect("item");
        let outcome = engine
            .checkout(
                user,
                &[BasketLine {
                    item_id: item.id,
                    quantity: 1,
                }],
                None,
            )
            .await
            .expect("checkout");
        let order_id = outcome.orders[0].order.id;

        // Owner and admin can read it; a stranger cannot.
        engine
            .order(Identity::member(user), order_id)
            .await
            .expect("owner read");
        engine.order(admin, order_id).await.expect("admin read");
        assert!(matches!(
            engine.order(Identity::member(UserId::new(50)), order_id).await,
            Err(EngineError::NotFound(Entity::Order))
        ));
    }

    #[tokio::test]
    async fn test_admin_gates() {
        let engine = Engine::new(MemoryStore::new());
        let member = Identity::member(UserId::new(1));

        assert!(matches!(
            engine
                .create_institute(
                    member,
                    NewInstitute {
                        name: "x".into(),
                        points_goal: Points::new(10)
                    }
                )
                .await,
            Err(EngineError::NotAuthorized)
        ));
        assert!(matches!(
            engine
                .update_order_status(member, OrderId::new(1), OrderStatus::Confirmed)
                .await,
            Err(EngineError::NotAuthorized)
        ));
    }
}
