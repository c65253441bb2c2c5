//! In-memory [`LedgerStore`].
//!
//! The whole dataset lives behind one mutex, so every commit method is
//! trivially atomic: all conditional preconditions are checked before the
//! first mutation, and the lock is never held across an await point.
//!
//! This store backs the engine's unit tests and the integration suites; the
//! production PostgreSQL store lives in `stride-api`.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use stride_core::{
    CatalogItemId, DonationId, GrantId, InstituteId, OrderId, OrderStatus, Points, StockLevel,
    TransferId, TransferStatus, UserId,
};

use crate::checkout::{basket_total, partition_by_seller, PricedLine};
use crate::error::Entity;
use crate::store::{
    CatalogItem, CheckoutReceipt, DailyEarningRecord, Donation, DonationReceipt, GrantRecord,
    Institute, LedgerStore, LineRequest, NewCatalogItem, NewInstitute, Order, OrderLine,
    OrderWithLines, PointTransfer, PointsSummary, StoreError, User,
};

#[derive(Debug, Default)]
struct Inner {
    users: HashMap<UserId, User>,
    earnings: HashMap<(UserId, NaiveDate), DailyEarningRecord>,
    catalog: HashMap<CatalogItemId, CatalogItem>,
    orders: HashMap<OrderId, Order>,
    order_lines: HashMap<OrderId, Vec<OrderLine>>,
    transfers: HashMap<TransferId, PointTransfer>,
    donations: Vec<Donation>,
    institutes: HashMap<InstituteId, Institute>,
    grants: Vec<GrantRecord>,
    receipts: HashMap<(UserId, Uuid), Vec<OrderId>>,
    next_item_id: i32,
    next_order_id: i32,
    next_transfer_id: i32,
    next_donation_id: i32,
    next_grant_id: i32,
    next_institute_id: i32,
}

impl Inner {
    /// Derive the credit/debit aggregates for a user from committed records.
    fn summary(&self, user: UserId) -> PointsSummary {
        let earned: i64 = self
            .earnings
            .values()
            .filter(|r| r.user_id == user && r.validated_at.is_some())
            .map(|r| r.points_earned.as_i64())
            .sum();
        let granted: i64 = self
            .grants
            .iter()
            .filter(|g| g.target_id == user)
            .map(|g| g.amount.as_i64())
            .sum();
        let received: i64 = self
            .transfers
            .values()
            .filter(|t| t.receiver_id == user && t.status == TransferStatus::Accepted)
            .map(|t| t.amount.as_i64())
            .sum();

        // Order totals count regardless of status: cancellation does not
        // restore points.
        let ordered: i64 = self
            .orders
            .values()
            .filter(|o| o.user_id == user)
            .map(|o| o.total_points.as_i64())
            .sum();
        let sent: i64 = self
            .transfers
            .values()
            .filter(|t| t.sender_id == user && t.status == TransferStatus::Accepted)
            .map(|t| t.amount.as_i64())
            .sum();
        let donated: i64 = self
            .donations
            .iter()
            .filter(|d| d.user_id == user)
            .map(|d| d.amount.as_i64())
            .sum();

        PointsSummary {
            cumulative: Points::new(earned + granted + received),
            spent: Points::new(ordered + sent + donated),
        }
    }

    fn available(&self, user: UserId) -> Points {
        let summary = self.summary(user);
        Points::new(summary.cumulative.as_i64() - summary.spent.as_i64())
    }

    fn order_with_lines(&self, id: OrderId) -> Option<OrderWithLines> {
        let order = self.orders.get(&id)?.clone();
        let lines = self.order_lines.get(&id).cloned().unwrap_or_default();
        Some(OrderWithLines { order, lines })
    }
}

fn next(counter: &mut i32) -> i32 {
    *counter += 1;
    *counter
}

/// Thread-safe in-memory store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl LedgerStore for MemoryStore {
    async fn user(&self, id: UserId) -> Result<Option<User>, StoreError> {
        Ok(self.lock().users.get(&id).copied())
    }

    async fn ensure_user(&self, id: UserId, now: DateTime<Utc>) -> Result<User, StoreError> {
        let mut inner = self.lock();
        Ok(*inner
            .users
            .entry(id)
            .or_insert(User { id, created_at: now }))
    }

    async fn points_summary(&self, user: UserId) -> Result<PointsSummary, StoreError> {
        Ok(self.lock().summary(user))
    }

    async fn earning_record(
        &self,
        user: UserId,
        date: NaiveDate,
    ) -> Result<Option<DailyEarningRecord>, StoreError> {
        Ok(self.lock().earnings.get(&(user, date)).copied())
    }

    async fn record_steps(
        &self,
        user: UserId,
        date: NaiveDate,
        steps: u32,
    ) -> Result<DailyEarningRecord, StoreError> {
        let mut inner = self.lock();
        let record = inner
            .earnings
            .entry((user, date))
            .or_insert(DailyEarningRecord {
                user_id: user,
                date,
                steps_count: 0,
                points_earned: Points::ZERO,
                validated_at: None,
            });
        if record.validated_at.is_some() {
            return Err(StoreError::AlreadyValidated);
        }
        record.steps_count = steps;
        Ok(*record)
    }

    async fn commit_validation(
        &self,
        user: UserId,
        date: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<DailyEarningRecord, StoreError> {
        let mut inner = self.lock();
        let record = inner
            .earnings
            .get_mut(&(user, date))
            .ok_or(StoreError::NotFound(Entity::EarningRecord))?;
        if record.validated_at.is_some() {
            return Err(StoreError::AlreadyValidated);
        }
        record.points_earned = Points::from_steps(record.steps_count);
        record.validated_at = Some(now);
        Ok(*record)
    }

    async fn catalog_items(&self) -> Result<Vec<CatalogItem>, StoreError> {
        let inner = self.lock();
        let mut items: Vec<CatalogItem> = inner.catalog.values().copied().collect();
        items.sort_by_key(|item| item.id);
        Ok(items)
    }

    async fn catalog_item(&self, id: CatalogItemId) -> Result<Option<CatalogItem>, StoreError> {
        Ok(self.lock().catalog.get(&id).copied())
    }

    async fn insert_catalog_item(&self, item: NewCatalogItem) -> Result<CatalogItem, StoreError> {
        let mut inner = self.lock();
        let id = CatalogItemId::new(next(&mut inner.next_item_id));
        let item = CatalogItem {
            id,
            seller_id: item.seller_id,
            kind: item.kind,
            unit_cost: item.unit_cost,
            stock: item.stock,
        };
        inner.catalog.insert(id, item);
        Ok(item)
    }

    async fn commit_checkout(
        &self,
        user: UserId,
        lines: &[LineRequest],
        idempotency_key: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> Result<CheckoutReceipt, StoreError> {
        let mut inner = self.lock();

        if let Some(key) = idempotency_key
            && let Some(order_ids) = inner.receipts.get(&(user, key))
        {
            let orders = order_ids
                .iter()
                .filter_map(|id| inner.order_with_lines(*id))
                .collect();
            return Ok(CheckoutReceipt {
                orders,
                replayed: true,
            });
        }

        // Resolve authoritative cost/kind/seller; the client's view of the
        // catalog is not consulted.
        let mut priced = Vec::with_capacity(lines.len());
        for request in lines {
            let item = inner
                .catalog
                .get(&request.item_id)
                .ok_or(StoreError::NotFound(Entity::CatalogItem))?;
            priced.push(PricedLine {
                item_id: item.id,
                seller_id: item.seller_id,
                kind: item.kind,
                quantity: request.quantity,
                unit_cost: item.unit_cost,
            });
        }

        let drafts = partition_by_seller(&priced)
            .map_err(|e| StoreError::Corrupt(format!("basket pricing overflow: {e}")))?;
        let total = basket_total(&drafts)
            .map_err(|e| StoreError::Corrupt(format!("basket total overflow: {e}")))?;

        let available = inner.available(user);
        if total > available {
            return Err(StoreError::InsufficientPoints {
                available,
                requested: total,
            });
        }

        for line in &priced {
            let item = inner
                .catalog
                .get(&line.item_id)
                .ok_or(StoreError::NotFound(Entity::CatalogItem))?;
            if !item.stock.covers(line.quantity) {
                return Err(StoreError::OutOfStock {
                    item_id: line.item_id,
                });
            }
        }

        // All preconditions hold; apply every mutation.
        for line in &priced {
            if let Some(item) = inner.catalog.get_mut(&line.item_id)
                && let StockLevel::Bounded(stock) = item.stock
            {
                item.stock = StockLevel::Bounded(stock - line.quantity as i32);
            }
        }

        let mut created = Vec::with_capacity(drafts.len());
        let mut created_ids = Vec::with_capacity(drafts.len());
        for draft in drafts {
            let id = OrderId::new(next(&mut inner.next_order_id));
            let order = Order {
                id,
                user_id: user,
                seller_id: draft.seller_id,
                status: OrderStatus::Pending,
                total_points: draft.total_points,
                created_at: now,
            };
            let order_lines: Vec<OrderLine> = draft
                .lines
                .into_iter()
                .map(|line| OrderLine {
                    order_id: id,
                    item_id: line.item_id,
                    quantity: line.quantity,
                    points_cost: line.points_cost,
                })
                .collect();
            inner.orders.insert(id, order.clone());
            inner.order_lines.insert(id, order_lines.clone());
            created_ids.push(id);
            created.push(OrderWithLines {
                order,
                lines: order_lines,
            });
        }

        if let Some(key) = idempotency_key {
            inner.receipts.insert((user, key), created_ids);
        }

        Ok(CheckoutReceipt {
            orders: created,
            replayed: false,
        })
    }

    async fn order_with_lines(&self, id: OrderId) -> Result<Option<OrderWithLines>, StoreError> {
        Ok(self.lock().order_with_lines(id))
    }

    async fn orders_for_user(&self, user: UserId) -> Result<Vec<Order>, StoreError> {
        let inner = self.lock();
        let mut orders: Vec<Order> = inner
            .orders
            .values()
            .filter(|o| o.user_id == user)
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(orders)
    }

    async fn commit_order_status(
        &self,
        id: OrderId,
        next_status: OrderStatus,
    ) -> Result<Order, StoreError> {
        let mut inner = self.lock();
        let order = inner
            .orders
            .get_mut(&id)
            .ok_or(StoreError::NotFound(Entity::Order))?;
        if !order.status.can_transition_to(next_status) {
            return Err(StoreError::Conflict);
        }
        order.status = next_status;
        Ok(order.clone())
    }

    async fn transfer(&self, id: TransferId) -> Result<Option<PointTransfer>, StoreError> {
        Ok(self.lock().transfers.get(&id).copied())
    }

    async fn transfers_for_user(&self, user: UserId) -> Result<Vec<PointTransfer>, StoreError> {
        let inner = self.lock();
        let mut transfers: Vec<PointTransfer> = inner
            .transfers
            .values()
            .filter(|t| t.sender_id == user || t.receiver_id == user)
            .copied()
            .collect();
        transfers.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(transfers)
    }

    async fn insert_transfer(
        &self,
        sender: UserId,
        receiver: UserId,
        amount: Points,
        now: DateTime<Utc>,
    ) -> Result<PointTransfer, StoreError> {
        let mut inner = self.lock();
        if !inner.users.contains_key(&receiver) {
            return Err(StoreError::NotFound(Entity::User));
        }
        let id = TransferId::new(next(&mut inner.next_transfer_id));
        let transfer = PointTransfer {
            id,
            sender_id: sender,
            receiver_id: receiver,
            amount,
            status: TransferStatus::Pending,
            created_at: now,
        };
        inner.transfers.insert(id, transfer);
        Ok(transfer)
    }

    async fn commit_transfer_reject(&self, id: TransferId) -> Result<PointTransfer, StoreError> {
        let mut inner = self.lock();
        let transfer = inner
            .transfers
            .get_mut(&id)
            .ok_or(StoreError::NotFound(Entity::Transfer))?;
        if transfer.status != TransferStatus::Pending {
            return Err(StoreError::Conflict);
        }
        transfer.status = TransferStatus::Rejected;
        Ok(*transfer)
    }

    async fn commit_transfer_accept(&self, id: TransferId) -> Result<PointTransfer, StoreError> {
        let mut inner = self.lock();
        let transfer = *inner
            .transfers
            .get(&id)
            .ok_or(StoreError::NotFound(Entity::Transfer))?;
        if transfer.status != TransferStatus::Pending {
            return Err(StoreError::Conflict);
        }

        // The sender's balance may have dropped since proposal; re-derive it
        // here. Insufficiency leaves the transfer pending.
        let available = inner.available(transfer.sender_id);
        if transfer.amount > available {
            return Err(StoreError::InsufficientPoints {
                available,
                requested: transfer.amount,
            });
        }

        // The accepted row itself is the sender's debit and the receiver's
        // credit in the balance derivation.
        let record = inner
            .transfers
            .get_mut(&id)
            .ok_or(StoreError::NotFound(Entity::Transfer))?;
        record.status = TransferStatus::Accepted;
        Ok(*record)
    }

    async fn institute(&self, id: InstituteId) -> Result<Option<Institute>, StoreError> {
        Ok(self.lock().institutes.get(&id).cloned())
    }

    async fn insert_institute(&self, institute: NewInstitute) -> Result<Institute, StoreError> {
        let mut inner = self.lock();
        let id = InstituteId::new(next(&mut inner.next_institute_id));
        let institute = Institute {
            id,
            name: institute.name,
            points_goal: institute.points_goal,
            current_points: Points::ZERO,
        };
        inner.institutes.insert(id, institute.clone());
        Ok(institute)
    }

    async fn commit_donation(
        &self,
        user: UserId,
        institute: InstituteId,
        amount: Points,
        now: DateTime<Utc>,
    ) -> Result<DonationReceipt, StoreError> {
        let mut inner = self.lock();
        if !inner.institutes.contains_key(&institute) {
            return Err(StoreError::NotFound(Entity::Institute));
        }

        let available = inner.available(user);
        if amount > available {
            return Err(StoreError::InsufficientPoints {
                available,
                requested: amount,
            });
        }

        let id = DonationId::new(next(&mut inner.next_donation_id));
        let donation = Donation {
            id,
            user_id: user,
            institute_id: institute,
            amount,
            created_at: now,
        };
        inner.donations.push(donation);

        let record = inner
            .institutes
            .get_mut(&institute)
            .ok_or(StoreError::NotFound(Entity::Institute))?;
        record.current_points = record
            .current_points
            .checked_add(amount)
            .map_err(|e| StoreError::Corrupt(format!("institute pool overflow: {e}")))?;

        Ok(DonationReceipt {
            donation,
            institute: record.clone(),
        })
    }

    async fn commit_grant(
        &self,
        actor: UserId,
        target: UserId,
        amount: Points,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<GrantRecord, StoreError> {
        let mut inner = self.lock();
        if !inner.users.contains_key(&target) {
            return Err(StoreError::NotFound(Entity::User));
        }
        let id = GrantId::new(next(&mut inner.next_grant_id));
        let grant = GrantRecord {
            id,
            actor_id: actor,
            target_id: target,
            amount,
            reason: reason.to_owned(),
            granted_at: now,
        };
        inner.grants.push(grant.clone());
        Ok(grant)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use stride_core::{ItemKind, SellerId};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 14, 12, 0, 0)
            .single()
            .expect("valid timestamp")
    }

    fn today() -> NaiveDate {
        now().date_naive()
    }

    async fn store_with_balance(user: UserId, points: i64) -> MemoryStore {
        let store = MemoryStore::new();
        store.ensure_user(user, now()).await.expect("user");
        store
            .commit_grant(UserId::new(999), user, Points::new(points), "seed", now())
            .await
            .expect("grant");
        store
    }

    #[tokio::test]
    async fn test_summary_derivation() {
        let user = UserId::new(1);
        let store = store_with_balance(user, 100).await;

        let summary = store.points_summary(user).await.expect("summary");
        assert_eq!(summary.cumulative, Points::new(100));
        assert_eq!(summary.spent, Points::ZERO);
    }

    #[tokio::test]
    async fn test_validation_is_once_per_day() {
        let user = UserId::new(1);
        let store = MemoryStore::new();
        store.ensure_user(user, now()).await.expect("user");
        store
            .record_steps(user, today(), 1250)
            .await
            .expect("record");

        let record = store
            .commit_validation(user, today(), now())
            .await
            .expect("validate");
        assert_eq!(record.points_earned, Points::new(12));
        assert!(record.validated_at.is_some());

        let second = store.commit_validation(user, today(), now()).await;
        assert!(matches!(second, Err(StoreError::AlreadyValidated)));

        // Steps can no longer be re-reported for a validated day.
        let report = store.record_steps(user, today(), 4000).await;
        assert!(matches!(report, Err(StoreError::AlreadyValidated)));
    }

    #[tokio::test]
    async fn test_checkout_failure_leaves_no_effect() {
        let user = UserId::new(1);
        let store = store_with_balance(user, 200).await;
        let cheap = store
            .insert_catalog_item(NewCatalogItem {
                seller_id: SellerId::new(1),
                kind: ItemKind::Reward,
                unit_cost: Points::new(10),
                stock: StockLevel::Bounded(5),
            })
            .await
            .expect("item");
        let scarce = store
            .insert_catalog_item(NewCatalogItem {
                seller_id: SellerId::new(2),
                kind: ItemKind::Reward,
                unit_cost: Points::new(10),
                stock: StockLevel::Bounded(1),
            })
            .await
            .expect("item");

        // The second line fails its stock check; the first line's decrement
        // must not survive.
        let result = store
            .commit_checkout(
                user,
                &[
                    LineRequest {
                        item_id: cheap.id,
                        quantity: 2,
                    },
                    LineRequest {
                        item_id: scarce.id,
                        quantity: 2,
                    },
                ],
                None,
                now(),
            )
            .await;
        assert!(
            matches!(result, Err(StoreError::OutOfStock { item_id }) if item_id == scarce.id)
        );

        let unchanged = store.catalog_item(cheap.id).await.expect("item").expect("row");
        assert_eq!(unchanged.stock, StockLevel::Bounded(5));
        assert_eq!(store.orders_for_user(user).await.expect("orders").len(), 0);
        let summary = store.points_summary(user).await.expect("summary");
        assert_eq!(summary.spent, Points::ZERO);
    }

    #[tokio::test]
    async fn test_checkout_idempotency_replay() {
        let user = UserId::new(1);
        let store = store_with_balance(user, 200).await;
        let item = store
            .insert_catalog_item(NewCatalogItem {
                seller_id: SellerId::new(1),
                kind: ItemKind::Reward,
                unit_cost: Points::new(50),
                stock: StockLevel::Bounded(4),
            })
            .await
            .expect("item");

        let key = Uuid::new_v4();
        let lines = [LineRequest {
            item_id: item.id,
            quantity: 1,
        }];
        let first = store
            .commit_checkout(user, &lines, Some(key), now())
            .await
            .expect("checkout");
        assert!(!first.replayed);

        let replay = store
            .commit_checkout(user, &lines, Some(key), now())
            .await
            .expect("replay");
        assert!(replay.replayed);
        assert_eq!(replay.orders, first.orders);

        // Exactly one spend and one decrement.
        let summary = store.points_summary(user).await.expect("summary");
        assert_eq!(summary.spent, Points::new(50));
        let stock = store
            .catalog_item(item.id)
            .await
            .expect("item")
            .expect("row")
            .stock;
        assert_eq!(stock, StockLevel::Bounded(3));
    }

    #[tokio::test]
    async fn test_order_status_raced_transition_conflicts() {
        let user = UserId::new(1);
        let store = store_with_balance(user, 100).await;
        let item = store
            .insert_catalog_item(NewCatalogItem {
                seller_id: SellerId::new(1),
                kind: ItemKind::Product,
                unit_cost: Points::new(10),
                stock: StockLevel::Unbounded,
            })
            .await
            .expect("item");
        let receipt = store
            .commit_checkout(
                user,
                &[LineRequest {
                    item_id: item.id,
                    quantity: 1,
                }],
                None,
                now(),
            )
            .await
            .expect("checkout");
        let order_id = receipt.orders[0].order.id;

        store
            .commit_order_status(order_id, OrderStatus::Cancelled)
            .await
            .expect("cancel");
        let again = store
            .commit_order_status(order_id, OrderStatus::Confirmed)
            .await;
        assert!(matches!(again, Err(StoreError::Conflict)));
    }
}
