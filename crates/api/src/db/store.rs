//! [`LedgerStore`] over `PostgreSQL`.
//!
//! Every commit method is one sqlx transaction. Debits serialize per user
//! through `pg_advisory_xact_lock`, stock decrements are conditional
//! `UPDATE ... WHERE stock >= $qty` statements checked by `rows_affected`,
//! and balances are re-derived inside the transaction by summing the
//! append-only credit and debit tables. Nothing survives a failed
//! precondition: the transaction is dropped, which rolls it back.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Row, Transaction};
use uuid::Uuid;

use stride_core::{
    CatalogItemId, DonationId, GrantId, InstituteId, ItemKind, OrderId, OrderStatus, Points,
    StockLevel, TransferId, TransferStatus, UserId,
};
use stride_engine::checkout::{PricedLine, basket_total, partition_by_seller};
use stride_engine::error::Entity;
use stride_engine::store::{
    CatalogItem, CheckoutReceipt, DailyEarningRecord, Donation, DonationReceipt, GrantRecord,
    Institute, LedgerStore, LineRequest, NewCatalogItem, NewInstitute, Order, OrderLine,
    OrderWithLines, PointTransfer, PointsSummary, StoreError, User,
};

use super::map_sqlx;

/// Advisory-lock class for per-user debit serialization. Arbitrary but must
/// not collide with other advisory-lock users of the same database.
const DEBIT_LOCK_CLASS: i32 = 0x5752; // "SR"

/// `PostgreSQL`-backed ledger store.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Create the store over a connection pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The underlying pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

// =============================================================================
// Row conversions
// =============================================================================

fn get<'r, T>(row: &'r PgRow, column: &str) -> Result<T, StoreError>
where
    T: sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres>,
{
    row.try_get::<T, _>(column)
        .map_err(|e| StoreError::Backend(e.to_string()))
}

fn earning_from_row(row: &PgRow) -> Result<DailyEarningRecord, StoreError> {
    let steps: i32 = get(row, "steps_count")?;
    Ok(DailyEarningRecord {
        user_id: get(row, "user_id")?,
        date: get::<NaiveDate>(row, "date")?,
        steps_count: u32::try_from(steps)
            .map_err(|_| StoreError::Corrupt(format!("negative steps_count {steps}")))?,
        points_earned: get(row, "points_earned")?,
        validated_at: get::<Option<DateTime<Utc>>>(row, "validated_at")?,
    })
}

fn item_from_row(row: &PgRow) -> Result<CatalogItem, StoreError> {
    let kind: String = get(row, "kind")?;
    Ok(CatalogItem {
        id: get(row, "id")?,
        seller_id: get(row, "seller_id")?,
        kind: ItemKind::parse(&kind)
            .ok_or_else(|| StoreError::Corrupt(format!("unknown item kind {kind:?}")))?,
        unit_cost: get(row, "unit_cost")?,
        stock: StockLevel::from_column(get::<Option<i32>>(row, "stock")?),
    })
}

fn order_from_row(row: &PgRow) -> Result<Order, StoreError> {
    let status: String = get(row, "status")?;
    Ok(Order {
        id: get(row, "id")?,
        user_id: get(row, "user_id")?,
        seller_id: get(row, "seller_id")?,
        status: OrderStatus::parse(&status)
            .ok_or_else(|| StoreError::Corrupt(format!("unknown order status {status:?}")))?,
        total_points: get(row, "total_points")?,
        created_at: get(row, "created_at")?,
    })
}

fn order_line_from_row(row: &PgRow) -> Result<OrderLine, StoreError> {
    let quantity: i32 = get(row, "quantity")?;
    Ok(OrderLine {
        order_id: get(row, "order_id")?,
        item_id: get(row, "item_id")?,
        quantity: u32::try_from(quantity)
            .map_err(|_| StoreError::Corrupt(format!("negative quantity {quantity}")))?,
        points_cost: get(row, "points_cost")?,
    })
}

fn transfer_from_row(row: &PgRow) -> Result<PointTransfer, StoreError> {
    let status: String = get(row, "status")?;
    Ok(PointTransfer {
        id: get(row, "id")?,
        sender_id: get(row, "sender_id")?,
        receiver_id: get(row, "receiver_id")?,
        amount: get(row, "amount")?,
        status: TransferStatus::parse(&status)
            .ok_or_else(|| StoreError::Corrupt(format!("unknown transfer status {status:?}")))?,
        created_at: get(row, "created_at")?,
    })
}

fn institute_from_row(row: &PgRow) -> Result<Institute, StoreError> {
    Ok(Institute {
        id: get(row, "id")?,
        name: get(row, "name")?,
        points_goal: get(row, "points_goal")?,
        current_points: get(row, "current_points")?,
    })
}

fn bind_quantity(quantity: u32) -> Result<i32, StoreError> {
    i32::try_from(quantity).map_err(|_| StoreError::Backend("quantity out of range".into()))
}

/// Map a foreign-key violation onto `NotFound` for the referenced entity.
fn map_fk(entity: Entity) -> impl Fn(sqlx::Error) -> StoreError {
    move |err| {
        if let sqlx::Error::Database(db) = &err
            && db.code().as_deref() == Some("23503")
        {
            return StoreError::NotFound(entity);
        }
        map_sqlx(err)
    }
}

// =============================================================================
// Shared queries
// =============================================================================

const SUMMARY_SQL: &str = r"
SELECT
  (COALESCE((SELECT SUM(points_earned) FROM daily_earnings
             WHERE user_id = $1 AND validated_at IS NOT NULL), 0)
   + COALESCE((SELECT SUM(amount) FROM grants WHERE target_id = $1), 0)
   + COALESCE((SELECT SUM(amount) FROM transfers
               WHERE receiver_id = $1 AND status = 'accepted'), 0))::BIGINT AS cumulative,
  (COALESCE((SELECT SUM(total_points) FROM orders WHERE user_id = $1), 0)
   + COALESCE((SELECT SUM(amount) FROM transfers
               WHERE sender_id = $1 AND status = 'accepted'), 0)
   + COALESCE((SELECT SUM(amount) FROM donations WHERE user_id = $1), 0))::BIGINT AS spent
";

async fn summary_with<'e, E>(executor: E, user: UserId) -> Result<PointsSummary, StoreError>
where
    E: sqlx::PgExecutor<'e>,
{
    let row = sqlx::query(SUMMARY_SQL)
        .bind(user)
        .fetch_one(executor)
        .await
        .map_err(map_sqlx)?;
    Ok(PointsSummary {
        cumulative: get(&row, "cumulative")?,
        spent: get(&row, "spent")?,
    })
}

async fn advisory_debit_lock(
    tx: &mut Transaction<'_, Postgres>,
    user: UserId,
) -> Result<(), StoreError> {
    sqlx::query("SELECT pg_advisory_xact_lock($1, $2)")
        .bind(DEBIT_LOCK_CLASS)
        .bind(user)
        .execute(&mut **tx)
        .await
        .map_err(map_sqlx)?;
    Ok(())
}

async fn available_with(
    tx: &mut Transaction<'_, Postgres>,
    user: UserId,
) -> Result<Points, StoreError> {
    let summary = summary_with(&mut **tx, user).await?;
    Ok(Points::new(
        summary.cumulative.as_i64() - summary.spent.as_i64(),
    ))
}

async fn load_orders(
    tx: &mut Transaction<'_, Postgres>,
    ids: &[i32],
) -> Result<Vec<OrderWithLines>, StoreError> {
    let order_rows = sqlx::query(
        "SELECT id, user_id, seller_id, status, total_points, created_at
         FROM orders WHERE id = ANY($1) ORDER BY id",
    )
    .bind(ids)
    .fetch_all(&mut **tx)
    .await
    .map_err(map_sqlx)?;
    let line_rows = sqlx::query(
        "SELECT order_id, item_id, quantity, points_cost
         FROM order_lines WHERE order_id = ANY($1) ORDER BY order_id, item_id",
    )
    .bind(ids)
    .fetch_all(&mut **tx)
    .await
    .map_err(map_sqlx)?;

    let mut lines_by_order: HashMap<OrderId, Vec<OrderLine>> = HashMap::new();
    for row in &line_rows {
        let line = order_line_from_row(row)?;
        lines_by_order.entry(line.order_id).or_default().push(line);
    }

    order_rows
        .iter()
        .map(|row| {
            let order = order_from_row(row)?;
            let lines = lines_by_order.remove(&order.id).unwrap_or_default();
            Ok(OrderWithLines { order, lines })
        })
        .collect()
}

// =============================================================================
// LedgerStore implementation
// =============================================================================

impl LedgerStore for PgStore {
    async fn user(&self, id: UserId) -> Result<Option<User>, StoreError> {
        let row = sqlx::query("SELECT id, created_at FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx)?;
        row.map(|row| {
            Ok(User {
                id: get(&row, "id")?,
                created_at: get(&row, "created_at")?,
            })
        })
        .transpose()
    }

    async fn ensure_user(&self, id: UserId, now: DateTime<Utc>) -> Result<User, StoreError> {
        sqlx::query("INSERT INTO users (id, created_at) VALUES ($1, $2) ON CONFLICT (id) DO NOTHING")
            .bind(id)
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx)?;
        self.user(id)
            .await?
            .ok_or_else(|| StoreError::Corrupt(format!("user {id} missing after upsert")))
    }

    async fn points_summary(&self, user: UserId) -> Result<PointsSummary, StoreError> {
        summary_with(&self.pool, user).await
    }

    async fn earning_record(
        &self,
        user: UserId,
        date: NaiveDate,
    ) -> Result<Option<DailyEarningRecord>, StoreError> {
        let row = sqlx::query(
            "SELECT user_id, date, steps_count, points_earned, validated_at
             FROM daily_earnings WHERE user_id = $1 AND date = $2",
        )
        .bind(user)
        .bind(date)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx)?;
        row.as_ref().map(earning_from_row).transpose()
    }

    async fn record_steps(
        &self,
        user: UserId,
        date: NaiveDate,
        steps: u32,
    ) -> Result<DailyEarningRecord, StoreError> {
        let steps = i32::try_from(steps)
            .map_err(|_| StoreError::Backend("step count out of range".into()))?;
        // The conditional upsert returns no row once the day is validated.
        let row = sqlx::query(
            "INSERT INTO daily_earnings (user_id, date, steps_count) VALUES ($1, $2, $3)
             ON CONFLICT (user_id, date) DO UPDATE SET steps_count = EXCLUDED.steps_count
             WHERE daily_earnings.validated_at IS NULL
             RETURNING user_id, date, steps_count, points_earned, validated_at",
        )
        .bind(user)
        .bind(date)
        .bind(steps)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_fk(Entity::User))?;
        row.as_ref()
            .map(earning_from_row)
            .transpose()?
            .ok_or(StoreError::AlreadyValidated)
    }

    async fn commit_validation(
        &self,
        user: UserId,
        date: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<DailyEarningRecord, StoreError> {
        let row = sqlx::query(
            "UPDATE daily_earnings
             SET points_earned = steps_count / 100, validated_at = $3
             WHERE user_id = $1 AND date = $2 AND validated_at IS NULL
             RETURNING user_id, date, steps_count, points_earned, validated_at",
        )
        .bind(user)
        .bind(date)
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx)?;

        if let Some(row) = row {
            return earning_from_row(&row);
        }
        // No row updated: either the day was already validated or nothing
        // was ever reported.
        let existing = self.earning_record(user, date).await?;
        match existing {
            Some(_) => Err(StoreError::AlreadyValidated),
            None => Err(StoreError::NotFound(Entity::EarningRecord)),
        }
    }

    async fn catalog_items(&self) -> Result<Vec<CatalogItem>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, seller_id, kind, unit_cost, stock FROM catalog_items ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx)?;
        rows.iter().map(item_from_row).collect()
    }

    async fn catalog_item(&self, id: CatalogItemId) -> Result<Option<CatalogItem>, StoreError> {
        let row = sqlx::query(
            "SELECT id, seller_id, kind, unit_cost, stock FROM catalog_items WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx)?;
        row.as_ref().map(item_from_row).transpose()
    }

    async fn insert_catalog_item(&self, item: NewCatalogItem) -> Result<CatalogItem, StoreError> {
        let row = sqlx::query(
            "INSERT INTO catalog_items (seller_id, kind, unit_cost, stock)
             VALUES ($1, $2, $3, $4)
             RETURNING id, seller_id, kind, unit_cost, stock",
        )
        .bind(item.seller_id)
        .bind(item.kind.as_str())
        .bind(item.unit_cost)
        .bind(item.stock.as_column())
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx)?;
        item_from_row(&row)
    }

    async fn commit_checkout(
        &self,
        user: UserId,
        lines: &[LineRequest],
        idempotency_key: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> Result<CheckoutReceipt, StoreError> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx)?;
        advisory_debit_lock(&mut tx, user).await?;

        if let Some(key) = idempotency_key {
            let row = sqlx::query(
                "SELECT order_ids FROM checkout_receipts
                 WHERE user_id = $1 AND idempotency_key = $2",
            )
            .bind(user)
            .bind(key)
            .fetch_optional(&mut *tx)
            .await
            .map_err(map_sqlx)?;
            if let Some(row) = row {
                let ids: Vec<i32> = get(&row, "order_ids")?;
                let orders = load_orders(&mut tx, &ids).await?;
                tx.commit().await.map_err(map_sqlx)?;
                return Ok(CheckoutReceipt {
                    orders,
                    replayed: true,
                });
            }
        }

        // Authoritative cost/kind/seller/stock, locked for the unit.
        let item_ids: Vec<i32> = lines.iter().map(|l| l.item_id.as_i32()).collect();
        let rows = sqlx::query(
            "SELECT id, seller_id, kind, unit_cost, stock FROM catalog_items
             WHERE id = ANY($1) ORDER BY id FOR UPDATE",
        )
        .bind(&item_ids)
        .fetch_all(&mut *tx)
        .await
        .map_err(map_sqlx)?;
        let mut items: HashMap<CatalogItemId, CatalogItem> = HashMap::with_capacity(rows.len());
        for row in &rows {
            let item = item_from_row(row)?;
            items.insert(item.id, item);
        }

        let mut priced = Vec::with_capacity(lines.len());
        for request in lines {
            let item = items
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

        let available = available_with(&mut tx, user).await?;
        if total > available {
            return Err(StoreError::InsufficientPoints {
                available,
                requested: total,
            });
        }

        for line in &priced {
            let item = items
                .get(&line.item_id)
                .ok_or(StoreError::NotFound(Entity::CatalogItem))?;
            if matches!(item.stock, StockLevel::Unbounded) {
                continue;
            }
            let result = sqlx::query(
                "UPDATE catalog_items SET stock = stock - $2 WHERE id = $1 AND stock >= $2",
            )
            .bind(line.item_id)
            .bind(bind_quantity(line.quantity)?)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx)?;
            if result.rows_affected() == 0 {
                return Err(StoreError::OutOfStock {
                    item_id: line.item_id,
                });
            }
        }

        let mut created = Vec::with_capacity(drafts.len());
        let mut created_ids = Vec::with_capacity(drafts.len());
        for draft in drafts {
            let row = sqlx::query(
                "INSERT INTO orders (user_id, seller_id, status, total_points, created_at)
                 VALUES ($1, $2, 'pending', $3, $4) RETURNING id",
            )
            .bind(user)
            .bind(draft.seller_id)
            .bind(draft.total_points)
            .bind(now)
            .fetch_one(&mut *tx)
            .await
            .map_err(map_sqlx)?;
            let order_id: OrderId = get(&row, "id")?;

            let mut order_lines = Vec::with_capacity(draft.lines.len());
            for line in &draft.lines {
                sqlx::query(
                    "INSERT INTO order_lines (order_id, item_id, quantity, points_cost)
                     VALUES ($1, $2, $3, $4)",
                )
                .bind(order_id)
                .bind(line.item_id)
                .bind(bind_quantity(line.quantity)?)
                .bind(line.points_cost)
                .execute(&mut *tx)
                .await
                .map_err(map_sqlx)?;
                order_lines.push(OrderLine {
                    order_id,
                    item_id: line.item_id,
                    quantity: line.quantity,
                    points_cost: line.points_cost,
                });
            }

            created_ids.push(order_id.as_i32());
            created.push(OrderWithLines {
                order: Order {
                    id: order_id,
                    user_id: user,
                    seller_id: draft.seller_id,
                    status: OrderStatus::Pending,
                    total_points: draft.total_points,
                    created_at: now,
                },
                lines: order_lines,
            });
        }

        if let Some(key) = idempotency_key {
            sqlx::query(
                "INSERT INTO checkout_receipts (user_id, idempotency_key, order_ids, created_at)
                 VALUES ($1, $2, $3, $4)",
            )
            .bind(user)
            .bind(key)
            .bind(&created_ids)
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx)?;
        }

        tx.commit().await.map_err(map_sqlx)?;
        Ok(CheckoutReceipt {
            orders: created,
            replayed: false,
        })
    }

    async fn order_with_lines(&self, id: OrderId) -> Result<Option<OrderWithLines>, StoreError> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx)?;
        let mut orders = load_orders(&mut tx, &[id.as_i32()]).await?;
        tx.commit().await.map_err(map_sqlx)?;
        Ok(orders.pop())
    }

    async fn orders_for_user(&self, user: UserId) -> Result<Vec<Order>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, user_id, seller_id, status, total_points, created_at
             FROM orders WHERE user_id = $1 ORDER BY created_at DESC, id DESC",
        )
        .bind(user)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx)?;
        rows.iter().map(order_from_row).collect()
    }

    async fn commit_order_status(
        &self,
        id: OrderId,
        next: OrderStatus,
    ) -> Result<Order, StoreError> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx)?;

        let row = sqlx::query("SELECT status FROM orders WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(map_sqlx)?
            .ok_or(StoreError::NotFound(Entity::Order))?;
        let current: String = get(&row, "status")?;
        let current = OrderStatus::parse(&current)
            .ok_or_else(|| StoreError::Corrupt(format!("unknown order status {current:?}")))?;
        if !current.can_transition_to(next) {
            return Err(StoreError::Conflict);
        }

        let row = sqlx::query(
            "UPDATE orders SET status = $2 WHERE id = $1
             RETURNING id, user_id, seller_id, status, total_points, created_at",
        )
        .bind(id)
        .bind(next.as_str())
        .fetch_one(&mut *tx)
        .await
        .map_err(map_sqlx)?;
        let order = order_from_row(&row)?;
        tx.commit().await.map_err(map_sqlx)?;
        Ok(order)
    }

    async fn transfer(&self, id: TransferId) -> Result<Option<PointTransfer>, StoreError> {
        let row = sqlx::query(
            "SELECT id, sender_id, receiver_id, amount, status, created_at
             FROM transfers WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx)?;
        row.as_ref().map(transfer_from_row).transpose()
    }

    async fn transfers_for_user(&self, user: UserId) -> Result<Vec<PointTransfer>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, sender_id, receiver_id, amount, status, created_at
             FROM transfers WHERE sender_id = $1 OR receiver_id = $1
             ORDER BY created_at DESC, id DESC",
        )
        .bind(user)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx)?;
        rows.iter().map(transfer_from_row).collect()
    }

    async fn insert_transfer(
        &self,
        sender: UserId,
        receiver: UserId,
        amount: Points,
        now: DateTime<Utc>,
    ) -> Result<PointTransfer, StoreError> {
        let row = sqlx::query(
            "INSERT INTO transfers (sender_id, receiver_id, amount, status, created_at)
             VALUES ($1, $2, $3, 'pending', $4)
             RETURNING id, sender_id, receiver_id, amount, status, created_at",
        )
        .bind(sender)
        .bind(receiver)
        .bind(amount)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(map_fk(Entity::User))?;
        transfer_from_row(&row)
    }

    async fn commit_transfer_reject(&self, id: TransferId) -> Result<PointTransfer, StoreError> {
        let row = sqlx::query(
            "UPDATE transfers SET status = 'rejected'
             WHERE id = $1 AND status = 'pending'
             RETURNING id, sender_id, receiver_id, amount, status, created_at",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx)?;

        if let Some(row) = row {
            return transfer_from_row(&row);
        }
        match self.transfer(id).await? {
            Some(_) => Err(StoreError::Conflict),
            None => Err(StoreError::NotFound(Entity::Transfer)),
        }
    }

    async fn commit_transfer_accept(&self, id: TransferId) -> Result<PointTransfer, StoreError> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx)?;

        let row = sqlx::query(
            "SELECT id, sender_id, receiver_id, amount, status, created_at
             FROM transfers WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(map_sqlx)?
        .ok_or(StoreError::NotFound(Entity::Transfer))?;
        let transfer = transfer_from_row(&row)?;
        if transfer.status != TransferStatus::Pending {
            return Err(StoreError::Conflict);
        }

        // The sender's balance may have dropped since proposal; re-derive it
        // inside this unit. Insufficiency rolls back and leaves the row
        // pending.
        advisory_debit_lock(&mut tx, transfer.sender_id).await?;
        let available = available_with(&mut tx, transfer.sender_id).await?;
        if transfer.amount > available {
            return Err(StoreError::InsufficientPoints {
                available,
                requested: transfer.amount,
            });
        }

        let row = sqlx::query(
            "UPDATE transfers SET status = 'accepted' WHERE id = $1
             RETURNING id, sender_id, receiver_id, amount, status, created_at",
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await
        .map_err(map_sqlx)?;
        let accepted = transfer_from_row(&row)?;
        tx.commit().await.map_err(map_sqlx)?;
        Ok(accepted)
    }

    async fn institute(&self, id: InstituteId) -> Result<Option<Institute>, StoreError> {
        let row = sqlx::query(
            "SELECT id, name, points_goal, current_points FROM institutes WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx)?;
        row.as_ref().map(institute_from_row).transpose()
    }

    async fn insert_institute(&self, institute: NewInstitute) -> Result<Institute, StoreError> {
        let row = sqlx::query(
            "INSERT INTO institutes (name, points_goal) VALUES ($1, $2)
             RETURNING id, name, points_goal, current_points",
        )
        .bind(&institute.name)
        .bind(institute.points_goal)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx)?;
        institute_from_row(&row)
    }

    async fn commit_donation(
        &self,
        user: UserId,
        institute: InstituteId,
        amount: Points,
        now: DateTime<Utc>,
    ) -> Result<DonationReceipt, StoreError> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx)?;
        advisory_debit_lock(&mut tx, user).await?;

        let exists = sqlx::query("SELECT id FROM institutes WHERE id = $1 FOR UPDATE")
            .bind(institute)
            .fetch_optional(&mut *tx)
            .await
            .map_err(map_sqlx)?;
        if exists.is_none() {
            return Err(StoreError::NotFound(Entity::Institute));
        }

        let available = available_with(&mut tx, user).await?;
        if amount > available {
            return Err(StoreError::InsufficientPoints {
                available,
                requested: amount,
            });
        }

        let row = sqlx::query(
            "INSERT INTO donations (user_id, institute_id, amount, created_at)
             VALUES ($1, $2, $3, $4) RETURNING id",
        )
        .bind(user)
        .bind(institute)
        .bind(amount)
        .bind(now)
        .fetch_one(&mut *tx)
        .await
        .map_err(map_sqlx)?;
        let donation_id: DonationId = get(&row, "id")?;

        let row = sqlx::query(
            "UPDATE institutes SET current_points = current_points + $2 WHERE id = $1
             RETURNING id, name, points_goal, current_points",
        )
        .bind(institute)
        .bind(amount)
        .fetch_one(&mut *tx)
        .await
        .map_err(map_sqlx)?;
        let updated = institute_from_row(&row)?;

        tx.commit().await.map_err(map_sqlx)?;
        Ok(DonationReceipt {
            donation: Donation {
                id: donation_id,
                user_id: user,
                institute_id: institute,
                amount,
                created_at: now,
            },
            institute: updated,
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
        let row = sqlx::query(
            "INSERT INTO grants (actor_id, target_id, amount, reason, granted_at)
             VALUES ($1, $2, $3, $4, $5) RETURNING id",
        )
        .bind(actor)
        .bind(target)
        .bind(amount)
        .bind(reason)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(map_fk(Entity::User))?;
        let id: GrantId = get(&row, "id")?;
        Ok(GrantRecord {
            id,
            actor_id: actor,
            target_id: target,
            amount,
            reason: reason.to_owned(),
            granted_at: now,
        })
    }
}
