//! Persistent-store boundary for the ledger engine.
//!
//! [`LedgerStore`] is the only way the engine touches persistence. Read
//! methods are advisory snapshots; each `commit_*` method is one atomic
//! unit that re-evaluates its conditional preconditions (balance
//! sufficiency, stock sufficiency, not-already-validated, still-pending)
//! against current state and either fully commits or leaves no effect.
//!
//! Two implementations exist: [`memory::MemoryStore`] in this crate, and the
//! PostgreSQL store in `stride-api`.

pub mod memory;

pub use memory::MemoryStore;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use stride_core::{
    CatalogItemId, DonationId, GrantId, InstituteId, ItemKind, OrderId, OrderStatus, Points,
    SellerId, StockLevel, TransferId, TransferStatus, UserId,
};

use crate::error::Entity;

/// Failures surfaced by store operations.
///
/// The first group are conditional-commit outcomes - expected results of the
/// optimistic concurrency model, mapped one-to-one onto the engine taxonomy.
/// `Backend` and `Corrupt` are infrastructure failures.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Balance re-derived inside the unit could not cover the debit.
    #[error("insufficient points: {available} available, {requested} requested")]
    InsufficientPoints {
        available: Points,
        requested: Points,
    },

    /// Conditional stock decrement failed.
    #[error("out of stock: item {item_id}")]
    OutOfStock { item_id: CatalogItemId },

    /// The earning record's `validated_at` was already set.
    #[error("already validated")]
    AlreadyValidated,

    /// Referenced row does not exist.
    #[error("{0} not found")]
    NotFound(Entity),

    /// The unit aborted because a precondition raced with another commit.
    #[error("concurrent conflict")]
    Conflict,

    /// Backend failure (connection, query, serialization of the unit).
    #[error("backend error: {0}")]
    Backend(String),

    /// Stored data violates a ledger invariant.
    #[error("data corruption: {0}")]
    Corrupt(String),
}

// =============================================================================
// Records
// =============================================================================

/// Registered user (ids are assigned by the external identity provider).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub created_at: DateTime<Utc>,
}

/// Credit/debit aggregate for one user. `available = cumulative - spent`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PointsSummary {
    /// Lifetime credits: validated earnings + grants + accepted incoming
    /// transfers. Monotonically non-decreasing.
    pub cumulative: Points,
    /// Lifetime committed debits: order totals + accepted outgoing transfers
    /// + donations.
    pub spent: Points,
}

/// One user's step record for one calendar date. Append-only audit trail;
/// `validated_at` is set at most once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyEarningRecord {
    pub user_id: UserId,
    pub date: NaiveDate,
    pub steps_count: u32,
    pub points_earned: Points,
    pub validated_at: Option<DateTime<Utc>>,
}

/// Catalog item owned by a seller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogItem {
    pub id: CatalogItemId,
    pub seller_id: SellerId,
    pub kind: ItemKind,
    pub unit_cost: Points,
    pub stock: StockLevel,
}

/// Input for catalog item creation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct NewCatalogItem {
    pub seller_id: SellerId,
    pub kind: ItemKind,
    pub unit_cost: Points,
    pub stock: StockLevel,
}

/// A committed order. One order per seller per checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub seller_id: SellerId,
    pub status: OrderStatus,
    pub total_points: Points,
    pub created_at: DateTime<Utc>,
}

/// A line of a committed order. Lines never change after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub order_id: OrderId,
    pub item_id: CatalogItemId,
    pub quantity: u32,
    /// Total cost of the line (unit cost x quantity) at checkout time.
    pub points_cost: Points,
}

/// An order together with its lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderWithLines {
    pub order: Order,
    pub lines: Vec<OrderLine>,
}

/// Result of a checkout commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutReceipt {
    pub orders: Vec<OrderWithLines>,
    /// True when an idempotency key replay returned the original orders
    /// without a new spend.
    pub replayed: bool,
}

/// A peer-to-peer point gift.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointTransfer {
    pub id: TransferId,
    pub sender_id: UserId,
    pub receiver_id: UserId,
    pub amount: Points,
    pub status: TransferStatus,
    pub created_at: DateTime<Utc>,
}

/// A committed donation. Append-only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Donation {
    pub id: DonationId,
    pub user_id: UserId,
    pub institute_id: InstituteId,
    pub amount: Points,
    pub created_at: DateTime<Utc>,
}

/// A donation campaign. `current_points` is monotonically non-decreasing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Institute {
    pub id: InstituteId,
    pub name: String,
    pub points_goal: Points,
    pub current_points: Points,
}

/// Input for institute creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewInstitute {
    pub name: String,
    pub points_goal: Points,
}

/// Donation commit result: the appended record plus the institute's
/// post-increment state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DonationReceipt {
    pub donation: Donation,
    pub institute: Institute,
}

/// Audit row for administrative issuance. Append-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrantRecord {
    pub id: GrantId,
    pub actor_id: UserId,
    pub target_id: UserId,
    pub amount: Points,
    pub reason: String,
    pub granted_at: DateTime<Utc>,
}

/// A validated, merged basket line handed to the checkout unit.
/// Costs and kinds are NOT carried here; the unit resolves them from the
/// catalog so client-claimed values are never trusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineRequest {
    pub item_id: CatalogItemId,
    pub quantity: u32,
}

// =============================================================================
// Store trait
// =============================================================================

/// Row-oriented persistent store with atomic conditional commits.
///
/// Read methods never block behind a commit and never participate in a lock
/// visible to the caller. Each `commit_*`/`insert_*` method is a single
/// atomic unit.
pub trait LedgerStore: Send + Sync + 'static {
    // ---- users ----

    /// Look up a registered user.
    fn user(&self, id: UserId) -> impl Future<Output = Result<Option<User>, StoreError>> + Send;

    /// Register a user id if not present (idempotent).
    fn ensure_user(
        &self,
        id: UserId,
        now: DateTime<Utc>,
    ) -> impl Future<Output = Result<User, StoreError>> + Send;

    // ---- balances ----

    /// Credit/debit aggregates for a user, derived from committed records.
    /// Advisory outside an atomic unit.
    fn points_summary(
        &self,
        user: UserId,
    ) -> impl Future<Output = Result<PointsSummary, StoreError>> + Send;

    // ---- daily earnings ----

    /// The earning record for one user and date, if any.
    fn earning_record(
        &self,
        user: UserId,
        date: NaiveDate,
    ) -> impl Future<Output = Result<Option<DailyEarningRecord>, StoreError>> + Send;

    /// Create or update the day's step count while `validated_at` is null.
    /// Fails `AlreadyValidated` once the day is validated.
    fn record_steps(
        &self,
        user: UserId,
        date: NaiveDate,
        steps: u32,
    ) -> impl Future<Output = Result<DailyEarningRecord, StoreError>> + Send;

    /// Atomically validate the day's record: fails `AlreadyValidated` if
    /// `validated_at` is set, `NotFound(EarningRecord)` if no steps were
    /// reported; otherwise computes the earned points from the recorded
    /// steps and sets `validated_at = now` in the same unit that credits
    /// the account.
    fn commit_validation(
        &self,
        user: UserId,
        date: NaiveDate,
        now: DateTime<Utc>,
    ) -> impl Future<Output = Result<DailyEarningRecord, StoreError>> + Send;

    // ---- catalog ----

    /// All catalog items.
    fn catalog_items(&self) -> impl Future<Output = Result<Vec<CatalogItem>, StoreError>> + Send;

    /// One catalog item.
    fn catalog_item(
        &self,
        id: CatalogItemId,
    ) -> impl Future<Output = Result<Option<CatalogItem>, StoreError>> + Send;

    /// Create a catalog item.
    fn insert_catalog_item(
        &self,
        item: NewCatalogItem,
    ) -> impl Future<Output = Result<CatalogItem, StoreError>> + Send;

    // ---- checkout ----

    /// Execute a whole checkout as one atomic unit: resolve every line's
    /// item (unknown -> `NotFound`), partition by seller, re-derive the
    /// available balance (shortfall -> `InsufficientPoints`), conditionally
    /// decrement every bounded stock (shortfall -> `OutOfStock`), and create
    /// one `pending` order plus lines per seller partition. Any failure
    /// leaves no row mutated.
    ///
    /// When `idempotency_key` matches a previously committed checkout for
    /// this user, the original receipt is returned with `replayed = true`.
    fn commit_checkout(
        &self,
        user: UserId,
        lines: &[LineRequest],
        idempotency_key: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> impl Future<Output = Result<CheckoutReceipt, StoreError>> + Send;

    // ---- orders ----

    /// One order with its lines.
    fn order_with_lines(
        &self,
        id: OrderId,
    ) -> impl Future<Output = Result<Option<OrderWithLines>, StoreError>> + Send;

    /// All orders of a user, newest first.
    fn orders_for_user(
        &self,
        user: UserId,
    ) -> impl Future<Output = Result<Vec<Order>, StoreError>> + Send;

    /// Advance an order's status. The transition is validated against the
    /// current status inside the unit; an invalid or raced transition fails
    /// `Conflict`.
    fn commit_order_status(
        &self,
        id: OrderId,
        next: OrderStatus,
    ) -> impl Future<Output = Result<Order, StoreError>> + Send;

    // ---- transfers ----

    /// One transfer.
    fn transfer(
        &self,
        id: TransferId,
    ) -> impl Future<Output = Result<Option<PointTransfer>, StoreError>> + Send;

    /// All transfers a user sent or received, newest first.
    fn transfers_for_user(
        &self,
        user: UserId,
    ) -> impl Future<Output = Result<Vec<PointTransfer>, StoreError>> + Send;

    /// Create a `pending` transfer. No balance effect. Fails
    /// `NotFound(User)` for an unregistered receiver.
    fn insert_transfer(
        &self,
        sender: UserId,
        receiver: UserId,
        amount: Points,
        now: DateTime<Utc>,
    ) -> impl Future<Output = Result<PointTransfer, StoreError>> + Send;

    /// Reject a pending transfer. Terminal, no balance effect. Fails
    /// `Conflict` if the transfer is no longer pending.
    fn commit_transfer_reject(
        &self,
        id: TransferId,
    ) -> impl Future<Output = Result<PointTransfer, StoreError>> + Send;

    /// Accept a pending transfer: re-derive the sender's balance inside the
    /// unit; `InsufficientPoints` leaves the transfer pending; otherwise the
    /// debit, credit, and status change commit together. Fails `Conflict`
    /// if the transfer is no longer pending.
    fn commit_transfer_accept(
        &self,
        id: TransferId,
    ) -> impl Future<Output = Result<PointTransfer, StoreError>> + Send;

    // ---- donations ----

    /// One institute.
    fn institute(
        &self,
        id: InstituteId,
    ) -> impl Future<Output = Result<Option<Institute>, StoreError>> + Send;

    /// Create an institute.
    fn insert_institute(
        &self,
        institute: NewInstitute,
    ) -> impl Future<Output = Result<Institute, StoreError>> + Send;

    /// Commit a donation as one unit: re-derive and check the donor's
    /// balance, append the donation, increment the institute's pooled total.
    fn commit_donation(
        &self,
        user: UserId,
        institute: InstituteId,
        amount: Points,
        now: DateTime<Utc>,
    ) -> impl Future<Output = Result<DonationReceipt, StoreError>> + Send;

    // ---- grants ----

    /// Commit an administrative grant: credit the target and append the
    /// audit row in one unit.
    fn commit_grant(
        &self,
        actor: UserId,
        target: UserId,
        amount: Points,
        reason: &str,
        now: DateTime<Utc>,
    ) -> impl Future<Output = Result<GrantRecord, StoreError>> + Send;
}
