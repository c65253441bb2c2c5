//! Multi-seller basket checkout.
//!
//! A basket is an ephemeral client-side selection; it is never persisted.
//! The service validates the basket's shape, merges duplicate lines, and
//! hands the merged line requests to the store's checkout unit. Everything
//! that matters - unit costs, item kinds, seller ownership, stock, the
//! payer's balance - is resolved inside that unit, so nothing the client
//! claimed is trusted.
//!
//! The balance check is against the entire basket (all sellers combined);
//! one order per seller partition is committed, or nothing is.

use std::collections::BTreeMap;

use tracing::instrument;
use uuid::Uuid;

use stride_core::{CatalogItemId, ItemKind, Points, PointsError, SellerId, UserId};

use crate::clock::Clock;
use crate::error::EngineError;
use crate::store::{LedgerStore, LineRequest, OrderWithLines};

/// One line of a client basket: an item and a quantity. Client-side price
/// and stock snapshots are display-only and deliberately absent here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
pub struct BasketLine {
    pub item_id: CatalogItemId,
    pub quantity: u32,
}

/// Successful checkout: one order per seller partition.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct CheckoutOutcome {
    pub orders: Vec<OrderWithLines>,
    /// True when an idempotency-key replay returned the original orders.
    pub replayed: bool,
}

/// A basket line priced from the catalog inside the checkout unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PricedLine {
    pub item_id: CatalogItemId,
    pub seller_id: SellerId,
    pub kind: ItemKind,
    pub quantity: u32,
    pub unit_cost: Points,
}

/// One line of a draft order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DraftLine {
    pub item_id: CatalogItemId,
    pub quantity: u32,
    pub points_cost: Points,
}

/// A per-seller order draft produced by partitioning a priced basket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderDraft {
    pub seller_id: SellerId,
    pub total_points: Points,
    pub lines: Vec<DraftLine>,
}

/// Group priced lines by owning seller, pricing each line and totalling each
/// partition. Partitions come out in seller-id order so commits are
/// deterministic. Store implementations call this inside the checkout unit.
///
/// # Errors
///
/// Returns `PointsError::Overflow` if any line or partition total overflows.
pub fn partition_by_seller(lines: &[PricedLine]) -> Result<Vec<OrderDraft>, PointsError> {
    let mut partitions: BTreeMap<SellerId, Vec<DraftLine>> = BTreeMap::new();
    for line in lines {
        let points_cost = line.unit_cost.checked_mul(line.quantity)?;
        partitions.entry(line.seller_id).or_default().push(DraftLine {
            item_id: line.item_id,
            quantity: line.quantity,
            points_cost,
        });
    }

    partitions
        .into_iter()
        .map(|(seller_id, lines)| {
            let mut total_points = Points::ZERO;
            for line in &lines {
                total_points = total_points.checked_add(line.points_cost)?;
            }
            Ok(OrderDraft {
                seller_id,
                total_points,
                lines,
            })
        })
        .collect()
}

/// Total of a whole basket across all seller partitions.
///
/// # Errors
///
/// Returns `PointsError::Overflow` if the sum overflows.
pub fn basket_total(drafts: &[OrderDraft]) -> Result<Points, PointsError> {
    let mut total = Points::ZERO;
    for draft in drafts {
        total = total.checked_add(draft.total_points)?;
    }
    Ok(total)
}

/// Executes basket checkouts against the ledger store.
pub struct RedemptionTransaction<'a, S> {
    store: &'a S,
    clock: &'a dyn Clock,
}

impl<'a, S: LedgerStore> RedemptionTransaction<'a, S> {
    /// Create the service over a store and clock.
    #[must_use]
    pub const fn new(store: &'a S, clock: &'a dyn Clock) -> Self {
        Self { store, clock }
    }

    /// Check out a basket.
    ///
    /// # Errors
    ///
    /// - `InvalidAmount` - empty basket or a zero quantity
    /// - `NotFound(CatalogItem)` - a line references an unknown item
    /// - `InsufficientPoints` - balance cannot cover the whole basket
    /// - `OutOfStock` - a bounded stock cannot cover its merged quantity
    /// - `ConcurrentConflict` - the unit raced; retry with fresh reads
    #[instrument(skip(self, basket), fields(user = %user, lines = basket.len()))]
    pub async fn checkout(
        &self,
        user: UserId,
        basket: &[BasketLine],
        idempotency_key: Option<Uuid>,
    ) -> Result<CheckoutOutcome, EngineError> {
        let lines = merge_basket(basket)?;
        let receipt = self
            .store
            .commit_checkout(user, &lines, idempotency_key, self.clock.now())
            .await?;
        Ok(CheckoutOutcome {
            orders: receipt.orders,
            replayed: receipt.replayed,
        })
    }
}

/// Validate basket shape and merge duplicate item lines by summing their
/// quantities. An empty basket or a non-positive quantity is rejected.
fn merge_basket(basket: &[BasketLine]) -> Result<Vec<LineRequest>, EngineError> {
    if basket.is_empty() {
        return Err(EngineError::InvalidAmount);
    }

    let mut merged: BTreeMap<CatalogItemId, u32> = BTreeMap::new();
    for line in basket {
        if line.quantity == 0 {
            return Err(EngineError::InvalidAmount);
        }
        let quantity = merged.entry(line.item_id).or_insert(0);
        *quantity = quantity
            .checked_add(line.quantity)
            .ok_or(EngineError::InvalidAmount)?;
    }

    Ok(merged
        .into_iter()
        .map(|(item_id, quantity)| LineRequest { item_id, quantity })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn priced(item: i32, seller: i32, quantity: u32, cost: i64) -> PricedLine {
        PricedLine {
            item_id: CatalogItemId::new(item),
            seller_id: SellerId::new(seller),
            kind: ItemKind::Reward,
            quantity,
            unit_cost: Points::new(cost),
        }
    }

    #[test]
    fn test_merge_rejects_empty_basket() {
        assert!(matches!(
            merge_basket(&[]),
            Err(EngineError::InvalidAmount)
        ));
    }

    #[test]
    fn test_merge_rejects_zero_quantity() {
        let basket = [BasketLine {
            item_id: CatalogItemId::new(1),
            quantity: 0,
        }];
        assert!(matches!(
            merge_basket(&basket),
            Err(EngineError::InvalidAmount)
        ));
    }

    #[test]
    fn test_merge_sums_duplicate_lines() {
        let basket = [
            BasketLine {
                item_id: CatalogItemId::new(1),
                quantity: 2,
            },
            BasketLine {
                item_id: CatalogItemId::new(2),
                quantity: 1,
            },
            BasketLine {
                item_id: CatalogItemId::new(1),
                quantity: 3,
            },
        ];
        let merged = merge_basket(&basket).expect("valid basket");
        assert_eq!(
            merged,
            vec![
                LineRequest {
                    item_id: CatalogItemId::new(1),
                    quantity: 5
                },
                LineRequest {
                    item_id: CatalogItemId::new(2),
                    quantity: 1
                },
            ]
        );
    }

    #[test]
    fn test_partition_groups_by_seller_and_totals() {
        let lines = [
            priced(10, 2, 1, 30),
            priced(11, 1, 2, 50),
            priced(12, 2, 4, 5),
        ];
        let drafts = partition_by_seller(&lines).expect("no overflow");

        assert_eq!(drafts.len(), 2);
        assert_eq!(drafts[0].seller_id, SellerId::new(1));
        assert_eq!(drafts[0].total_points, Points::new(100));
        assert_eq!(drafts[1].seller_id, SellerId::new(2));
        assert_eq!(drafts[1].total_points, Points::new(50));
        assert_eq!(drafts[1].lines.len(), 2);

        assert_eq!(basket_total(&drafts).expect("no overflow"), Points::new(150));
    }

    #[test]
    fn test_partition_overflow_is_an_error() {
        let lines = [priced(1, 1, 2, i64::MAX / 2 + 1)];
        assert_eq!(
            partition_by_seller(&lines),
            Err(PointsError::Overflow)
        );
    }
}
