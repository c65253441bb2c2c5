//! Status enums and stock levels for ledger entities.

use serde::{Deserialize, Serialize};

/// Order fulfillment status.
///
/// Transitions are append-only: an order's lines never change after creation,
/// only the status advances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Created by checkout, awaiting seller acknowledgement.
    #[default]
    Pending,
    /// Seller/partner acknowledged the order.
    Confirmed,
    /// Order was fulfilled.
    Completed,
    /// Order was cancelled. Spent points and decremented stock are NOT
    /// restored; cancellation is a status transition only.
    Cancelled,
}

impl OrderStatus {
    /// Whether an order may move from `self` to `next`.
    ///
    /// Valid transitions:
    /// - `Pending -> Confirmed`
    /// - `Confirmed -> Completed`
    /// - `Pending | Confirmed -> Cancelled`
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Confirmed)
                | (Self::Confirmed, Self::Completed)
                | (Self::Pending | Self::Confirmed, Self::Cancelled)
        )
    }

    /// Whether the status is terminal.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    /// Stable string form used by the database layer.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Parse the database string form.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "confirmed" => Some(Self::Confirmed),
            "completed" => Some(Self::Completed),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

/// Point transfer status.
///
/// A transfer moves no points until it is accepted; rejection is terminal
/// with no balance effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TransferStatus {
    /// Proposed by the sender, awaiting the receiver's response.
    #[default]
    Pending,
    /// Receiver accepted; points moved at acceptance time.
    Accepted,
    /// Receiver declined; terminal, no balance effect.
    Rejected,
}

impl TransferStatus {
    /// Stable string form used by the database layer.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
        }
    }

    /// Parse the database string form.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "accepted" => Some(Self::Accepted),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }
}

/// Catalog item kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    /// A physical product sold by a seller.
    Product,
    /// A redeemable reward; always stock-limited.
    Reward,
}

impl ItemKind {
    /// Stable string form used by the database layer.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Product => "product",
            Self::Reward => "reward",
        }
    }

    /// Parse the database string form.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "product" => Some(Self::Product),
            "reward" => Some(Self::Reward),
            _ => None,
        }
    }
}

/// Stock availability of a catalog item.
///
/// Products may be listed with unbounded availability (the seller fulfills on
/// demand); rewards always carry a bounded count. Only bounded stock is
/// decremented at checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StockLevel {
    /// Always-sufficient availability; never decremented.
    Unbounded,
    /// A finite count, decremented by successful checkouts. Never negative.
    Bounded(i32),
}

impl StockLevel {
    /// Whether `quantity` units can currently be taken.
    #[must_use]
    pub const fn covers(self, quantity: u32) -> bool {
        match self {
            Self::Unbounded => true,
            Self::Bounded(n) => n >= 0 && (n as u32) >= quantity,
        }
    }

    /// The database representation: `None` means unbounded.
    #[must_use]
    pub const fn as_column(self) -> Option<i32> {
        match self {
            Self::Unbounded => None,
            Self::Bounded(n) => Some(n),
        }
    }

    /// Build from the database representation.
    #[must_use]
    pub const fn from_column(stock: Option<i32>) -> Self {
        match stock {
            None => Self::Unbounded,
            Some(n) => Self::Bounded(n),
        }
    }
}
