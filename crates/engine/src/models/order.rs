//! Order entity and its fulfilment state machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tutorium_core::{Branch, Coins, OrderId, OrderStatus, RewardId, UserId};

use super::cart::{Cart, CartItem};

/// Who performed a terminal transition, and when.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionRecord {
    /// When the transition was committed.
    pub at: DateTime<Utc>,
    /// Display name of the staff member who performed it.
    pub by: String,
}

/// One ordered line, snapshotted from the cart at placement time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub reward_id: RewardId,
    pub reward_name: String,
    pub branch: Branch,
    pub quantity: u32,
    pub price_snapshot: Coins,
}

impl From<CartItem> for OrderItem {
    fn from(item: CartItem) -> Self {
        Self {
            reward_id: item.reward_id,
            reward_name: item.reward_name,
            branch: item.branch,
            quantity: item.quantity,
            price_snapshot: item.price_snapshot,
        }
    }
}

/// A placed order.
///
/// The item list is an immutable snapshot of the cart at placement time -
/// reward names and prices are denormalized so later catalog edits or
/// deletions cannot change what was charged. Status moves `Pending ->
/// Completed` (fulfilment) or `Pending -> Cancelled` (refund); both are
/// terminal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    /// System-generated unique id.
    pub id: OrderId,
    /// The student who placed the order.
    pub user_id: UserId,
    /// Snapshot of the cart's lines at placement time.
    pub items: Vec<OrderItem>,
    /// Total charged at placement time.
    pub total_price: Coins,
    /// Current state-machine position.
    pub status: OrderStatus,
    /// When the order was placed.
    pub ordered_at: DateTime<Utc>,
    /// Set exactly once, by fulfilment.
    pub completed: Option<ActionRecord>,
    /// Set exactly once, by cancellation.
    pub cancelled: Option<ActionRecord>,
}

impl Order {
    /// Create a pending order from a cart.
    #[must_use]
    pub fn from_cart(cart: Cart, now: DateTime<Utc>) -> Self {
        Self {
            id: OrderId::generate(),
            user_id: cart.user_id,
            items: cart.items.into_iter().map(OrderItem::from).collect(),
            total_price: cart.total_price,
            status: OrderStatus::Pending,
            ordered_at: now,
            completed: None,
            cancelled: None,
        }
    }

    /// Whether the item list is a well-formed, fulfillable sequence:
    /// non-empty, every line with a positive quantity.
    #[must_use]
    pub fn items_well_formed(&self) -> bool {
        !self.items.is_empty() && self.items.iter().all(|item| item.quantity > 0)
    }
}
