//! Order placement, fulfilment and cancellation.
//!
//! Every state transition here runs as one ledger transaction so the coin
//! debit, the stock decrement and the status write land together or not at
//! all. Placement charges coins without touching stock; fulfilment is where
//! stock is authoritatively checked and decremented; cancellation refunds
//! the recorded order total.

use std::collections::BTreeMap;

use chrono::Utc;
use thiserror::Error;
use tracing::{info, warn};

use tutorium_core::{Branch, Coins, OrderId, OrderStatus, RewardId, UserId};

use crate::models::{ActionRecord, Cart, Order, Reward, User};
use crate::store::{MemoryLedger, StoreError, TxnError, collections};

use super::coins::{DebitOutcome, credit_in_tx, debit_in_tx};
use super::tokens::{AuthContext, Forbidden};

/// Errors that can occur during order operations.
#[derive(Debug, Error)]
pub enum OrderError {
    /// The user has no cart to place.
    #[error("no cart for user {0}")]
    CartNotFound(UserId),

    /// The user has no coin balance document.
    #[error("no coin balance for user {0}")]
    BalanceNotFound(UserId),

    /// No order with the given id.
    #[error("order {0} not found")]
    OrderNotFound(OrderId),

    /// The order's item list is empty or carries a zero-quantity line.
    #[error("order {0} has a malformed item list")]
    InvalidItems(OrderId),

    /// The order is not in a state that permits the transition.
    #[error("order {order_id} is {status}, not pending")]
    InvalidStatus {
        order_id: OrderId,
        status: OrderStatus,
    },

    /// An order line carries a blank reward reference.
    #[error("order {0} has an item without a reward id")]
    MissingRewardId(OrderId),

    /// A reward referenced by the order no longer exists in the catalog.
    #[error("reward {0} not found")]
    RewardNotFound(RewardId),

    /// A branch cannot cover the requested quantity.
    #[error("insufficient stock of {reward_id} at {branch}: {available} available, {requested} requested")]
    InsufficientStock {
        reward_id: RewardId,
        branch: Branch,
        available: u32,
        requested: u32,
    },

    /// The caller's role does not permit the operation.
    #[error(transparent)]
    Forbidden(#[from] Forbidden),

    /// Store-level failure.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl OrderError {
    fn from_txn(err: TxnError<Self>) -> Self {
        match err {
            TxnError::Abort(e) => e,
            TxnError::Store(s) => Self::Store(s),
        }
    }
}

/// What happened when a cart was submitted.
///
/// Not affording the cart is a normal outcome of the flow, not a caller
/// mistake, so it lives here rather than in [`OrderError`].
#[derive(Debug)]
pub enum PlaceOrderOutcome {
    /// The order was placed; the cart is gone and the coins are charged.
    Placed {
        order: Order,
        /// Balance remaining after the charge.
        balance: Coins,
    },
    /// The balance cannot cover the cart. Nothing changed; the cart is kept
    /// so the student can trim it.
    InsufficientCoins {
        balance: Coins,
        required: Coins,
    },
}

/// Service over the order lifecycle.
pub struct OrderService<'a> {
    ledger: &'a MemoryLedger,
}

impl<'a> OrderService<'a> {
    /// Create an order service over the injected ledger.
    #[must_use]
    pub const fn new(ledger: &'a MemoryLedger) -> Self {
        Self { ledger }
    }

    /// Place the user's cart as a pending order.
    ///
    /// Atomically: checks the balance covers the cart total, debits it,
    /// creates the order as a snapshot of the cart, and deletes the cart.
    /// Stock is not checked here; fulfilment owns that.
    ///
    /// # Errors
    ///
    /// Returns `CartNotFound` if there is no cart and `BalanceNotFound` if
    /// the user has no balance document. An unaffordable cart is the
    /// `InsufficientCoins` outcome, not an error.
    pub async fn place_order(&self, user_id: &UserId) -> Result<PlaceOrderOutcome, OrderError> {
        let outcome = self
            .ledger
            .run_transaction(|tx| {
                let now = Utc::now();
                let cart = tx
                    .read::<Cart>(collections::CARTS, user_id.as_str())?
                    .ok_or_else(|| TxnError::Abort(OrderError::CartNotFound(user_id.clone())))?;
                let required = cart.total_price;

                let remaining = match debit_in_tx(tx, user_id, required, now)? {
                    DebitOutcome::Debited(remaining) => remaining,
                    DebitOutcome::Insufficient { balance } => {
                        // No writes were buffered; committing is a no-op.
                        return Ok(PlaceOrderOutcome::InsufficientCoins { balance, required });
                    }
                    DebitOutcome::Missing => {
                        return Err(TxnError::Abort(OrderError::BalanceNotFound(
                            user_id.clone(),
                        )));
                    }
                };

                let order = Order::from_cart(cart, now);
                tx.write(collections::ORDERS, order.id.as_str(), &order)?;
                tx.delete(collections::CARTS, user_id.as_str());
                Ok(PlaceOrderOutcome::Placed {
                    order,
                    balance: remaining,
                })
            })
            .await
            .map_err(OrderError::from_txn)?;

        match &outcome {
            PlaceOrderOutcome::Placed { order, balance } => {
                info!(user = %user_id, order = %order.id, total = %order.total_price,
                      balance = %balance, "order placed");
            }
            PlaceOrderOutcome::InsufficientCoins { balance, required } => {
                info!(user = %user_id, balance = %balance, required = %required,
                      "order rejected, insufficient coins");
            }
        }
        Ok(outcome)
    }

    /// Fulfil a pending order: the authoritative stock check. Staff only.
    ///
    /// Atomically verifies and decrements per-branch stock for every line,
    /// then marks the order completed with an action record. A single short
    /// line aborts the whole transaction with no stock movement.
    ///
    /// # Errors
    ///
    /// Returns `InvalidStatus` for non-pending orders, `RewardNotFound` or
    /// `MissingRewardId` for catalog drift, and `InsufficientStock` naming
    /// the first short line.
    pub async fn fulfil_order(
        &self,
        ctx: &AuthContext,
        order_id: &OrderId,
    ) -> Result<Order, OrderError> {
        ctx.require_staff("fulfil orders")?;
        let actor = self.actor_name(ctx).await?;

        let order = self
            .ledger
            .run_transaction(|tx| {
                let now = Utc::now();
                let mut order = tx
                    .read::<Order>(collections::ORDERS, order_id.as_str())?
                    .ok_or_else(|| TxnError::Abort(OrderError::OrderNotFound(order_id.clone())))?;

                if !order.items_well_formed() {
                    return Err(TxnError::Abort(OrderError::InvalidItems(order_id.clone())));
                }
                if order.status != OrderStatus::Pending {
                    return Err(TxnError::Abort(OrderError::InvalidStatus {
                        order_id: order_id.clone(),
                        status: order.status,
                    }));
                }
                if order.items.iter().any(|item| item.reward_id.is_blank()) {
                    return Err(TxnError::Abort(OrderError::MissingRewardId(
                        order_id.clone(),
                    )));
                }

                // Read every referenced reward once, before any write.
                let mut rewards: BTreeMap<RewardId, Reward> = BTreeMap::new();
                for item in &order.items {
                    if rewards.contains_key(&item.reward_id) {
                        continue;
                    }
                    let reward = tx
                        .read::<Reward>(collections::REWARDS, item.reward_id.as_str())?
                        .ok_or_else(|| {
                            TxnError::Abort(OrderError::RewardNotFound(item.reward_id.clone()))
                        })?;
                    rewards.insert(item.reward_id.clone(), reward);
                }

                // Decrement in-memory first so a later short line leaves the
                // ledger untouched.
                for item in &order.items {
                    let Some(reward) = rewards.get_mut(&item.reward_id) else {
                        return Err(TxnError::Abort(OrderError::RewardNotFound(
                            item.reward_id.clone(),
                        )));
                    };
                    let available = reward.stock_at(&item.branch);
                    let Some(remaining) = available.checked_sub(item.quantity) else {
                        return Err(TxnError::Abort(OrderError::InsufficientStock {
                            reward_id: item.reward_id.clone(),
                            branch: item.branch.clone(),
                            available,
                            requested: item.quantity,
                        }));
                    };
                    reward.stock_by_branch.insert(item.branch.clone(), remaining);
                    reward.updated_at = now;
                }

                for reward in rewards.values() {
                    tx.write(collections::REWARDS, reward.id.as_str(), reward)?;
                }

                order.status = OrderStatus::Completed;
                order.completed = Some(ActionRecord {
                    at: now,
                    by: actor.clone(),
                });
                tx.write(collections::ORDERS, order_id.as_str(), &order)?;
                Ok(order)
            })
            .await
            .map_err(OrderError::from_txn)?;

        info!(order = %order_id, by = %ctx.user_id, "order fulfilled");
        Ok(order)
    }

    /// Cancel a pending order and refund its recorded total. Staff only.
    ///
    /// The refund amount is taken from the order document, never from the
    /// caller. Returns the cancelled order and the balance after the refund.
    ///
    /// # Errors
    ///
    /// Returns `InvalidStatus` for non-pending orders.
    pub async fn cancel_order(
        &self,
        ctx: &AuthContext,
        order_id: &OrderId,
    ) -> Result<(Order, Coins), OrderError> {
        ctx.require_staff("cancel orders")?;
        let actor = self.actor_name(ctx).await?;

        let (order, balance) = self
            .ledger
            .run_transaction(|tx| {
                let now = Utc::now();
                let mut order = tx
                    .read::<Order>(collections::ORDERS, order_id.as_str())?
                    .ok_or_else(|| TxnError::Abort(OrderError::OrderNotFound(order_id.clone())))?;

                if order.status != OrderStatus::Pending {
                    return Err(TxnError::Abort(OrderError::InvalidStatus {
                        order_id: order_id.clone(),
                        status: order.status,
                    }));
                }

                let balance = credit_in_tx(tx, &order.user_id, order.total_price, now)?;

                order.status = OrderStatus::Cancelled;
                order.cancelled = Some(ActionRecord {
                    at: now,
                    by: actor.clone(),
                });
                tx.write(collections::ORDERS, order_id.as_str(), &order)?;
                Ok((order, balance))
            })
            .await
            .map_err(OrderError::from_txn)?;

        info!(order = %order_id, refund = %order.total_price, by = %ctx.user_id,
              "order cancelled and refunded");
        Ok((order, balance))
    }

    /// Fetch one order.
    ///
    /// # Errors
    ///
    /// Returns `OrderNotFound` if the order does not exist.
    pub async fn get_order(&self, order_id: &OrderId) -> Result<Order, OrderError> {
        let order: Option<Order> = self
            .ledger
            .get(collections::ORDERS, order_id.as_str())
            .await?;
        order.ok_or_else(|| OrderError::OrderNotFound(order_id.clone()))
    }

    /// All orders placed by a user, oldest first.
    ///
    /// # Errors
    ///
    /// Returns store errors only.
    pub async fn orders_for_user(&self, user_id: &UserId) -> Result<Vec<Order>, OrderError> {
        let mut orders: Vec<Order> = self.ledger.list(collections::ORDERS).await?;
        orders.retain(|order| &order.user_id == user_id);
        orders.sort_by_key(|order| order.ordered_at);
        Ok(orders)
    }

    /// All orders in a given state, oldest first. The pending queue for
    /// staff is `orders_by_status(OrderStatus::Pending)`.
    ///
    /// # Errors
    ///
    /// Returns store errors only.
    pub async fn orders_by_status(&self, status: OrderStatus) -> Result<Vec<Order>, OrderError> {
        let mut orders: Vec<Order> = self.ledger.list(collections::ORDERS).await?;
        orders.retain(|order| order.status == status);
        orders.sort_by_key(|order| order.ordered_at);
        Ok(orders)
    }

    /// Display name for action records; falls back to the raw id when the
    /// caller has no user document.
    async fn actor_name(&self, ctx: &AuthContext) -> Result<String, OrderError> {
        let user: Option<User> = self
            .ledger
            .get(collections::USERS, ctx.user_id.as_str())
            .await?;
        Ok(user.map_or_else(
            || {
                warn!(user = %ctx.user_id, "actor has no user document");
                ctx.user_id.to_string()
            },
            |u| u.name,
        ))
    }
}
