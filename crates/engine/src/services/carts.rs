//! Cart service - per-user pending selections.
//!
//! Cart mutations touch a single document, so they use plain get/set rather
//! than the transactional primitive; the only invariant here is arithmetic
//! consistency of the derived total, which the model maintains. Stock is
//! deliberately not checked when adding to a cart - availability is advisory
//! before placement and authoritative at fulfilment.

use chrono::Utc;
use thiserror::Error;
use tracing::debug;

use tutorium_core::{Branch, RewardId, UserId};

use crate::models::{Cart, CartMathError, Reward};
use crate::store::{MemoryLedger, StoreError, collections};

/// Errors that can occur during cart operations.
#[derive(Debug, Error)]
pub enum CartError {
    /// The user has no cart.
    #[error("no cart for user {0}")]
    CartNotFound(UserId),

    /// The cart has no line for the given reward and branch.
    #[error("item {reward_id} ({branch}) not in cart")]
    ItemNotFound {
        reward_id: RewardId,
        branch: Branch,
    },

    /// The reward reference is blank.
    #[error("reward id is blank")]
    BlankRewardId,

    /// Cart arithmetic overflowed.
    #[error(transparent)]
    Math(#[from] CartMathError),

    /// Store-level failure.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Service over per-user carts.
pub struct CartService<'a> {
    ledger: &'a MemoryLedger,
}

impl<'a> CartService<'a> {
    /// Create a cart service over the injected ledger.
    #[must_use]
    pub const fn new(ledger: &'a MemoryLedger) -> Self {
        Self { ledger }
    }

    /// Add one unit of a reward to the user's cart, creating the cart if
    /// absent. Returns the updated cart.
    ///
    /// # Errors
    ///
    /// Returns `BlankRewardId` for malformed rewards and arithmetic/store
    /// errors otherwise.
    pub async fn add_item(
        &self,
        user_id: &UserId,
        reward: &Reward,
        branch: Branch,
    ) -> Result<Cart, CartError> {
        if reward.id.is_blank() {
            return Err(CartError::BlankRewardId);
        }

        let now = Utc::now();
        let mut cart: Cart = self
            .ledger
            .get(collections::CARTS, user_id.as_str())
            .await?
            .unwrap_or_else(|| Cart::empty(user_id.clone(), now));

        cart.add_reward(reward, branch, now)?;
        self.ledger
            .set(collections::CARTS, user_id.as_str(), &cart)
            .await?;

        debug!(user = %user_id, reward = %reward.id, total = %cart.total_price, "cart item added");
        Ok(cart)
    }

    /// Remove one unit of a reward from the user's cart.
    ///
    /// Dropping the last unit of the last line deletes the cart document
    /// and returns `None`.
    ///
    /// # Errors
    ///
    /// Returns `CartNotFound` if the user has no cart and `ItemNotFound` if
    /// no line matches.
    pub async fn remove_item(
        &self,
        user_id: &UserId,
        reward_id: &RewardId,
        branch: &Branch,
    ) -> Result<Option<Cart>, CartError> {
        let now = Utc::now();
        let mut cart: Cart = self
            .ledger
            .get(collections::CARTS, user_id.as_str())
            .await?
            .ok_or_else(|| CartError::CartNotFound(user_id.clone()))?;

        if !cart.remove_reward(reward_id, branch, now)? {
            return Err(CartError::ItemNotFound {
                reward_id: reward_id.clone(),
                branch: branch.clone(),
            });
        }

        if cart.is_empty() {
            self.ledger.delete(collections::CARTS, user_id.as_str()).await;
            debug!(user = %user_id, "cart emptied and deleted");
            return Ok(None);
        }

        self.ledger
            .set(collections::CARTS, user_id.as_str(), &cart)
            .await?;
        Ok(Some(cart))
    }

    /// Current cart snapshot.
    ///
    /// # Errors
    ///
    /// Returns `CartNotFound` if the user has no cart.
    pub async fn get_cart(&self, user_id: &UserId) -> Result<Cart, CartError> {
        let cart: Option<Cart> = self
            .ledger
            .get(collections::CARTS, user_id.as_str())
            .await?;
        cart.ok_or_else(|| CartError::CartNotFound(user_id.clone()))
    }

    /// Explicitly discard the user's cart. Succeeds whether or not a cart
    /// exists.
    ///
    /// # Errors
    ///
    /// Returns store errors only.
    pub async fn clear(&self, user_id: &UserId) -> Result<(), CartError> {
        self.ledger.delete(collections::CARTS, user_id.as_str()).await;
        Ok(())
    }
}
