//! Cart entity - a user's pending reward selection before checkout.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use tutorium_core::{Branch, Coins, RewardId, UserId};

use super::reward::Reward;

/// Cart arithmetic failure.
///
/// Line and cart totals use checked arithmetic; an overflow means the cart
/// contents are nonsensical and the mutation is rejected.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("cart total overflows coin arithmetic")]
pub struct CartMathError;

/// One cart line: a reward, the branch to collect it from, and a quantity.
///
/// `price_snapshot` is the reward's unit price at the time the line was
/// added; order placement charges snapshot prices, not live catalog prices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    pub reward_id: RewardId,
    pub reward_name: String,
    pub branch: Branch,
    pub quantity: u32,
    pub price_snapshot: Coins,
}

impl CartItem {
    /// This line's contribution to the cart total.
    ///
    /// # Errors
    ///
    /// Returns `CartMathError` on arithmetic overflow.
    pub fn line_total(&self) -> Result<Coins, CartMathError> {
        self.price_snapshot
            .checked_mul(self.quantity)
            .ok_or(CartMathError)
    }
}

/// A user's cart. Ephemeral: created on first add, deleted on successful
/// order placement or explicit clear.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    /// Owning user (1:1 with the user document).
    pub user_id: UserId,
    /// Ordered line items.
    pub items: Vec<CartItem>,
    /// Derived: sum of line totals. Recomputed on every mutation.
    pub total_price: Coins,
    /// When the cart last changed.
    pub updated_at: DateTime<Utc>,
}

impl Cart {
    /// An empty cart for a user.
    #[must_use]
    pub fn empty(user_id: UserId, now: DateTime<Utc>) -> Self {
        Self {
            user_id,
            items: Vec::new(),
            total_price: Coins::ZERO,
            updated_at: now,
        }
    }

    /// Add one unit of a reward for a branch.
    ///
    /// Increments the matching line if one exists (same reward and branch),
    /// otherwise appends a new line with quantity 1 and the reward's current
    /// price as the snapshot. Recomputes the total.
    ///
    /// # Errors
    ///
    /// Returns `CartMathError` on arithmetic overflow.
    pub fn add_reward(
        &mut self,
        reward: &Reward,
        branch: Branch,
        now: DateTime<Utc>,
    ) -> Result<(), CartMathError> {
        match self
            .items
            .iter_mut()
            .find(|item| item.reward_id == reward.id && item.branch == branch)
        {
            Some(item) => {
                item.quantity = item.quantity.checked_add(1).ok_or(CartMathError)?;
            }
            None => self.items.push(CartItem {
                reward_id: reward.id.clone(),
                reward_name: reward.name.clone(),
                branch,
                quantity: 1,
                price_snapshot: reward.price,
            }),
        }
        self.recompute_total()?;
        self.updated_at = now;
        Ok(())
    }

    /// Remove one unit of a reward for a branch.
    ///
    /// Decrements the matching line and drops it when the quantity reaches
    /// zero; recomputes the total. Returns `false` if no matching line
    /// exists.
    ///
    /// # Errors
    ///
    /// Returns `CartMathError` on arithmetic overflow.
    pub fn remove_reward(
        &mut self,
        reward_id: &RewardId,
        branch: &Branch,
        now: DateTime<Utc>,
    ) -> Result<bool, CartMathError> {
        let Some(position) = self
            .items
            .iter()
            .position(|item| &item.reward_id == reward_id && &item.branch == branch)
        else {
            return Ok(false);
        };

        if let Some(item) = self.items.get_mut(position) {
            item.quantity = item.quantity.saturating_sub(1);
            if item.quantity == 0 {
                self.items.remove(position);
            }
        }
        self.recompute_total()?;
        self.updated_at = now;
        Ok(true)
    }

    /// Whether the cart has no lines left.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    fn recompute_total(&mut self) -> Result<(), CartMathError> {
        let mut total = Coins::ZERO;
        for item in &self.items {
            total = total.checked_add(item.line_total()?).ok_or(CartMathError)?;
        }
        self.total_price = total;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    fn reward(id: &str, price: u64) -> Reward {
        Reward {
            id: RewardId::new(id),
            name: format!("Reward {id}"),
            price: Coins::new(price),
            stock_by_branch: BTreeMap::new(),
            description: None,
            image_url: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_add_increments_matching_line() {
        let now = Utc::now();
        let mut cart = Cart::empty(UserId::new("u1"), now);
        let r1 = reward("r1", 50);
        let tampines = Branch::new("Tampines");

        cart.add_reward(&r1, tampines.clone(), now).unwrap();
        cart.add_reward(&r1, tampines, now).unwrap();

        assert_eq!(cart.items.len(), 1);
        assert_eq!(cart.items.first().unwrap().quantity, 2);
        assert_eq!(cart.total_price, Coins::new(100));
    }

    #[test]
    fn test_same_reward_different_branch_is_a_separate_line() {
        let now = Utc::now();
        let mut cart = Cart::empty(UserId::new("u1"), now);
        let r1 = reward("r1", 50);

        cart.add_reward(&r1, Branch::new("Tampines"), now).unwrap();
        cart.add_reward(&r1, Branch::new("Bedok"), now).unwrap();

        assert_eq!(cart.items.len(), 2);
        assert_eq!(cart.total_price, Coins::new(100));
    }

    #[test]
    fn test_price_snapshot_is_stable() {
        let now = Utc::now();
        let mut cart = Cart::empty(UserId::new("u1"), now);
        let mut r1 = reward("r1", 50);
        let branch = Branch::new("Tampines");

        cart.add_reward(&r1, branch.clone(), now).unwrap();
        // Catalog price changes; the existing line keeps its snapshot.
        r1.price = Coins::new(80);
        cart.add_reward(&r1, branch, now).unwrap();

        assert_eq!(cart.items.first().unwrap().price_snapshot, Coins::new(50));
        assert_eq!(cart.total_price, Coins::new(100));
    }

    #[test]
    fn test_remove_drops_line_at_zero() {
        let now = Utc::now();
        let mut cart = Cart::empty(UserId::new("u1"), now);
        let r1 = reward("r1", 50);
        let branch = Branch::new("Tampines");

        cart.add_reward(&r1, branch.clone(), now).unwrap();
        cart.add_reward(&r1, branch.clone(), now).unwrap();

        assert!(cart.remove_reward(&r1.id, &branch, now).unwrap());
        assert_eq!(cart.items.first().unwrap().quantity, 1);
        assert_eq!(cart.total_price, Coins::new(50));

        assert!(cart.remove_reward(&r1.id, &branch, now).unwrap());
        assert!(cart.is_empty());
        assert_eq!(cart.total_price, Coins::ZERO);
    }

    #[test]
    fn test_remove_missing_line_reports_absence() {
        let now = Utc::now();
        let mut cart = Cart::empty(UserId::new("u1"), now);
        assert!(
            !cart
                .remove_reward(&RewardId::new("r1"), &Branch::new("Tampines"), now)
                .unwrap()
        );
    }

    #[test]
    fn test_total_overflow_is_rejected() {
        let now = Utc::now();
        let mut cart = Cart::empty(UserId::new("u1"), now);
        let expensive = reward("r1", u64::MAX);
        let branch = Branch::new("Tampines");

        cart.add_reward(&expensive, branch.clone(), now).unwrap();
        assert_eq!(
            cart.add_reward(&expensive, branch, now),
            Err(CartMathError)
        );
    }
}
