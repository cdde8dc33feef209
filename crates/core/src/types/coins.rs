//! Coin amounts - the loyalty currency.
//!
//! Balances and prices are whole coins, never fractional, and never
//! negative. All arithmetic is checked: subtracting more coins than are
//! available yields `None` rather than wrapping, which is how the engine
//! rejects overdrafts before any write happens.

use core::fmt;

use serde::{Deserialize, Serialize};

/// A non-negative amount of coins.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct Coins(u64);

impl Coins {
    /// Zero coins.
    pub const ZERO: Self = Self(0);

    /// Create a coin amount.
    #[must_use]
    pub const fn new(amount: u64) -> Self {
        Self(amount)
    }

    /// Get the underlying amount.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }

    /// Checked addition.
    #[must_use]
    pub const fn checked_add(self, rhs: Self) -> Option<Self> {
        match self.0.checked_add(rhs.0) {
            Some(v) => Some(Self(v)),
            None => None,
        }
    }

    /// Checked subtraction; `None` when the result would be negative.
    #[must_use]
    pub const fn checked_sub(self, rhs: Self) -> Option<Self> {
        match self.0.checked_sub(rhs.0) {
            Some(v) => Some(Self(v)),
            None => None,
        }
    }

    /// Multiply a unit price by a quantity (for cart line totals).
    #[must_use]
    pub const fn checked_mul(self, quantity: u32) -> Option<Self> {
        match self.0.checked_mul(quantity as u64) {
            Some(v) => Some(Self(v)),
            None => None,
        }
    }

    /// Whether this amount is zero.
    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for Coins {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for Coins {
    fn from(amount: u64) -> Self {
        Self(amount)
    }
}

impl From<Coins> for u64 {
    fn from(coins: Coins) -> Self {
        coins.0
    }
}
