//! Coin balance entity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tutorium_core::{Coins, UserId};

/// A student's coin balance.
///
/// Created alongside a student user at registration; mutated only by
/// credit/debit inside an order transaction or by the administrative
/// overwrite. The balance can never go negative: debits are checked against
/// the current amount inside the same atomic transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoinBalance {
    /// Owning user (1:1 with the user document).
    pub user_id: UserId,
    /// Current coin amount.
    pub coins: Coins,
    /// When the balance last changed.
    pub updated_at: DateTime<Utc>,
}

impl CoinBalance {
    /// A zero balance for a freshly registered student.
    #[must_use]
    pub fn zero(user_id: UserId, now: DateTime<Utc>) -> Self {
        Self {
            user_id,
            coins: Coins::ZERO,
            updated_at: now,
        }
    }
}
