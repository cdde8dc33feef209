//! Coin ledger - balances and transaction-scoped credit/debit.
//!
//! Order-related mutation of a balance only ever happens inside an order
//! transaction via the crate-private [`debit_in_tx`]/[`credit_in_tx`]
//! primitives; the public surface is reads plus the staff-gated
//! administrative overwrite.

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::info;

use tutorium_core::{Coins, UserId};

use crate::models::CoinBalance;
use crate::store::{MemoryLedger, StoreError, Transaction, collections};

use super::tokens::{AuthContext, Forbidden};

/// Errors that can occur during coin operations.
#[derive(Debug, Error)]
pub enum CoinError {
    /// No balance document exists for the user.
    #[error("no coin balance for user {0}")]
    BalanceNotFound(UserId),

    /// The caller's role does not permit the operation.
    #[error(transparent)]
    Forbidden(#[from] Forbidden),

    /// Store-level failure.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Service over coin balances.
pub struct CoinService<'a> {
    ledger: &'a MemoryLedger,
}

impl<'a> CoinService<'a> {
    /// Create a coin service over the injected ledger.
    #[must_use]
    pub const fn new(ledger: &'a MemoryLedger) -> Self {
        Self { ledger }
    }

    /// Current coin count for a user.
    ///
    /// # Errors
    ///
    /// Returns `BalanceNotFound` if the user has no balance document.
    pub async fn balance(&self, user_id: &UserId) -> Result<Coins, CoinError> {
        let balance: Option<CoinBalance> = self
            .ledger
            .get(collections::BALANCES, user_id.as_str())
            .await?;
        balance
            .map(|b| b.coins)
            .ok_or_else(|| CoinError::BalanceNotFound(user_id.clone()))
    }

    /// Administrative overwrite of a balance, used for manual corrections.
    ///
    /// Unconditional: merge-writes the full balance document, creating it if
    /// absent. Staff only.
    ///
    /// # Errors
    ///
    /// Returns `Forbidden` for non-staff callers and store errors otherwise.
    pub async fn set_balance(
        &self,
        ctx: &AuthContext,
        user_id: &UserId,
        coins: Coins,
    ) -> Result<(), CoinError> {
        ctx.require_staff("overwrite coin balances")?;

        let balance = CoinBalance {
            user_id: user_id.clone(),
            coins,
            updated_at: Utc::now(),
        };
        self.ledger
            .merge(collections::BALANCES, user_id.as_str(), &balance)
            .await?;

        info!(user = %user_id, coins = %coins, by = %ctx.user_id, "balance overwritten");
        Ok(())
    }
}

/// Result of a transaction-scoped debit.
pub(crate) enum DebitOutcome {
    /// Debit applied; carries the new balance.
    Debited(Coins),
    /// The balance cannot cover the amount; nothing was written.
    Insufficient {
        /// Current balance at the time of the check.
        balance: Coins,
    },
    /// No balance document exists for the user.
    Missing,
}

/// Debit a balance inside an order transaction.
///
/// Reads the balance, verifies it covers `amount`, and buffers the
/// decremented write; the caller's transaction makes the check-and-write
/// atomic. Never leaves the balance negative.
pub(crate) fn debit_in_tx(
    tx: &mut Transaction<'_>,
    user_id: &UserId,
    amount: Coins,
    now: DateTime<Utc>,
) -> Result<DebitOutcome, StoreError> {
    let Some(mut balance) =
        tx.read::<CoinBalance>(collections::BALANCES, user_id.as_str())?
    else {
        return Ok(DebitOutcome::Missing);
    };

    let Some(remaining) = balance.coins.checked_sub(amount) else {
        return Ok(DebitOutcome::Insufficient {
            balance: balance.coins,
        });
    };

    balance.coins = remaining;
    balance.updated_at = now;
    tx.write(collections::BALANCES, user_id.as_str(), &balance)?;
    Ok(DebitOutcome::Debited(remaining))
}

/// Credit a balance inside an order transaction (cancellation refund).
///
/// Creates the balance document if it is somehow absent, so a refund can
/// never be lost. Returns the new balance.
pub(crate) fn credit_in_tx(
    tx: &mut Transaction<'_>,
    user_id: &UserId,
    amount: Coins,
    now: DateTime<Utc>,
) -> Result<Coins, StoreError> {
    let existing: Option<CoinBalance> = tx.read(collections::BALANCES, user_id.as_str())?;
    let mut balance = existing.unwrap_or_else(|| CoinBalance::zero(user_id.clone(), now));

    // Balances are far below u64::MAX in practice; saturate rather than fail
    // a refund on pathological stored data.
    balance.coins = balance.coins.checked_add(amount).unwrap_or(balance.coins);
    balance.updated_at = now;
    tx.write(collections::BALANCES, user_id.as_str(), &balance)?;
    Ok(balance.coins)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use tutorium_core::Role;

    use super::*;

    fn staff() -> AuthContext {
        AuthContext {
            user_id: UserId::new("staff-1"),
            role: Role::Staff,
        }
    }

    #[tokio::test]
    async fn test_balance_not_found() {
        let ledger = MemoryLedger::default();
        let coins = CoinService::new(&ledger);
        assert!(matches!(
            coins.balance(&UserId::new("u1")).await,
            Err(CoinError::BalanceNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_set_balance_creates_and_reads_back() {
        let ledger = MemoryLedger::default();
        let coins = CoinService::new(&ledger);
        let user = UserId::new("u1");

        coins
            .set_balance(&staff(), &user, Coins::new(150))
            .await
            .unwrap();
        assert_eq!(coins.balance(&user).await.unwrap(), Coins::new(150));
    }

    #[tokio::test]
    async fn test_set_balance_requires_staff() {
        let ledger = MemoryLedger::default();
        let coins = CoinService::new(&ledger);
        let student = AuthContext {
            user_id: UserId::new("u1"),
            role: Role::Student,
        };
        assert!(matches!(
            coins
                .set_balance(&student, &UserId::new("u1"), Coins::new(1))
                .await,
            Err(CoinError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn test_debit_in_tx_rejects_overdraft_without_writing() {
        let ledger = MemoryLedger::default();
        let user = UserId::new("u1");
        let balance = CoinBalance {
            user_id: user.clone(),
            coins: Coins::new(40),
            updated_at: Utc::now(),
        };
        ledger
            .set(collections::BALANCES, user.as_str(), &balance)
            .await
            .unwrap();

        let outcome = ledger
            .run_transaction::<_, (), _>(|tx| {
                let outcome = debit_in_tx(tx, &user, Coins::new(100), Utc::now())?;
                Ok(matches!(
                    outcome,
                    DebitOutcome::Insufficient {
                        balance
                    } if balance == Coins::new(40)
                ))
            })
            .await
            .unwrap();
        assert!(outcome);

        let coins = CoinService::new(&ledger);
        assert_eq!(coins.balance(&user).await.unwrap(), Coins::new(40));
    }

    #[tokio::test]
    async fn test_credit_in_tx_creates_missing_balance() {
        let ledger = MemoryLedger::default();
        let user = UserId::new("u1");

        let new_balance = ledger
            .run_transaction::<_, (), _>(|tx| {
                Ok(credit_in_tx(tx, &user, Coins::new(100), Utc::now())?)
            })
            .await
            .unwrap();
        assert_eq!(new_balance, Coins::new(100));

        let coins = CoinService::new(&ledger);
        assert_eq!(coins.balance(&user).await.unwrap(), Coins::new(100));
    }
}
