//! Ledger store - the transactional document database backing all entities.
//!
//! Production runs against a hosted document store; the engine only relies
//! on the small contract exposed here: per-document `get`/`list`/`set`/
//! `delete` plus [`MemoryLedger::run_transaction`], an atomic multi-document
//! read-modify-write with optimistic-concurrency semantics. The in-memory
//! implementation in [`memory`] honors that contract exactly and is what the
//! CLI and the test suites run against.
//!
//! # Collections
//!
//! - `users` - user profiles and approval status
//! - `coins` - one coin balance per student, keyed by user id
//! - `rewards` - the reward catalog with per-branch stock
//! - `carts` - one ephemeral cart per user
//! - `orders` - placed orders, keyed by generated order id

pub mod memory;

pub use memory::{MemoryLedger, Transaction};

use thiserror::Error;

/// Collection names used by the engine.
pub mod collections {
    /// User profiles and approval status.
    pub const USERS: &str = "users";
    /// Coin balances, keyed by user id.
    pub const BALANCES: &str = "coins";
    /// Reward catalog.
    pub const REWARDS: &str = "rewards";
    /// Per-user carts.
    pub const CARTS: &str = "carts";
    /// Placed orders.
    pub const ORDERS: &str = "orders";
}

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A transaction could not commit within the configured attempt bound.
    ///
    /// Safe to retry by resubmitting the whole operation.
    #[error("transaction aborted after {attempts} conflicting attempts")]
    Conflict {
        /// How many attempts were made before giving up.
        attempts: u32,
    },

    /// A stored document no longer decodes into its entity type.
    #[error("corrupt document in {collection}/{id}: {source}")]
    Corrupt {
        /// Collection the document lives in.
        collection: String,
        /// Document id.
        id: String,
        /// Decode failure.
        #[source]
        source: serde_json::Error,
    },

    /// A value could not be encoded as a JSON document.
    #[error("failed to encode document: {0}")]
    Encode(#[source] serde_json::Error),

    /// A transaction body issued a read after buffering a write.
    ///
    /// The store gathers a transaction's entire read set before its write
    /// phase; interleaving breaks conflict detection, so it is rejected.
    #[error("transaction read {collection}/{id} after a buffered write")]
    ReadAfterWrite {
        /// Collection of the offending read.
        collection: String,
        /// Document id of the offending read.
        id: String,
    },
}

impl StoreError {
    /// Whether the failed operation may succeed if resubmitted as-is.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}

/// Error type returned by transaction bodies.
///
/// A body either aborts with a domain decision (`Abort`, never retried) or
/// fails at the store level (`Store`). `StoreError` converts via `?` so
/// bodies can propagate read/encode failures directly.
#[derive(Debug)]
pub enum TxnError<E> {
    /// Business-rule abort decided by the transaction body.
    Abort(E),
    /// Store-level failure.
    Store(StoreError),
}

impl<E> From<StoreError> for TxnError<E> {
    fn from(err: StoreError) -> Self {
        Self::Store(err)
    }
}
