//! Engine services.
//!
//! Each service borrows the injected ledger handle and owns one concern:
//!
//! - [`tokens`] - signed access tokens and the role gate
//! - [`users`] - registration, approval, profile updates
//! - [`coins`] - balances and transaction-scoped credit/debit
//! - [`rewards`] - the catalog and advisory availability checks
//! - [`carts`] - per-user carts
//! - [`orders`] - placement, fulfilment, cancellation (the transaction core)

pub mod carts;
pub mod coins;
pub mod orders;
pub mod rewards;
pub mod tokens;
pub mod users;

pub use carts::{CartError, CartService};
pub use coins::{CoinError, CoinService};
pub use orders::{OrderError, OrderService, PlaceOrderOutcome};
pub use rewards::{AvailabilityIssue, RewardError, RewardService};
pub use tokens::{AuthContext, Forbidden, TokenError, TokenService};
pub use users::{ApproveOutcome, UserError, UserService};
