//! Entity models stored in the ledger.
//!
//! Each entity is an explicit typed record, validated when it is decoded at
//! the store boundary. Orders denormalize reward name and price at placement
//! time so they stay correct even if the reward is later edited or deleted.

pub mod balance;
pub mod cart;
pub mod order;
pub mod reward;
pub mod user;

pub use balance::CoinBalance;
pub use cart::{Cart, CartItem, CartMathError};
pub use order::{ActionRecord, Order, OrderItem};
pub use reward::{NewReward, Reward, RewardPatch, RewardUpdate};
pub use user::{NewUser, User, UserPatch, UserUpdate};
