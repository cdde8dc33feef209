//! Integration tests for Tutorium Rewards.
//!
//! Each test builds a fresh in-memory engine, so no external services are
//! required and tests cannot interfere with each other.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p tutorium-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `order_lifecycle` - Cart to order to fulfilment/cancellation flows
//! - `concurrency` - Double-spend and oversell races
//! - `accounts_and_catalog` - Registration, approval, catalog updates

#![cfg_attr(not(test), forbid(unsafe_code))]
// Test support: helpers panic on setup failure.
#![allow(clippy::unwrap_used, clippy::missing_panics_doc)]

use tutorium_core::{Branch, Coins, RewardId, Role, UserId};
use tutorium_engine::models::{NewReward, NewUser, Reward};
use tutorium_engine::services::AuthContext;
use tutorium_engine::{Engine, EngineConfig};

/// Signing secret used by every test engine.
pub const TEST_SECRET: &str = "kJ8#mP2$vN9@xQ4&wR7!zT5^bY3*cU6(";

/// A fresh engine with one authenticated staff member.
pub struct TestContext {
    pub engine: Engine,
    pub staff: AuthContext,
    pub branch: Branch,
}

impl TestContext {
    /// Build an engine and authenticate a staff member through the real
    /// token path.
    pub async fn new() -> Self {
        let branch = Branch::new("Tampines");
        let config = EngineConfig::with_secret(TEST_SECRET, vec![branch.clone()]).unwrap();
        let engine = Engine::new(config);

        let staff = engine
            .users()
            .register(NewUser {
                id: UserId::new("staff-1"),
                role: Role::Staff,
                name: "Mr Tan".into(),
                email: None,
                branch: None,
            })
            .await
            .unwrap();
        let token = engine.tokens().issue(&staff.id, staff.role).unwrap();
        let staff = engine.tokens().verify(&token).unwrap();

        Self {
            engine,
            staff,
            branch,
        }
    }

    /// Register and approve a student with a starting balance.
    pub async fn student(&self, id: &str, coins: u64) -> UserId {
        let user = self
            .engine
            .users()
            .register(NewUser {
                id: UserId::new(id),
                role: Role::Student,
                name: format!("Student {id}"),
                email: None,
                branch: Some(self.branch.clone()),
            })
            .await
            .unwrap();
        self.engine
            .users()
            .approve(&self.staff, &user.id)
            .await
            .unwrap();
        self.engine
            .coins()
            .set_balance(&self.staff, &user.id, Coins::new(coins))
            .await
            .unwrap();
        user.id
    }

    /// Upload a reward stocked at the context branch.
    pub async fn reward(&self, id: &str, price: u64, stock: u32) -> Reward {
        self.engine
            .rewards()
            .upload(
                &self.staff,
                NewReward {
                    id: RewardId::new(id),
                    name: format!("Reward {id}"),
                    price: Coins::new(price),
                    stock_by_branch: [(self.branch.clone(), stock)].into_iter().collect(),
                    description: None,
                    image_url: None,
                },
            )
            .await
            .unwrap()
    }

    /// Put `quantity` units of a reward into the user's cart.
    pub async fn fill_cart(&self, user: &UserId, reward: &Reward, quantity: u32) {
        for _ in 0..quantity {
            self.engine
                .carts()
                .add_item(user, reward, self.branch.clone())
                .await
                .unwrap();
        }
    }
}
