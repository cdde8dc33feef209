//! End-to-end walkthrough of the rewards flow.
//!
//! Seeds a staff member, a student and a small catalog into a fresh
//! in-memory engine, then walks the cart -> order -> fulfilment path,
//! logging each step. Nothing persists after exit.
//!
//! # Environment Variables
//!
//! - `TUTORIUM_TOKEN_SECRET` - Access-token signing secret
//! - `TUTORIUM_BRANCHES` - Branch names; the first is used for the demo

use tracing::info;

use tutorium_core::{Branch, Coins, RewardId, Role, UserId};
use tutorium_engine::models::{NewReward, NewUser};
use tutorium_engine::services::PlaceOrderOutcome;
use tutorium_engine::{Engine, EngineConfig};

/// Run the demo scenario.
///
/// # Errors
///
/// Returns an error if the configuration is invalid or any engine
/// operation fails.
pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = EngineConfig::from_env()?;
    let branch = config
        .branches
        .first()
        .cloned()
        .unwrap_or_else(|| Branch::new("Main"));
    let engine = Engine::new(config);

    // Staff account and token.
    let staff = engine
        .users()
        .register(NewUser {
            id: UserId::new("staff-1"),
            role: Role::Staff,
            name: "Mr Tan".into(),
            email: None,
            branch: None,
        })
        .await?;
    let staff_token = engine.tokens().issue(&staff.id, staff.role)?;
    let staff_ctx = engine.tokens().verify(&staff_token)?;
    info!(user = %staff.id, "staff registered and authenticated");

    // Student registration and approval.
    let student = engine
        .users()
        .register(NewUser {
            id: UserId::new("tg-1001"),
            role: Role::Student,
            name: "Mei Lin".into(),
            email: None,
            branch: Some(branch.clone()),
        })
        .await?;
    engine.users().approve(&staff_ctx, &student.id).await?;
    engine
        .coins()
        .set_balance(&staff_ctx, &student.id, Coins::new(150))
        .await?;
    info!(user = %student.id, "student approved with 150 coins");

    // Catalog.
    let reward = engine
        .rewards()
        .upload(
            &staff_ctx,
            NewReward {
                id: RewardId::new("colour-pencils"),
                name: "Colour Pencils".into(),
                price: Coins::new(50),
                stock_by_branch: [(branch.clone(), 5)].into_iter().collect(),
                description: Some("A box of 12 colour pencils".into()),
                image_url: None,
            },
        )
        .await?;
    info!(reward = %reward.id, price = %reward.price, "reward uploaded");

    // Cart and advisory availability.
    engine
        .carts()
        .add_item(&student.id, &reward, branch.clone())
        .await?;
    let cart = engine
        .carts()
        .add_item(&student.id, &reward, branch.clone())
        .await?;
    info!(total = %cart.total_price, "cart holds two units");

    let issues = engine.rewards().availability(&cart).await?;
    info!(issues = issues.len(), "advisory availability check");

    // Placement charges coins and consumes the cart.
    let order = match engine.orders().place_order(&student.id).await? {
        PlaceOrderOutcome::Placed { order, balance } => {
            info!(order = %order.id, balance = %balance, "order placed");
            order
        }
        PlaceOrderOutcome::InsufficientCoins { balance, required } => {
            info!(%balance, %required, "placement rejected");
            return Ok(());
        }
    };

    // Fulfilment decrements branch stock and completes the order.
    let fulfilled = engine.orders().fulfil_order(&staff_ctx, &order.id).await?;
    info!(order = %fulfilled.id, status = %fulfilled.status, "order fulfilled");

    let remaining = engine.rewards().get(&reward.id).await?;
    info!(
        stock = remaining.stock_at(&branch),
        balance = %engine.coins().balance(&student.id).await?,
        "final state"
    );

    // A second attempt the student cannot afford.
    for _ in 0..2 {
        engine
            .carts()
            .add_item(&student.id, &reward, branch.clone())
            .await?;
    }
    if let PlaceOrderOutcome::InsufficientCoins { balance, required } =
        engine.orders().place_order(&student.id).await?
    {
        info!(%balance, %required, "second placement correctly rejected");
    }

    Ok(())
}
