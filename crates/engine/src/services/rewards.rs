//! Reward catalog service.
//!
//! Staff manage the catalog; students browse it. Updates are diff-based:
//! only fields that changed from the stored version are merge-written,
//! which limits write amplification and avoids clobbering unrelated fields
//! written concurrently. The advisory [`RewardService::availability`] check
//! reports stock problems before placement; the authoritative check stays
//! inside the fulfilment transaction.

use chrono::Utc;
use thiserror::Error;
use tracing::info;

use tutorium_core::{Branch, RewardId};

use crate::models::{Cart, NewReward, Reward, RewardUpdate};
use crate::store::{MemoryLedger, StoreError, collections};

use super::tokens::{AuthContext, Forbidden};

/// Errors that can occur during catalog operations.
#[derive(Debug, Error)]
pub enum RewardError {
    /// No reward with the given id.
    #[error("reward {0} not found")]
    RewardNotFound(RewardId),

    /// A reward with the given id already exists.
    #[error("reward {0} already exists")]
    AlreadyExists(RewardId),

    /// The reward id is blank.
    #[error("reward id is blank")]
    BlankRewardId,

    /// The caller's role does not permit the operation.
    #[error(transparent)]
    Forbidden(#[from] Forbidden),

    /// Store-level failure.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// One cart line that cannot currently be satisfied from stock.
///
/// Advisory only - stock can change before fulfilment, where the
/// authoritative check runs. A missing reward reports zero availability.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AvailabilityIssue {
    pub reward_id: RewardId,
    pub branch: Branch,
    pub requested: u32,
    pub available: u32,
}

/// Service over the reward catalog.
pub struct RewardService<'a> {
    ledger: &'a MemoryLedger,
}

impl<'a> RewardService<'a> {
    /// Create a reward service over the injected ledger.
    #[must_use]
    pub const fn new(ledger: &'a MemoryLedger) -> Self {
        Self { ledger }
    }

    /// Create a new catalog entry. Staff only.
    ///
    /// # Errors
    ///
    /// Returns `AlreadyExists` if the id is taken and `BlankRewardId` for
    /// malformed payloads.
    pub async fn upload(&self, ctx: &AuthContext, new: NewReward) -> Result<Reward, RewardError> {
        ctx.require_staff("manage the reward catalog")?;
        if new.id.is_blank() {
            return Err(RewardError::BlankRewardId);
        }

        let existing: Option<Reward> = self.ledger.get(collections::REWARDS, new.id.as_str()).await?;
        if existing.is_some() {
            return Err(RewardError::AlreadyExists(new.id));
        }

        let reward = new.into_reward(Utc::now());
        self.ledger
            .set(collections::REWARDS, reward.id.as_str(), &reward)
            .await?;
        info!(reward = %reward.id, by = %ctx.user_id, "reward uploaded");
        Ok(reward)
    }

    /// Apply a diff-based update. Staff only.
    ///
    /// Returns `Ok(None)` when nothing differs from the stored version (no
    /// write is issued), otherwise the reward as stored after the patch.
    ///
    /// # Errors
    ///
    /// Returns `RewardNotFound` if the reward does not exist.
    pub async fn update(
        &self,
        ctx: &AuthContext,
        id: &RewardId,
        update: RewardUpdate,
    ) -> Result<Option<Reward>, RewardError> {
        ctx.require_staff("manage the reward catalog")?;

        let current: Reward = self
            .ledger
            .get(collections::REWARDS, id.as_str())
            .await?
            .ok_or_else(|| RewardError::RewardNotFound(id.clone()))?;

        let Some(patch) = update.diff(&current, Utc::now()) else {
            return Ok(None);
        };

        self.ledger
            .merge(collections::REWARDS, id.as_str(), &patch)
            .await?;
        info!(reward = %id, by = %ctx.user_id, "reward updated");

        let stored: Option<Reward> = self.ledger.get(collections::REWARDS, id.as_str()).await?;
        stored
            .map(Some)
            .ok_or_else(|| RewardError::RewardNotFound(id.clone()))
    }

    /// Remove a reward from the catalog. Staff only.
    ///
    /// Existing orders are unaffected - they carry denormalized snapshots -
    /// but their fulfilment will fail with a missing reward, which is the
    /// intended signal to staff.
    ///
    /// # Errors
    ///
    /// Returns `RewardNotFound` if the reward does not exist.
    pub async fn delete(&self, ctx: &AuthContext, id: &RewardId) -> Result<(), RewardError> {
        ctx.require_staff("manage the reward catalog")?;
        if self.ledger.delete(collections::REWARDS, id.as_str()).await {
            info!(reward = %id, by = %ctx.user_id, "reward deleted");
            Ok(())
        } else {
            Err(RewardError::RewardNotFound(id.clone()))
        }
    }

    /// Fetch one reward.
    ///
    /// # Errors
    ///
    /// Returns `RewardNotFound` if the reward does not exist.
    pub async fn get(&self, id: &RewardId) -> Result<Reward, RewardError> {
        let reward: Option<Reward> = self.ledger.get(collections::REWARDS, id.as_str()).await?;
        reward.ok_or_else(|| RewardError::RewardNotFound(id.clone()))
    }

    /// The whole catalog, in id order.
    ///
    /// # Errors
    ///
    /// Returns store errors only.
    pub async fn list_all(&self) -> Result<Vec<Reward>, RewardError> {
        Ok(self.ledger.list(collections::REWARDS).await?)
    }

    /// Advisory pre-placement stock check for a cart.
    ///
    /// Returns the lines that cannot currently be satisfied; an empty list
    /// means everything looks available right now. This is a courtesy to
    /// the student - the fulfilment transaction remains the single source
    /// of truth.
    ///
    /// # Errors
    ///
    /// Returns store errors only.
    pub async fn availability(&self, cart: &Cart) -> Result<Vec<AvailabilityIssue>, RewardError> {
        let mut issues = Vec::new();
        for item in &cart.items {
            let reward: Option<Reward> = self
                .ledger
                .get(collections::REWARDS, item.reward_id.as_str())
                .await?;
            let available = reward.map_or(0, |r| r.stock_at(&item.branch));
            if available < item.quantity {
                issues.push(AvailabilityIssue {
                    reward_id: item.reward_id.clone(),
                    branch: item.branch.clone(),
                    requested: item.quantity,
                    available,
                });
            }
        }
        Ok(issues)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use tutorium_core::{Coins, Role, UserId};

    use crate::models::CartItem;

    use super::*;

    fn staff() -> AuthContext {
        AuthContext {
            user_id: UserId::new("staff-1"),
            role: Role::Staff,
        }
    }

    fn new_reward(id: &str, price: u64, stock: &[(&str, u32)]) -> NewReward {
        NewReward {
            id: RewardId::new(id),
            name: format!("Reward {id}"),
            price: Coins::new(price),
            stock_by_branch: stock
                .iter()
                .map(|(branch, qty)| (Branch::new(*branch), *qty))
                .collect(),
            description: None,
            image_url: None,
        }
    }

    #[tokio::test]
    async fn test_upload_then_get_and_list() {
        let ledger = MemoryLedger::default();
        let rewards = RewardService::new(&ledger);

        rewards
            .upload(&staff(), new_reward("b-pen", 10, &[("Tampines", 5)]))
            .await
            .unwrap();
        rewards
            .upload(&staff(), new_reward("a-notebook", 20, &[]))
            .await
            .unwrap();

        let got = rewards.get(&RewardId::new("b-pen")).await.unwrap();
        assert_eq!(got.price, Coins::new(10));

        let all = rewards.list_all().await.unwrap();
        let ids: Vec<&str> = all.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, ["a-notebook", "b-pen"]);
    }

    #[tokio::test]
    async fn test_upload_duplicate_is_rejected() {
        let ledger = MemoryLedger::default();
        let rewards = RewardService::new(&ledger);
        rewards
            .upload(&staff(), new_reward("pen", 10, &[]))
            .await
            .unwrap();
        assert!(matches!(
            rewards.upload(&staff(), new_reward("pen", 99, &[])).await,
            Err(RewardError::AlreadyExists(_))
        ));
    }

    #[tokio::test]
    async fn test_catalog_mutation_requires_staff() {
        let ledger = MemoryLedger::default();
        let rewards = RewardService::new(&ledger);
        let student = AuthContext {
            user_id: UserId::new("u1"),
            role: Role::Student,
        };
        assert!(matches!(
            rewards.upload(&student, new_reward("pen", 10, &[])).await,
            Err(RewardError::Forbidden(_))
        ));
        assert!(matches!(
            rewards.delete(&student, &RewardId::new("pen")).await,
            Err(RewardError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn test_update_no_change_issues_no_write() {
        let ledger = MemoryLedger::default();
        let rewards = RewardService::new(&ledger);
        rewards
            .upload(&staff(), new_reward("pen", 10, &[("Tampines", 5)]))
            .await
            .unwrap();

        let update = RewardUpdate {
            price: Some(Coins::new(10)),
            ..RewardUpdate::default()
        };
        let result = rewards
            .update(&staff(), &RewardId::new("pen"), update)
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_update_patches_only_changed_fields() {
        let ledger = MemoryLedger::default();
        let rewards = RewardService::new(&ledger);
        rewards
            .upload(&staff(), new_reward("pen", 10, &[("Tampines", 5)]))
            .await
            .unwrap();

        let update = RewardUpdate {
            price: Some(Coins::new(15)),
            ..RewardUpdate::default()
        };
        let updated = rewards
            .update(&staff(), &RewardId::new("pen"), update)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.price, Coins::new(15));
        assert_eq!(updated.name, "Reward pen");
        assert_eq!(updated.stock_at(&Branch::new("Tampines")), 5);
    }

    #[tokio::test]
    async fn test_delete_missing_reward() {
        let ledger = MemoryLedger::default();
        let rewards = RewardService::new(&ledger);
        assert!(matches!(
            rewards.delete(&staff(), &RewardId::new("ghost")).await,
            Err(RewardError::RewardNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_availability_reports_short_lines() {
        let ledger = MemoryLedger::default();
        let rewards = RewardService::new(&ledger);
        rewards
            .upload(&staff(), new_reward("pen", 10, &[("Tampines", 1)]))
            .await
            .unwrap();

        let cart = Cart {
            user_id: UserId::new("u1"),
            items: vec![
                CartItem {
                    reward_id: RewardId::new("pen"),
                    reward_name: "Pen".into(),
                    branch: Branch::new("Tampines"),
                    quantity: 2,
                    price_snapshot: Coins::new(10),
                },
                CartItem {
                    reward_id: RewardId::new("ghost"),
                    reward_name: "Ghost".into(),
                    branch: Branch::new("Bedok"),
                    quantity: 1,
                    price_snapshot: Coins::new(10),
                },
            ],
            total_price: Coins::new(30),
            updated_at: Utc::now(),
        };

        let issues = rewards.availability(&cart).await.unwrap();
        assert_eq!(issues.len(), 2);
        assert_eq!(
            issues.first().unwrap(),
            &AvailabilityIssue {
                reward_id: RewardId::new("pen"),
                branch: Branch::new("Tampines"),
                requested: 2,
                available: 1,
            }
        );
        assert_eq!(issues.get(1).unwrap().available, 0);
    }
}
