//! Reward catalog entity and its typed patch.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tutorium_core::{Branch, Coins, RewardId};

/// A redeemable reward with per-branch stock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reward {
    /// Staff-chosen identifier (e.g. a slug).
    pub id: RewardId,
    /// Display name.
    pub name: String,
    /// Price in coins.
    pub price: Coins,
    /// Remaining stock per branch; absent branch means no stock there.
    pub stock_by_branch: BTreeMap<Branch, u32>,
    /// Optional long description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Optional image shown in the mini-app.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Reward {
    /// Remaining stock at a branch (0 when the branch is not listed).
    #[must_use]
    pub fn stock_at(&self, branch: &Branch) -> u32 {
        self.stock_by_branch.get(branch).copied().unwrap_or(0)
    }
}

/// Payload for creating a reward.
#[derive(Debug, Clone, Deserialize)]
pub struct NewReward {
    pub id: RewardId,
    pub name: String,
    pub price: Coins,
    pub stock_by_branch: BTreeMap<Branch, u32>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
}

impl NewReward {
    /// Materialize the reward with creation timestamps.
    #[must_use]
    pub fn into_reward(self, now: DateTime<Utc>) -> Reward {
        Reward {
            id: self.id,
            name: self.name,
            price: self.price,
            stock_by_branch: self.stock_by_branch,
            description: self.description,
            image_url: self.image_url,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Incoming update payload; `None` fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RewardUpdate {
    pub name: Option<String>,
    pub price: Option<Coins>,
    pub stock_by_branch: Option<BTreeMap<Branch, u32>>,
    pub description: Option<String>,
    pub image_url: Option<String>,
}

impl RewardUpdate {
    /// Compute the field-level diff against the stored reward.
    ///
    /// Only fields that actually differ make it into the patch; identical
    /// payloads produce `None` and no write is issued. This is an
    /// optimization to limit write amplification and avoid clobbering
    /// concurrently-written unrelated fields - correctness never depends on
    /// it, since fulfilment re-reads rewards transactionally.
    #[must_use]
    pub fn diff(&self, current: &Reward, now: DateTime<Utc>) -> Option<RewardPatch> {
        let mut patch = RewardPatch {
            name: None,
            price: None,
            stock_by_branch: None,
            description: None,
            image_url: None,
            updated_at: now,
        };
        let mut changed = false;

        if let Some(name) = &self.name
            && name != &current.name
        {
            patch.name = Some(name.clone());
            changed = true;
        }
        if let Some(price) = self.price
            && price != current.price
        {
            patch.price = Some(price);
            changed = true;
        }
        if let Some(stock) = &self.stock_by_branch
            && stock != &current.stock_by_branch
        {
            patch.stock_by_branch = Some(stock.clone());
            changed = true;
        }
        if let Some(description) = &self.description
            && Some(description) != current.description.as_ref()
        {
            patch.description = Some(description.clone());
            changed = true;
        }
        if let Some(image_url) = &self.image_url
            && Some(image_url) != current.image_url.as_ref()
        {
            patch.image_url = Some(image_url.clone());
            changed = true;
        }

        changed.then_some(patch)
    }
}

/// The changed fields of a reward, merge-written into the stored document.
#[derive(Debug, Clone, Serialize)]
pub struct RewardPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<Coins>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stock_by_branch: Option<BTreeMap<Branch, u32>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn stored() -> Reward {
        Reward {
            id: RewardId::new("pencil-case"),
            name: "Pencil Case".into(),
            price: Coins::new(50),
            stock_by_branch: BTreeMap::from([(Branch::new("Tampines"), 3)]),
            description: None,
            image_url: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_identical_payload_produces_no_patch() {
        let reward = stored();
        let update = RewardUpdate {
            name: Some("Pencil Case".into()),
            price: Some(Coins::new(50)),
            stock_by_branch: Some(reward.stock_by_branch.clone()),
            ..RewardUpdate::default()
        };
        assert!(update.diff(&reward, Utc::now()).is_none());
    }

    #[test]
    fn test_diff_contains_only_changed_fields() {
        let reward = stored();
        let update = RewardUpdate {
            name: Some("Pencil Case".into()),
            price: Some(Coins::new(60)),
            ..RewardUpdate::default()
        };

        let patch = update.diff(&reward, Utc::now()).unwrap();
        assert_eq!(patch.price, Some(Coins::new(60)));
        assert!(patch.name.is_none());
        assert!(patch.stock_by_branch.is_none());

        // The serialized patch must not mention untouched fields, or the
        // merge write would clobber them.
        let json = serde_json::to_value(&patch).unwrap();
        let object = json.as_object().unwrap();
        assert!(object.contains_key("price"));
        assert!(object.contains_key("updated_at"));
        assert!(!object.contains_key("name"));
        assert!(!object.contains_key("stock_by_branch"));
    }

    #[test]
    fn test_stock_at_missing_branch_is_zero() {
        let reward = stored();
        assert_eq!(reward.stock_at(&Branch::new("Tampines")), 3);
        assert_eq!(reward.stock_at(&Branch::new("Bedok")), 0);
    }
}
