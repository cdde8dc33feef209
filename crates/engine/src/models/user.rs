//! User entity and its typed patch.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tutorium_core::{Branch, Email, Role, UserId};

/// A registered user.
///
/// The id comes from the external identity provider; users are never
/// hard-deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub role: Role,
    /// Set by staff approval; students start unapproved.
    pub approved: bool,
    /// Display name.
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<Email>,
    /// Home branch, if the student picked one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<Branch>,
    pub registered_at: DateTime<Utc>,
}

/// Payload for registration.
#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
    pub id: UserId,
    pub role: Role,
    pub name: String,
    #[serde(default)]
    pub email: Option<Email>,
    #[serde(default)]
    pub branch: Option<Branch>,
}

impl NewUser {
    /// Materialize the user document; approval always starts false.
    #[must_use]
    pub fn into_user(self, now: DateTime<Utc>) -> User {
        User {
            id: self.id,
            role: self.role,
            approved: false,
            name: self.name,
            email: self.email,
            branch: self.branch,
            registered_at: now,
        }
    }
}

/// Incoming profile update; `None` fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserUpdate {
    pub name: Option<String>,
    pub email: Option<Email>,
    pub branch: Option<Branch>,
}

impl UserUpdate {
    /// Compute the field-level diff against the stored user.
    ///
    /// Same contract as the reward diff: only fields that differ are
    /// written, and an identical payload produces no write at all.
    #[must_use]
    pub fn diff(&self, current: &User) -> Option<UserPatch> {
        let mut patch = UserPatch {
            name: None,
            email: None,
            branch: None,
        };
        let mut changed = false;

        if let Some(name) = &self.name
            && name != &current.name
        {
            patch.name = Some(name.clone());
            changed = true;
        }
        if let Some(email) = &self.email
            && Some(email) != current.email.as_ref()
        {
            patch.email = Some(email.clone());
            changed = true;
        }
        if let Some(branch) = &self.branch
            && Some(branch) != current.branch.as_ref()
        {
            patch.branch = Some(branch.clone());
            changed = true;
        }

        changed.then_some(patch)
    }
}

/// The changed fields of a user profile, merge-written into the document.
#[derive(Debug, Clone, Serialize)]
pub struct UserPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<Email>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branch: Option<Branch>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn stored() -> User {
        User {
            id: UserId::new("tg-1"),
            role: Role::Student,
            approved: false,
            name: "Mei Lin".into(),
            email: None,
            branch: Some(Branch::new("Tampines")),
            registered_at: Utc::now(),
        }
    }

    #[test]
    fn test_registration_starts_unapproved() {
        let user = NewUser {
            id: UserId::new("tg-1"),
            role: Role::Student,
            name: "Mei Lin".into(),
            email: None,
            branch: None,
        }
        .into_user(Utc::now());
        assert!(!user.approved);
    }

    #[test]
    fn test_identical_payload_produces_no_patch() {
        let user = stored();
        let update = UserUpdate {
            name: Some("Mei Lin".into()),
            branch: Some(Branch::new("Tampines")),
            ..UserUpdate::default()
        };
        assert!(update.diff(&user).is_none());
    }

    #[test]
    fn test_diff_contains_only_changed_fields() {
        let user = stored();
        let update = UserUpdate {
            name: Some("Mei Lin Tan".into()),
            branch: Some(Branch::new("Tampines")),
            ..UserUpdate::default()
        };
        let patch = update.diff(&user).unwrap();
        assert_eq!(patch.name.as_deref(), Some("Mei Lin Tan"));
        assert!(patch.branch.is_none());
        assert!(patch.email.is_none());
    }
}
