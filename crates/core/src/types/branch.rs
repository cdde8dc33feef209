//! Branch names.
//!
//! The tutoring service operates several physical branches; reward stock is
//! tracked per branch, and a cart line records the branch the student wants
//! to collect the reward from.

use core::fmt;

use serde::{Deserialize, Serialize};

/// A branch of the tutoring centre, identified by name.
///
/// Used as the key of per-branch stock maps, so it is `Ord` and serializes
/// as a bare string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Branch(String);

impl Branch {
    /// Create a branch from its display name.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Get the branch name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Branch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Branch {
    fn from(name: &str) -> Self {
        Self(name.to_owned())
    }
}

impl From<String> for Branch {
    fn from(name: String) -> Self {
        Self(name)
    }
}
