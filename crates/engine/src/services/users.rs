//! Registration, approval and profile updates.
//!
//! Registration atomically creates the user document and, for students, a
//! zero coin balance, so every approved student is guaranteed a balance to
//! charge against. Approval is a staff action and is modelled as an outcome
//! rather than an error when it has nothing to do.

use chrono::Utc;
use thiserror::Error;
use tracing::info;

use tutorium_core::{Role, UserId};

use crate::models::{CoinBalance, NewUser, User, UserUpdate};
use crate::store::{MemoryLedger, StoreError, TxnError, collections};

use super::tokens::{AuthContext, Forbidden};

/// Errors that can occur during user operations.
#[derive(Debug, Error)]
pub enum UserError {
    /// No user with the given id.
    #[error("user {0} not found")]
    UserNotFound(UserId),

    /// A user with the given id is already registered.
    #[error("user {0} is already registered")]
    AlreadyRegistered(UserId),

    /// The user id is blank.
    #[error("user id is blank")]
    BlankUserId,

    /// The caller's role does not permit the operation.
    #[error(transparent)]
    Forbidden(#[from] Forbidden),

    /// Store-level failure.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl UserError {
    fn from_txn(err: TxnError<Self>) -> Self {
        match err {
            TxnError::Abort(e) => e,
            TxnError::Store(s) => Self::Store(s),
        }
    }
}

/// What an approval attempt did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApproveOutcome {
    /// The user is now approved.
    Approved,
    /// The user was already approved; nothing was written.
    AlreadyApproved,
    /// Approval only applies to students; nothing was written.
    RoleNotEligible,
}

/// Service over user accounts.
pub struct UserService<'a> {
    ledger: &'a MemoryLedger,
}

impl<'a> UserService<'a> {
    /// Create a user service over the injected ledger.
    #[must_use]
    pub const fn new(ledger: &'a MemoryLedger) -> Self {
        Self { ledger }
    }

    /// Register a new account, unapproved.
    ///
    /// Students get a zero coin balance in the same transaction.
    ///
    /// # Errors
    ///
    /// Returns `AlreadyRegistered` if the id is taken and `BlankUserId` for
    /// malformed payloads.
    pub async fn register(&self, new: NewUser) -> Result<User, UserError> {
        if new.id.is_blank() {
            return Err(UserError::BlankUserId);
        }

        let user = self
            .ledger
            .run_transaction(|tx| {
                let now = Utc::now();
                let existing: Option<User> = tx.read(collections::USERS, new.id.as_str())?;
                if existing.is_some() {
                    return Err(TxnError::Abort(UserError::AlreadyRegistered(
                        new.id.clone(),
                    )));
                }

                let user = new.clone().into_user(now);
                tx.write(collections::USERS, user.id.as_str(), &user)?;
                if user.role == Role::Student {
                    let balance = CoinBalance::zero(user.id.clone(), now);
                    tx.write(collections::BALANCES, user.id.as_str(), &balance)?;
                }
                Ok(user)
            })
            .await
            .map_err(UserError::from_txn)?;

        info!(user = %user.id, role = %user.role, "user registered");
        Ok(user)
    }

    /// Approve a registered account. Staff only.
    ///
    /// # Errors
    ///
    /// Returns `UserNotFound` if the user does not exist.
    pub async fn approve(
        &self,
        ctx: &AuthContext,
        user_id: &UserId,
    ) -> Result<ApproveOutcome, UserError> {
        ctx.require_staff("approve registrations")?;

        let outcome = self
            .ledger
            .run_transaction(|tx| {
                let mut user = tx
                    .read::<User>(collections::USERS, user_id.as_str())?
                    .ok_or_else(|| TxnError::Abort(UserError::UserNotFound(user_id.clone())))?;
                if user.role != Role::Student {
                    return Ok(ApproveOutcome::RoleNotEligible);
                }
                if user.approved {
                    return Ok(ApproveOutcome::AlreadyApproved);
                }
                user.approved = true;
                tx.write(collections::USERS, user_id.as_str(), &user)?;
                Ok(ApproveOutcome::Approved)
            })
            .await
            .map_err(UserError::from_txn)?;

        if outcome == ApproveOutcome::Approved {
            info!(user = %user_id, by = %ctx.user_id, "user approved");
        }
        Ok(outcome)
    }

    /// Apply a diff-based profile update.
    ///
    /// Returns `Ok(None)` when nothing differs from the stored profile,
    /// otherwise the profile as stored after the patch.
    ///
    /// # Errors
    ///
    /// Returns `UserNotFound` if the user does not exist.
    pub async fn update(
        &self,
        user_id: &UserId,
        update: UserUpdate,
    ) -> Result<Option<User>, UserError> {
        let current: User = self
            .ledger
            .get(collections::USERS, user_id.as_str())
            .await?
            .ok_or_else(|| UserError::UserNotFound(user_id.clone()))?;

        let Some(patch) = update.diff(&current) else {
            return Ok(None);
        };

        self.ledger
            .merge(collections::USERS, user_id.as_str(), &patch)
            .await?;
        info!(user = %user_id, "profile updated");

        let stored: Option<User> = self.ledger.get(collections::USERS, user_id.as_str()).await?;
        stored
            .map(Some)
            .ok_or_else(|| UserError::UserNotFound(user_id.clone()))
    }

    /// Fetch one user.
    ///
    /// # Errors
    ///
    /// Returns `UserNotFound` if the user does not exist.
    pub async fn get(&self, user_id: &UserId) -> Result<User, UserError> {
        let user: Option<User> = self.ledger.get(collections::USERS, user_id.as_str()).await?;
        user.ok_or_else(|| UserError::UserNotFound(user_id.clone()))
    }

    /// The approval queue for staff: unapproved accounts, in id order.
    ///
    /// # Errors
    ///
    /// Returns store errors only.
    pub async fn list_unapproved(&self, ctx: &AuthContext) -> Result<Vec<User>, UserError> {
        ctx.require_staff("list pending registrations")?;
        let mut users: Vec<User> = self.ledger.list(collections::USERS).await?;
        users.retain(|user| !user.approved);
        Ok(users)
    }
}
