//! Crate-level error type for callers that do not care which service failed.

use thiserror::Error;

use crate::services::{CartError, CoinError, OrderError, RewardError, TokenError, UserError};
use crate::store::StoreError;

/// Any engine failure, tagged by the service it came from.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Cart(#[from] CartError),
    #[error(transparent)]
    Coin(#[from] CoinError),
    #[error(transparent)]
    Order(#[from] OrderError),
    #[error(transparent)]
    Reward(#[from] RewardError),
    #[error(transparent)]
    Token(#[from] TokenError),
    #[error(transparent)]
    User(#[from] UserError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Convenience alias for engine results.
pub type Result<T, E = EngineError> = std::result::Result<T, E>;

impl EngineError {
    /// HTTP status a transport layer should map this error to.
    #[must_use]
    pub const fn status_hint(&self) -> u16 {
        match self {
            Self::Cart(err) => match err {
                CartError::CartNotFound(_) | CartError::ItemNotFound { .. } => 404,
                CartError::BlankRewardId | CartError::Math(_) => 400,
                CartError::Store(_) => 500,
            },
            Self::Coin(err) => match err {
                CoinError::BalanceNotFound(_) => 404,
                CoinError::Forbidden(_) => 403,
                CoinError::Store(_) => 500,
            },
            Self::Order(err) => match err {
                OrderError::CartNotFound(_)
                | OrderError::BalanceNotFound(_)
                | OrderError::OrderNotFound(_)
                | OrderError::RewardNotFound(_) => 404,
                OrderError::InvalidItems(_)
                | OrderError::InvalidStatus { .. }
                | OrderError::MissingRewardId(_)
                | OrderError::InsufficientStock { .. } => 400,
                OrderError::Forbidden(_) => 403,
                OrderError::Store(_) => 500,
            },
            Self::Reward(err) => match err {
                RewardError::RewardNotFound(_) => 404,
                RewardError::AlreadyExists(_) | RewardError::BlankRewardId => 400,
                RewardError::Forbidden(_) => 403,
                RewardError::Store(_) => 500,
            },
            Self::Token(_) => 401,
            Self::User(err) => match err {
                UserError::UserNotFound(_) => 404,
                UserError::AlreadyRegistered(_) | UserError::BlankUserId => 400,
                UserError::Forbidden(_) => 403,
                UserError::Store(_) => 500,
            },
            Self::Store(_) => 500,
        }
    }

    /// Whether resubmitting the same operation can reasonably succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Cart(CartError::Store(err))
            | Self::Coin(CoinError::Store(err))
            | Self::Order(OrderError::Store(err))
            | Self::Reward(RewardError::Store(err))
            | Self::User(UserError::Store(err))
            | Self::Store(err) => err.is_retryable(),
            _ => false,
        }
    }
}
