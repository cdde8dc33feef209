//! Shared engine handle.

use std::sync::Arc;

use crate::config::EngineConfig;
use crate::services::{
    CartService, CoinService, OrderService, RewardService, TokenService, UserService,
};
use crate::store::MemoryLedger;

/// The assembled engine: configuration plus the ledger, cheap to clone and
/// share across tasks. Transport layers hold one of these and construct
/// short-lived service views per operation.
#[derive(Debug, Clone)]
pub struct Engine {
    inner: Arc<EngineInner>,
}

#[derive(Debug)]
struct EngineInner {
    config: EngineConfig,
    ledger: MemoryLedger,
}

impl Engine {
    /// Assemble an engine from configuration, with an empty ledger sized to
    /// the configured transaction attempt bound.
    #[must_use]
    pub fn new(config: EngineConfig) -> Self {
        let ledger = MemoryLedger::new(config.txn_max_attempts);
        Self {
            inner: Arc::new(EngineInner { config, ledger }),
        }
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn ledger(&self) -> &MemoryLedger {
        &self.inner.ledger
    }

    #[must_use]
    pub fn tokens(&self) -> TokenService<'_> {
        TokenService::new(&self.inner.config)
    }

    #[must_use]
    pub fn users(&self) -> UserService<'_> {
        UserService::new(&self.inner.ledger)
    }

    #[must_use]
    pub fn coins(&self) -> CoinService<'_> {
        CoinService::new(&self.inner.ledger)
    }

    #[must_use]
    pub fn rewards(&self) -> RewardService<'_> {
        RewardService::new(&self.inner.ledger)
    }

    #[must_use]
    pub fn carts(&self) -> CartService<'_> {
        CartService::new(&self.inner.ledger)
    }

    #[must_use]
    pub fn orders(&self) -> OrderService<'_> {
        OrderService::new(&self.inner.ledger)
    }
}
