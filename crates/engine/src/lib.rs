//! Tutorium Rewards engine.
//!
//! This crate holds the whole business layer of the rewards programme:
//! coin balances, the reward catalog, per-user carts, and the order
//! lifecycle, all backed by a transactional document ledger. Transport
//! layers (bot, HTTP) stay thin: verify a token, call a service, map the
//! error.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod error;
pub mod models;
pub mod services;
pub mod state;
pub mod store;

pub use config::EngineConfig;
pub use error::{EngineError, Result};
pub use state::Engine;
