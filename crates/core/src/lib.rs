//! Tutorium Core - Shared types library.
//!
//! This crate provides common types used across all Tutorium Rewards components:
//! - `engine` - Business-logic library (carts, coins, rewards, orders, users)
//! - `cli` - Command-line tools for seeding and demos
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no store access, no async.
//! This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for type-safe IDs, coin amounts, branches,
//!   emails, and status enums

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
