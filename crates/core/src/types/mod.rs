//! Core types for Tutorium Rewards.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod branch;
pub mod coins;
pub mod email;
pub mod id;
pub mod status;

pub use branch::Branch;
pub use coins::Coins;
pub use email::{Email, EmailError};
pub use id::*;
pub use status::*;
