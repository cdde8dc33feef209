//! Access-token tooling for local testing.
//!
//! # Environment Variables
//!
//! - `TUTORIUM_TOKEN_SECRET` - Access-token signing secret
//! - `TUTORIUM_TOKEN_TTL_SECS` - Token lifetime for `issue`

use std::str::FromStr;

use tracing::info;

use tutorium_core::{Role, UserId};
use tutorium_engine::EngineConfig;
use tutorium_engine::services::TokenService;

/// Issue a token for a user id and role.
///
/// # Errors
///
/// Returns an error if the configuration is invalid or the role does not
/// parse.
pub fn issue(user: &str, role: &str) -> Result<(), Box<dyn std::error::Error>> {
    let config = EngineConfig::from_env()?;
    let role = Role::from_str(role)?;
    let token = TokenService::new(&config).issue(&UserId::new(user), role)?;
    info!(user, %role, ttl_secs = config.token_ttl_secs, "token issued");
    info!("{token}");
    Ok(())
}

/// Verify a token and print who it belongs to.
///
/// # Errors
///
/// Returns an error for malformed, forged or expired tokens.
pub fn verify(token: &str) -> Result<(), Box<dyn std::error::Error>> {
    let config = EngineConfig::from_env()?;
    let ctx = TokenService::new(&config).verify(token)?;
    info!(user = %ctx.user_id, role = %ctx.role, "token valid");
    Ok(())
}
