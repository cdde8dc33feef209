//! Engine configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `TUTORIUM_TOKEN_SECRET` - Access-token signing secret (min 32 chars,
//!   high entropy)
//!
//! ## Optional
//! - `TUTORIUM_TOKEN_TTL_SECS` - Access-token lifetime (default: 3600)
//! - `TUTORIUM_TXN_MAX_ATTEMPTS` - Ledger transaction attempt bound
//!   (default: 5)
//! - `TUTORIUM_BRANCHES` - Comma-separated branch names (default: Main)

use std::collections::HashMap;

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

use tutorium_core::Branch;

const MIN_TOKEN_SECRET_LENGTH: usize = 32;
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Engine configuration.
///
/// Implements `Debug` manually to redact the signing secret.
#[derive(Clone)]
pub struct EngineConfig {
    /// Access-token signing secret.
    pub token_secret: SecretString,
    /// Access-token lifetime in seconds.
    pub token_ttl_secs: u64,
    /// Bound on ledger transaction attempts before surfacing a conflict.
    pub txn_max_attempts: u32,
    /// Branch names of the tutoring centre.
    pub branches: Vec<Branch>,
}

impl std::fmt::Debug for EngineConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineConfig")
            .field("token_secret", &"[REDACTED]")
            .field("token_ttl_secs", &self.token_ttl_secs)
            .field("txn_max_attempts", &self.txn_max_attempts)
            .field("branches", &self.branches)
            .finish()
    }
}

impl EngineConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if the secret fails validation (placeholder detection, entropy
    /// check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let token_secret = get_validated_secret("TUTORIUM_TOKEN_SECRET")?;
        validate_secret_length(&token_secret, "TUTORIUM_TOKEN_SECRET")?;

        let token_ttl_secs = get_env_or_default("TUTORIUM_TOKEN_TTL_SECS", "3600")
            .parse::<u64>()
            .map_err(|e| {
                ConfigError::InvalidEnvVar("TUTORIUM_TOKEN_TTL_SECS".to_string(), e.to_string())
            })?;
        let txn_max_attempts = get_env_or_default("TUTORIUM_TXN_MAX_ATTEMPTS", "5")
            .parse::<u32>()
            .map_err(|e| {
                ConfigError::InvalidEnvVar("TUTORIUM_TXN_MAX_ATTEMPTS".to_string(), e.to_string())
            })?;
        let branches = get_env_or_default("TUTORIUM_BRANCHES", "Main")
            .split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(Branch::new)
            .collect();

        Ok(Self {
            token_secret,
            token_ttl_secs,
            txn_max_attempts,
            branches,
        })
    }

    /// Build a configuration directly, bypassing the environment.
    ///
    /// Used by tests and tooling; the secret still has to meet the length
    /// requirement.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InsecureSecret` if the secret is too short.
    pub fn with_secret(
        token_secret: impl Into<String>,
        branches: Vec<Branch>,
    ) -> Result<Self, ConfigError> {
        let token_secret = SecretString::from(token_secret.into());
        validate_secret_length(&token_secret, "token_secret")?;
        Ok(Self {
            token_secret,
            token_ttl_secs: 3600,
            txn_max_attempts: 5,
            branches,
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Validate that a signing secret meets minimum length requirements.
fn validate_secret_length(secret: &SecretString, var_name: &str) -> Result<(), ConfigError> {
    let value = secret.expose_secret();
    if value.len() < MIN_TOKEN_SECRET_LENGTH {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "must be at least {} characters (got {})",
                MIN_TOKEN_SECRET_LENGTH,
                value.len()
            ),
        ));
    }
    Ok(())
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.len() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)] // Character count will never exceed f64 precision
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    // Check blocklist
    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    // Check entropy (real secrets like API keys have high entropy)
    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use a randomly generated secret."
            ),
        ));
    }

    Ok(())
}

/// Load and validate a secret from environment.
fn get_validated_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    validate_secret_strength(&value, key)?;
    Ok(SecretString::from(value))
}
