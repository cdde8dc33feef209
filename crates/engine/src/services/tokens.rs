//! Signed access tokens binding a user id to a role.
//!
//! The transport layer verifies a token once per request and hands the
//! resulting [`AuthContext`] to the engine; no engine operation re-derives
//! identity. Tokens are HMAC-SHA256 signed, URL-safe base64, shaped as
//! `payload.signature`.

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::Utc;
use hmac::{Hmac, Mac};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;

use tutorium_core::{Role, UserId};

use crate::config::EngineConfig;

type HmacSha256 = Hmac<Sha256>;

/// An authenticated caller: who they are and what they may do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthContext {
    pub user_id: UserId,
    pub role: Role,
}

impl AuthContext {
    /// Require a staff-capable role for the named action.
    ///
    /// # Errors
    ///
    /// Returns [`Forbidden`] when the caller's role is not staff.
    pub fn require_staff(&self, action: &'static str) -> Result<(), Forbidden> {
        if self.role.is_staff() {
            Ok(())
        } else {
            Err(Forbidden {
                role: self.role,
                action,
            })
        }
    }
}

/// The caller's role does not permit the attempted action.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("role {role} may not {action}")]
pub struct Forbidden {
    pub role: Role,
    pub action: &'static str,
}

/// Errors that can occur when issuing or verifying a token.
#[derive(Debug, Error)]
pub enum TokenError {
    /// The token is not `payload.signature` with valid base64/JSON parts.
    #[error("malformed token")]
    Malformed,
    /// The signature does not match the payload.
    #[error("token signature mismatch")]
    BadSignature,
    /// The token's expiry has passed.
    #[error("token expired")]
    Expired,
    /// The signing key was rejected by the MAC implementation.
    #[error("invalid signing key")]
    Key,
}

/// Signed token claims.
#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: UserId,
    role: Role,
    /// Issued-at, seconds since the epoch.
    iat: i64,
    /// Expiry, seconds since the epoch.
    exp: i64,
}

/// Issues and verifies access tokens.
pub struct TokenService<'a> {
    config: &'a EngineConfig,
}

impl<'a> TokenService<'a> {
    /// Create a token service over the engine configuration.
    #[must_use]
    pub const fn new(config: &'a EngineConfig) -> Self {
        Self { config }
    }

    fn mac(&self) -> Result<HmacSha256, TokenError> {
        HmacSha256::new_from_slice(self.config.token_secret.expose_secret().as_bytes())
            .map_err(|_| TokenError::Key)
    }

    /// Issue a token for a user and role, valid for the configured TTL.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::Key` if the signing key is unusable.
    pub fn issue(&self, user_id: &UserId, role: Role) -> Result<String, TokenError> {
        let now = Utc::now().timestamp();
        let ttl = i64::try_from(self.config.token_ttl_secs).unwrap_or(i64::MAX);
        let claims = Claims {
            sub: user_id.clone(),
            role,
            iat: now,
            exp: now.saturating_add(ttl),
        };
        // Claims are plain data; encoding cannot fail.
        let payload =
            serde_json::to_vec(&claims).map_err(|_| TokenError::Malformed)?;
        let encoded = URL_SAFE_NO_PAD.encode(&payload);

        let mut mac = self.mac()?;
        mac.update(encoded.as_bytes());
        let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

        Ok(format!("{encoded}.{signature}"))
    }

    /// Verify a token and return the authenticated context.
    ///
    /// # Errors
    ///
    /// Returns `Malformed`, `BadSignature`, or `Expired` as appropriate.
    pub fn verify(&self, token: &str) -> Result<AuthContext, TokenError> {
        let (encoded, signature) = token.split_once('.').ok_or(TokenError::Malformed)?;
        let signature = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|_| TokenError::Malformed)?;

        let mut mac = self.mac()?;
        mac.update(encoded.as_bytes());
        mac.verify_slice(&signature)
            .map_err(|_| TokenError::BadSignature)?;

        let payload = URL_SAFE_NO_PAD
            .decode(encoded)
            .map_err(|_| TokenError::Malformed)?;
        let claims: Claims =
            serde_json::from_slice(&payload).map_err(|_| TokenError::Malformed)?;

        if claims.exp <= Utc::now().timestamp() {
            return Err(TokenError::Expired);
        }

        Ok(AuthContext {
            user_id: claims.sub,
            role: claims.role,
        })
    }
}
