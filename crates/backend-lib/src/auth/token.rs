// ============================
// crates/backend-lib/src/auth/token.rs
// ============================
//! Signed session tokens (HS256 JWT).
//!
//! The same token is stored in the `token` cookie, used as the session map
//! key, and presented to the remote access check, which re-derives the
//! account identity from the claims.
use std::fmt;
use std::time::Duration;

use authdb_common::AccountId;
use chrono::{DateTime, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use zeroize::Zeroize;

use super::token_generator::generate_nonce;

/// Minimum accepted signing secret length in bytes
pub const MIN_SECRET_BYTES: usize = 32;

const ALGORITHM: Algorithm = Algorithm::HS256;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("token signature is invalid")]
    InvalidSignature,

    #[error("token has expired")]
    Expired,

    #[error("token is malformed")]
    Malformed,

    #[error("failed to sign token: {0}")]
    Signing(String),

    #[error("signing secret rejected: {0}")]
    WeakSecret(String),
}

/// Server-held HMAC secret. Wiped from memory on drop.
#[derive(Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct SigningSecret(String);

impl SigningSecret {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl fmt::Debug for SigningSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SigningSecret(<redacted>)")
    }
}

impl Drop for SigningSecret {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

/// Claims carried by a session token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Account identifier
    pub sub: AccountId,
    /// Issued-at, unix seconds
    pub iat: i64,
    /// Expiry, unix seconds
    pub exp: i64,
    /// Random nonce
    pub jti: String,
}

/// A freshly minted token with its absolute expiry
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub claims: Claims,
    pub expires_at: DateTime<Utc>,
}

/// Mints and verifies session tokens
#[derive(Clone)]
pub struct TokenIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl TokenIssuer {
    /// Build an issuer; refuses missing or short secrets
    pub fn new(secret: &SigningSecret, ttl: Duration) -> Result<Self, TokenError> {
        if secret.is_empty() {
            return Err(TokenError::WeakSecret("signing secret is not set".to_string()));
        }
        if secret.as_bytes().len() < MIN_SECRET_BYTES {
            return Err(TokenError::WeakSecret(format!(
                "signing secret must be at least {MIN_SECRET_BYTES} bytes"
            )));
        }

        let mut validation = Validation::new(ALGORITHM);
        validation.leeway = 0;

        Ok(Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            ttl,
        })
    }

    /// Default token lifetime
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Issue a token with the default lifetime
    pub fn issue(&self, account_id: AccountId) -> Result<IssuedToken, TokenError> {
        self.issue_with_ttl(account_id, self.ttl)
    }

    /// Issue a token that expires `ttl` from now
    pub fn issue_with_ttl(
        &self,
        account_id: AccountId,
        ttl: Duration,
    ) -> Result<IssuedToken, TokenError> {
        let now = Utc::now().timestamp();
        let ttl_secs = i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX);
        let claims = Claims {
            sub: account_id,
            iat: now,
            exp: now.saturating_add(ttl_secs),
            jti: generate_nonce(),
        };
        let expires_at = DateTime::<Utc>::from_timestamp(claims.exp, 0)
            .ok_or_else(|| TokenError::Signing("expiry out of range".to_string()))?;
        let token = self.sign(&claims)?;
        Ok(IssuedToken {
            token,
            claims,
            expires_at,
        })
    }

    pub(crate) fn sign(&self, claims: &Claims) -> Result<String, TokenError> {
        encode(&Header::new(ALGORITHM), claims, &self.encoding)
            .map_err(|e| TokenError::Signing(e.to_string()))
    }

    /// Verify signature, algorithm and expiry, then return the claims
    pub fn parse(&self, token: &str) -> Result<Claims, TokenError> {
        decode::<Claims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => {
                    TokenError::InvalidSignature
                },
                _ => TokenError::Malformed,
            })
    }
}

#[cfg(test)]
pub(crate) fn test_secret() -> SigningSecret {
    SigningSecret::new("test-secret-that-is-long-enough-for-hs256")
}
