// ============================
// crates/backend-lib/src/auth/password.rs
// ============================
//! Password hashing and verification.
use scrypt::{
    password_hash::{
        rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString,
    },
    Params, Scrypt,
};
use serde::Deserialize;
use thiserror::Error;
use zeroize::Zeroize;

/// Errors raised while hashing
#[derive(Error, Debug)]
pub enum HashError {
    #[error("invalid hash cost: {0}")]
    InvalidCost(String),

    #[error("hashing failed: {0}")]
    Failure(String),
}

/// scrypt work factor.
///
/// Verification reads the parameters back from the stored PHC string, so the
/// cost can be raised without invalidating existing hashes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct HashCost {
    /// log2 of the CPU/memory cost
    pub log_n: u8,
    /// Block size
    pub r: u32,
    /// Parallelism
    pub p: u32,
}

impl Default for HashCost {
    fn default() -> Self {
        Self {
            log_n: Params::RECOMMENDED_LOG_N,
            r: Params::RECOMMENDED_R,
            p: Params::RECOMMENDED_P,
        }
    }
}

impl HashCost {
    fn params(&self) -> Result<Params, HashError> {
        Params::new(self.log_n, self.r, self.p, Params::RECOMMENDED_LEN)
            .map_err(|e| HashError::InvalidCost(e.to_string()))
    }

    /// Check the parameters without hashing anything
    pub fn validate(&self) -> Result<(), HashError> {
        self.params().map(|_| ())
    }
}

/// Hash a password using scrypt
pub fn hash_password(plain: &str, cost: &HashCost) -> Result<String, HashError> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Scrypt
        .hash_password_customized(plain.as_bytes(), None, None, cost.params()?, &salt)
        .map_err(|e| HashError::Failure(e.to_string()))?
        .to_string();
    Ok(hash)
}

/// Verify a password against a hash
pub fn verify_password(hash: &str, plain: &str) -> bool {
    let parsed_hash = match PasswordHash::new(hash) {
        Ok(h) => h,
        Err(_) => return false,
    };
    Scrypt.verify_password(plain.as_bytes(), &parsed_hash).is_ok()
}

/// Hash a password and wipe the plaintext
pub fn hash_password_secure(plain: &mut String, cost: &HashCost) -> Result<String, HashError> {
    let hash = hash_password(plain, cost);
    plain.zeroize();
    hash
}

#[cfg(test)]
pub(crate) fn test_cost() -> HashCost {
    HashCost { log_n: 4, r: 8, p: 1 }
}
