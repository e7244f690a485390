// ============================
// crates/backend-lib/src/auth/token_generator.rs
// ============================
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
/** Secure random material for session tokens
The signed session token carries a random nonce drawn from the OS RNG so
that two tokens are never equal, even for the same account in the same
second. */
use rand::{rngs::OsRng, RngCore};

/// Nonce size in bytes (16 bytes = 128 bits of entropy)
pub const NONCE_BYTES: usize = 16;

/** Generate a cryptographically secure random nonce
# Returns
A base64 URL-safe encoded string without padding */
pub fn generate_nonce() -> String {
    generate_secure_token_with_size(NONCE_BYTES)
}

/** Generate a cryptographically secure random token with specified size
# Arguments
* `bytes` - The size of the random token in bytes */
pub fn generate_secure_token_with_size(bytes: usize) -> String {
    let mut buffer = vec![0u8; bytes];
    OsRng.fill_bytes(&mut buffer);
    URL_SAFE_NO_PAD.encode(buffer)
}
