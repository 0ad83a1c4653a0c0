//! Transfer PIN hashing and constant-time comparison.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use z_ledger_core::UserId;

type HmacSha256 = Hmac<Sha256>;

/// Compute HMAC-SHA256 and return hex-encoded result.
///
/// # Panics
///
/// Never in practice: HMAC accepts keys of any size (RFC 2104).
#[must_use]
pub fn hmac_sha256_hex(secret: &str, message: &str) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC-SHA256 accepts any key size");
    mac.update(message.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Constant-time string comparison.
#[must_use]
pub fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }
    result == 0
}

/// Hash a transfer PIN. The user id is mixed in so equal PINs hash differently.
#[must_use]
pub fn hash_pin(secret: &str, user_id: &UserId, pin: &str) -> String {
    hmac_sha256_hex(secret, &format!("{user_id}:{pin}"))
}

/// Check a PIN against a stored hash.
#[must_use]
pub fn verify_pin(secret: &str, user_id: &UserId, pin: &str, stored_hash: &str) -> bool {
    constant_time_eq(&hash_pin(secret, user_id, pin), stored_hash)
}
