//! Password hashing: PBKDF2-HMAC-SHA256, 100,000 iterations, a fresh
//! 32-byte random salt per password, 32-byte derived key. The stored hash
//! is `salt || key` as a flat 64-byte blob.

use rand::RngCore;
use sha2::Sha256;
use subtle::ConstantTimeEq;

const SALT_LEN: usize = 32;
const KEY_LEN: usize = 32;
const ITERATIONS: u32 = 100_000;

/// Hashes `password` with a freshly generated random salt, returning the
/// 64-byte `salt || key` blob to persist.
pub fn hash_password(password: &str) -> [u8; SALT_LEN + KEY_LEN] {
    let mut salt = [0u8; SALT_LEN];
    rand::thread_rng().fill_bytes(&mut salt);

    let mut key = [0u8; KEY_LEN];
    pbkdf2::pbkdf2_hmac::<Sha256>(password.as_bytes(), &salt, ITERATIONS, &mut key);

    let mut out = [0u8; SALT_LEN + KEY_LEN];
    out[..SALT_LEN].copy_from_slice(&salt);
    out[SALT_LEN..].copy_from_slice(&key);
    out
}

/// Verifies `password` against a stored `salt || key` blob in constant time.
/// Returns `false` (rather than an error) for a malformed stored blob, since
/// that can only happen for corrupted state, and the caller's response is
/// the same either way: authentication fails.
pub fn verify_password(stored: &[u8], password: &str) -> bool {
    if stored.len() != SALT_LEN + KEY_LEN {
        return false;
    }
    let salt = &stored[..SALT_LEN];
    let stored_key = &stored[SALT_LEN..];

    let mut candidate_key = [0u8; KEY_LEN];
    pbkdf2::pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, ITERATIONS, &mut candidate_key);

    candidate_key.ct_eq(stored_key).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verifies_correct_password_only() {
        let hash = hash_password("correct horse battery staple");
        assert!(verify_password(&hash, "correct horse battery staple"));
        assert!(!verify_password(&hash, "wrong password"));
    }

    #[test]
    fn two_hashes_of_same_password_differ_by_salt() {
        let a = hash_password("same-password");
        let b = hash_password("same-password");
        assert_ne!(a, b);
        assert!(verify_password(&a, "same-password"));
        assert!(verify_password(&b, "same-password"));
    }
}
