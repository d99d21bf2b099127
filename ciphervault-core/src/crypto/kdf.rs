//! PBKDF2-HMAC-SHA256 key derivation for the master password.
//!
//! Parameters:
//! - 600,000 iterations (OWASP 2023 recommendation for HMAC-SHA256)
//! - 256-bit output
//! - 16-byte random salt, generated once at vault initialization

use crate::crypto::{CryptoError, Result};
use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine;
use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use sha2::Sha256;

/// PBKDF2 iteration count.
pub const KDF_ITERATIONS: u32 = 600_000;

/// Derived key length in bytes.
pub const KEY_LEN: usize = 32;

/// Salt length in bytes.
pub const SALT_LEN: usize = 16;

/// Generate a fresh random salt, base64-encoded for storage.
///
/// Called exactly once, when a vault is first initialized. The salt is
/// persisted in the vault config and uploaded at registration so other
/// devices can derive the same key.
pub fn generate_salt() -> String {
    let mut salt = [0u8; SALT_LEN];
    rand::thread_rng().fill_bytes(&mut salt);
    B64.encode(salt)
}

/// Derive a 256-bit key from a password and a base64-encoded salt.
///
/// Deterministic: the same password and salt always yield the same key.
/// Derivation never judges password correctness; that is the job of the
/// validation-token check in [`crate::crypto::CryptoEngine`].
pub fn derive_key_bytes(password: &str, salt_b64: &str) -> Result<[u8; KEY_LEN]> {
    let salt = B64
        .decode(salt_b64)
        .map_err(|e| CryptoError::Kdf(format!("invalid salt encoding: {e}")))?;
    if salt.is_empty() {
        return Err(CryptoError::Kdf("empty salt".to_string()));
    }

    let mut key = [0u8; KEY_LEN];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), &salt, KDF_ITERATIONS, &mut key);
    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn salt_is_random_and_decodable() {
        let s1 = generate_salt();
        let s2 = generate_salt();
        assert_ne!(s1, s2);
        assert_eq!(B64.decode(&s1).unwrap().len(), SALT_LEN);
    }

    #[test]
    fn derivation_is_deterministic() {
        let salt = generate_salt();
        let k1 = derive_key_bytes("correct horse", &salt).unwrap();
        let k2 = derive_key_bytes("correct horse", &salt).unwrap();
        assert_eq!(k1, k2);
    }

    #[test]
    fn different_password_different_key() {
        let salt = generate_salt();
        let k1 = derive_key_bytes("password-one", &salt).unwrap();
        let k2 = derive_key_bytes("password-two", &salt).unwrap();
        assert_ne!(k1, k2);
    }

    #[test]
    fn different_salt_different_key() {
        let k1 = derive_key_bytes("same password", &generate_salt()).unwrap();
        let k2 = derive_key_bytes("same password", &generate_salt()).unwrap();
        assert_ne!(k1, k2);
    }

    #[test]
    fn invalid_salt_rejected() {
        assert!(derive_key_bytes("pw", "not base64 !!!").is_err());
        assert!(derive_key_bytes("pw", "").is_err());
    }
}
