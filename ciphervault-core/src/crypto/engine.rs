//! The crypto engine: lock state, item/text encryption, and the
//! validation-token protocol.
//!
//! Token wire format is `base64(nonce(12) || ciphertext || auth_tag(16))`
//! under AES-256-GCM, so every token is text-safe for storage and
//! transport.

use crate::crypto::kdf::{derive_key_bytes, KEY_LEN};
use crate::crypto::{CryptoError, Result};
use crate::models::PasswordItem;
use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine;
use zeroize::Zeroize;

/// AES-256-GCM nonce length in bytes.
const NONCE_LEN: usize = 12;

/// AES-256-GCM authentication tag length in bytes.
const TAG_LEN: usize = 16;

/// Known plaintext encrypted at vault initialization. Decrypting the
/// stored token and comparing against this detects a wrong password
/// before any real item is touched.
pub const VALIDATION_PLAINTEXT: &str = "ciphervault-validation-v1";

/// Derived symmetric key, wiped from memory on drop.
struct DerivedKey([u8; KEY_LEN]);

impl Drop for DerivedKey {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

/// Encrypts and decrypts vault contents with a password-derived key.
///
/// Starts Locked; [`CryptoEngine::derive_key`] transitions to Unlocked.
/// There is no transition back except dropping the engine or calling
/// [`CryptoEngine::lock`] at session end.
#[derive(Default)]
pub struct CryptoEngine {
    key: Option<DerivedKey>,
}

impl CryptoEngine {
    /// Create a new engine in the Locked state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a key has been derived.
    pub fn is_unlocked(&self) -> bool {
        self.key.is_some()
    }

    /// Clear the derived key from memory.
    pub fn lock(&mut self) {
        self.key = None;
    }

    /// Derive the symmetric key from the master password and stored
    /// salt, transitioning to Unlocked.
    ///
    /// Succeeds for any password; correctness is verified separately
    /// via [`CryptoEngine::verify_validation_token`].
    pub fn derive_key(&mut self, password: &str, salt_b64: &str) -> Result<()> {
        let key = derive_key_bytes(password, salt_b64)?;
        self.key = Some(DerivedKey(key));
        Ok(())
    }

    /// Encrypt an item into an opaque text token.
    pub fn encrypt_item(&self, item: &PasswordItem) -> Result<String> {
        let json = serde_json::to_vec(item)
            .map_err(|e| CryptoError::Encryption(format!("serialization failed: {e}")))?;
        self.seal(&json)
    }

    /// Decrypt an item token. Fails with [`CryptoError::Decryption`] if
    /// the authentication tag does not verify (wrong key or corrupted
    /// data, which are cryptographically indistinguishable) or if the
    /// plaintext does not parse.
    pub fn decrypt_item(&self, token: &str) -> Result<PasswordItem> {
        let plaintext = self.open(token)?;
        serde_json::from_slice(&plaintext)
            .map_err(|e| CryptoError::Decryption(format!("invalid item payload: {e}")))
    }

    /// Encrypt a short string with the same token format.
    pub fn encrypt_text(&self, text: &str) -> Result<String> {
        self.seal(text.as_bytes())
    }

    /// Decrypt a short string token.
    pub fn decrypt_text(&self, token: &str) -> Result<String> {
        let plaintext = self.open(token)?;
        String::from_utf8(plaintext)
            .map_err(|_| CryptoError::Decryption("plaintext is not valid UTF-8".to_string()))
    }

    /// Produce the validation token persisted at vault initialization.
    pub fn create_validation_token(&self) -> Result<String> {
        self.encrypt_text(VALIDATION_PLAINTEXT)
    }

    /// Check a stored validation token against the derived key.
    ///
    /// Any failure here means the password was wrong, which is reported
    /// as [`CryptoError::WrongPassword`] rather than a per-item
    /// decryption error.
    pub fn verify_validation_token(&self, token: &str) -> Result<()> {
        match self.decrypt_text(token) {
            Ok(plaintext) if plaintext == VALIDATION_PLAINTEXT => Ok(()),
            Ok(_) => Err(CryptoError::WrongPassword),
            Err(CryptoError::Locked) => Err(CryptoError::Locked),
            Err(_) => Err(CryptoError::WrongPassword),
        }
    }

    fn cipher(&self) -> Result<Aes256Gcm> {
        let key = self.key.as_ref().ok_or(CryptoError::Locked)?;
        Ok(Aes256Gcm::new(&key.0.into()))
    }

    fn seal(&self, plaintext: &[u8]) -> Result<String> {
        let cipher = self.cipher()?;
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);

        // aes-gcm appends the tag, so this is ciphertext || tag
        let ciphertext_with_tag = cipher
            .encrypt(&nonce, plaintext)
            .map_err(|e| CryptoError::Encryption(e.to_string()))?;

        let mut blob = Vec::with_capacity(NONCE_LEN + ciphertext_with_tag.len());
        blob.extend_from_slice(nonce.as_slice());
        blob.extend_from_slice(&ciphertext_with_tag);
        Ok(B64.encode(blob))
    }

    fn open(&self, token: &str) -> Result<Vec<u8>> {
        let cipher = self.cipher()?;
        let blob = B64
            .decode(token)
            .map_err(|e| CryptoError::Decryption(format!("invalid token encoding: {e}")))?;

        if blob.len() < NONCE_LEN + TAG_LEN {
            return Err(CryptoError::Decryption("token too short".to_string()));
        }

        let nonce_bytes: [u8; NONCE_LEN] = blob[..NONCE_LEN]
            .try_into()
            .map_err(|_| CryptoError::Decryption("invalid nonce".to_string()))?;
        let nonce = Nonce::from(nonce_bytes);

        cipher
            .decrypt(&nonce, &blob[NONCE_LEN..])
            .map_err(|_| CryptoError::Decryption("authentication tag mismatch".to_string()))
    }
}
