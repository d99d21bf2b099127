//! Cryptographic layer for the vault.
//!
//! This module provides:
//! - PBKDF2-HMAC-SHA256 key derivation from the master password
//! - AES-256-GCM authenticated encryption of items and short strings
//! - The lock/unlock state machine and validation-token protocol

pub mod engine;
pub mod kdf;

pub use engine::{CryptoEngine, VALIDATION_PLAINTEXT};
pub use kdf::{derive_key_bytes, generate_salt, KDF_ITERATIONS, KEY_LEN, SALT_LEN};

use thiserror::Error;

/// Errors that can occur in cryptographic operations
#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("Vault is locked")]
    Locked,

    #[error("Key derivation failed: {0}")]
    Kdf(String),

    #[error("Encryption failed: {0}")]
    Encryption(String),

    #[error("Decryption failed: {0}")]
    Decryption(String),

    #[error("Wrong master password")]
    WrongPassword,
}

/// Result type for crypto operations
pub type Result<T> = std::result::Result<T, CryptoError>;
