//! CipherVault Core Library
//!
//! This library provides the client-side core of CipherVault: key
//! derivation and authenticated encryption of vault items, the local
//! encrypted item store, and the sync engine that reconciles the local
//! replica with a remote server.

pub mod crypto;
pub mod models;
pub mod store;
pub mod sync;
pub mod vault;

pub use crypto::{CryptoEngine, CryptoError};
pub use models::PasswordItem;
pub use store::{StoreError, VaultConfig, VaultItem, VaultStore};
pub use sync::client::ApiClient;
pub use sync::diff::{SyncAction, SyncDiffEntry, SyncStatus};
pub use sync::engine::{SyncEngine, SyncOutcome};
pub use sync::{SyncTransport, TransportError};
pub use vault::{ItemDecryptOutcome, Vault};

use thiserror::Error;

/// Result type for vault operations
pub type Result<T> = std::result::Result<T, VaultError>;

/// General error type for vault operations
#[derive(Error, Debug)]
pub enum VaultError {
    #[error("Crypto error: {0}")]
    Crypto(#[from] crypto::CryptoError),

    #[error("Store error: {0}")]
    Store(#[from] store::StoreError),

    #[error("Transport error: {0}")]
    Transport(#[from] sync::TransportError),

    #[error("Item {0} is owned by another identity")]
    Ownership(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}
