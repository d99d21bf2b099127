//! Vault session — coordinates the crypto engine and the local store.
//!
//! A `Vault` is the unlocked handle higher layers work with: it owns
//! the store and an unlocked [`CryptoEngine`], and enforces the
//! validation-token protocol on unlock.

use crate::crypto::{kdf, CryptoEngine, CryptoError};
use crate::models::PasswordItem;
use crate::store::{VaultItem, VaultStore};
use crate::{Result, VaultError};
use tracing::{debug, warn};

/// Outcome of decrypting a single stored item during enumeration.
///
/// One undecryptable item must not prevent others from being listed,
/// so failures are carried per entry instead of aborting.
pub struct ItemDecryptOutcome {
    pub id: String,
    pub is_deleted: bool,
    pub result: std::result::Result<PasswordItem, CryptoError>,
}

/// An unlocked vault.
pub struct Vault {
    store: VaultStore,
    crypto: CryptoEngine,
}

// Manual impl: the crypto engine holds key material, so fields are not
// exposed through Debug.
impl std::fmt::Debug for Vault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Vault").finish_non_exhaustive()
    }
}

impl Vault {
    /// Initialize a brand-new vault: generate the salt, derive the key,
    /// and persist the salt plus validation token.
    pub fn initialize(store: VaultStore, master_password: &str) -> Result<Self> {
        let salt = kdf::generate_salt();
        let mut crypto = CryptoEngine::new();
        crypto.derive_key(master_password, &salt)?;

        let validation_token = crypto.create_validation_token()?;
        store.set_credentials(&salt, &validation_token)?;

        debug!("vault initialized");
        Ok(Self { store, crypto })
    }

    /// Unlock an existing vault, verifying the password against the
    /// stored validation token before trusting the derived key.
    pub fn unlock(store: VaultStore, master_password: &str) -> Result<Self> {
        let config = store.config()?;
        let salt = config
            .kdf_salt
            .ok_or_else(|| VaultError::InvalidInput("vault is not initialized".to_string()))?;
        let token = config
            .validation_token
            .ok_or_else(|| VaultError::InvalidInput("vault is not initialized".to_string()))?;

        let mut crypto = CryptoEngine::new();
        crypto.derive_key(master_password, &salt)?;
        crypto.verify_validation_token(&token)?;

        debug!("vault unlocked");
        Ok(Self { store, crypto })
    }

    /// Encrypt and store an item, marking it dirty for the next sync.
    pub fn save_item(&self, item: &PasswordItem) -> Result<()> {
        let token = self.crypto.encrypt_item(item)?;
        self.store
            .save(&item.id.to_string(), &token, false, true, None)?;
        Ok(())
    }

    /// Soft-delete an item. The tombstone stays in the store, flagged
    /// dirty, so the deletion itself is synced.
    pub fn delete_item(&self, id: &str) -> Result<()> {
        let Some(existing) = self.store.get(id)? else {
            return Err(VaultError::InvalidInput(format!("no such item: {id}")));
        };
        self.store
            .save(id, &existing.encrypted_data, true, true, None)?;
        Ok(())
    }

    /// Fetch and decrypt a single item.
    pub fn get_item(&self, id: &str) -> Result<Option<PasswordItem>> {
        match self.store.get(id)? {
            Some(row) => Ok(Some(self.crypto.decrypt_item(&row.encrypted_data)?)),
            None => Ok(None),
        }
    }

    /// Decrypt every live item, collecting per-item failures instead of
    /// aborting the enumeration.
    pub fn list_items(&self) -> Result<Vec<ItemDecryptOutcome>> {
        let rows = self.store.get_all(false)?;
        let mut outcomes = Vec::with_capacity(rows.len());
        for row in rows {
            let result = self.crypto.decrypt_item(&row.encrypted_data);
            if let Err(ref e) = result {
                warn!(id = %row.id, error = %e, "failed to decrypt item");
            }
            outcomes.push(ItemDecryptOutcome {
                id: row.id,
                is_deleted: row.is_deleted,
                result,
            });
        }
        Ok(outcomes)
    }

    /// Raw encrypted rows, including tombstones, for the sync engine.
    pub fn snapshot(&self) -> Result<Vec<VaultItem>> {
        Ok(self.store.get_all(true)?)
    }

    pub fn store(&self) -> &VaultStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut VaultStore {
        &mut self.store
    }

    pub fn crypto(&self) -> &CryptoEngine {
        &self.crypto
    }

    /// Lock the vault, wiping the derived key.
    pub fn lock(&mut self) {
        self.crypto.lock();
    }
}
