//! Local persisted vault store.
//!
//! Pure storage over a single SQLite file: one item table keyed by id
//! and a singleton config row. No crypto and no network awareness.
//! Items are never hard-deleted locally; deletion is a flagged mutation
//! that must itself be synced.

use crate::models::now_ts;
use rusqlite::{Connection, OptionalExtension};
use std::path::Path;
use thiserror::Error;

/// Errors from the local store.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

type Result<T> = std::result::Result<T, StoreError>;

/// A locally persisted, encrypted vault item.
#[derive(Debug, Clone, PartialEq)]
pub struct VaultItem {
    /// Opaque unique identifier, stable for the item's lifetime.
    pub id: String,
    /// Authenticated-encryption token produced by the crypto engine.
    pub encrypted_data: String,
    /// Soft-delete flag; the tombstone still syncs.
    pub is_deleted: bool,
    /// True iff mutated locally since the last confirmed sync.
    pub is_dirty: bool,
    /// Local mutation timestamp, replaced by the server timestamp once
    /// the item is confirmed synced.
    pub updated_at: f64,
    /// Identity bound after the first successful sync.
    pub owner: Option<String>,
}

/// Singleton local configuration row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VaultConfig {
    pub kdf_salt: Option<String>,
    pub validation_token: Option<String>,
    /// Server-issued sync cursor; advanced only by server responses,
    /// never by the client clock.
    pub last_sync_timestamp: f64,
}

/// SQLite-backed vault store. Callers must serialize concurrent
/// mutation of the same store instance.
pub struct VaultStore {
    conn: Connection,
}

impl VaultStore {
    /// Open (or create) a vault store at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        let store = Self { conn };
        store.initialize_schema()?;
        Ok(store)
    }

    /// Create an in-memory store for testing.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.initialize_schema()?;
        Ok(store)
    }

    fn initialize_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS vault_items (
                id TEXT PRIMARY KEY,
                encrypted_data TEXT NOT NULL,
                is_deleted INTEGER NOT NULL DEFAULT 0,
                is_dirty INTEGER NOT NULL DEFAULT 0,
                updated_at REAL NOT NULL,
                owner TEXT
            );

            CREATE TABLE IF NOT EXISTS vault_config (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                kdf_salt TEXT,
                validation_token TEXT,
                last_sync_timestamp REAL NOT NULL DEFAULT 0
            );

            INSERT OR IGNORE INTO vault_config (id) VALUES (1);",
        )?;
        Ok(())
    }

    /// Load the singleton config row.
    pub fn config(&self) -> Result<VaultConfig> {
        let config = self
            .conn
            .query_row(
                "SELECT kdf_salt, validation_token, last_sync_timestamp
                 FROM vault_config WHERE id = 1",
                [],
                |row| {
                    Ok(VaultConfig {
                        kdf_salt: row.get(0)?,
                        validation_token: row.get(1)?,
                        last_sync_timestamp: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(config.unwrap_or_default())
    }

    /// Persist vault initialization state (salt + validation token).
    pub fn set_credentials(&self, kdf_salt: &str, validation_token: &str) -> Result<()> {
        self.conn.execute(
            "UPDATE vault_config SET kdf_salt = ?1, validation_token = ?2 WHERE id = 1",
            rusqlite::params![kdf_salt, validation_token],
        )?;
        Ok(())
    }

    /// Advance the sync cursor to a server-reported timestamp.
    pub fn set_last_sync_timestamp(&self, server_ts: f64) -> Result<()> {
        self.conn.execute(
            "UPDATE vault_config SET last_sync_timestamp = ?1 WHERE id = 1",
            [server_ts],
        )?;
        Ok(())
    }

    /// Fetch a single item by id.
    pub fn get(&self, id: &str) -> Result<Option<VaultItem>> {
        let item = self
            .conn
            .query_row(
                "SELECT id, encrypted_data, is_deleted, is_dirty, updated_at, owner
                 FROM vault_items WHERE id = ?1",
                [id],
                row_to_item,
            )
            .optional()?;
        Ok(item)
    }

    /// Fetch all items, optionally including soft-deleted ones.
    pub fn get_all(&self, include_deleted: bool) -> Result<Vec<VaultItem>> {
        let sql = if include_deleted {
            "SELECT id, encrypted_data, is_deleted, is_dirty, updated_at, owner
             FROM vault_items ORDER BY id"
        } else {
            "SELECT id, encrypted_data, is_deleted, is_dirty, updated_at, owner
             FROM vault_items WHERE is_deleted = 0 ORDER BY id"
        };
        let mut stmt = self.conn.prepare(sql)?;
        let items = stmt
            .query_map([], row_to_item)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(items)
    }

    /// Fetch all items mutated since the last confirmed sync.
    pub fn get_dirty(&self) -> Result<Vec<VaultItem>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, encrypted_data, is_deleted, is_dirty, updated_at, owner
             FROM vault_items WHERE is_dirty = 1 ORDER BY id",
        )?;
        let items = stmt
            .query_map([], row_to_item)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(items)
    }

    /// Upsert an item. Always refreshes `updated_at` from the local
    /// clock. `owner` only overwrites the stored value when `Some`.
    pub fn save(
        &self,
        id: &str,
        encrypted_data: &str,
        is_deleted: bool,
        is_dirty: bool,
        owner: Option<&str>,
    ) -> Result<()> {
        self.conn.execute(
            "INSERT INTO vault_items (id, encrypted_data, is_deleted, is_dirty, updated_at, owner)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(id) DO UPDATE SET
                encrypted_data = excluded.encrypted_data,
                is_deleted = excluded.is_deleted,
                is_dirty = excluded.is_dirty,
                updated_at = excluded.updated_at,
                owner = COALESCE(excluded.owner, vault_items.owner)",
            rusqlite::params![id, encrypted_data, is_deleted, is_dirty, now_ts(), owner],
        )?;
        Ok(())
    }

    /// Atomically mark the given ids as synced: clear `is_dirty`, stamp
    /// `updated_at` with the server timestamp, and bind `owner`. Ids not
    /// present in the store are ignored.
    pub fn mark_synced(&mut self, ids: &[String], server_ts: f64, owner: &str) -> Result<()> {
        let tx = self.conn.transaction()?;
        for id in ids {
            tx.execute(
                "UPDATE vault_items SET is_dirty = 0, updated_at = ?1, owner = ?2 WHERE id = ?3",
                rusqlite::params![server_ts, owner, id],
            )?;
        }
        tx.commit()?;
        Ok(())
    }
}

fn row_to_item(row: &rusqlite::Row<'_>) -> rusqlite::Result<VaultItem> {
    Ok(VaultItem {
        id: row.get(0)?,
        encrypted_data: row.get(1)?,
        is_deleted: row.get(2)?,
        is_dirty: row.get(3)?,
        updated_at: row.get(4)?,
        owner: row.get(5)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults() {
        let store = VaultStore::in_memory().unwrap();
        let config = store.config().unwrap();
        assert!(config.kdf_salt.is_none());
        assert!(config.validation_token.is_none());
        assert_eq!(config.last_sync_timestamp, 0.0);
    }

    #[test]
    fn credentials_persist() {
        let store = VaultStore::in_memory().unwrap();
        store.set_credentials("salt-b64", "token-b64").unwrap();
        let config = store.config().unwrap();
        assert_eq!(config.kdf_salt.as_deref(), Some("salt-b64"));
        assert_eq!(config.validation_token.as_deref(), Some("token-b64"));
    }

    #[test]
    fn save_defaults_dirty_and_refreshes_timestamp() {
        let store = VaultStore::in_memory().unwrap();
        store.save("a", "blob1", false, true, None).unwrap();
        let first = store.get("a").unwrap().unwrap();
        assert!(first.is_dirty);
        assert!(first.owner.is_none());

        std::thread::sleep(std::time::Duration::from_millis(2));
        store.save("a", "blob2", false, true, None).unwrap();
        let second = store.get("a").unwrap().unwrap();
        assert_eq!(second.encrypted_data, "blob2");
        assert!(second.updated_at > first.updated_at);
    }

    #[test]
    fn owner_only_overwritten_when_some() {
        let store = VaultStore::in_memory().unwrap();
        store.save("a", "blob", false, true, Some("alice")).unwrap();
        store.save("a", "blob2", false, true, None).unwrap();
        assert_eq!(
            store.get("a").unwrap().unwrap().owner.as_deref(),
            Some("alice")
        );
    }

    #[test]
    fn get_all_filters_deleted() {
        let store = VaultStore::in_memory().unwrap();
        store.save("live", "blob", false, true, None).unwrap();
        store.save("gone", "blob", true, true, None).unwrap();

        assert_eq!(store.get_all(false).unwrap().len(), 1);
        assert_eq!(store.get_all(true).unwrap().len(), 2);
    }

    #[test]
    fn get_dirty_returns_only_dirty() {
        let store = VaultStore::in_memory().unwrap();
        store.save("dirty", "blob", false, true, None).unwrap();
        store.save("clean", "blob", false, false, None).unwrap();

        let dirty = store.get_dirty().unwrap();
        assert_eq!(dirty.len(), 1);
        assert_eq!(dirty[0].id, "dirty");
    }

    #[test]
    fn mark_synced_clears_dirty_and_stamps_server_time() {
        let mut store = VaultStore::in_memory().unwrap();
        store.save("a", "blob", false, true, None).unwrap();
        store.save("b", "blob", false, true, None).unwrap();

        store
            .mark_synced(
                &["a".to_string(), "missing".to_string()],
                1234.5,
                "alice",
            )
            .unwrap();

        let a = store.get("a").unwrap().unwrap();
        assert!(!a.is_dirty);
        assert_eq!(a.updated_at, 1234.5);
        assert_eq!(a.owner.as_deref(), Some("alice"));

        // untouched sibling stays dirty
        assert!(store.get("b").unwrap().unwrap().is_dirty);
    }

    #[test]
    fn cursor_persists() {
        let store = VaultStore::in_memory().unwrap();
        store.set_last_sync_timestamp(99.25).unwrap();
        assert_eq!(store.config().unwrap().last_sync_timestamp, 99.25);
    }
}
