//! Batch reconciliation for the sync endpoint.
//!
//! One sync request is one atomic unit: every accepted push lands under
//! a single server timestamp, or none do. Ownership is first-writer:
//! the identity that first pushes an id owns it forever, and pushes
//! against a foreign id are skipped silently (signaled only by absence
//! from `processed_ids`). The pull set is computed after the commit, so
//! it includes the items just pushed.

use crate::error::ServerError;
use crate::storage::now_ts;
use rusqlite::{Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// One pushed item, as sent by the client.
#[derive(Debug, Clone, Deserialize)]
pub struct PushItem {
    pub id: String,
    pub encrypted_data: String,
    pub is_deleted: bool,
}

/// Server-side item record, as returned in pull sets.
#[derive(Debug, Clone, Serialize)]
pub struct StoredItem {
    pub id: String,
    pub encrypted_data: String,
    pub is_deleted: bool,
    pub updated_at: f64,
    pub owner: String,
}

/// Outcome of one reconciled batch.
#[derive(Debug)]
pub struct ReconcileResult {
    pub server_timestamp: f64,
    pub pull_items: Vec<StoredItem>,
    pub processed_ids: Vec<String>,
}

/// Reconcile one push batch for `identity` and compute its pull set.
///
/// `cursor` is the client's last known server timestamp; the pull set
/// is every item owned by `identity` with `updated_at` strictly after
/// it. A zero cursor therefore pulls the full snapshot.
pub fn reconcile(
    conn: &mut Connection,
    identity: &str,
    cursor: f64,
    push_items: &[PushItem],
) -> Result<ReconcileResult, ServerError> {
    let now = now_ts();
    let tx = conn.transaction()?;

    let mut processed_ids = Vec::with_capacity(push_items.len());
    for item in push_items {
        let existing_owner: Option<String> = tx
            .query_row(
                "SELECT owner FROM vault_items WHERE id = ?1",
                [&item.id],
                |row| row.get(0),
            )
            .optional()?;

        if let Some(owner) = existing_owner {
            if owner != identity {
                debug!(id = %item.id, "skipping push against foreign item");
                continue;
            }
        }

        tx.execute(
            "INSERT INTO vault_items (id, encrypted_data, is_deleted, updated_at, owner)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(id) DO UPDATE SET
                encrypted_data = excluded.encrypted_data,
                is_deleted = excluded.is_deleted,
                updated_at = excluded.updated_at",
            rusqlite::params![item.id, item.encrypted_data, item.is_deleted, now, identity],
        )?;
        processed_ids.push(item.id.clone());
    }

    tx.commit()?;

    let mut stmt = conn.prepare(
        "SELECT id, encrypted_data, is_deleted, updated_at, owner
         FROM vault_items WHERE owner = ?1 AND updated_at > ?2
         ORDER BY updated_at, id",
    )?;
    let pull_items = stmt
        .query_map(rusqlite::params![identity, cursor], |row| {
            Ok(StoredItem {
                id: row.get(0)?,
                encrypted_data: row.get(1)?,
                is_deleted: row.get(2)?,
                updated_at: row.get(3)?,
                owner: row.get(4)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(ReconcileResult {
        server_timestamp: now,
        pull_items,
        processed_ids,
    })
}
