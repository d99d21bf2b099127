//! Diff classification between the local replica and a remote snapshot.
//!
//! Every id present on either side (minus cross-identity items) maps to
//! exactly one status. Conflicts are never auto-resolved: they default
//! to [`SyncAction::Skip`] and require an explicit choice before
//! execution.

use crate::store::VaultItem;
use crate::sync::models::RemoteVaultItem;
use std::collections::BTreeMap;

/// Clock-skew tolerance added to the cursor when deciding whether a
/// remote change predates or postdates the last known sync.
pub const EPSILON_SECS: f64 = 1.0;

/// Classification of one id across the two replicas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStatus {
    /// Both sides agree; no diff entry is emitted.
    Synced,
    /// Present locally only.
    LocalNew,
    /// Present remotely only.
    RemoteNew,
    /// Dirty locally, remote unchanged since the cursor.
    LocalModified,
    /// Clean locally, remote is newer.
    RemoteModified,
    /// Both sides changed since the last sync.
    Conflict,
}

/// Action to take for one diff entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncAction {
    /// Keep local: send to the server.
    Push,
    /// Keep remote: overwrite the local copy.
    Pull,
    /// Defer; touch nothing.
    Skip,
}

impl SyncStatus {
    /// Status-derived default action. Conflicts are deliberately left
    /// at Skip so they must be resolved explicitly.
    pub fn default_action(self) -> SyncAction {
        match self {
            SyncStatus::LocalNew | SyncStatus::LocalModified => SyncAction::Push,
            SyncStatus::RemoteNew | SyncStatus::RemoteModified => SyncAction::Pull,
            SyncStatus::Conflict | SyncStatus::Synced => SyncAction::Skip,
        }
    }
}

/// One divergent id, with the records backing the classification and a
/// mutable action that starts at the status default.
#[derive(Debug, Clone)]
pub struct SyncDiffEntry {
    pub id: String,
    pub status: SyncStatus,
    pub local: Option<VaultItem>,
    pub remote: Option<RemoteVaultItem>,
    pub action: SyncAction,
}

impl SyncDiffEntry {
    fn new(id: String, status: SyncStatus, local: Option<VaultItem>, remote: Option<RemoteVaultItem>) -> Self {
        let action = status.default_action();
        Self {
            id,
            status,
            local,
            remote,
            action,
        }
    }
}

/// Classify one id. `local` and `remote` must not both be `None`.
pub fn classify(local: Option<&VaultItem>, remote: Option<&RemoteVaultItem>, cursor: f64) -> SyncStatus {
    match (local, remote) {
        (Some(_), None) => SyncStatus::LocalNew,
        (None, Some(_)) => SyncStatus::RemoteNew,
        (Some(local), Some(remote)) => {
            if local.is_dirty {
                if remote.updated_at > cursor + EPSILON_SECS {
                    SyncStatus::Conflict
                } else {
                    SyncStatus::LocalModified
                }
            } else if remote.updated_at > local.updated_at {
                SyncStatus::RemoteModified
            } else {
                SyncStatus::Synced
            }
        }
        (None, None) => SyncStatus::Synced,
    }
}

/// Compute the divergence between the full local snapshot and a full
/// remote snapshot.
///
/// Ids whose local `owner` is bound to a different identity than
/// `identity` are invisible to diffing: ownership isolation. Entries
/// classified Synced are not emitted. Output is ordered by id.
pub fn compute_diff(
    local_items: &[VaultItem],
    remote_items: &[RemoteVaultItem],
    cursor: f64,
    identity: &str,
) -> Vec<SyncDiffEntry> {
    let local_map: BTreeMap<&str, &VaultItem> =
        local_items.iter().map(|i| (i.id.as_str(), i)).collect();
    let remote_map: BTreeMap<&str, &RemoteVaultItem> =
        remote_items.iter().map(|i| (i.id.as_str(), i)).collect();

    let mut ids: BTreeMap<&str, ()> = BTreeMap::new();
    ids.extend(local_map.keys().map(|k| (*k, ())));
    ids.extend(remote_map.keys().map(|k| (*k, ())));

    let mut entries = Vec::new();
    for id in ids.keys() {
        let local = local_map.get(id).copied();
        let remote = remote_map.get(id).copied();

        if let Some(local) = local {
            if let Some(owner) = &local.owner {
                if owner != identity {
                    continue;
                }
            }
        }

        let status = classify(local, remote, cursor);
        if status == SyncStatus::Synced {
            continue;
        }

        entries.push(SyncDiffEntry::new(
            (*id).to_string(),
            status,
            local.cloned(),
            remote.cloned(),
        ));
    }
    entries
}

/// Bulk-override the action on every non-conflict entry. Conflict
/// entries keep whatever action they already carry; they can only be
/// changed one at a time, explicitly.
pub fn set_bulk_action(entries: &mut [SyncDiffEntry], action: SyncAction) {
    for entry in entries.iter_mut() {
        if entry.status != SyncStatus::Conflict {
            entry.action = action;
        }
    }
}
