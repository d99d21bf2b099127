//! Sync engine: computes divergence and executes chosen actions.

use crate::store::VaultStore;
use crate::sync::diff::{compute_diff, SyncAction, SyncDiffEntry};
use crate::sync::models::{PushItem, SyncRequest};
use crate::sync::SyncTransport;
use crate::{Result, VaultError};
use tracing::{debug, info, warn};

/// Summary of one executed sync run.
#[derive(Debug, Default)]
pub struct SyncOutcome {
    /// Remote items applied locally.
    pub pulled: u64,
    /// Ids whose pull failed; others were still applied.
    pub pull_failures: Vec<String>,
    /// Items submitted in the push batch.
    pub pushed: u64,
    /// Ids the server reported as accepted.
    pub accepted_ids: Vec<String>,
    /// Server commit timestamp, if anything was pushed.
    pub server_timestamp: Option<f64>,
}

/// Reconciles the local replica with the remote store through a
/// transport. Holds the active identity; the store is passed per call
/// so callers keep control of its lifetime and locking.
pub struct SyncEngine<T: SyncTransport> {
    transport: T,
    identity: String,
}

impl<T: SyncTransport> SyncEngine<T> {
    pub fn new(transport: T, identity: impl Into<String>) -> Self {
        Self {
            transport,
            identity: identity.into(),
        }
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Compute the divergence between the local replica and the remote
    /// store.
    ///
    /// Always requests the full remote snapshot (zero cursor) and
    /// re-evaluates it against local state; classification is
    /// idempotent, so this is O(remote size) but never wrong. The
    /// persisted cursor is only used for conflict detection.
    pub async fn check_diff(&self, store: &VaultStore) -> Result<Vec<SyncDiffEntry>> {
        let local = store.get_all(true)?;
        let cursor = store.config()?.last_sync_timestamp;

        let response = self.transport.fetch_snapshot().await?;
        debug!(
            local = local.len(),
            remote = response.pull_items.len(),
            cursor,
            "computing sync diff"
        );

        Ok(compute_diff(&local, &response.pull_items, cursor, &self.identity))
    }

    /// Execute a finalized entry list.
    ///
    /// Pulls are applied first, immediately and individually; one
    /// failure does not block the others. Pushes are collected into a
    /// single batch; a transport failure aborts the push phase with no
    /// local mutation for pushed items (already-applied pulls stand).
    /// On success, only the ids the server reports as accepted are
    /// marked synced, and the cursor advances to the server timestamp.
    pub async fn execute(
        &self,
        store: &mut VaultStore,
        entries: &[SyncDiffEntry],
    ) -> Result<SyncOutcome> {
        let mut outcome = SyncOutcome::default();
        let mut push_items = Vec::new();

        for entry in entries {
            match entry.action {
                SyncAction::Pull => {
                    let Some(remote) = &entry.remote else {
                        warn!(id = %entry.id, "pull requested without a remote record");
                        outcome.pull_failures.push(entry.id.clone());
                        continue;
                    };
                    match store.save(
                        &remote.id,
                        &remote.encrypted_data,
                        remote.is_deleted,
                        false,
                        Some(&self.identity),
                    ) {
                        Ok(()) => outcome.pulled += 1,
                        Err(e) => {
                            warn!(id = %entry.id, error = %e, "failed to apply pulled item");
                            outcome.pull_failures.push(entry.id.clone());
                        }
                    }
                }
                SyncAction::Push => {
                    let Some(local) = &entry.local else {
                        warn!(id = %entry.id, "push requested without a local record");
                        continue;
                    };
                    if let Some(owner) = &local.owner {
                        if owner != &self.identity {
                            return Err(VaultError::Ownership(entry.id.clone()));
                        }
                    }
                    push_items.push(PushItem {
                        id: local.id.clone(),
                        encrypted_data: local.encrypted_data.clone(),
                        is_deleted: local.is_deleted,
                    });
                }
                SyncAction::Skip => {}
            }
        }

        if push_items.is_empty() {
            // No request and no cursor movement: a deferred conflict
            // keeps classifying as a conflict only while the cursor
            // stays behind the remote edit.
            info!(pulled = outcome.pulled, "sync executed with nothing to push");
            return Ok(outcome);
        }

        outcome.pushed = push_items.len() as u64;
        let request = SyncRequest {
            last_sync_timestamp: store.config()?.last_sync_timestamp,
            push_items,
        };

        let response = self.transport.push(&request).await?;

        store.mark_synced(&response.processed_ids, response.server_timestamp, &self.identity)?;
        store.set_last_sync_timestamp(response.server_timestamp)?;

        info!(
            pulled = outcome.pulled,
            pushed = outcome.pushed,
            accepted = response.processed_ids.len(),
            server_timestamp = response.server_timestamp,
            "sync executed"
        );

        outcome.accepted_ids = response.processed_ids;
        outcome.server_timestamp = Some(response.server_timestamp);
        Ok(outcome)
    }
}
