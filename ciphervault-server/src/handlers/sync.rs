//! The sync endpoint.

use crate::auth::Identity;
use crate::error::ServerError;
use crate::reconcile::{reconcile, PushItem, StoredItem};
use crate::storage::ServerStorage;
use axum::extract::State;
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Deserialize)]
pub struct SyncRequest {
    pub last_sync_timestamp: f64,
    pub push_items: Vec<PushItem>,
}

#[derive(Serialize)]
pub struct SyncResponse {
    pub server_timestamp: f64,
    pub pull_items: Vec<StoredItem>,
    pub processed_ids: Vec<String>,
}

/// `POST /api/v1/sync`: reconcile a push batch and return the pull set
/// since the client's cursor.
pub async fn sync(
    State(storage): State<ServerStorage>,
    Extension(identity): Extension<Identity>,
    Json(req): Json<SyncRequest>,
) -> Result<Json<SyncResponse>, ServerError> {
    let mut conn = storage.conn()?;
    let result = reconcile(
        &mut conn,
        &identity.0,
        req.last_sync_timestamp,
        &req.push_items,
    )?;

    info!(
        username = %identity.0,
        pushed = req.push_items.len(),
        accepted = result.processed_ids.len(),
        pulled = result.pull_items.len(),
        "sync batch reconciled"
    );

    Ok(Json(SyncResponse {
        server_timestamp: result.server_timestamp,
        pull_items: result.pull_items,
        processed_ids: result.processed_ids,
    }))
}
