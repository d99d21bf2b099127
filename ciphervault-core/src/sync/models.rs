//! Sync and auth wire models.

use serde::{Deserialize, Serialize};

/// One item in a push batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushItem {
    pub id: String,
    pub encrypted_data: String,
    pub is_deleted: bool,
}

/// Request body for `POST /api/v1/sync`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncRequest {
    pub last_sync_timestamp: f64,
    pub push_items: Vec<PushItem>,
}

/// Server-side view of an item, returned in pull sets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteVaultItem {
    pub id: String,
    pub encrypted_data: String,
    pub is_deleted: bool,
    /// Server-assigned timestamp; the only ordering authority.
    pub updated_at: f64,
    /// Identity the item is permanently bound to.
    pub owner: String,
}

/// Response body for `POST /api/v1/sync`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncResponse {
    pub server_timestamp: f64,
    pub pull_items: Vec<RemoteVaultItem>,
    /// Ids the server actually accepted (a subset of the pushed ids;
    /// ownership conflicts are signaled by omission, not by error).
    #[serde(default)]
    pub processed_ids: Vec<String>,
}

/// Request body for `POST /auth/register`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    /// Client-generated KDF salt, bound to the account so other devices
    /// can derive the same vault key.
    pub kdf_salt: String,
}

/// Response body for `POST /auth/token`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
}

/// Response body for `GET /auth/me`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub username: String,
    pub kdf_salt: String,
}

/// Response body for `GET /auth/check/{username}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserCheckResponse {
    pub exists: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sync_response_tolerates_missing_processed_ids() {
        let json = r#"{"server_timestamp": 12.5, "pull_items": []}"#;
        let resp: SyncResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.server_timestamp, 12.5);
        assert!(resp.processed_ids.is_empty());
    }

    #[test]
    fn sync_request_roundtrip() {
        let req = SyncRequest {
            last_sync_timestamp: 100.0,
            push_items: vec![PushItem {
                id: "a".to_string(),
                encrypted_data: "blob".to_string(),
                is_deleted: false,
            }],
        };
        let json = serde_json::to_string(&req).unwrap();
        let back: SyncRequest = serde_json::from_str(&json).unwrap();
        assert_eq!(back.push_items.len(), 1);
        assert_eq!(back.push_items[0].id, "a");
    }
}
