//! Plaintext vault item model.
//!
//! A [`PasswordItem`] only ever exists in memory while the vault is
//! unlocked; at rest and on the wire it is an opaque encrypted token.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A decrypted credential entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PasswordItem {
    /// Stable identifier, assigned at creation and never changed.
    pub id: Uuid,
    pub title: String,
    pub username: String,
    pub password: String,
    pub url: Option<String>,
    pub notes: Option<String>,
    /// Unix timestamp in seconds.
    pub created_at: f64,
    /// Unix timestamp in seconds, refreshed on every edit.
    pub updated_at: f64,
}

impl PasswordItem {
    /// Create a new item with a fresh id and current timestamps.
    pub fn new(
        title: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        let now = now_ts();
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            username: username.into(),
            password: password.into(),
            url: None,
            notes: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Refresh `updated_at` to the current local clock.
    pub fn touch(&mut self) {
        self.updated_at = now_ts();
    }
}

/// Current local wall-clock time as fractional Unix seconds.
///
/// Local timestamps are used only for display and dirty tracking;
/// sync ordering always uses server-issued timestamps.
pub fn now_ts() -> f64 {
    chrono::Utc::now().timestamp_micros() as f64 / 1_000_000.0
}
