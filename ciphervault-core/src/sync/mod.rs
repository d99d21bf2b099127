//! Multi-device synchronization.
//!
//! - Diff classification between the local replica and a remote
//!   snapshot, with explicit conflict handling
//! - Push/pull execution against the server through a transport seam
//! - Server-issued cursor tracking (client clocks are untrusted for
//!   ordering)

pub mod client;
pub mod diff;
pub mod engine;
pub mod models;

pub use client::ApiClient;
pub use diff::{compute_diff, SyncAction, SyncDiffEntry, SyncStatus, EPSILON_SECS};
pub use engine::{SyncEngine, SyncOutcome};
pub use models::{PushItem, RemoteVaultItem, SyncRequest, SyncResponse};

use async_trait::async_trait;
use thiserror::Error;

/// Errors from the network transport.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Network error: {0}")]
    Http(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Server rejected request ({status}): {message}")]
    Status { status: u16, message: String },

    #[error("Invalid response body: {0}")]
    InvalidResponse(String),
}

/// The transport seam the sync engine depends on. Implemented over HTTP
/// by [`ApiClient`]; tests substitute in-memory fakes.
#[async_trait]
pub trait SyncTransport {
    /// Fetch the full remote snapshot (zero cursor, nothing pushed).
    async fn fetch_snapshot(&self) -> Result<SyncResponse, TransportError>;

    /// Submit a push batch together with the persisted cursor.
    async fn push(&self, request: &SyncRequest) -> Result<SyncResponse, TransportError>;
}
