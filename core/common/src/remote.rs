//! Remote store interface as seen by the backup pipeline and the
//! retention enforcer.
//!
//! The backup system drives exactly three remote operations: create a file
//! with metadata and content, list a folder, and delete by id. Keeping the
//! trait this small lets tests substitute an in-memory store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Result;

/// Read-only view of a remote object, as returned by a folder listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteObject {
    /// Provider-assigned identifier, used for deletion.
    pub id: String,
    /// Object name (the backup filename).
    pub name: String,
    /// Last modification time, used by the retention cutoff.
    pub modified: DateTime<Utc>,
}

/// Remote storage backend for backup artifacts.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Create a file with the given name and content type under `folder_id`.
    async fn upload(
        &self,
        name: &str,
        folder_id: &str,
        mime_type: &str,
        data: Vec<u8>,
    ) -> Result<RemoteObject>;

    /// List all objects whose parent is `folder_id`.
    async fn list_folder(&self, folder_id: &str) -> Result<Vec<RemoteObject>>;

    /// Delete an object by id.
    async fn delete(&self, id: &str) -> Result<()>;
}
