use serde::{Deserialize, Serialize};
use tether::{RemoteStoreClient, StoreError};

use crate::config::{node, paths};

/// App release metadata, stored once for all users as
/// `{ "latest": "1.4.0", "forced": "1.2.0" }`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionInfo {
    pub latest: String,
    /// Builds older than this must update before continuing.
    pub forced: String,
}

/// Unlike collection reads, a missing or undecodable node fails the call.
pub async fn fetch_version(client: &RemoteStoreClient) -> Result<VersionInfo, StoreError> {
    let path = node(paths::VERSION)?;
    let snapshot = client.read_shared_once(&path).await?;
    if !snapshot.exists() {
        return Err(StoreError::malformed(&path, "version node is missing"));
    }
    snapshot
        .decode()
        .map_err(|e| StoreError::malformed(&path, e))
}
