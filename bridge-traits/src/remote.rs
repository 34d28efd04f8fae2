//! Remote Collection Source
//!
//! A remote catalog groups files into collections. For a torrent client a
//! collection is one torrent: it has an opaque identifier (the info hash), a
//! display name, and a save location on the client's filesystem.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// One collection as reported by the remote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteCollection {
    /// Opaque identifier, e.g. a torrent info hash
    pub id: String,
    /// Display name
    pub name: String,
    /// Total size in bytes
    pub size: i64,
    /// Directory the remote stores this collection under
    pub save_location: String,
}

/// One file inside a collection, relative to the collection root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteCollectionFile {
    pub relative_name: String,
    pub size: i64,
}

/// Remote inventory API.
///
/// `authenticate` must be called before the listing methods. Implementations
/// keep whatever session state the remote needs internally and must be safe
/// to call concurrently from several fetch workers.
#[async_trait]
pub trait RemoteCollectionSource: Send + Sync {
    /// Establish a session.
    ///
    /// # Errors
    ///
    /// Returns `BridgeError::AuthenticationFailed` when the remote rejects
    /// the credentials; any other variant for transport failures.
    async fn authenticate(&self) -> Result<()>;

    /// List every collection known to the remote.
    async fn list_collections(&self) -> Result<Vec<RemoteCollection>>;

    /// List the files belonging to one collection.
    async fn files_of(&self, collection_id: &str) -> Result<Vec<RemoteCollectionFile>>;
}
