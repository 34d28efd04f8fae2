//! qBittorrent API response types
//!
//! Only the fields the inventory needs are deserialized; the API returns many
//! more and they are ignored.

use bridge_traits::remote::{RemoteCollection, RemoteCollectionFile};
use serde::{Deserialize, Serialize};

/// One entry of `GET /api/v2/torrents/info`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TorrentInfo {
    /// Info hash
    pub hash: String,

    /// Torrent name, also the top-level directory of multi-file torrents
    pub name: String,

    /// Selected size in bytes
    #[serde(default)]
    pub size: i64,

    /// Directory the torrent is saved under
    #[serde(default)]
    pub save_path: String,
}

impl From<TorrentInfo> for RemoteCollection {
    fn from(info: TorrentInfo) -> Self {
        RemoteCollection {
            id: info.hash,
            name: info.name,
            size: info.size,
            save_location: info.save_path,
        }
    }
}

/// One entry of `GET /api/v2/torrents/files`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TorrentFile {
    /// Path relative to the torrent root
    pub name: String,

    #[serde(default)]
    pub size: i64,
}

impl From<TorrentFile> for RemoteCollectionFile {
    fn from(file: TorrentFile) -> Self {
        RemoteCollectionFile {
            relative_name: file.name,
            size: file.size,
        }
    }
}
