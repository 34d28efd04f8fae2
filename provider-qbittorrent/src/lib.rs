//! # qBittorrent Provider
//!
//! Implements `RemoteCollectionSource` for the qBittorrent Web API v2.
//!
//! ## Overview
//!
//! This module provides:
//! - Cookie-session login (`/api/v2/auth/login`)
//! - Torrent listing (`/api/v2/torrents/info`)
//! - Per-torrent file listing (`/api/v2/torrents/files`)
//!
//! Each torrent is exposed as one remote collection keyed by its info hash.

pub mod connector;
pub mod error;
pub mod types;

pub use connector::QbittorrentConnector;
pub use error::{QbittorrentError, Result};
pub use types::{TorrentFile, TorrentInfo};
