//! # Reconciliation Store
//!
//! Persists the remote (torrent client) and local (filesystem) inventories in
//! SQLite and answers the read side of the orphan report.
//!
//! ## Overview
//!
//! This crate provides:
//! - Path normalization into comparable keys
//! - SQLite schema, migrations and connection pooling
//! - Atomic, batched replacement of either inventory
//! - Paginated, filtered and sorted reads over remote, local and orphan views
//! - Per-category and per-folder aggregation
//!
//! An orphan is a local file whose normalized key matches no remote file. The
//! orphan set is computed at read time and never stored.

pub mod db;
pub mod error;
pub mod models;
pub mod normalize;
pub mod query;
pub mod repositories;
pub mod store;

pub use db::{create_pool, create_test_pool, DatabaseConfig};
pub use error::{LibraryError, Result};
pub use models::{
    Category, CategoryStats, FolderStats, InventoryRow, InventoryStats, LocalFileRecord,
    LocalFileRow, RemoteFileRecord, RemoteFileRow, RemoteStats,
};
pub use normalize::{classify, normalized_key, PathNormalizer};
pub use query::{QueryOptions, SortDirection, Source};
pub use repositories::{InventoryRecord, InventoryRepository, Page, PageRequest};
pub use store::{
    InventoryWriter, LocalInventoryWriter, ReconciliationStore, StoreOptions, DEFAULT_BATCH_SIZE,
};
