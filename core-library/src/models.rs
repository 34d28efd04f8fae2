//! Domain models for the two inventories and their aggregates.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;

use crate::error::LibraryError;

// ============================================================================
// Category
// ============================================================================

/// Media category of a local file, derived from its path segments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Category {
    #[serde(rename = "4k")]
    FourK,
    #[serde(rename = "movies")]
    Movies,
    #[serde(rename = "shows")]
    Shows,
    #[serde(rename = "unknown")]
    Unknown,
}

impl Category {
    /// Labelled categories in classification priority order.
    pub const LABELLED: [Category; 3] = [Category::FourK, Category::Movies, Category::Shows];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::FourK => "4k",
            Category::Movies => "movies",
            Category::Shows => "shows",
            Category::Unknown => "unknown",
        }
    }

    /// The label wrapped in separators, e.g. `/movies/`.
    pub fn marker(&self) -> Option<&'static str> {
        match self {
            Category::FourK => Some("/4k/"),
            Category::Movies => Some("/movies/"),
            Category::Shows => Some("/shows/"),
            Category::Unknown => None,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = LibraryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "4k" => Ok(Category::FourK),
            "movies" => Ok(Category::Movies),
            "shows" => Ok(Category::Shows),
            "unknown" => Ok(Category::Unknown),
            other => Err(LibraryError::invalid_input(
                "category",
                format!("unknown category '{}'", other),
            )),
        }
    }
}

impl TryFrom<String> for Category {
    type Error = LibraryError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

// ============================================================================
// Ingestion Records
// ============================================================================

/// A file reported by the remote, before persistence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteFileRecord {
    /// Collection identifier (torrent hash); not unique per record
    pub collection_id: String,
    pub collection_name: String,
    pub file_name: String,
    /// save location / collection name / relative name
    pub file_path: String,
    pub size: i64,
}

/// A file discovered on the local tree, before persistence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalFileRecord {
    pub file_path: String,
    pub file_name: String,
    pub size: i64,
    pub category: Category,
}

// ============================================================================
// Stored Rows
// ============================================================================

/// A persisted remote file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct RemoteFileRow {
    #[serde(skip_serializing)]
    pub id: i64,
    #[serde(rename = "torrent_hash")]
    pub collection_id: String,
    #[serde(rename = "torrent_name")]
    pub collection_name: String,
    pub file_name: String,
    pub file_path: String,
    #[serde(skip_serializing)]
    pub normalized_key: String,
    pub size: i64,
    #[serde(skip_serializing)]
    pub created_at: i64,
}

/// A persisted local file. Orphan queries return this shape too.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct LocalFileRow {
    #[serde(skip_serializing)]
    pub id: i64,
    /// Stored with the mount prefix removed
    pub file_path: String,
    pub file_name: String,
    #[serde(skip_serializing)]
    pub normalized_key: String,
    pub size: i64,
    #[sqlx(try_from = "String")]
    pub category: Category,
    #[serde(skip_serializing)]
    pub created_at: i64,
}

/// One row from any inventory query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum InventoryRow {
    Remote(RemoteFileRow),
    Local(LocalFileRow),
}

impl InventoryRow {
    pub fn file_path(&self) -> &str {
        match self {
            InventoryRow::Remote(row) => &row.file_path,
            InventoryRow::Local(row) => &row.file_path,
        }
    }

    pub fn file_name(&self) -> &str {
        match self {
            InventoryRow::Remote(row) => &row.file_name,
            InventoryRow::Local(row) => &row.file_name,
        }
    }

    pub fn size(&self) -> i64 {
        match self {
            InventoryRow::Remote(row) => row.size,
            InventoryRow::Local(row) => row.size,
        }
    }
}

// ============================================================================
// Aggregates
// ============================================================================

/// Totals over the remote inventory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, FromRow)]
pub struct RemoteStats {
    pub total_files: i64,
    #[serde(rename = "total_torrents")]
    pub total_collections: i64,
    pub total_size: i64,
}

/// Count and size for one category label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct CategoryStats {
    pub category: String,
    pub file_count: i64,
    pub total_size: i64,
}

/// Count and size for one top-level folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct FolderStats {
    pub folder: String,
    pub file_count: i64,
    pub total_size: i64,
}

/// Result of `aggregate_stats`, shaped per source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum InventoryStats {
    Remote(RemoteStats),
    ByCategory(Vec<CategoryStats>),
}
