//! Remote file repository

use async_trait::async_trait;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

use crate::error::Result;
use crate::models::{FolderStats, InventoryRow, RemoteFileRecord, RemoteFileRow, RemoteStats};
use crate::normalize::{search_text, PathNormalizer};
use crate::query::{QueryOptions, Source};
use crate::repositories::{folder_stats_for, query_page, InventoryRecord, InventoryRepository, Page};

impl InventoryRecord for RemoteFileRecord {
    const TABLE: &'static str = "remote_files";
    const COLUMNS: usize = 8;

    fn insert_statement<'a>(
        records: &'a [Self],
        normalizer: &PathNormalizer,
        created_at: i64,
    ) -> QueryBuilder<'a, Sqlite> {
        let mut builder = QueryBuilder::new(
            "INSERT INTO remote_files \
             (collection_id, collection_name, file_name, file_path, normalized_key, search_text, size, created_at) ",
        );
        builder.push_values(records, |mut row, record| {
            row.push_bind(&record.collection_id)
                .push_bind(&record.collection_name)
                .push_bind(&record.file_name)
                .push_bind(&record.file_path)
                .push_bind(normalizer.remote_key(&record.file_path))
                .push_bind(search_text(&record.file_name, &record.file_path))
                .push_bind(record.size)
                .push_bind(created_at);
        });
        builder
    }
}

/// SQLite implementation for the remote inventory
#[derive(Debug, Clone)]
pub struct SqliteRemoteFileRepository {
    pool: SqlitePool,
}

impl SqliteRemoteFileRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Typed variant of [`InventoryRepository::query`].
    pub async fn query_rows(&self, options: &QueryOptions) -> Result<Page<RemoteFileRow>> {
        query_page(&self.pool, Source::Remote, options).await
    }

    /// File count, distinct collection count and total size.
    pub async fn stats(&self) -> Result<RemoteStats> {
        let stats = sqlx::query_as::<_, RemoteStats>(
            "SELECT COUNT(*) AS total_files, \
                    COUNT(DISTINCT collection_id) AS total_collections, \
                    COALESCE(SUM(size), 0) AS total_size \
             FROM remote_files",
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(stats)
    }
}

#[async_trait]
impl InventoryRepository for SqliteRemoteFileRepository {
    fn source(&self) -> Source {
        Source::Remote
    }

    async fn query(&self, options: &QueryOptions) -> Result<Page<InventoryRow>> {
        Ok(self.query_rows(options).await?.map(InventoryRow::Remote))
    }

    async fn count(&self) -> Result<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM remote_files")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn folder_stats(&self) -> Result<Vec<FolderStats>> {
        folder_stats_for(&self.pool, Source::Remote).await
    }
}
