//! Local file repository

use async_trait::async_trait;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

use crate::error::Result;
use crate::models::{CategoryStats, FolderStats, InventoryRow, LocalFileRecord, LocalFileRow};
use crate::normalize::{search_text, PathNormalizer};
use crate::query::{build_category_stats_sql, QueryOptions, Source};
use crate::repositories::{folder_stats_for, query_page, InventoryRecord, InventoryRepository, Page};

impl InventoryRecord for LocalFileRecord {
    const TABLE: &'static str = "local_files";
    const COLUMNS: usize = 7;

    /// Upserts by stored path. The stored path has the mount prefix removed,
    /// so `/mnt/x` and `/x` land on the same row.
    fn insert_statement<'a>(
        records: &'a [Self],
        normalizer: &PathNormalizer,
        created_at: i64,
    ) -> QueryBuilder<'a, Sqlite> {
        let mut builder = QueryBuilder::new(
            "INSERT INTO local_files \
             (file_path, file_name, normalized_key, search_text, size, category, created_at) ",
        );
        builder.push_values(records, |mut row, record| {
            let stored_path = normalizer.strip_mount_prefix(&record.file_path);
            let key = crate::normalize::normalized_key(&stored_path);
            let folded = search_text(&record.file_name, &stored_path);
            row.push_bind(stored_path)
                .push_bind(&record.file_name)
                .push_bind(key)
                .push_bind(folded)
                .push_bind(record.size)
                .push_bind(record.category.as_str())
                .push_bind(created_at);
        });
        builder.push(
            " ON CONFLICT(file_path) DO UPDATE SET \
               file_name = excluded.file_name, \
               normalized_key = excluded.normalized_key, \
               search_text = excluded.search_text, \
               size = excluded.size, \
               category = excluded.category",
        );
        builder
    }
}

/// SQLite implementation for the local inventory
#[derive(Debug, Clone)]
pub struct SqliteLocalFileRepository {
    pool: SqlitePool,
}

impl SqliteLocalFileRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn query_rows(&self, options: &QueryOptions) -> Result<Page<LocalFileRow>> {
        query_page(&self.pool, Source::Local, options).await
    }

    /// Look up one row by stored (mount-stripped) path.
    pub async fn find_by_path(&self, file_path: &str) -> Result<Option<LocalFileRow>> {
        let row = sqlx::query_as::<_, LocalFileRow>(
            "SELECT id, file_path, file_name, normalized_key, size, category, created_at \
             FROM local_files WHERE file_path = ?",
        )
        .bind(file_path)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    /// Count and size per category, ordered by label.
    pub async fn category_stats(&self) -> Result<Vec<CategoryStats>> {
        let sql = build_category_stats_sql(Source::Local);
        let stats = sqlx::query_as::<_, CategoryStats>(&sql)
            .fetch_all(&self.pool)
            .await?;
        Ok(stats)
    }
}

#[async_trait]
impl InventoryRepository for SqliteLocalFileRepository {
    fn source(&self) -> Source {
        Source::Local
    }

    async fn query(&self, options: &QueryOptions) -> Result<Page<InventoryRow>> {
        Ok(self.query_rows(options).await?.map(InventoryRow::Local))
    }

    async fn count(&self) -> Result<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM local_files")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn folder_stats(&self) -> Result<Vec<FolderStats>> {
        folder_stats_for(&self.pool, Source::Local).await
    }
}
