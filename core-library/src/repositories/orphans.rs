//! Orphan view: local rows whose normalized key matches no remote row.

use async_trait::async_trait;
use sqlx::SqlitePool;

use crate::error::Result;
use crate::models::{CategoryStats, FolderStats, InventoryRow, LocalFileRow};
use crate::query::{build_category_stats_sql, QueryOptions, Source};
use crate::repositories::{folder_stats_for, query_page, InventoryRepository, Page};

#[derive(Debug, Clone)]
pub struct SqliteOrphanRepository {
    pool: SqlitePool,
}

impl SqliteOrphanRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn query_rows(&self, options: &QueryOptions) -> Result<Page<LocalFileRow>> {
        query_page(&self.pool, Source::Orphan, options).await
    }

    pub async fn category_stats(&self) -> Result<Vec<CategoryStats>> {
        let sql = build_category_stats_sql(Source::Orphan);
        let stats = sqlx::query_as::<_, CategoryStats>(&sql)
            .fetch_all(&self.pool)
            .await?;
        Ok(stats)
    }
}

#[async_trait]
impl InventoryRepository for SqliteOrphanRepository {
    fn source(&self) -> Source {
        Source::Orphan
    }

    async fn query(&self, options: &QueryOptions) -> Result<Page<InventoryRow>> {
        Ok(self.query_rows(options).await?.map(InventoryRow::Local))
    }

    async fn count(&self) -> Result<i64> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM local_files l \
             WHERE NOT EXISTS (SELECT 1 FROM remote_files r WHERE r.normalized_key = l.normalized_key)",
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    async fn folder_stats(&self) -> Result<Vec<FolderStats>> {
        folder_stats_for(&self.pool, Source::Orphan).await
    }
}
