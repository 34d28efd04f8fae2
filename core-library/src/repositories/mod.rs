//! # Repository Pattern Implementation
//!
//! One repository per inventory view:
//!
//! - `SqliteRemoteFileRepository` - files reported by the torrent client
//! - `SqliteLocalFileRepository` - files found on the local tree
//! - `SqliteOrphanRepository` - local files with no remote counterpart,
//!   computed by anti-join at read time and never materialized
//!
//! All three implement [`InventoryRepository`] for paginated reads and
//! folder aggregation. Writes go through [`InventoryRecord`], which knows how
//! to render a chunk of records as one multi-row `INSERT`.

use async_trait::async_trait;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

use crate::error::Result;
use crate::models::{FolderStats, InventoryRow};
use crate::normalize::PathNormalizer;
use crate::query::{build_folder_stats_sql, build_query_spec, QueryOptions, Source};

pub mod local_files;
pub mod orphans;
pub mod pagination;
pub mod remote_files;

pub use local_files::SqliteLocalFileRepository;
pub use orphans::SqliteOrphanRepository;
pub use pagination::{Page, PageRequest, DEFAULT_PER_PAGE, MAX_PER_PAGE};
pub use remote_files::SqliteRemoteFileRepository;

/// SQLite's default cap on bound parameters per statement.
pub(crate) const SQLITE_MAX_VARIABLES: usize = 32_766;

/// Read access shared by every inventory view.
#[async_trait]
pub trait InventoryRepository: Send + Sync {
    /// The view this repository reads.
    fn source(&self) -> Source;

    /// Filtered, sorted page of rows plus the pre-pagination total.
    ///
    /// A page past the end yields no items and no error.
    async fn query(&self, options: &QueryOptions) -> Result<Page<InventoryRow>>;

    /// Number of rows in the view.
    async fn count(&self) -> Result<i64>;

    /// Count and size per first path segment, largest first.
    ///
    /// Leading `/` is ignored, so `/movies/A/f.mkv` counts under `movies`
    /// rather than under an empty folder. A path with no further separator
    /// is its own folder.
    async fn folder_stats(&self) -> Result<Vec<FolderStats>>;
}

/// A record type that can be bulk-inserted into its inventory table.
pub trait InventoryRecord: Clone + Send + Sync + 'static {
    /// Destination table.
    const TABLE: &'static str;

    /// Bound parameters per row.
    const COLUMNS: usize;

    /// Render `records` as a single INSERT statement.
    fn insert_statement<'a>(
        records: &'a [Self],
        normalizer: &PathNormalizer,
        created_at: i64,
    ) -> QueryBuilder<'a, Sqlite>;

    /// Largest chunk that stays under the parameter cap.
    fn max_chunk() -> usize {
        (SQLITE_MAX_VARIABLES / Self::COLUMNS).max(1)
    }
}

/// Shared implementation of the paginated read for any source.
pub(crate) async fn query_page<T>(
    pool: &SqlitePool,
    source: Source,
    options: &QueryOptions,
) -> Result<Page<T>>
where
    T: for<'r> sqlx::FromRow<'r, sqlx::sqlite::SqliteRow> + Send + Unpin,
{
    let spec = build_query_spec(source, options);

    let mut count_query = sqlx::query_as::<_, (i64,)>(&spec.count_sql);
    for bind in &spec.binds {
        count_query = count_query.bind(bind);
    }
    let (total,) = count_query.fetch_one(pool).await?;

    let mut select_query = sqlx::query_as::<_, T>(&spec.select_sql);
    for bind in &spec.binds {
        select_query = select_query.bind(bind);
    }
    let items = select_query
        .bind(spec.page.limit())
        .bind(spec.page.offset())
        .fetch_all(pool)
        .await?;

    Ok(Page::new(items, total.max(0) as u64, spec.page))
}

pub(crate) async fn folder_stats_for(
    pool: &SqlitePool,
    source: Source,
) -> Result<Vec<FolderStats>> {
    let sql = build_folder_stats_sql(source);
    let stats = sqlx::query_as::<_, FolderStats>(&sql)
        .fetch_all(pool)
        .await?;
    Ok(stats)
}
