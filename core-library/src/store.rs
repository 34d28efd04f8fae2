//! # Reconciliation Store
//!
//! Owns the connection pool and serializes writers. Reads go straight to the
//! pool and may run concurrently with each other and with a writer (WAL).
//!
//! A replace clears the table and inserts the new inventory in chunks inside
//! one transaction, so readers see either the previous inventory or the new
//! one once committed. Dropping an [`InventoryWriter`] without committing
//! rolls the replacement back.
//!
//! ```rust,ignore
//! let store = ReconciliationStore::open(DatabaseConfig::new("torrents.db"), StoreOptions::default()).await?;
//!
//! let mut writer = store.begin_replace::<LocalFileRecord>().await?;
//! writer.push(record).await?;
//! writer.commit().await?;
//!
//! let orphans = store.query(Source::Orphan, &QueryOptions::new()).await?;
//! ```

use std::marker::PhantomData;
use std::sync::Arc;

use sqlx::{Sqlite, SqlitePool, Transaction};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::db::{create_pool, DatabaseConfig};
use crate::error::{LibraryError, Result};
use crate::models::{
    FolderStats, InventoryRow, InventoryStats, LocalFileRecord, RemoteFileRecord,
};
use crate::normalize::PathNormalizer;
use crate::query::{QueryOptions, Source};
use crate::repositories::{
    InventoryRecord, InventoryRepository, Page, SqliteLocalFileRepository,
    SqliteOrphanRepository, SqliteRemoteFileRepository,
};

/// Default rows per INSERT statement.
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// Write-side settings for the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreOptions {
    pub batch_size: usize,
    pub normalizer: PathNormalizer,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            normalizer: PathNormalizer::default(),
        }
    }
}

impl StoreOptions {
    pub fn new(batch_size: usize, mount_prefix: impl Into<String>) -> Self {
        Self {
            batch_size,
            normalizer: PathNormalizer::new(mount_prefix),
        }
    }
}

/// Persistence and read API over both inventories.
#[derive(Debug, Clone)]
pub struct ReconciliationStore {
    pool: SqlitePool,
    options: StoreOptions,
    write_lock: Arc<Mutex<()>>,
    remote: SqliteRemoteFileRepository,
    local: SqliteLocalFileRepository,
    orphans: SqliteOrphanRepository,
}

impl ReconciliationStore {
    /// Wrap an already-migrated pool.
    pub fn new(pool: SqlitePool, options: StoreOptions) -> Result<Self> {
        if options.batch_size == 0 {
            return Err(LibraryError::invalid_input(
                "batch_size",
                "must be at least 1",
            ));
        }

        Ok(Self {
            remote: SqliteRemoteFileRepository::new(pool.clone()),
            local: SqliteLocalFileRepository::new(pool.clone()),
            orphans: SqliteOrphanRepository::new(pool.clone()),
            pool,
            options,
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    /// Create the pool, apply migrations and wrap it.
    pub async fn open(config: DatabaseConfig, options: StoreOptions) -> Result<Self> {
        let pool = create_pool(config).await?;
        Self::new(pool, options)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn normalizer(&self) -> &PathNormalizer {
        &self.options.normalizer
    }

    pub fn batch_size(&self) -> usize {
        self.options.batch_size
    }

    pub fn remote_files(&self) -> &SqliteRemoteFileRepository {
        &self.remote
    }

    pub fn local_files(&self) -> &SqliteLocalFileRepository {
        &self.local
    }

    pub fn orphans(&self) -> &SqliteOrphanRepository {
        &self.orphans
    }

    fn repository(&self, source: Source) -> &dyn InventoryRepository {
        match source {
            Source::Remote => &self.remote,
            Source::Local => &self.local,
            Source::Orphan => &self.orphans,
        }
    }

    // ------------------------------------------------------------------------
    // Writes
    // ------------------------------------------------------------------------

    /// Open a replacement of `R`'s table.
    ///
    /// Waits for any other writer, begins a transaction and clears the
    /// table inside it.
    pub async fn begin_replace<R: InventoryRecord>(&self) -> Result<InventoryWriter<R>> {
        let guard = Arc::clone(&self.write_lock).lock_owned().await;
        let mut tx = self.pool.begin().await?;

        sqlx::query(&format!("DELETE FROM {}", R::TABLE))
            .execute(&mut *tx)
            .await?;

        debug!(table = R::TABLE, "Cleared table for replacement");

        let chunk_size = self.options.batch_size.min(R::max_chunk());
        Ok(InventoryWriter {
            tx,
            _guard: guard,
            buffer: Vec::with_capacity(chunk_size),
            chunk_size,
            normalizer: self.options.normalizer.clone(),
            created_at: chrono::Utc::now().timestamp(),
            flushed: 0,
            _record: PhantomData,
        })
    }

    /// Streaming replacement of the local inventory.
    pub async fn begin_local_replace(&self) -> Result<InventoryWriter<LocalFileRecord>> {
        self.begin_replace().await
    }

    /// Replace the remote inventory with `records`.
    ///
    /// Returns the number of rows written. On cancellation the transaction is
    /// rolled back and the previous inventory stays in place.
    #[instrument(skip(self, records, cancel), fields(records = records.len()))]
    pub async fn replace_remote(
        &self,
        records: &[RemoteFileRecord],
        cancel: &CancellationToken,
    ) -> Result<u64> {
        self.replace_all(records, cancel).await
    }

    /// Replace the local inventory with `records`.
    #[instrument(skip(self, records, cancel), fields(records = records.len()))]
    pub async fn replace_local(
        &self,
        records: &[LocalFileRecord],
        cancel: &CancellationToken,
    ) -> Result<u64> {
        self.replace_all(records, cancel).await
    }

    async fn replace_all<R: InventoryRecord>(
        &self,
        records: &[R],
        cancel: &CancellationToken,
    ) -> Result<u64> {
        let mut writer = self.begin_replace::<R>().await?;

        for chunk in records.chunks(writer.chunk_size) {
            if cancel.is_cancelled() {
                writer.rollback().await?;
                return Err(LibraryError::Cancelled);
            }
            writer.extend(chunk.iter().cloned()).await?;
        }

        if cancel.is_cancelled() {
            writer.rollback().await?;
            return Err(LibraryError::Cancelled);
        }

        let written = writer.commit().await?;
        info!(table = R::TABLE, rows = written, "Inventory replaced");
        Ok(written)
    }

    // ------------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------------

    /// Paginated, sorted, filtered rows of one source.
    pub async fn query(&self, source: Source, options: &QueryOptions) -> Result<Page<InventoryRow>> {
        self.repository(source).query(options).await
    }

    /// Remote: totals. Local and orphan: per-category counts by label.
    pub async fn aggregate_stats(&self, source: Source) -> Result<InventoryStats> {
        match source {
            Source::Remote => Ok(InventoryStats::Remote(self.remote.stats().await?)),
            Source::Local => Ok(InventoryStats::ByCategory(
                self.local.category_stats().await?,
            )),
            Source::Orphan => Ok(InventoryStats::ByCategory(
                self.orphans.category_stats().await?,
            )),
        }
    }

    /// Count and size per first path segment, largest first.
    pub async fn folder_stats(&self, source: Source) -> Result<Vec<FolderStats>> {
        self.repository(source).folder_stats().await
    }

    /// Row count of one source.
    pub async fn count(&self, source: Source) -> Result<i64> {
        self.repository(source).count().await
    }

    /// Close the pool. Safe to call more than once.
    pub async fn close(&self) {
        if !self.pool.is_closed() {
            info!("Closing reconciliation store");
            self.pool.close().await;
        }
    }

    pub fn is_closed(&self) -> bool {
        self.pool.is_closed()
    }
}

/// An open, uncommitted replacement of one inventory table.
///
/// Holds the store's write lock until committed, rolled back or dropped.
pub struct InventoryWriter<R: InventoryRecord> {
    tx: Transaction<'static, Sqlite>,
    _guard: OwnedMutexGuard<()>,
    buffer: Vec<R>,
    chunk_size: usize,
    normalizer: PathNormalizer,
    created_at: i64,
    flushed: u64,
    _record: PhantomData<R>,
}

/// Writer for the local inventory.
pub type LocalInventoryWriter = InventoryWriter<LocalFileRecord>;

impl<R: InventoryRecord> InventoryWriter<R> {
    /// Buffer one record, flushing a full chunk.
    pub async fn push(&mut self, record: R) -> Result<()> {
        self.buffer.push(record);
        if self.buffer.len() >= self.chunk_size {
            self.flush().await?;
        }
        Ok(())
    }

    pub async fn extend<I>(&mut self, records: I) -> Result<()>
    where
        I: IntoIterator<Item = R>,
    {
        for record in records {
            self.push(record).await?;
        }
        Ok(())
    }

    /// Records accepted so far, flushed or buffered.
    pub fn written(&self) -> u64 {
        self.flushed + self.buffer.len() as u64
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    async fn flush(&mut self) -> Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }

        {
            let mut statement = R::insert_statement(&self.buffer, &self.normalizer, self.created_at);
            statement.build().execute(&mut *self.tx).await?;
        }

        self.flushed += self.buffer.len() as u64;
        debug!(table = R::TABLE, flushed = self.flushed, "Flushed inventory chunk");
        self.buffer.clear();
        Ok(())
    }

    /// Flush the remainder and commit. Returns the number of records written.
    pub async fn commit(mut self) -> Result<u64> {
        self.flush().await?;
        let written = self.flushed;
        self.tx.commit().await?;
        Ok(written)
    }

    /// Discard everything, leaving the previous inventory in place.
    pub async fn rollback(self) -> Result<()> {
        warn!(table = R::TABLE, "Rolling back inventory replacement");
        self.tx.rollback().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::create_test_pool;
    use crate::models::Category;

    async fn test_store(batch_size: usize) -> ReconciliationStore {
        let pool = create_test_pool().await.unwrap();
        ReconciliationStore::new(pool, StoreOptions::new(batch_size, "/mnt")).unwrap()
    }

    fn local(path: &str, size: i64) -> LocalFileRecord {
        LocalFileRecord {
            file_path: path.to_string(),
            file_name: path.rsplit('/').next().unwrap().to_string(),
            size,
            category: crate::normalize::classify(path),
        }
    }

    fn remote(hash: &str, path: &str, size: i64) -> RemoteFileRecord {
        RemoteFileRecord {
            collection_id: hash.to_string(),
            collection_name: format!("name-{}", hash),
            file_name: path.rsplit('/').next().unwrap().to_string(),
            file_path: path.to_string(),
            size,
        }
    }

    #[tokio::test]
    async fn test_zero_batch_size_rejected() {
        let pool = create_test_pool().await.unwrap();
        let result = ReconciliationStore::new(pool, StoreOptions::new(0, "/mnt"));
        assert!(matches!(result, Err(LibraryError::InvalidInput { .. })));
    }

    #[tokio::test]
    async fn test_local_round_trip_across_batches() {
        let store = test_store(3).await;
        let records: Vec<_> = (0..10)
            .map(|i| local(&format!("/mnt/movies/M{}/f{}.mkv", i, i), i * 10))
            .collect();

        let written = store
            .replace_local(&records, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(written, 10);

        let page = store
            .local_files()
            .query_rows(&QueryOptions::new().per_page(100))
            .await
            .unwrap();
        assert_eq!(page.total, 10);
        for (row, record) in page.items.iter().zip(&records) {
            assert_eq!(row.file_path, record.file_path.trim_start_matches("/mnt"));
            assert_eq!(row.file_name, record.file_name);
            assert_eq!(row.size, record.size);
            assert_eq!(row.category, Category::Movies);
        }
    }

    #[tokio::test]
    async fn test_local_upsert_keeps_single_row_per_path() {
        let store = test_store(10).await;
        let records = vec![
            local("/mnt/movies/A/f1.mkv", 100),
            local("/movies/A/f1.mkv", 150),
        ];

        store
            .replace_local(&records, &CancellationToken::new())
            .await
            .unwrap();

        let row = store
            .local_files()
            .find_by_path("/movies/A/f1.mkv")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(row.size, 150);
        assert_eq!(store.count(Source::Local).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_remote_duplicates_are_retained() {
        let store = test_store(10).await;
        let records = vec![
            remote("h1", "/dl/movies/A/f1.mkv", 100),
            remote("h2", "/dl/movies/A/f1.mkv", 100),
        ];

        store
            .replace_remote(&records, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(store.count(Source::Remote).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_replace_clears_previous_inventory() {
        let store = test_store(10).await;
        let cancel = CancellationToken::new();

        store
            .replace_local(&[local("/mnt/movies/A/old.mkv", 1)], &cancel)
            .await
            .unwrap();
        store
            .replace_local(&[local("/mnt/shows/B/new.mkv", 2)], &cancel)
            .await
            .unwrap();

        let page = store.query(Source::Local, &QueryOptions::new()).await.unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].file_name(), "new.mkv");
    }

    #[tokio::test]
    async fn test_cancelled_replace_rolls_back() {
        let store = test_store(2).await;
        store
            .replace_local(&[local("/mnt/movies/A/keep.mkv", 1)], &CancellationToken::new())
            .await
            .unwrap();

        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = store
            .replace_local(&[local("/mnt/shows/B/new.mkv", 2)], &cancel)
            .await;

        assert!(matches!(result, Err(LibraryError::Cancelled)));
        let page = store.query(Source::Local, &QueryOptions::new()).await.unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].file_name(), "keep.mkv");
    }

    #[tokio::test]
    async fn test_dropped_writer_rolls_back() {
        let store = test_store(1).await;
        store
            .replace_local(&[local("/mnt/movies/A/keep.mkv", 1)], &CancellationToken::new())
            .await
            .unwrap();

        {
            let mut writer = store.begin_local_replace().await.unwrap();
            writer.push(local("/mnt/shows/B/partial.mkv", 2)).await.unwrap();
            assert_eq!(writer.written(), 1);
        }

        let page = store.query(Source::Local, &QueryOptions::new()).await.unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].file_name(), "keep.mkv");
    }

    #[tokio::test]
    async fn test_orphan_scenario() {
        let store = test_store(100).await;
        let cancel = CancellationToken::new();

        store
            .replace_local(
                &[
                    local("/mnt/movies/A/f1.mkv", 100),
                    local("/mnt/shows/B/f2.mkv", 200),
                ],
                &cancel,
            )
            .await
            .unwrap();
        store
            .replace_remote(&[remote("h1", "/movies/A/f1.mkv", 100)], &cancel)
            .await
            .unwrap();

        let orphans = store
            .orphans()
            .query_rows(&QueryOptions::new())
            .await
            .unwrap();
        assert_eq!(orphans.total, 1);
        assert_eq!(orphans.items[0].file_path, "/shows/B/f2.mkv");
        assert_eq!(orphans.items[0].size, 200);
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let store = test_store(10).await;
        store.close().await;
        store.close().await;
        assert!(store.is_closed());
    }
}
