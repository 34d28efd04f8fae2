//! # Local Tree Scanner
//!
//! Walks a directory tree on a blocking worker thread and hands discovered
//! files to the async side through a bounded channel.
//!
//! - Depth-first; each reachable regular file is produced once
//! - Entries whose name starts with `.` are skipped, and hidden directories
//!   are not descended into
//! - Any I/O error aborts the walk and becomes the terminal outcome; records
//!   already delivered stay valid
//! - Cancellation stops the walk between entries and is reported as
//!   [`SyncError::Cancelled`]
//!
//! ```rust,ignore
//! let mut stream = LocalTreeScanner::new("/mnt", 1024).scan(cancel.clone());
//! while let Some(record) = stream.next().await {
//!     writer.push(record).await?;
//! }
//! let summary = stream.finish().await?;
//! ```

use std::path::{Path, PathBuf};

use core_library::{classify, LocalFileRecord};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use walkdir::{DirEntry, WalkDir};

use crate::{Result, SyncError};

/// Default capacity of the scan handoff channel.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// Totals reported by the walker when it ends normally.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanSummary {
    pub files: u64,
    pub bytes: u64,
}

/// Scanner rooted at one directory
#[derive(Debug, Clone)]
pub struct LocalTreeScanner {
    root: PathBuf,
    channel_capacity: usize,
}

impl LocalTreeScanner {
    pub fn new(root: impl Into<PathBuf>, channel_capacity: usize) -> Self {
        Self {
            root: root.into(),
            channel_capacity: channel_capacity.max(1),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Start walking. Must be called from within a Tokio runtime.
    pub fn scan(&self, cancel: CancellationToken) -> ScanStream {
        let (tx, rx) = mpsc::channel(self.channel_capacity);
        let root = self.root.clone();
        let walker_cancel = cancel.clone();

        info!(root = %root.display(), "Starting local scan");
        let handle = tokio::task::spawn_blocking(move || walk(&root, &tx, &walker_cancel));

        ScanStream { rx, handle, cancel }
    }
}

/// Lazy sequence of scanned records plus one terminal outcome.
pub struct ScanStream {
    rx: mpsc::Receiver<LocalFileRecord>,
    handle: JoinHandle<Result<ScanSummary>>,
    cancel: CancellationToken,
}

impl ScanStream {
    /// Next record, or `None` once the walk ended or the scan was cancelled.
    ///
    /// Nothing is delivered after cancellation, even if the walker had
    /// already queued more records.
    pub async fn next(&mut self) -> Option<LocalFileRecord> {
        if self.cancel.is_cancelled() {
            return None;
        }
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            record = self.rx.recv() => record,
        }
    }

    /// Stop consuming and wait for the walker's terminal outcome.
    pub async fn finish(self) -> Result<ScanSummary> {
        let ScanStream { rx, handle, cancel } = self;
        // Unblocks a walker parked on a full channel.
        drop(rx);

        let outcome = handle
            .await
            .map_err(|e| SyncError::Internal(format!("scan worker panicked: {}", e)))?;

        if cancel.is_cancelled() {
            return Err(SyncError::Cancelled);
        }
        outcome
    }
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry
            .file_name()
            .to_str()
            .is_some_and(|name| name.starts_with('.'))
}

fn walk(
    root: &Path,
    tx: &mpsc::Sender<LocalFileRecord>,
    cancel: &CancellationToken,
) -> Result<ScanSummary> {
    let mut summary = ScanSummary::default();

    let entries = WalkDir::new(root)
        .follow_links(true)
        .into_iter()
        .filter_entry(|entry| !is_hidden(entry));

    for entry in entries {
        if cancel.is_cancelled() {
            debug!(files = summary.files, "Local scan cancelled");
            return Err(SyncError::Cancelled);
        }

        let entry = entry.map_err(|e| {
            let path = e
                .path()
                .unwrap_or(root)
                .to_string_lossy()
                .into_owned();
            warn!(path = %path, error = %e, "Local scan aborted");
            SyncError::Scan {
                path,
                message: e.to_string(),
            }
        })?;

        if !entry.file_type().is_file() {
            continue;
        }

        let metadata = entry.metadata().map_err(|e| SyncError::Scan {
            path: entry.path().to_string_lossy().into_owned(),
            message: e.to_string(),
        })?;

        let file_path = entry.path().to_string_lossy().into_owned();
        let record = LocalFileRecord {
            category: classify(&file_path),
            file_name: entry.file_name().to_string_lossy().into_owned(),
            size: i64::try_from(metadata.len()).unwrap_or(i64::MAX),
            file_path,
        };

        if tx.blocking_send(record).is_err() {
            // Receiver gone: the consumer stopped early.
            return Err(SyncError::Cancelled);
        }

        summary.files += 1;
        summary.bytes += metadata.len();
    }

    info!(files = summary.files, bytes = summary.bytes, "Local scan finished");
    Ok(summary)
}
