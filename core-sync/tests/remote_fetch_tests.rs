//! Integration tests for the remote fan-out and the local scan stream
//!
//! These tests verify:
//! - The worker ceiling is never exceeded
//! - A failing collection is reported without losing the others
//! - Cancellation abandons the fan-out
//! - A cancelled scan delivers exactly what was consumed before the cancel

use async_trait::async_trait;
use bridge_traits::error::{BridgeError, Result as BridgeResult};
use bridge_traits::remote::{RemoteCollection, RemoteCollectionFile, RemoteCollectionSource};
use core_sync::{LocalTreeScanner, RemoteInventoryFetcher, SyncError};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

// ============================================================================
// Fake Remote
// ============================================================================

/// Remote with `count` collections of two files each. Listing a collection's
/// files takes `delay`; collections named in `failing` return an error.
struct FakeRemote {
    count: usize,
    failing: HashSet<String>,
    delay: Duration,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    started: AtomicUsize,
}

impl FakeRemote {
    fn new(count: usize, delay: Duration) -> Self {
        Self {
            count,
            failing: HashSet::new(),
            delay,
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            started: AtomicUsize::new(0),
        }
    }

    fn failing(mut self, id: &str) -> Self {
        self.failing.insert(id.to_string());
        self
    }
}

#[async_trait]
impl RemoteCollectionSource for FakeRemote {
    async fn authenticate(&self) -> BridgeResult<()> {
        Ok(())
    }

    async fn list_collections(&self) -> BridgeResult<Vec<RemoteCollection>> {
        Ok((1..=self.count)
            .map(|i| RemoteCollection {
                id: format!("hash{}", i),
                name: format!("Collection {}", i),
                size: 20,
                save_location: "/downloads/movies".to_string(),
            })
            .collect())
    }

    async fn files_of(&self, collection_id: &str) -> BridgeResult<Vec<RemoteCollectionFile>> {
        self.started.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        tokio::time::sleep(self.delay).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.failing.contains(collection_id) {
            return Err(BridgeError::OperationFailed("status 500".to_string()));
        }
        Ok(vec![
            RemoteCollectionFile {
                relative_name: "a.mkv".to_string(),
                size: 10,
            },
            RemoteCollectionFile {
                relative_name: "b.mkv".to_string(),
                size: 10,
            },
        ])
    }
}

// ============================================================================
// Fan-out
// ============================================================================

#[tokio::test]
async fn failing_collection_is_reported_and_others_survive() {
    let remote = Arc::new(FakeRemote::new(5, Duration::from_millis(20)).failing("hash3"));
    let fetcher = RemoteInventoryFetcher::new(remote.clone(), 2).unwrap();

    let inventory = fetcher.fetch_all(&CancellationToken::new()).await.unwrap();

    assert_eq!(inventory.collections, 5);
    assert_eq!(inventory.records.len(), 8);
    assert_eq!(inventory.errors.len(), 1);
    assert_eq!(inventory.errors[0].collection_id, "hash3");
    assert_eq!(inventory.errors[0].collection_name, "Collection 3");

    let ids: HashSet<_> = inventory
        .records
        .iter()
        .map(|r| r.collection_id.as_str())
        .collect();
    assert_eq!(ids, HashSet::from(["hash1", "hash2", "hash4", "hash5"]));

    assert!(remote.peak.load(Ordering::SeqCst) <= 2);
}

#[tokio::test]
async fn ceiling_is_reached_but_not_exceeded() {
    let remote = Arc::new(FakeRemote::new(12, Duration::from_millis(30)));
    let fetcher = RemoteInventoryFetcher::new(remote.clone(), 4).unwrap();

    fetcher.fetch_all(&CancellationToken::new()).await.unwrap();

    assert_eq!(remote.peak.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn records_carry_synthesized_paths() {
    let remote = Arc::new(FakeRemote::new(1, Duration::ZERO));
    let fetcher = RemoteInventoryFetcher::new(remote, 1).unwrap();

    let mut inventory = fetcher.fetch_all(&CancellationToken::new()).await.unwrap();
    inventory.records.sort_by(|a, b| a.file_path.cmp(&b.file_path));

    assert_eq!(
        inventory.records[0].file_path,
        "/downloads/movies/Collection 1/a.mkv"
    );
    assert_eq!(inventory.records[0].file_name, "a.mkv");
}

#[tokio::test]
async fn progress_is_reported_per_collection() {
    let remote = Arc::new(FakeRemote::new(3, Duration::ZERO).failing("hash2"));
    let fetcher = RemoteInventoryFetcher::new(remote, 2).unwrap();
    let calls = std::sync::Mutex::new(Vec::new());

    fetcher
        .fetch_all_with_progress(&CancellationToken::new(), |done, total| {
            calls.lock().unwrap().push((done, total));
        })
        .await
        .unwrap();

    assert_eq!(calls.into_inner().unwrap(), vec![(1, 3), (2, 3), (3, 3)]);
}

#[tokio::test]
async fn cancellation_abandons_fan_out() {
    let remote = Arc::new(FakeRemote::new(20, Duration::from_millis(200)));
    let fetcher = RemoteInventoryFetcher::new(remote.clone(), 2).unwrap();
    let cancel = CancellationToken::new();

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let result = fetcher.fetch_all(&cancel).await;

    assert!(matches!(result, Err(SyncError::Cancelled)));
    assert_eq!(remote.started.load(Ordering::SeqCst), 2);
}

#[test]
fn zero_workers_rejected() {
    let remote = Arc::new(FakeRemote::new(1, Duration::ZERO));
    let result = RemoteInventoryFetcher::new(remote, 0);
    assert!(matches!(result, Err(SyncError::Validation { .. })));
}

// ============================================================================
// Scan cancellation
// ============================================================================

#[tokio::test]
async fn cancel_after_k_files_delivers_exactly_k() {
    let dir = tempfile::tempdir().unwrap();
    for i in 0..50 {
        let path = dir.path().join("movies").join(format!("f{:02}.mkv", i));
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, b"x").unwrap();
    }

    const K: usize = 7;
    let cancel = CancellationToken::new();
    let mut stream = LocalTreeScanner::new(dir.path(), 4).scan(cancel.clone());

    let mut delivered = Vec::new();
    while let Some(record) = stream.next().await {
        delivered.push(record);
        if delivered.len() == K {
            cancel.cancel();
        }
    }

    assert_eq!(delivered.len(), K);
    assert!(matches!(stream.finish().await, Err(SyncError::Cancelled)));
}
