//! # Remote Inventory Fetcher
//!
//! Lists every collection on the remote and retrieves each collection's files
//! with at most `max_workers` requests in flight.
//!
//! A failing collection is recorded as a [`CollectionFetchError`] and the
//! others continue. A failing listing aborts the fetch. On cancellation the
//! in-flight requests are dropped and no new ones start.

use std::sync::Arc;

use bridge_traits::error::BridgeError;
use bridge_traits::remote::{RemoteCollection, RemoteCollectionFile, RemoteCollectionSource};
use core_library::RemoteFileRecord;
use futures::stream::{self, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::error::CollectionFetchError;
use crate::{Result, SyncError};

/// Default number of concurrent per-collection requests.
pub const DEFAULT_MAX_WORKERS: usize = 10;

/// Everything one fetch produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteInventory {
    /// Union of the files of every collection that was fetched successfully
    pub records: Vec<RemoteFileRecord>,
    pub errors: Vec<CollectionFetchError>,
    /// Number of collections the listing returned
    pub collections: usize,
}

#[derive(Clone)]
pub struct RemoteInventoryFetcher {
    source: Arc<dyn RemoteCollectionSource>,
    max_workers: usize,
}

impl RemoteInventoryFetcher {
    /// # Errors
    ///
    /// Returns a validation error if `max_workers` is zero.
    pub fn new(source: Arc<dyn RemoteCollectionSource>, max_workers: usize) -> Result<Self> {
        if max_workers == 0 {
            return Err(SyncError::validation(
                "max_workers",
                "must be at least 1",
            ));
        }
        Ok(Self {
            source,
            max_workers,
        })
    }

    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    /// Establish the remote session.
    pub async fn authenticate(&self) -> Result<()> {
        self.source.authenticate().await.map_err(|e| match e {
            BridgeError::AuthenticationFailed(msg) => SyncError::Authentication(msg),
            other => SyncError::Authentication(other.to_string()),
        })
    }

    pub async fn list_collections(&self) -> Result<Vec<RemoteCollection>> {
        self.source
            .list_collections()
            .await
            .map_err(|e| SyncError::CollectionListing(e.to_string()))
    }

    /// Files of one collection as inventory records.
    pub async fn files_of(
        &self,
        collection: &RemoteCollection,
    ) -> std::result::Result<Vec<RemoteFileRecord>, CollectionFetchError> {
        let files = self
            .source
            .files_of(&collection.id)
            .await
            .map_err(|e| CollectionFetchError {
                collection_id: collection.id.clone(),
                collection_name: collection.name.clone(),
                message: e.to_string(),
            })?;

        Ok(files
            .into_iter()
            .map(|file| to_record(collection, file))
            .collect())
    }

    /// List, then fetch every collection's files.
    pub async fn fetch_all(&self, cancel: &CancellationToken) -> Result<RemoteInventory> {
        self.fetch_all_with_progress(cancel, |_, _| {}).await
    }

    /// Like [`fetch_all`](Self::fetch_all), calling `on_progress(done, total)`
    /// after each collection finishes, successfully or not.
    #[instrument(skip(self, cancel, on_progress), fields(max_workers = self.max_workers))]
    pub async fn fetch_all_with_progress<F>(
        &self,
        cancel: &CancellationToken,
        on_progress: F,
    ) -> Result<RemoteInventory>
    where
        F: Fn(u64, u64) + Send + Sync,
    {
        let collections = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(SyncError::Cancelled),
            listed = self.list_collections() => listed?,
        };

        let total = collections.len() as u64;
        info!(collections = total, "Fetching remote collection files");

        let mut inventory = RemoteInventory {
            collections: collections.len(),
            ..RemoteInventory::default()
        };

        let fetches = stream::iter(collections)
            .map(|collection| async move {
                let result = self.files_of(&collection).await;
                (collection, result)
            })
            .buffer_unordered(self.max_workers);
        tokio::pin!(fetches);

        let mut done = 0u64;
        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!(done, total, "Remote fetch cancelled");
                    return Err(SyncError::Cancelled);
                }
                next = fetches.next() => next,
            };

            let Some((collection, result)) = next else {
                break;
            };

            match result {
                Ok(records) => {
                    debug!(
                        collection = %collection.id,
                        files = records.len(),
                        "Fetched collection files"
                    );
                    inventory.records.extend(records);
                }
                Err(error) => {
                    warn!(error = %error, "Failed to fetch collection files");
                    inventory.errors.push(error);
                }
            }

            done += 1;
            on_progress(done, total);
        }

        info!(
            files = inventory.records.len(),
            errors = inventory.errors.len(),
            "Remote fetch finished"
        );
        Ok(inventory)
    }
}

/// `save_location / collection name / relative name`, joined with `/`.
pub fn synthesize_path(save_location: &str, collection_name: &str, relative_name: &str) -> String {
    let mut path = String::with_capacity(
        save_location.len() + collection_name.len() + relative_name.len() + 2,
    );
    if save_location.starts_with('/') {
        path.push('/');
    }
    let segments = [save_location, collection_name, relative_name]
        .into_iter()
        .flat_map(|part| part.split('/'))
        .filter(|segment| !segment.is_empty() && *segment != ".");
    for (i, segment) in segments.enumerate() {
        if i > 0 {
            path.push('/');
        }
        path.push_str(segment);
    }
    path
}

fn to_record(collection: &RemoteCollection, file: RemoteCollectionFile) -> RemoteFileRecord {
    let file_path = synthesize_path(
        &collection.save_location,
        &collection.name,
        &file.relative_name,
    );
    let file_name = file_path
        .rsplit('/')
        .next()
        .unwrap_or_default()
        .to_string();

    RemoteFileRecord {
        collection_id: collection.id.clone(),
        collection_name: collection.name.clone(),
        file_name,
        file_path,
        size: file.size,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_synthesize_path() {
        assert_eq!(
            synthesize_path("/downloads/movies", "Alpha", "alpha.mkv"),
            "/downloads/movies/Alpha/alpha.mkv"
        );
        assert_eq!(
            synthesize_path("/downloads/movies/", "Alpha", "sub/alpha.mkv"),
            "/downloads/movies/Alpha/sub/alpha.mkv"
        );
        assert_eq!(synthesize_path("", "Alpha", "alpha.mkv"), "Alpha/alpha.mkv");
    }

    #[test]
    fn test_to_record_takes_last_segment_as_name() {
        let collection = RemoteCollection {
            id: "abc".to_string(),
            name: "Gamma".to_string(),
            size: 10,
            save_location: "/downloads/shows".to_string(),
        };
        let record = to_record(
            &collection,
            RemoteCollectionFile {
                relative_name: "Season 1/s01e01.mkv".to_string(),
                size: 10,
            },
        );

        assert_eq!(record.collection_id, "abc");
        assert_eq!(record.collection_name, "Gamma");
        assert_eq!(record.file_name, "s01e01.mkv");
        assert_eq!(record.file_path, "/downloads/shows/Gamma/Season 1/s01e01.mkv");
    }
}
