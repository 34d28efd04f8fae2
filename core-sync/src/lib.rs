//! # Sync Module
//!
//! Runs reconciliation passes between the torrent client and the local tree.
//!
//! ## Components
//!
//! - **Sync Job State Machine** (`job`): phases of one pass with validated transitions
//! - **Local Tree Scanner** (`scanner`): blocking directory walk streamed over a bounded channel
//! - **Remote Inventory Fetcher** (`remote`): collection listing with bounded fan-out
//! - **Sync Coordinator** (`coordinator`): runs both sides concurrently and persists the result

pub mod coordinator;
pub mod error;
pub mod job;
pub mod remote;
pub mod scanner;

pub use coordinator::{SyncConfig, SyncCoordinator, DEFAULT_PROGRESS_INTERVAL};
pub use error::{CollectionFetchError, Result, SyncError};
pub use job::{SyncJob, SyncJobId, SyncPhase, SyncReport};
pub use remote::{synthesize_path, RemoteInventory, RemoteInventoryFetcher, DEFAULT_MAX_WORKERS};
pub use scanner::{LocalTreeScanner, ScanStream, ScanSummary, DEFAULT_CHANNEL_CAPACITY};
