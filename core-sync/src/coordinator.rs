//! # Sync Coordinator
//!
//! Runs one full reconciliation pass.
//!
//! ## Workflow
//!
//! 1. Authenticate against the remote and fetch every collection's files,
//!    concurrently with step 2
//! 2. Walk the local tree, streaming records into an open replacement of the
//!    local table
//! 3. Commit the local table, then replace the remote table
//! 4. Emit completion and return a [`SyncReport`]
//!
//! A remote that cannot be reached or refuses the credentials degrades the
//! pass to a warning and leaves the remote table as it was. A local scan
//! failure is fatal and rolls back the local replacement. Cancellation stops
//! both sides and rolls back whatever has not been committed.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use core_sync::{SyncConfig, SyncCoordinator};
//!
//! let coordinator = SyncCoordinator::new(config, store, connector, event_bus)?;
//! let report = coordinator.run(CancellationToken::new()).await?;
//! println!("{} local, {} remote", report.local_files, report.remote_files);
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use bridge_traits::remote::RemoteCollectionSource;
use core_library::{LocalInventoryWriter, ReconciliationStore};
use core_runtime::events::{CoreEvent, EventBus, SyncEvent};
use core_runtime::AppConfig;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::job::{SyncJob, SyncJobId, SyncPhase, SyncReport};
use crate::remote::{RemoteInventory, RemoteInventoryFetcher, DEFAULT_MAX_WORKERS};
use crate::scanner::{LocalTreeScanner, DEFAULT_CHANNEL_CAPACITY};
use crate::{Result, SyncError};

/// Scanned files between two progress events.
pub const DEFAULT_PROGRESS_INTERVAL: u64 = 100;

/// Sync coordinator configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    /// Root of the local tree to scan
    pub local_root: PathBuf,

    /// Maximum concurrent per-collection remote requests
    pub max_workers: usize,

    /// Capacity of the scanner's handoff channel
    pub scan_channel_capacity: usize,

    /// Emit a progress event every this many scanned files
    pub progress_interval: u64,
}

impl SyncConfig {
    pub fn new(local_root: impl Into<PathBuf>) -> Self {
        Self {
            local_root: local_root.into(),
            max_workers: DEFAULT_MAX_WORKERS,
            scan_channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
        }
    }

    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            local_root: config.local_path.clone(),
            max_workers: config.qbittorrent_max_workers,
            scan_channel_capacity: config.scan_channel_capacity,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
        }
    }

    pub fn with_max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = max_workers;
        self
    }

    pub fn with_progress_interval(mut self, interval: u64) -> Self {
        self.progress_interval = interval;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.local_root.as_os_str().is_empty() {
            return Err(SyncError::validation("local_root", "must not be empty"));
        }
        if self.max_workers == 0 {
            return Err(SyncError::validation("max_workers", "must be at least 1"));
        }
        if self.scan_channel_capacity == 0 {
            return Err(SyncError::validation(
                "scan_channel_capacity",
                "must be at least 1",
            ));
        }
        if self.progress_interval == 0 {
            return Err(SyncError::validation(
                "progress_interval",
                "must be at least 1",
            ));
        }
        Ok(())
    }
}

/// What the remote side of a pass produced
#[derive(Debug)]
enum RemoteOutcome {
    Fetched(RemoteInventory),
    /// Remote unusable this pass; the reason becomes a warning
    Skipped(String),
}

/// Active sync tracking
#[derive(Debug, Clone)]
struct ActiveSync {
    job_id: SyncJobId,
    cancellation_token: CancellationToken,
}

/// Sync coordinator for orchestrating reconciliation passes
pub struct SyncCoordinator {
    config: SyncConfig,
    store: ReconciliationStore,
    fetcher: RemoteInventoryFetcher,
    scanner: LocalTreeScanner,
    event_bus: EventBus,
    active: Mutex<Option<ActiveSync>>,
}

impl SyncCoordinator {
    /// # Errors
    ///
    /// Returns a validation error for an unusable `config`.
    pub fn new(
        config: SyncConfig,
        store: ReconciliationStore,
        source: Arc<dyn RemoteCollectionSource>,
        event_bus: EventBus,
    ) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            fetcher: RemoteInventoryFetcher::new(source, config.max_workers)?,
            scanner: LocalTreeScanner::new(&config.local_root, config.scan_channel_capacity),
            config,
            store,
            event_bus,
            active: Mutex::new(None),
        })
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn store(&self) -> &ReconciliationStore {
        &self.store
    }

    /// Identifier of the pass currently running, if any.
    pub async fn current_job(&self) -> Option<SyncJobId> {
        self.active.lock().await.as_ref().map(|active| active.job_id)
    }

    /// Cancel the running pass. Returns false when nothing is running.
    pub async fn cancel_current(&self) -> bool {
        match self.active.lock().await.as_ref() {
            Some(active) => {
                info!(job_id = %active.job_id, "Cancelling sync");
                active.cancellation_token.cancel();
                true
            }
            None => false,
        }
    }

    /// Run one full pass.
    ///
    /// # Errors
    ///
    /// - `SyncInProgress` if another pass is running on this coordinator
    /// - `Scan` if the local walk failed; nothing local was persisted
    /// - `Persistence` if the store failed; uncommitted work was rolled back
    /// - `Cancelled` if `cancel` fired before the pass completed
    #[instrument(skip(self, cancel), fields(root = %self.config.local_root.display()))]
    pub async fn run(&self, cancel: CancellationToken) -> Result<SyncReport> {
        let mut job = SyncJob::new();

        {
            let mut active = self.active.lock().await;
            if let Some(running) = active.as_ref() {
                return Err(SyncError::SyncInProgress {
                    job_id: running.job_id.to_string(),
                });
            }
            *active = Some(ActiveSync {
                job_id: job.id,
                cancellation_token: cancel.clone(),
            });
        }

        let job_id = job.id.to_string();
        info!(job_id = %job_id, "Sync started");
        self.emit(SyncEvent::Started {
            job_id: job_id.clone(),
        });

        let result = self.run_job(&mut job, &cancel).await;
        self.active.lock().await.take();

        match &result {
            Ok(report) => {
                info!(
                    job_id = %job_id,
                    remote_files = report.remote_files,
                    local_files = report.local_files,
                    collection_errors = report.collection_errors.len(),
                    duration_ms = report.duration.as_millis() as u64,
                    "Sync completed"
                );
                self.emit(SyncEvent::Completed {
                    job_id,
                    remote_files: report.remote_files,
                    local_files: report.local_files,
                    collection_errors: report.collection_errors.len() as u64,
                    duration_ms: report.duration.as_millis() as u64,
                });
            }
            Err(SyncError::Cancelled) => {
                self.finish_phase(&mut job, SyncPhase::Cancelled);
                info!(job_id = %job_id, "Sync cancelled");
                self.emit(SyncEvent::Cancelled { job_id });
            }
            Err(e) => {
                self.finish_phase(&mut job, SyncPhase::Failed);
                error!(job_id = %job_id, error = %e, "Sync failed");
                self.emit(SyncEvent::Failed {
                    job_id,
                    message: e.to_string(),
                });
            }
        }

        result
    }

    async fn run_job(&self, job: &mut SyncJob, cancel: &CancellationToken) -> Result<SyncReport> {
        let job_id = job.id.to_string();
        self.enter(job, SyncPhase::FetchingRemote)?;

        let remote_cancel = cancel.child_token();
        let remote = self.fetch_remote(&job_id, &remote_cancel);
        let local = async {
            self.enter(job, SyncPhase::ScanningLocal)?;
            let outcome = self.scan_local(&job_id, cancel).await;
            if outcome.is_err() {
                remote_cancel.cancel();
            }
            outcome
        };

        let (remote_outcome, local_outcome) = tokio::join!(remote, local);

        let (writer, scanned) = local_outcome?;

        let inventory = match remote_outcome {
            Ok(RemoteOutcome::Fetched(inventory)) => Some(inventory),
            Ok(RemoteOutcome::Skipped(reason)) => {
                job.add_warning(reason);
                None
            }
            Err(e) => {
                Self::discard(writer).await;
                return Err(e);
            }
        };

        if cancel.is_cancelled() {
            Self::discard(writer).await;
            return Err(SyncError::Cancelled);
        }

        self.enter(job, SyncPhase::Persisting)?;

        let local_files = writer.commit().await?;
        debug!(scanned, local_files, "Local inventory committed");

        let (remote_files, collection_errors) = match inventory {
            Some(inventory) => {
                let written = self.store.replace_remote(&inventory.records, cancel).await?;
                (Some(written), inventory.errors)
            }
            None => (None, Vec::new()),
        };

        self.enter(job, SyncPhase::Done)?;
        Ok(job.report(remote_files, local_files, collection_errors))
    }

    /// Authenticate and fetch. Failures that [`SyncError::is_remote_degradation`]
    /// accepts become [`RemoteOutcome::Skipped`]; anything else is returned.
    async fn fetch_remote(&self, job_id: &str, cancel: &CancellationToken) -> Result<RemoteOutcome> {
        let authenticated = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(SyncError::Cancelled),
            result = self.fetcher.authenticate() => result,
        };
        match authenticated {
            Ok(()) => {}
            Err(e) if e.is_remote_degradation() => return Ok(self.skip_remote(job_id, e)),
            Err(e) => return Err(e),
        }

        let bus = self.event_bus.clone();
        let progress_job_id = job_id.to_string();
        let fetched = self
            .fetcher
            .fetch_all_with_progress(cancel, move |done, total| {
                let _ = bus.emit(CoreEvent::Sync(SyncEvent::Progress {
                    job_id: progress_job_id.clone(),
                    phase: SyncPhase::FetchingRemote.as_str().to_string(),
                    items_processed: done,
                    total_items: Some(total),
                }));
            })
            .await;

        match fetched {
            Ok(inventory) => {
                for error in &inventory.errors {
                    self.emit(SyncEvent::Warning {
                        job_id: job_id.to_string(),
                        message: error.to_string(),
                    });
                }
                Ok(RemoteOutcome::Fetched(inventory))
            }
            Err(e) if e.is_remote_degradation() => Ok(self.skip_remote(job_id, e)),
            Err(e) => Err(e),
        }
    }

    fn skip_remote(&self, job_id: &str, error: SyncError) -> RemoteOutcome {
        let message = format!(
            "{}; remote inventory not refreshed, orphans are computed against the previous pass's remote data",
            error
        );
        warn!(job_id = %job_id, error = %error, "Remote unavailable, continuing with local scan");
        self.emit(SyncEvent::Warning {
            job_id: job_id.to_string(),
            message: message.clone(),
        });
        RemoteOutcome::Skipped(message)
    }

    /// Stream the local tree into an open, uncommitted local replacement.
    async fn scan_local(
        &self,
        job_id: &str,
        cancel: &CancellationToken,
    ) -> Result<(LocalInventoryWriter, u64)> {
        let mut writer = self.store.begin_local_replace().await?;
        let mut stream = self.scanner.scan(cancel.clone());

        let mut scanned = 0u64;
        let mut write_failure: Option<SyncError> = None;

        while let Some(record) = stream.next().await {
            if let Err(e) = writer.push(record).await {
                write_failure = Some(e.into());
                break;
            }
            scanned += 1;
            if scanned % self.config.progress_interval == 0 {
                self.emit(SyncEvent::Progress {
                    job_id: job_id.to_string(),
                    phase: SyncPhase::ScanningLocal.as_str().to_string(),
                    items_processed: scanned,
                    total_items: None,
                });
            }
        }

        let outcome = stream.finish().await;
        let error = match (write_failure, outcome) {
            (Some(e), _) | (None, Err(e)) => e,
            (None, Ok(summary)) => {
                debug!(files = summary.files, bytes = summary.bytes, "Local scan streamed");
                return Ok((writer, scanned));
            }
        };

        Self::discard(writer).await;
        Err(error)
    }

    async fn discard(writer: LocalInventoryWriter) {
        if let Err(e) = writer.rollback().await {
            warn!(error = %e, "Failed to roll back local inventory replacement");
        }
    }

    fn enter(&self, job: &mut SyncJob, phase: SyncPhase) -> Result<()> {
        job.advance(phase)?;
        debug!(job_id = %job.id, phase = %phase, "Sync phase changed");
        self.emit(SyncEvent::PhaseChanged {
            job_id: job.id.to_string(),
            phase: phase.as_str().to_string(),
        });
        Ok(())
    }

    fn finish_phase(&self, job: &mut SyncJob, phase: SyncPhase) {
        if let Err(e) = job.advance(phase) {
            debug!(error = %e, "Job already terminal");
        }
    }

    /// Events are best effort; having no subscribers is not an error.
    fn emit(&self, event: SyncEvent) {
        if self.event_bus.emit(CoreEvent::Sync(event)).is_err() {
            debug!("No event subscribers");
        }
    }
}
