//! Core service façade and bootstrap helpers.
//!
//! This crate wires the remote connector, the reconciliation store and the
//! sync coordinator together from one [`AppConfig`]. Desktop builds enable the
//! `desktop-shims` feature (on by default), which supplies the reqwest HTTP
//! client and the qBittorrent connector. Tests and embedders can hand in any
//! [`RemoteCollectionSource`] through [`CoreDependencies`] instead.

pub mod error;

pub use error::{CoreError, Result};

use std::sync::Arc;

use bridge_traits::remote::RemoteCollectionSource;
use core_library::{
    DatabaseConfig, FolderStats, InventoryRow, InventoryStats, Page, QueryOptions,
    ReconciliationStore, Source, StoreOptions,
};
use core_runtime::events::{EventBus, Receiver, CoreEvent};
use core_runtime::AppConfig;
use core_sync::{SyncConfig, SyncCoordinator, SyncReport};
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Aggregated handle to the bridges the core requires.
pub struct CoreDependencies {
    pub remote: Arc<dyn RemoteCollectionSource>,
}

impl CoreDependencies {
    pub fn new(remote: Arc<dyn RemoteCollectionSource>) -> Self {
        Self { remote }
    }

    /// Reqwest-backed qBittorrent connector built from `config`.
    #[cfg(feature = "desktop-shims")]
    pub fn desktop(config: &AppConfig) -> Result<Self> {
        use bridge_desktop::ReqwestHttpClient;
        use provider_qbittorrent::QbittorrentConnector;

        let http_client = ReqwestHttpClient::with_timeout(config.request_timeout())?;
        let connector = QbittorrentConnector::new(
            Arc::new(http_client),
            config.qbittorrent_url(),
            config.qbittorrent_username.clone(),
            config.qbittorrent_password.clone(),
        )
        .with_timeout(config.request_timeout());

        Ok(Self::new(Arc::new(connector)))
    }
}

/// Primary entry point for hosts.
pub struct CoreService {
    config: AppConfig,
    store: ReconciliationStore,
    coordinator: SyncCoordinator,
    event_bus: EventBus,
}

impl CoreService {
    /// Validate `config`, open the database and assemble the coordinator.
    ///
    /// # Errors
    ///
    /// - `Config` if the configuration is invalid; nothing was opened
    /// - `Library` if the database could not be opened or migrated
    pub async fn bootstrap_with(config: AppConfig, deps: CoreDependencies) -> Result<Self> {
        config.validate()?;

        let store = ReconciliationStore::open(
            DatabaseConfig::new(&config.sqlite_path),
            StoreOptions::new(config.sqlite_batch_size, config.mount_prefix.clone()),
        )
        .await?;

        let event_bus = EventBus::default();
        let coordinator = SyncCoordinator::new(
            SyncConfig::from_app_config(&config),
            store.clone(),
            deps.remote,
            event_bus.clone(),
        )?;

        info!(
            remote = %config.qbittorrent_url(),
            database = %config.sqlite_path.display(),
            local_path = %config.local_path.display(),
            "Core service ready"
        );

        Ok(Self {
            config,
            store,
            coordinator,
            event_bus,
        })
    }

    /// [`bootstrap_with`](Self::bootstrap_with) using the desktop bridges.
    #[cfg(feature = "desktop-shims")]
    pub async fn bootstrap(config: AppConfig) -> Result<Self> {
        config.validate()?;
        let deps = CoreDependencies::desktop(&config)?;
        Self::bootstrap_with(config, deps).await
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn store(&self) -> &ReconciliationStore {
        &self.store
    }

    /// Run one reconciliation pass.
    pub async fn sync(&self, cancel: CancellationToken) -> Result<SyncReport> {
        Ok(self.coordinator.run(cancel).await?)
    }

    /// Cancel the running pass, if any.
    pub async fn cancel_sync(&self) -> bool {
        self.coordinator.cancel_current().await
    }

    pub async fn query(&self, source: Source, options: &QueryOptions) -> Result<Page<InventoryRow>> {
        Ok(self.store.query(source, options).await?)
    }

    pub async fn aggregate_stats(&self, source: Source) -> Result<InventoryStats> {
        Ok(self.store.aggregate_stats(source).await?)
    }

    pub async fn folder_stats(&self, source: Source) -> Result<Vec<FolderStats>> {
        Ok(self.store.folder_stats(source).await?)
    }

    /// Subscribe to sync events. Past events are not replayed.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.event_bus.subscribe()
    }

    /// Close the database. Further reads fail.
    pub async fn shutdown(&self) {
        self.store.close().await;
        info!("Core service shut down");
    }
}

const SIZE_UNITS: [&str; 6] = ["B", "KB", "MB", "GB", "TB", "PB"];

/// Human-readable size in binary units with two decimals.
///
/// ```
/// use core_service::format_size;
///
/// assert_eq!(format_size(512), "512 B");
/// assert_eq!(format_size(1536), "1.50 KB");
/// ```
pub fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        return format!("{} B", bytes);
    }

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < SIZE_UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.2} {}", value, SIZE_UNITS[unit])
}
