//! # Application Configuration
//!
//! `AppConfig` is assembled from three layers, lowest priority first:
//!
//! 1. Built-in defaults
//! 2. A JSON file (path from `CONFIG_PATH`, default `./config.json`); a
//!    missing file is ignored
//! 3. Environment variables
//!
//! ```ignore
//! use core_runtime::config::AppConfig;
//!
//! let config = AppConfig::load()?;
//! println!("remote at {}", config.qbittorrent_url());
//! ```
//!
//! Programmatic construction goes through the builder, which validates on
//! `build()`:
//!
//! ```ignore
//! let config = AppConfig::builder()
//!     .local_path("/mnt/media")
//!     .sqlite_path(":memory:")
//!     .max_workers(4)
//!     .build()?;
//! ```

use crate::error::{Error, Result};
use crate::logging::redact_if_sensitive;
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_CONFIG_PATH: &str = "./config.json";
pub const DEFAULT_QBITTORRENT_HOST: &str = "qbt.home";
pub const DEFAULT_QBITTORRENT_PORT: u32 = 80;
pub const DEFAULT_QBITTORRENT_USERNAME: &str = "admin";
pub const DEFAULT_QBITTORRENT_PASSWORD: &str = "adminadmin";
pub const DEFAULT_MAX_WORKERS: usize = 10;
pub const DEFAULT_SQLITE_PATH: &str = "./data/torrents.db";
pub const DEFAULT_BATCH_SIZE: usize = 1000;
pub const DEFAULT_LOCAL_PATH: &str = "./data/torrents";
pub const DEFAULT_MOUNT_PREFIX: &str = "/mnt";
pub const DEFAULT_SCAN_CHANNEL_CAPACITY: usize = 1024;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Immutable application configuration.
#[derive(Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub qbittorrent_host: String,
    pub qbittorrent_port: u32,
    pub qbittorrent_username: String,
    pub qbittorrent_password: String,
    /// Ceiling on concurrent per-collection fetches
    pub qbittorrent_max_workers: usize,
    pub sqlite_path: PathBuf,
    /// Rows per multi-row INSERT statement
    pub sqlite_batch_size: usize,
    /// Root of the local media tree
    pub local_path: PathBuf,
    /// Prefix stripped from local paths before storage and matching
    pub mount_prefix: String,
    /// Capacity of the scanner-to-store handoff channel
    pub scan_channel_capacity: usize,
    pub request_timeout_secs: u64,
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("qbittorrent_host", &self.qbittorrent_host)
            .field("qbittorrent_port", &self.qbittorrent_port)
            .field("qbittorrent_username", &self.qbittorrent_username)
            .field(
                "qbittorrent_password",
                &redact_if_sensitive("qbittorrent_password", &self.qbittorrent_password),
            )
            .field("qbittorrent_max_workers", &self.qbittorrent_max_workers)
            .field("sqlite_path", &self.sqlite_path)
            .field("sqlite_batch_size", &self.sqlite_batch_size)
            .field("local_path", &self.local_path)
            .field("mount_prefix", &self.mount_prefix)
            .field("scan_channel_capacity", &self.scan_channel_capacity)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            qbittorrent_host: DEFAULT_QBITTORRENT_HOST.to_string(),
            qbittorrent_port: DEFAULT_QBITTORRENT_PORT,
            qbittorrent_username: DEFAULT_QBITTORRENT_USERNAME.to_string(),
            qbittorrent_password: DEFAULT_QBITTORRENT_PASSWORD.to_string(),
            qbittorrent_max_workers: DEFAULT_MAX_WORKERS,
            sqlite_path: PathBuf::from(DEFAULT_SQLITE_PATH),
            sqlite_batch_size: DEFAULT_BATCH_SIZE,
            local_path: PathBuf::from(DEFAULT_LOCAL_PATH),
            mount_prefix: DEFAULT_MOUNT_PREFIX.to_string(),
            scan_channel_capacity: DEFAULT_SCAN_CHANNEL_CAPACITY,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

/// On-disk shape of the JSON config file. Absent keys keep the lower layer.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileConfig {
    qbittorrent_host: Option<String>,
    qbittorrent_port: Option<u32>,
    qbittorrent_username: Option<String>,
    qbittorrent_password: Option<String>,
    qbittorrent_max_workers: Option<usize>,
    sqlite_path: Option<PathBuf>,
    sqlite_batch_size: Option<usize>,
    local_path: Option<PathBuf>,
    mount_prefix: Option<String>,
    scan_channel_capacity: Option<usize>,
    request_timeout_secs: Option<u64>,
}

impl AppConfig {
    pub fn builder() -> AppConfigBuilder {
        AppConfigBuilder::default()
    }

    /// Load from defaults, `CONFIG_PATH` (or `./config.json`) and the
    /// process environment, then validate.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("CONFIG_PATH")
            .ok()
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());

        Self::load_with(Path::new(&config_path), |key| std::env::var(key).ok())
    }

    /// Layered load with an injectable environment lookup.
    pub fn load_with<F>(config_path: &Path, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        match std::fs::read(config_path) {
            Ok(bytes) => config.apply_file(&bytes, config_path)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(Error::Config(format!(
                    "Failed to read config file {}: {}",
                    config_path.display(),
                    e
                )))
            }
        }

        config.apply_env(env)?;
        config.validate()?;
        Ok(config)
    }

    fn apply_file(&mut self, bytes: &[u8], path: &Path) -> Result<()> {
        let file: FileConfig = serde_json::from_slice(bytes).map_err(|e| {
            Error::Config(format!("Invalid JSON in {}: {}", path.display(), e))
        })?;

        if let Some(v) = file.qbittorrent_host.filter(|v| !v.is_empty()) {
            self.qbittorrent_host = v;
        }
        if let Some(v) = file.qbittorrent_port {
            self.qbittorrent_port = v;
        }
        if let Some(v) = file.qbittorrent_username.filter(|v| !v.is_empty()) {
            self.qbittorrent_username = v;
        }
        if let Some(v) = file.qbittorrent_password.filter(|v| !v.is_empty()) {
            self.qbittorrent_password = v;
        }
        if let Some(v) = file.qbittorrent_max_workers {
            self.qbittorrent_max_workers = v;
        }
        if let Some(v) = file.sqlite_path.filter(|v| !v.as_os_str().is_empty()) {
            self.sqlite_path = v;
        }
        if let Some(v) = file.sqlite_batch_size {
            self.sqlite_batch_size = v;
        }
        if let Some(v) = file.local_path.filter(|v| !v.as_os_str().is_empty()) {
            self.local_path = v;
        }
        if let Some(v) = file.mount_prefix {
            self.mount_prefix = v;
        }
        if let Some(v) = file.scan_channel_capacity {
            self.scan_channel_capacity = v;
        }
        if let Some(v) = file.request_timeout_secs {
            self.request_timeout_secs = v;
        }
        Ok(())
    }

    fn apply_env<F>(&mut self, env: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| env(key).filter(|v| !v.is_empty());

        if let Some(v) = get("QBITTORRENT_HOST") {
            self.qbittorrent_host = v;
        }
        if let Some(v) = get("QBITTORRENT_PORT") {
            self.qbittorrent_port = parse_env("QBITTORRENT_PORT", &v)?;
        }
        if let Some(v) = get("QBITTORRENT_USERNAME") {
            self.qbittorrent_username = v;
        }
        if let Some(v) = get("QBITTORRENT_PASSWORD") {
            self.qbittorrent_password = v;
        }
        if let Some(v) = get("QBITTORRENT_MAX_WORKERS") {
            self.qbittorrent_max_workers = parse_env("QBITTORRENT_MAX_WORKERS", &v)?;
        }
        if let Some(v) = get("SQLITE_PATH") {
            self.sqlite_path = PathBuf::from(v);
        }
        if let Some(v) = get("SQLITE_BATCH_SIZE") {
            self.sqlite_batch_size = parse_env("SQLITE_BATCH_SIZE", &v)?;
        }
        if let Some(v) = get("LOCAL_PATH") {
            self.local_path = PathBuf::from(v);
        }
        // An explicitly empty MOUNT_PREFIX disables stripping.
        if let Some(v) = env("MOUNT_PREFIX") {
            self.mount_prefix = v;
        }
        Ok(())
    }

    /// Reject values that would fail later at I/O time.
    pub fn validate(&self) -> Result<()> {
        if !(1..=65535).contains(&self.qbittorrent_port) {
            return Err(Error::validation(
                "qbittorrent_port",
                format!("must be between 1 and 65535, got {}", self.qbittorrent_port),
            ));
        }
        if self.qbittorrent_host.trim().is_empty() {
            return Err(Error::validation("qbittorrent_host", "cannot be empty"));
        }
        if self.sqlite_path.as_os_str().is_empty() {
            return Err(Error::validation("sqlite_path", "path cannot be empty"));
        }
        if self.local_path.as_os_str().is_empty() {
            return Err(Error::validation("local_path", "path cannot be empty"));
        }
        if self.qbittorrent_max_workers < 1 {
            return Err(Error::validation("qbittorrent_max_workers", "must be at least 1"));
        }
        if self.sqlite_batch_size < 1 {
            return Err(Error::validation("sqlite_batch_size", "must be at least 1"));
        }
        if self.scan_channel_capacity < 1 {
            return Err(Error::validation("scan_channel_capacity", "must be at least 1"));
        }
        if self.request_timeout_secs == 0 {
            return Err(Error::validation("request_timeout_secs", "must be at least 1"));
        }
        Ok(())
    }

    /// Base URL of the qBittorrent Web UI.
    ///
    /// Port 80 and 443 are left implicit; some reverse proxies reject an
    /// explicit default port in the `Host` header.
    pub fn qbittorrent_url(&self) -> String {
        match self.qbittorrent_port {
            80 => format!("http://{}", self.qbittorrent_host),
            443 => format!("https://{}", self.qbittorrent_host),
            port => format!("http://{}:{}", self.qbittorrent_host, port),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::validation(key, format!("not a valid number: {:?}", value)))
}

/// Builder for [`AppConfig`], starting from the defaults.
#[derive(Debug, Default)]
pub struct AppConfigBuilder {
    config: AppConfig,
}

impl AppConfigBuilder {
    pub fn qbittorrent_host(mut self, host: impl Into<String>) -> Self {
        self.config.qbittorrent_host = host.into();
        self
    }

    pub fn qbittorrent_port(mut self, port: u32) -> Self {
        self.config.qbittorrent_port = port;
        self
    }

    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.config.qbittorrent_username = username.into();
        self.config.qbittorrent_password = password.into();
        self
    }

    pub fn max_workers(mut self, workers: usize) -> Self {
        self.config.qbittorrent_max_workers = workers;
        self
    }

    pub fn sqlite_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.sqlite_path = path.into();
        self
    }

    pub fn batch_size(mut self, size: usize) -> Self {
        self.config.sqlite_batch_size = size;
        self
    }

    pub fn local_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.local_path = path.into();
        self
    }

    pub fn mount_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.mount_prefix = prefix.into();
        self
    }

    pub fn scan_channel_capacity(mut self, capacity: usize) -> Self {
        self.config.scan_channel_capacity = capacity;
        self
    }

    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = secs;
        self
    }

    /// Returns the configuration without validating it.
    pub fn build_unchecked(self) -> AppConfig {
        self.config
    }

    pub fn build(self) -> Result<AppConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.qbittorrent_max_workers, 10);
        assert_eq!(config.sqlite_batch_size, 1000);
        assert_eq!(config.mount_prefix, "/mnt");
    }

    #[test]
    fn test_missing_file_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load_with(&dir.path().join("absent.json"), env_of(&[])).unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn test_file_then_env_precedence() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"qbittorrent_host":"file.host","qbittorrent_port":8080,"sqlite_batch_size":50}"#,
        )
        .unwrap();

        let config =
            AppConfig::load_with(&path, env_of(&[("QBITTORRENT_HOST", "env.host")])).unwrap();

        assert_eq!(config.qbittorrent_host, "env.host");
        assert_eq!(config.qbittorrent_port, 8080);
        assert_eq!(config.sqlite_batch_size, 50);
        assert_eq!(config.qbittorrent_username, DEFAULT_QBITTORRENT_USERNAME);
    }

    #[test]
    fn test_invalid_json_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{not json").unwrap();

        let result = AppConfig::load_with(&path, env_of(&[]));
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_unparseable_env_number_is_validation_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = AppConfig::load_with(
            &dir.path().join("none.json"),
            env_of(&[("QBITTORRENT_MAX_WORKERS", "many")]),
        );
        assert!(matches!(
            result,
            Err(Error::Validation { ref field, .. }) if field == "QBITTORRENT_MAX_WORKERS"
        ));
    }

    #[test]
    fn test_empty_mount_prefix_from_env_disables_stripping() {
        let dir = tempfile::tempdir().unwrap();
        let config =
            AppConfig::load_with(&dir.path().join("none.json"), env_of(&[("MOUNT_PREFIX", "")]))
                .unwrap();
        assert_eq!(config.mount_prefix, "");
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let cases = [
            AppConfig::builder().qbittorrent_port(0).build_unchecked(),
            AppConfig::builder().qbittorrent_port(70000).build_unchecked(),
            AppConfig::builder().max_workers(0).build_unchecked(),
            AppConfig::builder().batch_size(0).build_unchecked(),
            AppConfig::builder().local_path("").build_unchecked(),
            AppConfig::builder().sqlite_path("").build_unchecked(),
            AppConfig::builder().scan_channel_capacity(0).build_unchecked(),
        ];

        for config in cases {
            assert!(
                matches!(config.validate(), Err(Error::Validation { .. })),
                "expected rejection for {:?}",
                config
            );
        }
    }

    #[test]
    fn test_qbittorrent_url() {
        let url = |port| {
            AppConfig::builder()
                .qbittorrent_host("qbt.home")
                .qbittorrent_port(port)
                .build_unchecked()
                .qbittorrent_url()
        };

        assert_eq!(url(80), "http://qbt.home");
        assert_eq!(url(443), "https://qbt.home");
        assert_eq!(url(8080), "http://qbt.home:8080");
    }

    #[test]
    fn test_debug_redacts_password() {
        let config = AppConfig::builder()
            .credentials("admin", "hunter2")
            .build_unchecked();
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("[REDACTED]"));
    }
}
