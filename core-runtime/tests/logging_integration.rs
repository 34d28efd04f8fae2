//! Integration tests for logging system

use core_runtime::logging::{init_logging, redact_if_sensitive, LogFormat, LogLevel, LoggingConfig};
use core_runtime::AppConfig;

#[test]
fn test_logging_initialization_is_single_shot() {
    let config = LoggingConfig::default()
        .with_format(LogFormat::Compact)
        .with_level(LogLevel::Debug);

    assert!(init_logging(config.clone()).is_ok());

    // A global subscriber is already installed.
    assert!(init_logging(config).is_err());

    tracing::info!(file = "/mnt/movies/A/f1.mkv", "logging works");
}

#[test]
fn test_credentials_are_redacted() {
    assert_eq!(redact_if_sensitive("password", "adminadmin"), "[REDACTED]");
    assert_eq!(redact_if_sensitive("cookie", "SID=abc"), "[REDACTED]");
    assert_eq!(redact_if_sensitive("username", "admin"), "admin");
}

#[test]
fn test_logged_config_hides_password() {
    let config = AppConfig::builder()
        .credentials("admin", "adminadmin")
        .build_unchecked();

    let rendered = format!("{:?}", config);
    tracing::info!(config = ?config, "Loaded configuration");

    assert!(rendered.contains("admin"));
    assert!(!rendered.contains("adminadmin"));
    assert!(rendered.contains("[REDACTED]"));
}
