//! # Core Runtime Module
//!
//! Foundational runtime infrastructure shared by every crate:
//! - Application configuration (defaults, JSON file, environment overrides)
//! - Logging and tracing setup
//! - Event bus for sync progress
//!
//! Configuration is an immutable value: it is loaded and validated once and
//! then passed by reference into the constructors that need it.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use config::AppConfig;
pub use error::{Error, Result};
