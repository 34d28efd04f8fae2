//! # Host Bridge Traits
//!
//! Contracts between the reconciliation core and the outside world.
//!
//! ## Overview
//!
//! The core never talks to a network socket directly. It is handed
//! implementations of the traits below, which keeps the sync pipeline testable
//! with mocks and lets the transport be swapped without touching the core.
//!
//! ## Traits
//!
//! - [`HttpClient`](http::HttpClient) - Async HTTP with per-request timeout and retry
//! - [`RemoteCollectionSource`](remote::RemoteCollectionSource) - A remote catalog of
//!   collections (torrents) and their member files
//!
//! ## Implementations
//!
//! | Trait | Crate |
//! |-------|-------|
//! | `HttpClient` | `bridge-desktop` (`ReqwestHttpClient`) |
//! | `RemoteCollectionSource` | `provider-qbittorrent` (`QbittorrentConnector`) |
//!
//! ## Error Handling
//!
//! Every trait returns [`BridgeError`](error::BridgeError). Authentication
//! rejections use the dedicated
//! [`AuthenticationFailed`](error::BridgeError::AuthenticationFailed) variant so
//! callers can degrade instead of treating them as transient failures.
//!
//! ## Thread Safety
//!
//! All traits require `Send + Sync` so implementations can be shared across
//! the fetcher's concurrent workers behind an `Arc`.

pub mod error;
pub mod http;
pub mod remote;

pub use error::BridgeError;

pub use http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, RetryPolicy};
pub use remote::{RemoteCollection, RemoteCollectionFile, RemoteCollectionSource};
