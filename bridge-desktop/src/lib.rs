//! # Desktop Bridge Implementations
//!
//! Default implementations of bridge traits for desktop and server hosts
//! (macOS, Windows, Linux).
//!
//! - `HttpClient` using `reqwest` with rustls
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::ReqwestHttpClient;
//! use std::sync::Arc;
//!
//! let http_client = Arc::new(ReqwestHttpClient::with_timeout(Duration::from_secs(30))?);
//! ```

mod http;

pub use http::ReqwestHttpClient;
