//! Workspace umbrella crate.
//!
//! Re-exports the `core-service` façade so hosts can depend on a single
//! package. The `orphanscan` binary lives in `core-service`.

pub use core_service::*;
