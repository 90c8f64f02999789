//! Offline cache
//!
//! A cache-first proxy with an explicit three-phase lifecycle:
//!
//! - **install**: fetch the manifest into a bucket named after the
//!   current version tag
//! - **activate**: delete every other bucket of this app, including
//!   legacy unversioned ones
//! - **fetch**: serve GET requests from the bucket, then the network,
//!   then an offline fallback
//!
//! Buckets live in a [`CacheStorage`]; the network sits behind a
//! [`Fetcher`] so tests can run without one.

pub mod error;
pub mod fetch;
pub mod manager;
pub mod manifest;
pub mod storage;
pub mod version;

use std::fmt;

use serde::Serialize;

pub use error::{CacheError, CacheResult};
pub use fetch::{CachedResponse, Fetcher, HttpFetcher, ProxyRequest, RequestMode};
pub use manager::{
    ActivateReport, CacheGeneration, CacheManager, FetchOutcome, InstallReport, ResponseSource,
};
pub use storage::{CacheStorage, MemoryCacheStorage, SqliteCacheStorage};

/// Lifecycle phase of a cache manager
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Idle,
    Installed,
    Active,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Idle => "idle",
            Phase::Installed => "installed",
            Phase::Active => "active",
        };
        f.write_str(name)
    }
}
