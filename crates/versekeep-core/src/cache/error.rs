//! Offline cache errors

use std::io;
use std::path::PathBuf;
use thiserror::Error;

use super::Phase;

/// Errors that can occur in the offline cache
#[derive(Error, Debug)]
pub enum CacheError {
    /// A lifecycle transition was requested out of order
    #[error("Cannot {action} while the cache is {phase}")]
    Lifecycle { action: &'static str, phase: Phase },

    /// A manifest path or origin could not be turned into a URL
    #[error("Invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    /// A progressive-cache pattern is not a valid regex
    #[error("Invalid cache pattern '{pattern}': {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// The network fetch itself failed
    #[error("Fetch failed for {url}: {reason}")]
    Fetch { url: String, reason: String },

    /// Failed to create the directory holding the cache database
    #[error("Failed to create cache directory '{path}': {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Stored headers could not be encoded or decoded
    #[error("Invalid cached headers for {url}: {source}")]
    Headers {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    /// SQLite database error
    #[error("Cache database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Bucket storage lock was poisoned by a panicking writer
    #[error("Cache storage unavailable: {0}")]
    Unavailable(String),
}

impl CacheError {
    /// Build a fetch error from anything printable
    pub fn fetch(url: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        CacheError::Fetch {
            url: url.into(),
            reason: reason.to_string(),
        }
    }

    /// Check if this error is a network failure (as opposed to local state)
    pub fn is_network(&self) -> bool {
        matches!(self, CacheError::Fetch { .. })
    }
}

/// Result type for offline cache operations
pub type CacheResult<T> = Result<T, CacheError>;
