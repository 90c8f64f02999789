//! Storage error handling
//!
//! Provides typed errors for key-value store operations, with a
//! classification for the "store unavailable" case that annotation
//! features treat as empty state.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

use super::Collection;

/// Errors that can occur during storage operations
#[derive(Error, Debug)]
pub enum StorageError {
    /// The underlying store could not be opened
    #[error("Store unavailable: {reason}")]
    Unavailable { reason: String },

    /// Failed to create data directory
    #[error("Failed to create data directory '{path}': {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A secondary index was requested on a collection that has none
    #[error("Index '{index}' does not exist on collection '{collection}'")]
    IndexMissing {
        collection: Collection,
        index: String,
    },

    /// A stored record could not be encoded or decoded
    #[error("Invalid record '{id}' in '{collection}': {source}")]
    InvalidRecord {
        collection: Collection,
        id: String,
        #[source]
        source: serde_json::Error,
    },

    /// A record key is not a valid verse address
    #[error("Invalid verse address: {0}")]
    Address(#[from] crate::address::AddressError),

    /// A record was found under a collection name the schema doesn't know
    #[error("Unknown collection '{0}'")]
    UnknownCollection(String),

    /// SQLite database error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Generic I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl StorageError {
    /// Build an `Unavailable` error from anything printable
    pub fn unavailable(reason: impl std::fmt::Display) -> Self {
        StorageError::Unavailable {
            reason: reason.to_string(),
        }
    }

    /// Check if this error means the store could not be reached at all
    ///
    /// Callers treat this as degraded (empty) state, not as corruption.
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            StorageError::Unavailable { .. } | StorageError::CreateDirectory { .. }
        )
    }

    /// Get a recovery suggestion for this error
    pub fn recovery_suggestion(&self) -> Option<&'static str> {
        match self {
            StorageError::Unavailable { .. } => {
                Some("Check that the data directory is writable and not locked by another process.")
            }
            StorageError::CreateDirectory { .. } => {
                Some("Check that the parent directory exists and you have write permissions.")
            }
            StorageError::InvalidRecord { .. } => {
                Some("Remove the affected record or clear the collection.")
            }
            _ => None,
        }
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unavailable_classification() {
        let err = StorageError::unavailable("database is locked");
        assert!(err.is_unavailable());
        assert!(err.recovery_suggestion().is_some());
        assert!(err.to_string().contains("database is locked"));
    }

    #[test]
    fn test_create_directory_is_unavailable() {
        let err = StorageError::CreateDirectory {
            path: PathBuf::from("/readonly/data"),
            source: io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        };
        assert!(err.is_unavailable());
        assert!(err.to_string().contains("/readonly/data"));
    }

    #[test]
    fn test_index_missing_is_not_unavailable() {
        let err = StorageError::IndexMissing {
            collection: Collection::Bookmarks,
            index: "timestamp".to_string(),
        };
        assert!(!err.is_unavailable());

        let msg = err.to_string();
        assert!(msg.contains("timestamp"));
        assert!(msg.contains("bookmarks"));
    }
}
