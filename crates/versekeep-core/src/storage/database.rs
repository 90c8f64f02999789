//! Connection ownership
//!
//! `Database` opens its backend on first use and hands the same handle to
//! every caller afterwards. A failed open is reported as
//! `StorageError::Unavailable` and leaves the database closed, so a later
//! call retries instead of caching the failure.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use tracing::{info, warn};

use super::{KeyValueStore, MemoryStore, SqliteStore, StorageError, StorageResult};

/// Which backend a `Database` opens
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Backend {
    /// In-process store, lost when the process exits
    Memory,
    /// SQLite database file
    Sqlite(PathBuf),
}

/// Lazily opened, shared key-value store handle
pub struct Database {
    backend: Backend,
    handle: Mutex<Option<Arc<dyn KeyValueStore>>>,
}

impl Database {
    pub fn new(backend: Backend) -> Self {
        Self {
            backend,
            handle: Mutex::new(None),
        }
    }

    /// Database over an in-memory store
    pub fn in_memory() -> Self {
        Self::new(Backend::Memory)
    }

    /// Wrap an already opened store (always "open")
    pub fn from_store(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            backend: Backend::Memory,
            handle: Mutex::new(Some(store)),
        }
    }

    pub fn backend(&self) -> &Backend {
        &self.backend
    }

    /// Open the store, or return the already open handle
    ///
    /// Concurrent callers serialize on the handle lock, so exactly one
    /// connection is ever opened.
    pub fn open(&self) -> StorageResult<Arc<dyn KeyValueStore>> {
        let mut handle = self
            .handle
            .lock()
            .map_err(|_| StorageError::unavailable("database handle lock poisoned"))?;

        if let Some(store) = handle.as_ref() {
            return Ok(Arc::clone(store));
        }

        let store: Arc<dyn KeyValueStore> = match &self.backend {
            Backend::Memory => Arc::new(MemoryStore::new()),
            Backend::Sqlite(path) => {
                let store = SqliteStore::open(path).map_err(|e| {
                    warn!("Failed to open store at {:?}: {}", path, e);
                    if e.is_unavailable() {
                        e
                    } else {
                        StorageError::unavailable(e)
                    }
                })?;
                info!("Opened store at {:?}", path);
                Arc::new(store)
            }
        };

        *handle = Some(Arc::clone(&store));
        Ok(store)
    }

    /// Check whether the connection has been opened
    pub fn is_open(&self) -> bool {
        self.handle.lock().map(|h| h.is_some()).unwrap_or(false)
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("backend", &self.backend)
            .field("open", &self.is_open())
            .finish()
    }
}
