//! Unified annotation interface
//!
//! The `Library` owns one database handle and one change notifier and
//! hands out the repositories that share them:
//! - bookmarks, notes and highlights (verse-keyed annotations)
//! - the bounded reading history
//!
//! ## Usage
//!
//! ```ignore
//! let library = Library::open(&config);
//!
//! library.highlights().add(19, 23, &[1, 2, 3], HighlightColor::Yellow)?;
//! let marks = library.highlights().for_verse(19, 23, 2)?;
//! ```

use std::sync::Arc;

use tracing::info;

use crate::annotations::{Bookmarks, Highlights, Notes};
use crate::config::Config;
use crate::history::HistoryLog;
use crate::notifier::{ChangeNotifier, Subscription};
use crate::storage::{Backend, Collection, Database, StorageResult};

/// Entry point for all annotation state in one session
#[derive(Clone)]
pub struct Library {
    db: Arc<Database>,
    notifier: ChangeNotifier,
    bookmarks: Bookmarks,
    notes: Notes,
    highlights: Highlights,
    history: HistoryLog,
}

impl Library {
    /// Library backed by the SQLite file in the configured data directory
    ///
    /// The file is not touched until the first operation needs it.
    pub fn open(config: &Config) -> Self {
        let db = Database::new(Backend::Sqlite(config.database_path()));
        Self::with_database(db, config.history_limit)
    }

    /// Library kept entirely in memory
    pub fn in_memory() -> Self {
        Self::with_database(Database::in_memory(), crate::history::DEFAULT_HISTORY_LIMIT)
    }

    /// Library over an existing database handle
    pub fn with_database(db: Database, history_limit: u64) -> Self {
        let db = Arc::new(db);
        let notifier = ChangeNotifier::new();
        Self {
            bookmarks: Bookmarks::new(Arc::clone(&db), notifier.clone()),
            notes: Notes::new(Arc::clone(&db), notifier.clone()),
            highlights: Highlights::new(Arc::clone(&db), notifier.clone()),
            history: HistoryLog::with_limit(Arc::clone(&db), notifier.clone(), history_limit),
            db,
            notifier,
        }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn notifier(&self) -> &ChangeNotifier {
        &self.notifier
    }

    /// Shorthand for `notifier().subscribe(..)`
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.notifier.subscribe(callback)
    }

    // ==================== Repositories ====================

    pub fn bookmarks(&self) -> &Bookmarks {
        &self.bookmarks
    }

    pub fn notes(&self) -> &Notes {
        &self.notes
    }

    pub fn highlights(&self) -> &Highlights {
        &self.highlights
    }

    pub fn history(&self) -> &HistoryLog {
        &self.history
    }

    // ==================== Maintenance ====================

    /// Record counts per collection
    pub fn stats(&self) -> StorageResult<LibraryStats> {
        Ok(LibraryStats {
            bookmarks: self.bookmarks.count()?,
            notes: self.notes.count()?,
            highlights: self.highlights.count()?,
            history: self.history.count()?,
        })
    }

    /// Wipe every collection and publish a single change event
    pub fn clear_all(&self) -> StorageResult<()> {
        let store = self.db.open()?;
        for collection in Collection::ALL {
            store.clear(collection)?;
        }
        info!("Cleared all collections");
        self.notifier.publish();
        Ok(())
    }
}

/// Record counts per collection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct LibraryStats {
    pub bookmarks: u64,
    pub notes: u64,
    pub highlights: u64,
    pub history: u64,
}

impl LibraryStats {
    pub fn total(&self) -> u64 {
        self.bookmarks + self.notes + self.highlights + self.history
    }
}
