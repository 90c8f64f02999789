//! Versekeep Core Library
//!
//! This crate provides the persistence layer of a Bible reader: verse
//! annotations, reading history, an installable offline cache and a
//! cross-reference index.
//!
//! # Architecture
//!
//! - **KeyValueStore**: named collections keyed by verse address, with a
//!   SQLite backend and an in-memory backend
//! - **ChangeNotifier**: session-scoped "something changed" bus that every
//!   repository publishes to after a mutation
//!
//! # Quick Start
//!
//! ```text
//! let config = Config::load()?;
//! let library = Library::open(&config);
//!
//! // Highlight Psalm 23:1-3
//! library.highlights().add(19, 23, &[1, 2, 3], HighlightColor::Yellow)?;
//!
//! // Query one verse
//! let marks = library.highlights().for_verse(19, 23, 2)?;
//! ```
//!
//! # Modules
//!
//! - `library`: Unified annotation interface (main entry point)
//! - `address`: Verse address encoding
//! - `annotations`: Bookmarks, notes and highlights
//! - `history`: Bounded reading history
//! - `notifier`: Change notification bus
//! - `storage`: Key-value store trait and backends
//! - `cache`: Offline cache lifecycle and interception
//! - `xref`: Cross-reference index
//! - `config`: Application configuration

pub mod address;
pub mod annotations;
pub mod cache;
pub mod config;
pub mod history;
pub mod library;
pub mod notifier;
pub mod storage;
pub mod xref;

pub use address::{AddressError, VerseAddress};
pub use annotations::{
    AddOutcome, Annotation, AnnotationRepository, Bookmarks, HighlightColor, Highlights, Notes,
};
pub use cache::{CacheError, CacheManager};
pub use config::Config;
pub use history::{HistoryEntry, HistoryLog};
pub use library::{Library, LibraryStats};
pub use notifier::{ChangeNotifier, Subscription};
pub use storage::{Database, KeyValueStore, StorageError};
pub use xref::{Coordinate, CrossReference, CrossReferenceIndex};
