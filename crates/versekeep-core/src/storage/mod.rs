//! Storage layer
//!
//! A small transactional key-value store with named collections.
//!
//! ## Architecture
//!
//! - **KeyValueStore**: the trait every backend implements
//! - **MemoryStore**: in-process backend, used by tests and as a fallback
//! - **SqliteStore**: persistent backend on an embedded SQLite database
//! - **Database**: owns the connection, opens it lazily and shares it
//!
//! ## Collections
//!
//! - `bookmarks`, `notes`, `highlights` - verse annotations keyed by verse id
//! - `history` - visited locations, with an ascending `timestamp` index

pub mod database;
pub mod error;
pub mod memory;
pub mod schema;
pub mod sqlite;

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use database::{Backend, Database};
pub use error::{StorageError, StorageResult};
pub use memory::MemoryStore;
pub use schema::SCHEMA_VERSION;
pub use sqlite::SqliteStore;

/// A named collection in the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Collection {
    Bookmarks,
    Notes,
    Highlights,
    History,
}

impl Collection {
    /// Every collection in the schema
    pub const ALL: [Collection; 4] = [
        Collection::Bookmarks,
        Collection::Notes,
        Collection::Highlights,
        Collection::History,
    ];

    /// Table / collection name
    pub fn name(&self) -> &'static str {
        match self {
            Collection::Bookmarks => "bookmarks",
            Collection::Notes => "notes",
            Collection::Highlights => "highlights",
            Collection::History => "history",
        }
    }

    /// Secondary indexes defined on this collection
    pub fn indexes(&self) -> &'static [Index] {
        match self {
            Collection::History => &[Index::Timestamp],
            _ => &[],
        }
    }

    /// Check whether `index` exists on this collection
    pub fn has_index(&self, index: Index) -> bool {
        self.indexes().contains(&index)
    }

    pub(crate) fn require_index(&self, index: Index) -> StorageResult<()> {
        if self.has_index(index) {
            Ok(())
        } else {
            Err(StorageError::IndexMissing {
                collection: *self,
                index: index.name().to_string(),
            })
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for Collection {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Collection::ALL
            .into_iter()
            .find(|c| c.name() == s)
            .ok_or_else(|| StorageError::UnknownCollection(s.to_string()))
    }
}

/// A secondary index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Index {
    /// Ascending record timestamp
    Timestamp,
}

impl Index {
    pub fn name(&self) -> &'static str {
        match self {
            Index::Timestamp => "timestamp",
        }
    }
}

/// A bounded range of primary keys: inclusive lower, exclusive upper
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyRange {
    pub lower: String,
    pub upper: String,
}

impl KeyRange {
    pub fn new(lower: impl Into<String>, upper: impl Into<String>) -> Self {
        Self {
            lower: lower.into(),
            upper: upper.into(),
        }
    }

    /// Range covering every key that starts with `prefix`
    ///
    /// The upper bound is the prefix with its last character incremented,
    /// so `"2/13:"` covers `"2/13:1"` .. `"2/13:99,100"` and nothing else.
    pub fn prefix(prefix: &str) -> Self {
        let mut upper: Vec<char> = prefix.chars().collect();
        while let Some(last) = upper.pop() {
            if let Some(next) = char::from_u32(last as u32 + 1) {
                upper.push(next);
                return Self::new(prefix, upper.into_iter().collect::<String>());
            }
        }
        // Empty prefix (or all chars at char::MAX): everything
        Self::new(prefix, char::MAX.to_string())
    }

    /// Check whether `key` falls inside the range
    pub fn contains(&self, key: &str) -> bool {
        key >= self.lower.as_str() && key < self.upper.as_str()
    }
}

/// A stored record
///
/// `timestamp` backs the `timestamp` index where a collection defines one.
/// It is kept at millisecond precision so every backend orders identically.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub data: serde_json::Value,
}

impl Record {
    pub fn new(id: impl Into<String>, timestamp: DateTime<Utc>, data: serde_json::Value) -> Self {
        Self {
            id: id.into(),
            timestamp: truncate_millis(timestamp),
            data,
        }
    }
}

pub(crate) fn truncate_millis(ts: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ts.timestamp_millis()).unwrap_or(ts)
}

/// Transactional key-value store with named collections
///
/// Every operation runs in its own transaction; no caller can observe
/// another operation's partial effect.
pub trait KeyValueStore: Send + Sync {
    /// Get a record by id
    fn get(&self, collection: Collection, id: &str) -> StorageResult<Option<Record>>;

    /// Get all records (optionally within a key range), ordered by id
    fn get_all(&self, collection: Collection, range: Option<&KeyRange>)
        -> StorageResult<Vec<Record>>;

    /// Insert or replace a record by id
    fn put(&self, collection: Collection, record: &Record) -> StorageResult<()>;

    /// Insert a record only if its id is free; returns whether it was written
    fn put_if_absent(&self, collection: Collection, record: &Record) -> StorageResult<bool>;

    /// Delete a record; deleting a missing id is not an error
    fn delete(&self, collection: Collection, id: &str) -> StorageResult<()>;

    /// Remove every record in a collection
    fn clear(&self, collection: Collection) -> StorageResult<()>;

    /// Number of records in a collection
    fn count(&self, collection: Collection) -> StorageResult<u64>;

    /// Ids of the `n` oldest records, scanning `index` ascending
    fn get_oldest_by_index(
        &self,
        collection: Collection,
        index: Index,
        n: usize,
    ) -> StorageResult<Vec<String>>;

    /// Records scanning `index` descending, skipping `offset`, at most `limit`
    fn get_newest_by_index(
        &self,
        collection: Collection,
        index: Index,
        limit: usize,
        offset: usize,
    ) -> StorageResult<Vec<Record>>;
}
