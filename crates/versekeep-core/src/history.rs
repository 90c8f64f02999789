//! Reading history
//!
//! A set of most-recently-visited locations, not a log of every visit:
//! recording a location that already exists only moves its timestamp.
//! The collection is bounded; once it grows past the ceiling the oldest
//! entries are pruned through the `timestamp` index.
//!
//! Chapter visits (`1/1`) and verse visits (`1/1:3`) are independent
//! entries.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, error, warn};

use crate::address::{self, chapter_key};
use crate::notifier::ChangeNotifier;
use crate::storage::{Collection, Database, Index, Record, StorageResult};

/// Default number of entries kept
pub const DEFAULT_HISTORY_LIMIT: u64 = 10_000;

/// A visited location
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoryEntry {
    /// `book/chapter`, `book/chapter:verse` or `book/chapter:start-end`
    pub id: String,
    pub last_viewed_at: DateTime<Utc>,
}

/// A decoded history id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Location {
    pub book: u8,
    pub chapter: u32,
    pub start_verse: Option<u32>,
    pub end_verse: Option<u32>,
}

impl HistoryEntry {
    /// Decode the id into book, chapter and verse span
    ///
    /// Returns `None` for ids that don't follow the history grammar.
    pub fn location(&self) -> Option<Location> {
        let (book_chapter, verse_part) = match self.id.split_once(':') {
            Some((bc, v)) => (bc, Some(v)),
            None => (self.id.as_str(), None),
        };
        let (book, chapter) = book_chapter.split_once('/')?;
        let book = book.parse().ok()?;
        let chapter = chapter.parse().ok()?;

        let (start_verse, end_verse) = match verse_part {
            None => (None, None),
            Some(part) => match part.split_once('-') {
                Some((start, end)) => (Some(start.parse().ok()?), Some(end.parse().ok()?)),
                None => {
                    let verse = part.parse().ok()?;
                    (Some(verse), Some(verse))
                }
            },
        };

        Some(Location {
            book,
            chapter,
            start_verse,
            end_verse,
        })
    }

    /// `book/chapter` of this entry
    pub fn chapter_key(&self) -> Option<String> {
        self.location().map(|l| chapter_key(l.book, l.chapter))
    }
}

impl From<Record> for HistoryEntry {
    fn from(record: Record) -> Self {
        Self {
            id: record.id,
            last_viewed_at: record.timestamp,
        }
    }
}

/// Bounded most-recently-visited set
#[derive(Clone)]
pub struct HistoryLog {
    db: Arc<Database>,
    notifier: ChangeNotifier,
    limit: u64,
}

impl HistoryLog {
    pub fn new(db: Arc<Database>, notifier: ChangeNotifier) -> Self {
        Self::with_limit(db, notifier, DEFAULT_HISTORY_LIMIT)
    }

    pub fn with_limit(db: Arc<Database>, notifier: ChangeNotifier, limit: u64) -> Self {
        Self {
            db,
            notifier,
            limit,
        }
    }

    pub fn limit(&self) -> u64 {
        self.limit
    }

    /// Record a visit now
    pub fn record(
        &self,
        book: u8,
        chapter: u32,
        verse: Option<u32>,
        end_verse: Option<u32>,
    ) -> StorageResult<HistoryEntry> {
        self.record_at(book, chapter, verse, end_verse, Utc::now())
    }

    /// Record a visit with an explicit timestamp
    ///
    /// Overwrites the timestamp of an existing entry, then prunes the
    /// oldest entries if the collection exceeds the limit. Publishes once.
    /// A location that would not decode is rejected before any write.
    pub fn record_at(
        &self,
        book: u8,
        chapter: u32,
        verse: Option<u32>,
        end_verse: Option<u32>,
        at: DateTime<Utc>,
    ) -> StorageResult<HistoryEntry> {
        address::validate_history(book, chapter, verse, end_verse)?;
        let id = address::history_id(book, chapter, verse, end_verse);
        let record = Record::new(id, at, serde_json::json!({}));
        let store = self.db.open()?;
        store.put(Collection::History, &record)?;

        if let Err(e) = self.prune() {
            // History may run over the limit until the next successful prune
            error!("Failed to prune history: {}", e);
        }

        self.notifier.publish();
        Ok(record.into())
    }

    /// Delete the oldest entries beyond the limit
    ///
    /// Only the overflow path pays for the index scan.
    fn prune(&self) -> StorageResult<()> {
        let store = self.db.open()?;
        let count = store.count(Collection::History)?;
        if count <= self.limit {
            return Ok(());
        }

        let excess = (count - self.limit) as usize;
        let ids = store.get_oldest_by_index(Collection::History, Index::Timestamp, excess)?;
        debug!("Pruning {} history entries", ids.len());
        for id in ids {
            store.delete(Collection::History, &id)?;
        }
        Ok(())
    }

    /// Entries newest first
    ///
    /// With a `limit`, pages through the timestamp index, skipping
    /// `offset` entries; without one, returns everything.
    pub fn list(&self, limit: Option<usize>, offset: usize) -> StorageResult<Vec<HistoryEntry>> {
        let store = match self.db.open() {
            Ok(store) => store,
            Err(e) if e.is_unavailable() => {
                warn!("History store unavailable, returning no data: {}", e);
                return Ok(Vec::new());
            }
            Err(e) => return Err(e),
        };

        let records = match limit {
            Some(limit) => {
                store.get_newest_by_index(Collection::History, Index::Timestamp, limit, offset)?
            }
            None => {
                let mut all = store.get_all(Collection::History, None)?;
                all.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then_with(|| b.id.cmp(&a.id)));
                all.into_iter().skip(offset).collect()
            }
        };

        Ok(records.into_iter().map(HistoryEntry::from).collect())
    }

    pub fn count(&self) -> StorageResult<u64> {
        match self.db.open() {
            Ok(store) => store.count(Collection::History),
            Err(e) if e.is_unavailable() => Ok(0),
            Err(e) => Err(e),
        }
    }

    /// Wipe the history
    pub fn clear(&self) -> StorageResult<()> {
        self.db.open()?.clear(Collection::History)?;
        self.notifier.publish();
        Ok(())
    }
}
