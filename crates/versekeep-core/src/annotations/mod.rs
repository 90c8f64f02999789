//! Verse-keyed annotations
//!
//! Bookmarks, notes and highlights share one repository type,
//! parameterized by [`AnnotationKind`]. Records are keyed by the verse
//! address id, and chapter queries are bounded to that chapter's key
//! range so a chapter view never scans the whole collection.
//!
//! Stored form: `{ "v": [verses], "p": payload }` with the record
//! timestamp as created/updated time.

mod kinds;

use std::marker::PhantomData;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::address::{self, AddressError, VerseAddress};
use crate::notifier::ChangeNotifier;
use crate::storage::{Collection, Database, KeyRange, Record, StorageError, StorageResult};

pub use kinds::{AnnotationKind, Bookmark, DuplicatePolicy, Highlight, HighlightColor, Note};

pub type Bookmarks = AnnotationRepository<Bookmark>;
pub type Notes = AnnotationRepository<Note>;
pub type Highlights = AnnotationRepository<Highlight>;

/// A stored annotation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Annotation<P> {
    /// Verse address id
    pub id: String,
    /// Sorted verse set
    pub verses: Vec<u32>,
    /// Created or last updated
    pub updated_at: DateTime<Utc>,
    pub payload: P,
}

impl<P> Annotation<P> {
    /// Decode the id back into book, chapter and verses
    pub fn address(&self) -> Result<VerseAddress, AddressError> {
        VerseAddress::decode(&self.id)
    }

    pub fn contains(&self, verse: u32) -> bool {
        self.verses.binary_search(&verse).is_ok()
    }
}

/// Result of `add`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AddOutcome {
    Added,
    Updated,
    /// Non-fatal: a bookmark for this exact verse set already exists
    AlreadyExists,
}

#[derive(Serialize, Deserialize)]
struct Stored<P> {
    #[serde(rename = "v")]
    verses: Vec<u32>,
    #[serde(rename = "p")]
    payload: P,
}

/// Repository for one annotation kind
pub struct AnnotationRepository<K: AnnotationKind> {
    db: Arc<Database>,
    notifier: ChangeNotifier,
    _kind: PhantomData<K>,
}

impl<K: AnnotationKind> Clone for AnnotationRepository<K> {
    fn clone(&self) -> Self {
        Self {
            db: Arc::clone(&self.db),
            notifier: self.notifier.clone(),
            _kind: PhantomData,
        }
    }
}

impl<K: AnnotationKind> AnnotationRepository<K> {
    pub fn new(db: Arc<Database>, notifier: ChangeNotifier) -> Self {
        Self {
            db,
            notifier,
            _kind: PhantomData,
        }
    }

    // ==================== Mutations ====================

    /// Annotate a set of verses
    ///
    /// An existing record with the same id is rejected or replaced
    /// according to the kind's [`DuplicatePolicy`]. Publishes once unless
    /// the add was rejected. Out-of-range books, chapters or verses fail
    /// with [`StorageError::Address`] before the store is touched.
    ///
    /// Rejecting kinds insert with a single conditional write, so of two
    /// concurrent adds of the same id exactly one reports `Added`.
    pub fn add(
        &self,
        book: u8,
        chapter: u32,
        verses: &[u32],
        payload: K::Payload,
    ) -> StorageResult<AddOutcome> {
        let address = VerseAddress::new(book, chapter, verses.iter().copied());
        if address.verses.is_empty() {
            return Err(AddressError::EmptyVerses.into());
        }
        address.validate()?;
        let id = address.encode();
        let store = self.db.open()?;

        let stored = Stored {
            verses: address.verses,
            payload,
        };
        let record = encode_record(K::COLLECTION, &id, Utc::now(), &stored)?;

        let outcome = match K::ON_DUPLICATE {
            DuplicatePolicy::Reject => {
                if !store.put_if_absent(K::COLLECTION, &record)? {
                    debug!("{} {} already exists", K::COLLECTION, id);
                    return Ok(AddOutcome::AlreadyExists);
                }
                AddOutcome::Added
            }
            DuplicatePolicy::Upsert => {
                let existed = store.get(K::COLLECTION, &id)?.is_some();
                store.put(K::COLLECTION, &record)?;
                if existed {
                    AddOutcome::Updated
                } else {
                    AddOutcome::Added
                }
            }
        };

        self.notifier.publish();
        Ok(outcome)
    }

    /// Annotate an inclusive span of verses
    pub fn add_span(
        &self,
        book: u8,
        chapter: u32,
        start: u32,
        end: u32,
        payload: K::Payload,
    ) -> StorageResult<AddOutcome> {
        address::validate(book, chapter, &[start, end])?;
        let span = VerseAddress::span(book, chapter, start, end);
        self.add(book, chapter, &span.verses, payload)
    }

    /// Delete by id; removing a missing id is not an error
    pub fn remove(&self, id: &str) -> StorageResult<()> {
        self.db.open()?.delete(K::COLLECTION, id)?;
        self.notifier.publish();
        Ok(())
    }

    /// Remove every record of this kind
    pub fn clear(&self) -> StorageResult<()> {
        self.db.open()?.clear(K::COLLECTION)?;
        self.notifier.publish();
        Ok(())
    }

    // ==================== Queries ====================

    pub fn get(&self, id: &str) -> StorageResult<Option<Annotation<K::Payload>>> {
        let store = match self.db.open() {
            Ok(store) => store,
            Err(e) => return degraded(e, None),
        };
        store
            .get(K::COLLECTION, id)?
            .map(|record| decode_record(K::COLLECTION, record))
            .transpose()
    }

    /// Every record of this kind, ordered by id
    pub fn all(&self) -> StorageResult<Vec<Annotation<K::Payload>>> {
        self.query(None)
    }

    /// Every record in one chapter
    pub fn for_chapter(
        &self,
        book: u8,
        chapter: u32,
    ) -> StorageResult<Vec<Annotation<K::Payload>>> {
        self.query(Some(chapter_range(book, chapter)))
    }

    /// Every record in the chapter whose verse set contains `verse`
    ///
    /// Overlapping records are all returned.
    pub fn for_verse(
        &self,
        book: u8,
        chapter: u32,
        verse: u32,
    ) -> StorageResult<Vec<Annotation<K::Payload>>> {
        let mut annotations = self.for_chapter(book, chapter)?;
        annotations.retain(|a| a.contains(verse));
        Ok(annotations)
    }

    pub fn count(&self) -> StorageResult<u64> {
        match self.db.open() {
            Ok(store) => store.count(K::COLLECTION),
            Err(e) => degraded(e, 0),
        }
    }

    fn query(&self, range: Option<KeyRange>) -> StorageResult<Vec<Annotation<K::Payload>>> {
        let store = match self.db.open() {
            Ok(store) => store,
            Err(e) => return degraded(e, Vec::new()),
        };

        store
            .get_all(K::COLLECTION, range.as_ref())?
            .into_iter()
            .map(|record| decode_record(K::COLLECTION, record))
            .collect()
    }
}

impl AnnotationRepository<Note> {
    /// Replace a note's text and timestamp, keeping its id and verses
    ///
    /// Returns `false` if no note has this id.
    pub fn update(&self, id: &str, text: impl Into<String>) -> StorageResult<bool> {
        let store = self.db.open()?;
        let Some(record) = store.get(Note::COLLECTION, id)? else {
            return Ok(false);
        };

        let mut note: Annotation<String> = decode_record(Note::COLLECTION, record)?;
        note.payload = text.into();
        let stored = Stored {
            verses: note.verses,
            payload: note.payload,
        };
        store.put(
            Note::COLLECTION,
            &encode_record(Note::COLLECTION, id, Utc::now(), &stored)?,
        )?;
        self.notifier.publish();
        Ok(true)
    }
}

/// Key range covering every annotation id in one chapter
///
/// Annotation ids always carry a verse part, so the bound is
/// `book/chapter:` and `2/1` never picks up `2/13`.
pub(crate) fn chapter_range(book: u8, chapter: u32) -> KeyRange {
    KeyRange::prefix(&format!("{}:", address::chapter_key(book, chapter)))
}

/// Map an unavailable store to empty state; propagate anything else
fn degraded<T>(error: StorageError, empty: T) -> StorageResult<T> {
    if error.is_unavailable() {
        warn!("Annotation store unavailable, returning no data: {}", error);
        Ok(empty)
    } else {
        Err(error)
    }
}

fn encode_record<P: Serialize>(
    collection: Collection,
    id: &str,
    at: DateTime<Utc>,
    stored: &Stored<P>,
) -> StorageResult<Record> {
    let data = serde_json::to_value(stored).map_err(|source| StorageError::InvalidRecord {
        collection,
        id: id.to_string(),
        source,
    })?;
    Ok(Record::new(id, at, data))
}

fn decode_record<P: DeserializeOwned>(
    collection: Collection,
    record: Record,
) -> StorageResult<Annotation<P>> {
    let stored: Stored<P> =
        serde_json::from_value(record.data).map_err(|source| StorageError::InvalidRecord {
            collection,
            id: record.id.clone(),
            source,
        })?;
    Ok(Annotation {
        id: record.id,
        verses: stored.verses,
        updated_at: record.timestamp,
        payload: stored.payload,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Backend;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Fixture {
        db: Arc<Database>,
        notifier: ChangeNotifier,
        events: Arc<AtomicUsize>,
        _sub: crate::notifier::Subscription,
    }

    impl Fixture {
        fn new() -> Self {
            let db = Arc::new(Database::in_memory());
            let notifier = ChangeNotifier::new();
            let events = Arc::new(AtomicUsize::new(0));
            let seen = Arc::clone(&events);
            let sub = notifier.subscribe(move || {
                seen.fetch_add(1, Ordering::SeqCst);
            });
            Self {
                db,
                notifier,
                events,
                _sub: sub,
            }
        }

        fn repo<K: AnnotationKind>(&self) -> AnnotationRepository<K> {
            AnnotationRepository::new(Arc::clone(&self.db), self.notifier.clone())
        }

        fn events(&self) -> usize {
            self.events.load(Ordering::SeqCst)
        }
    }

    #[test]
    fn test_bookmark_duplicate_is_rejected() {
        let fx = Fixture::new();
        let bookmarks: Bookmarks = fx.repo();

        assert_eq!(bookmarks.add(43, 3, &[16], ()).unwrap(), AddOutcome::Added);
        assert_eq!(
            bookmarks.add(43, 3, &[16], ()).unwrap(),
            AddOutcome::AlreadyExists
        );
        assert_eq!(bookmarks.count().unwrap(), 1);
        assert_eq!(fx.events(), 1);
    }

    #[test]
    fn test_highlight_upsert_replaces_color() {
        let fx = Fixture::new();
        let highlights: Highlights = fx.repo();

        highlights
            .add(19, 23, &[1, 2, 3], HighlightColor::Yellow)
            .unwrap();
        let outcome = highlights
            .add(19, 23, &[3, 2, 1], HighlightColor::Blue)
            .unwrap();

        assert_eq!(outcome, AddOutcome::Updated);
        let all = highlights.all().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].id, "19/23:1-3");
        assert_eq!(all[0].payload, HighlightColor::Blue);
        assert_eq!(fx.events(), 2);
    }

    #[test]
    fn test_note_update_keeps_id_and_verses() {
        let fx = Fixture::new();
        let notes: Notes = fx.repo();

        notes
            .add(1, 1, &[1, 3], "In the beginning".to_string())
            .unwrap();
        let before = notes.get("1/1:1,3").unwrap().unwrap();

        assert!(notes.update("1/1:1,3", "Revised").unwrap());
        assert!(!notes.update("1/1:2", "Nothing here").unwrap());

        let after = notes.get("1/1:1,3").unwrap().unwrap();
        assert_eq!(after.payload, "Revised");
        assert_eq!(after.verses, before.verses);
        assert!(after.updated_at >= before.updated_at);
        assert_eq!(fx.events(), 2);
    }

    #[test]
    fn test_remove_is_idempotent() {
        let fx = Fixture::new();
        let bookmarks: Bookmarks = fx.repo();
        bookmarks.add(1, 1, &[1], ()).unwrap();

        bookmarks.remove("1/1:1").unwrap();
        bookmarks.remove("1/1:1").unwrap();

        assert!(bookmarks.get("1/1:1").unwrap().is_none());
        assert_eq!(fx.events(), 3);
    }

    #[test]
    fn test_for_verse_returns_overlapping_records() {
        let fx = Fixture::new();
        let notes: Notes = fx.repo();
        notes.add(5, 6, &[4, 5, 6], "shema".into()).unwrap();
        notes.add(5, 6, &[5], "love".into()).unwrap();
        notes.add(5, 6, &[7, 9], "teach".into()).unwrap();

        let hits = notes.for_verse(5, 6, 5).unwrap();
        let ids: Vec<&str> = hits.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["5/6:4-6", "5/6:5"]);

        assert!(notes.for_verse(5, 6, 8).unwrap().is_empty());
        assert_eq!(notes.for_chapter(5, 6).unwrap().len(), 3);
    }

    #[test]
    fn test_prefix_isolation() {
        let fx = Fixture::new();
        let highlights: Highlights = fx.repo();
        highlights
            .add(2, 13, &[1], HighlightColor::Green)
            .unwrap();

        assert!(highlights.for_chapter(2, 3).unwrap().is_empty());
        assert!(highlights.for_chapter(2, 1).unwrap().is_empty());
        assert!(highlights.for_verse(3, 13, 1).unwrap().is_empty());
        assert_eq!(highlights.for_verse(2, 13, 1).unwrap().len(), 1);
    }

    #[test]
    fn test_add_rejects_empty_verses() {
        let fx = Fixture::new();
        let bookmarks: Bookmarks = fx.repo();
        let err = bookmarks.add(1, 1, &[], ()).unwrap_err();
        assert!(matches!(err, StorageError::Address(AddressError::EmptyVerses)));
        assert_eq!(fx.events(), 0);
    }

    #[test]
    fn test_add_rejects_out_of_range_addresses() {
        let fx = Fixture::new();
        let bookmarks: Bookmarks = fx.repo();

        let err = bookmarks.add(0, 1, &[1], ()).unwrap_err();
        assert!(matches!(err, StorageError::Address(AddressError::BookOutOfRange(0))));
        let err = bookmarks.add(67, 1, &[1], ()).unwrap_err();
        assert!(matches!(err, StorageError::Address(AddressError::BookOutOfRange(67))));
        let err = bookmarks.add(1, 0, &[1], ()).unwrap_err();
        assert!(matches!(err, StorageError::Address(AddressError::Zero(_))));
        let err = bookmarks.add(1, 1, &[0, 1], ()).unwrap_err();
        assert!(matches!(err, StorageError::Address(AddressError::Zero(_))));
        let err = bookmarks.add(1, 1, &[177], ()).unwrap_err();
        assert!(matches!(err, StorageError::Address(AddressError::VerseOutOfRange(177))));
        let err = bookmarks.add_span(1, 1, 1, u32::MAX, ()).unwrap_err();
        assert!(matches!(err, StorageError::Address(AddressError::VerseOutOfRange(_))));

        assert_eq!(bookmarks.count().unwrap(), 0);
        assert_eq!(fx.events(), 0);
    }

    #[test]
    fn test_stored_ids_decode_back() {
        let fx = Fixture::new();
        let highlights: Highlights = fx.repo();
        highlights.add(19, 119, &[176, 1], HighlightColor::Pink).unwrap();
        highlights.add_span(66, 22, 20, 21, HighlightColor::Blue).unwrap();

        for annotation in highlights.all().unwrap() {
            let address = annotation.address().unwrap();
            assert_eq!(address.verses, annotation.verses);
            assert_eq!(address.encode(), annotation.id);
        }
    }

    #[test]
    fn test_concurrent_bookmark_adds_publish_once() {
        let fx = Fixture::new();
        let bookmarks: Bookmarks = fx.repo();

        let outcomes: Vec<AddOutcome> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    let bookmarks = bookmarks.clone();
                    scope.spawn(move || bookmarks.add(43, 3, &[16], ()).unwrap())
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let added = outcomes.iter().filter(|o| **o == AddOutcome::Added).count();
        assert_eq!(added, 1);
        assert_eq!(bookmarks.count().unwrap(), 1);
        assert_eq!(fx.events(), 1);
    }

    #[test]
    fn test_add_span() {
        let fx = Fixture::new();
        let bookmarks: Bookmarks = fx.repo();
        bookmarks.add_span(40, 5, 3, 10, ()).unwrap();

        let all = bookmarks.all().unwrap();
        assert_eq!(all[0].id, "40/5:3-10");
        assert_eq!(all[0].address().unwrap().verses.len(), 8);
    }

    #[test]
    fn test_unavailable_store_reads_as_empty() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let blocker = temp_dir.path().join("blocker");
        std::fs::write(&blocker, b"file").unwrap();

        let db = Arc::new(Database::new(Backend::Sqlite(blocker.join("db.sqlite"))));
        let notes: Notes = AnnotationRepository::new(db, ChangeNotifier::new());

        assert!(notes.for_verse(1, 1, 1).unwrap().is_empty());
        assert!(notes.all().unwrap().is_empty());
        assert_eq!(notes.count().unwrap(), 0);
        assert!(notes.get("1/1:1").unwrap().is_none());

        let err = notes.add(1, 1, &[1], "x".into()).unwrap_err();
        assert!(err.is_unavailable());
    }
}
