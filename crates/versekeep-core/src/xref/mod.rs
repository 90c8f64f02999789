//! Cross-reference index
//!
//! Built lazily on the first query and at most once per index: concurrent
//! first queries wait on the same in-flight build. A build that fails to
//! load its inputs produces an empty index instead of an error.

pub mod parse;
pub mod source;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::OnceCell;
use tracing::{error, info};

pub use parse::{parse_corpus, parse_reference, Abbreviations};
pub use source::{FileSource, ReferenceError, ReferenceResult, ReferenceSource, StaticSource};

/// A single verse location
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Coordinate {
    pub book: u8,
    pub chapter: u32,
    pub verse: u32,
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.book, self.chapter, self.verse)
    }
}

impl Serialize for Coordinate {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Edge from one verse of a book to a target verse or range
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CrossReference {
    pub chapter: u32,
    pub verse: u32,
    /// One coordinate, or the two ends of a range
    pub to: Vec<Coordinate>,
    /// Community vote count; higher is more relevant
    pub weight: i64,
}

/// Memoized book to edges map
pub struct CrossReferenceIndex {
    source: Arc<dyn ReferenceSource>,
    books: OnceCell<HashMap<u8, Vec<CrossReference>>>,
}

impl CrossReferenceIndex {
    pub fn new(source: Arc<dyn ReferenceSource>) -> Self {
        Self {
            source,
            books: OnceCell::new(),
        }
    }

    pub fn is_built(&self) -> bool {
        self.books.initialized()
    }

    /// Every edge starting in `book`, in corpus order
    ///
    /// Unknown books yield an empty slice.
    pub async fn for_book(&self, book: u8) -> &[CrossReference] {
        self.books()
            .await
            .get(&book)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Edges starting at one verse
    pub async fn for_verse(&self, book: u8, chapter: u32, verse: u32) -> Vec<&CrossReference> {
        self.for_book(book)
            .await
            .iter()
            .filter(|e| e.chapter == chapter && e.verse == verse)
            .collect()
    }

    /// Number of books with at least one edge
    pub async fn book_count(&self) -> usize {
        self.books().await.len()
    }

    async fn books(&self) -> &HashMap<u8, Vec<CrossReference>> {
        self.books
            .get_or_init(|| async {
                match self.build().await {
                    Ok(books) => books,
                    Err(e) => {
                        error!("Failed to load cross references: {}", e);
                        HashMap::new()
                    }
                }
            })
            .await
    }

    async fn build(&self) -> ReferenceResult<HashMap<u8, Vec<CrossReference>>> {
        let (abbreviations, corpus) =
            tokio::try_join!(self.source.abbreviations(), self.source.corpus())?;
        let books = parse_corpus(&corpus, &abbreviations);
        info!(
            "Loaded cross references for {} books ({} edges)",
            books.len(),
            books.values().map(Vec::len).sum::<usize>()
        );
        Ok(books)
    }
}
