//! Verse addresses
//!
//! Compact string keys for a book/chapter/verse-set, shared by every
//! annotation kind and by reading history:
//!
//! ```text
//! id     = book "/" chapter [":" verses]
//! verses = single | range | list
//! single = 1*DIGIT
//! range  = single "-" single
//! list   = single *("," single)
//! ```
//!
//! A sorted verse set encodes as a singleton (`19/23:1`), a contiguous
//! range (`19/23:1-3`) or a comma list (`19/23:1,3`). Decoding is the
//! exact inverse.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of books in the corpus
pub const BOOK_COUNT: u8 = 66;

/// Highest verse number accepted; the longest chapter (Psalm 119) has 176
pub const MAX_VERSE: u32 = 176;

/// Errors for malformed verse ids
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
    #[error("Missing '/' between book and chapter in '{0}'")]
    MissingChapter(String),

    #[error("Invalid number '{value}' in '{id}'")]
    InvalidNumber { id: String, value: String },

    #[error("Book {0} is outside 1..=66")]
    BookOutOfRange(u32),

    #[error("Chapter and verse numbers must be positive in '{0}'")]
    Zero(String),

    #[error("Range start is after range end in '{0}'")]
    InvertedRange(String),

    #[error("Verse {0} is beyond the last verse of any chapter (176)")]
    VerseOutOfRange(u32),

    #[error("An annotation needs at least one verse")]
    EmptyVerses,
}

pub type AddressResult<T> = Result<T, AddressError>;

/// A book, chapter and sorted set of verses
///
/// `verses` is strictly increasing. An empty set addresses the whole
/// chapter (`book/chapter`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VerseAddress {
    pub book: u8,
    pub chapter: u32,
    pub verses: Vec<u32>,
}

impl VerseAddress {
    /// Build an address, sorting and de-duplicating `verses`
    pub fn new(book: u8, chapter: u32, verses: impl IntoIterator<Item = u32>) -> Self {
        let mut verses: Vec<u32> = verses.into_iter().collect();
        verses.sort_unstable();
        verses.dedup();
        Self {
            book,
            chapter,
            verses,
        }
    }

    /// Address of a whole chapter
    pub fn chapter(book: u8, chapter: u32) -> Self {
        Self::new(book, chapter, [])
    }

    /// Address of an inclusive verse span
    pub fn span(book: u8, chapter: u32, start: u32, end: u32) -> Self {
        Self::new(book, chapter, start..=end.max(start))
    }

    /// Canonical string id
    pub fn encode(&self) -> String {
        encode(self.book, self.chapter, &self.verses)
    }

    /// Parse a canonical string id
    pub fn decode(id: &str) -> AddressResult<Self> {
        decode(id).map(|d| d.address)
    }

    /// `book/chapter`, the key prefix shared by every id in this chapter
    pub fn chapter_key(&self) -> String {
        chapter_key(self.book, self.chapter)
    }

    pub fn start_verse(&self) -> Option<u32> {
        self.verses.first().copied()
    }

    pub fn end_verse(&self) -> Option<u32> {
        self.verses.last().copied()
    }

    pub fn contains(&self, verse: u32) -> bool {
        self.verses.binary_search(&verse).is_ok()
    }

    /// True when the verses form one run with no gaps
    pub fn is_contiguous(&self) -> bool {
        is_contiguous(&self.verses)
    }

    /// Check that `decode` would accept this address
    pub fn validate(&self) -> AddressResult<()> {
        validate(self.book, self.chapter, &self.verses)
    }
}

impl fmt::Display for VerseAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

impl FromStr for VerseAddress {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::decode(s)
    }
}

/// A decoded id with its first and last verse
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedAddress {
    pub address: VerseAddress,
    pub start_verse: Option<u32>,
    pub end_verse: Option<u32>,
}

/// `book/chapter`
pub fn chapter_key(book: u8, chapter: u32) -> String {
    format!("{}/{}", book, chapter)
}

fn is_contiguous(sorted: &[u32]) -> bool {
    match (sorted.first(), sorted.last()) {
        (Some(&min), Some(&max)) => sorted.len() as u64 == u64::from(max - min) + 1,
        _ => false,
    }
}

/// Encode a book, chapter and verse set
///
/// Verses are sorted and de-duplicated first, so any ordering of the same
/// set yields the same id.
pub fn encode(book: u8, chapter: u32, verses: &[u32]) -> String {
    let mut sorted = verses.to_vec();
    sorted.sort_unstable();
    sorted.dedup();

    let key = chapter_key(book, chapter);
    match sorted.as_slice() {
        [] => key,
        [single] => format!("{}:{}", key, single),
        [start, .., end] if is_contiguous(&sorted) => format!("{}:{}-{}", key, start, end),
        _ => {
            let list: Vec<String> = sorted.iter().map(u32::to_string).collect();
            format!("{}:{}", key, list.join(","))
        }
    }
}

/// Check book, chapter and verse bounds
///
/// Anything stored under an id built from these parts must decode again.
pub fn validate(book: u8, chapter: u32, verses: &[u32]) -> AddressResult<()> {
    if book == 0 || book > BOOK_COUNT {
        return Err(AddressError::BookOutOfRange(u32::from(book)));
    }
    if chapter == 0 || verses.contains(&0) {
        return Err(AddressError::Zero(encode(book, chapter, verses)));
    }
    match verses.iter().find(|&&v| v > MAX_VERSE) {
        Some(&v) => Err(AddressError::VerseOutOfRange(v)),
        None => Ok(()),
    }
}

/// Decode an id produced by [`encode`]
pub fn decode(id: &str) -> AddressResult<DecodedAddress> {
    let (book_chapter, verses_part) = match id.split_once(':') {
        Some((bc, v)) => (bc, Some(v)),
        None => (id, None),
    };

    let (book, chapter) = book_chapter
        .split_once('/')
        .ok_or_else(|| AddressError::MissingChapter(id.to_string()))?;
    let book = parse_number(id, book)?;
    if book == 0 || book > u32::from(BOOK_COUNT) {
        return Err(AddressError::BookOutOfRange(book));
    }
    let chapter = positive(id, parse_number(id, chapter)?)?;

    let verses = match verses_part {
        None => Vec::new(),
        Some(part) if part.contains('-') && !part.contains(',') => {
            let (start, end) = part
                .split_once('-')
                .ok_or_else(|| AddressError::InvertedRange(id.to_string()))?;
            let start = verse(id, start)?;
            let end = verse(id, end)?;
            if start > end {
                return Err(AddressError::InvertedRange(id.to_string()));
            }
            (start..=end).collect()
        }
        Some(part) if part.contains(',') => part
            .split(',')
            .map(|v| verse(id, v))
            .collect::<AddressResult<Vec<u32>>>()?,
        Some(part) => vec![verse(id, part)?],
    };

    let address = VerseAddress::new(book as u8, chapter, verses);
    Ok(DecodedAddress {
        start_verse: address.start_verse(),
        end_verse: address.end_verse(),
        address,
    })
}

fn parse_number(id: &str, value: &str) -> AddressResult<u32> {
    value
        .trim()
        .parse()
        .map_err(|_| AddressError::InvalidNumber {
            id: id.to_string(),
            value: value.to_string(),
        })
}

fn positive(id: &str, n: u32) -> AddressResult<u32> {
    if n == 0 {
        Err(AddressError::Zero(id.to_string()))
    } else {
        Ok(n)
    }
}

/// A positive verse number no higher than [`MAX_VERSE`]
fn verse(id: &str, value: &str) -> AddressResult<u32> {
    let n = positive(id, parse_number(id, value)?)?;
    if n > MAX_VERSE {
        return Err(AddressError::VerseOutOfRange(n));
    }
    Ok(n)
}

/// Check a history location before building its id
///
/// Same bounds as [`validate`], plus `end_verse` may not precede `verse`.
pub fn validate_history(
    book: u8,
    chapter: u32,
    verse: Option<u32>,
    end_verse: Option<u32>,
) -> AddressResult<()> {
    let verses: Vec<u32> = verse
        .into_iter()
        .chain(end_verse.filter(|_| verse.is_some()))
        .collect();
    validate(book, chapter, &verses)?;
    match (verse, end_verse) {
        (Some(v), Some(e)) if e < v => Err(AddressError::InvertedRange(format!(
            "{}:{}-{}",
            chapter_key(book, chapter),
            v,
            e
        ))),
        _ => Ok(()),
    }
}

/// History location id: `book/chapter`, `book/chapter:verse` or
/// `book/chapter:start-end`
///
/// An `end_verse` equal to `verse` collapses to the single-verse form;
/// an `end_verse` without a `verse` is ignored.
pub fn history_id(book: u8, chapter: u32, verse: Option<u32>, end_verse: Option<u32>) -> String {
    let key = chapter_key(book, chapter);
    match (verse, end_verse) {
        (None, _) => key,
        (Some(v), Some(e)) if e != v => format!("{}:{}-{}", key, v, e),
        (Some(v), _) => format!("{}:{}", key, v),
    }
}
