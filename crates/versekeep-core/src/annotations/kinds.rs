//! Annotation kinds
//!
//! Each kind fixes its collection, its payload type and what `add` does
//! when a record for the exact same verse set already exists.

use std::fmt;
use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::storage::Collection;

/// What `add` does when the id already exists
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplicatePolicy {
    /// Leave the existing record alone and report `AlreadyExists`
    Reject,
    /// Replace payload and timestamp, keep id and verses
    Upsert,
}

/// A kind of verse-keyed annotation
pub trait AnnotationKind: Send + Sync + 'static {
    const COLLECTION: Collection;
    const ON_DUPLICATE: DuplicatePolicy;

    type Payload: Serialize + DeserializeOwned + Clone + fmt::Debug + PartialEq + Send + Sync;
}

/// Bookmarks: no payload, no duplicates
#[derive(Debug, Clone, Copy)]
pub struct Bookmark;

impl AnnotationKind for Bookmark {
    const COLLECTION: Collection = Collection::Bookmarks;
    const ON_DUPLICATE: DuplicatePolicy = DuplicatePolicy::Reject;
    type Payload = ();
}

/// Notes: free text, editable after creation
#[derive(Debug, Clone, Copy)]
pub struct Note;

impl AnnotationKind for Note {
    const COLLECTION: Collection = Collection::Notes;
    const ON_DUPLICATE: DuplicatePolicy = DuplicatePolicy::Upsert;
    type Payload = String;
}

/// Highlights: one color from a fixed palette
#[derive(Debug, Clone, Copy)]
pub struct Highlight;

impl AnnotationKind for Highlight {
    const COLLECTION: Collection = Collection::Highlights;
    const ON_DUPLICATE: DuplicatePolicy = DuplicatePolicy::Upsert;
    type Payload = HighlightColor;
}

/// Highlight palette, stored as its hex token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum HighlightColor {
    #[default]
    Yellow,
    Green,
    Blue,
    Pink,
    Orange,
    Purple,
}

impl HighlightColor {
    pub const PALETTE: [HighlightColor; 6] = [
        HighlightColor::Yellow,
        HighlightColor::Green,
        HighlightColor::Blue,
        HighlightColor::Pink,
        HighlightColor::Orange,
        HighlightColor::Purple,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            HighlightColor::Yellow => "Yellow",
            HighlightColor::Green => "Green",
            HighlightColor::Blue => "Blue",
            HighlightColor::Pink => "Pink",
            HighlightColor::Orange => "Orange",
            HighlightColor::Purple => "Purple",
        }
    }

    pub fn hex(&self) -> &'static str {
        match self {
            HighlightColor::Yellow => "#fff59d",
            HighlightColor::Green => "#a5d6a7",
            HighlightColor::Blue => "#90caf9",
            HighlightColor::Pink => "#f48fb1",
            HighlightColor::Orange => "#ffcc80",
            HighlightColor::Purple => "#ce93d8",
        }
    }
}

impl fmt::Display for HighlightColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for HighlightColor {
    type Err = String;

    /// Accepts a palette name (any case) or its hex token
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        HighlightColor::PALETTE
            .into_iter()
            .find(|c| c.name().eq_ignore_ascii_case(s) || c.hex().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("Unknown highlight color '{}'", s))
    }
}

impl TryFrom<String> for HighlightColor {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<HighlightColor> for String {
    fn from(color: HighlightColor) -> Self {
        color.hex().to_string()
    }
}
