//! Cross-reference corpus parsing
//!
//! Corpus rows look like `Gen.1.1\tJohn.1.1-John.1.3\t42`. The last two
//! dot-separated segments of a reference are chapter and verse; everything
//! before them is the book abbreviation, which may itself contain dots.

use std::collections::HashMap;

use tracing::debug;

use super::{Coordinate, CrossReference};

/// Book abbreviation to book number
pub type Abbreviations = HashMap<String, u8>;

/// Parse one `Book.chapter.verse` reference
///
/// Unknown books and non-numeric chapter or verse yield `None`.
pub fn parse_reference(reference: &str, abbreviations: &Abbreviations) -> Option<Coordinate> {
    let mut parts = reference.trim().rsplitn(3, '.');
    let verse = parts.next()?.parse().ok()?;
    let chapter = parts.next()?.parse().ok()?;
    let book = parts.next()?;
    let book = *abbreviations.get(book)?;

    Some(Coordinate {
        book,
        chapter,
        verse,
    })
}

/// Parse the target column: one reference or a hyphenated range
///
/// Hyphens may also appear inside abbreviations, so the split happens at
/// the first hyphen where both sides are complete references. A range with
/// one unknown side keeps the side that parses.
pub fn parse_target(target: &str, abbreviations: &Abbreviations) -> Vec<Coordinate> {
    for (i, _) in target.match_indices('-') {
        let (start, end) = (&target[..i], &target[i + 1..]);
        if let (Some(start), Some(end)) = (
            parse_reference(start, abbreviations),
            parse_reference(end, abbreviations),
        ) {
            return vec![start, end];
        }
    }

    if let Some(single) = parse_reference(target, abbreviations) {
        return vec![single];
    }

    target
        .split('-')
        .filter_map(|part| parse_reference(part, abbreviations))
        .collect()
}

/// Parse a whole corpus into per-book edge lists
///
/// The first line is a header. Malformed rows are skipped; edges keep
/// their corpus order.
pub fn parse_corpus(text: &str, abbreviations: &Abbreviations) -> HashMap<u8, Vec<CrossReference>> {
    let mut books: HashMap<u8, Vec<CrossReference>> = HashMap::new();
    let mut skipped = 0usize;

    for line in text.lines().skip(1) {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() < 3 {
            skipped += 1;
            continue;
        }

        let Some(from) = parse_reference(fields[0], abbreviations) else {
            skipped += 1;
            continue;
        };
        let to = parse_target(fields[1], abbreviations);
        if to.is_empty() {
            skipped += 1;
            continue;
        }
        let weight = fields[2].trim().parse().unwrap_or(0);

        books.entry(from.book).or_default().push(CrossReference {
            chapter: from.chapter,
            verse: from.verse,
            to,
            weight,
        });
    }

    if skipped > 0 {
        debug!("Skipped {} unparseable cross-reference rows", skipped);
    }
    books
}
