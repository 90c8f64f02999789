//! Command handlers

pub mod annotation;
pub mod cache;
pub mod config;
pub mod history;
pub mod manifest;
pub mod note;
pub mod xref;

use anyhow::{bail, Context, Result};

/// Parse a `book/chapter` filter
pub fn parse_chapter(value: &str) -> Result<(u8, u32)> {
    let Some((book, chapter)) = value.split_once('/') else {
        bail!("Expected book/chapter, e.g. 19/23 (got '{}')", value);
    };
    let book = book
        .trim()
        .parse()
        .with_context(|| format!("Invalid book number: '{}'", book))?;
    let chapter = chapter
        .trim()
        .parse()
        .with_context(|| format!("Invalid chapter number: '{}'", chapter))?;
    Ok((book, chapter))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_chapter() {
        assert_eq!(parse_chapter("19/23").unwrap(), (19, 23));
        assert_eq!(parse_chapter(" 1 / 1 ").unwrap(), (1, 1));
        assert!(parse_chapter("19").is_err());
        assert!(parse_chapter("ps/23").is_err());
        assert!(parse_chapter("300/1").is_err());
    }
}
