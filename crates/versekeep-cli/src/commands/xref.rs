//! Cross-reference lookup

use std::sync::Arc;

use anyhow::Result;

use versekeep_core::xref::FileSource;
use versekeep_core::{Config, CrossReferenceIndex};

use crate::output::Output;

pub async fn show(
    config: &Config,
    book: u8,
    chapter: Option<u32>,
    verse: Option<u32>,
    output: &Output,
) -> Result<()> {
    let index = CrossReferenceIndex::new(Arc::new(FileSource::from_config(&config.references)));

    let edges: Vec<_> = index
        .for_book(book)
        .await
        .iter()
        .filter(|e| chapter.map_or(true, |c| e.chapter == c))
        .filter(|e| verse.map_or(true, |v| e.verse == v))
        .collect();

    output.print_xrefs(book, &edges);
    Ok(())
}
