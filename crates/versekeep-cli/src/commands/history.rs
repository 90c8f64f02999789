//! History command handlers

use anyhow::{bail, Context, Result};

use versekeep_core::{Library, VerseAddress};

use crate::editor::confirm;
use crate::output::Output;

/// Record a visit to a chapter, verse or verse span
pub fn record(library: &Library, address: &VerseAddress, output: &Output) -> Result<()> {
    let (verse, end_verse) = visit_span(address)?;
    let entry = library
        .history()
        .record(address.book, address.chapter, verse, end_verse)
        .with_context(|| format!("Failed to record visit to {}", address))?;
    output.success(&format!("Recorded {}", entry.id));
    Ok(())
}

/// History locations are a chapter, one verse or one contiguous span
fn visit_span(address: &VerseAddress) -> Result<(Option<u32>, Option<u32>)> {
    if !address.verses.is_empty() && !address.is_contiguous() {
        bail!(
            "History records a single verse or span, not a list (got '{}')",
            address
        );
    }
    Ok((address.start_verse(), address.end_verse()))
}

pub fn list(library: &Library, limit: Option<usize>, offset: usize, output: &Output) -> Result<()> {
    let entries = library
        .history()
        .list(limit, offset)
        .context("Failed to read history")?;
    output.print_history(&entries);
    Ok(())
}

pub fn clear(library: &Library, output: &Output) -> Result<()> {
    if output.should_prompt() && !confirm("Forget all reading history?")? {
        println!("Cancelled.");
        return Ok(());
    }

    library.history().clear().context("Failed to clear history")?;
    output.success("History cleared");
    Ok(())
}
