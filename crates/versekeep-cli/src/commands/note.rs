//! Note command handlers
//!
//! Notes take their text from `--text` or from $EDITOR.

use anyhow::{bail, Context, Result};

use versekeep_core::address::VerseAddress;
use versekeep_core::Library;

use crate::editor::edit_note;
use crate::output::Output;

/// Attach a note to verses
pub fn add(
    library: &Library,
    address: &VerseAddress,
    text: Option<String>,
    output: &Output,
) -> Result<()> {
    let id = address.encode();
    let existing = library.notes().get(&id)?.map(|n| n.payload);

    let text = match text {
        Some(t) => t.trim().to_string(),
        None => edit_note(
            &format!("Note on {}", id),
            existing.as_deref().unwrap_or_default(),
        )?,
    };
    if text.is_empty() {
        bail!("Note text cannot be empty");
    }

    super::annotation::add(library.notes(), address, text, output)
}

/// Replace a note's text
pub fn edit(library: &Library, id: &str, text: Option<String>, output: &Output) -> Result<()> {
    let Some(note) = library.notes().get(id)? else {
        bail!("No note found at {}", id);
    };

    let text = match text {
        Some(t) => t.trim().to_string(),
        None => edit_note(&format!("Editing note on {}", id), &note.payload)?,
    };
    if text.is_empty() {
        bail!("Note text cannot be empty. Use `versekeep note rm {}` to delete it.", id);
    }
    if text == note.payload {
        output.message("No changes.");
        return Ok(());
    }

    library
        .notes()
        .update(id, text)
        .context("Failed to update note")?;
    output.success(&format!("Updated note {}", id));
    Ok(())
}
