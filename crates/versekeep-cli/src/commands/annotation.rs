//! Handlers shared by bookmarks, notes and highlights

use anyhow::{Context, Result};

use versekeep_core::address::VerseAddress;
use versekeep_core::annotations::{AddOutcome, AnnotationKind, AnnotationRepository};

use super::parse_chapter;
use crate::editor::confirm;
use crate::output::Output;

/// Add an annotation of any kind
pub fn add<K: AnnotationKind>(
    repo: &AnnotationRepository<K>,
    address: &VerseAddress,
    payload: K::Payload,
    output: &Output,
) -> Result<()> {
    let outcome = repo
        .add(address.book, address.chapter, &address.verses, payload)
        .with_context(|| format!("Failed to add {}", K::COLLECTION))?;

    let id = address.encode();
    match outcome {
        AddOutcome::Added => output.success(&format!("Added {}", id)),
        AddOutcome::Updated => output.success(&format!("Updated {}", id)),
        AddOutcome::AlreadyExists => output.message(&format!("{} already exists", id)),
    }
    Ok(())
}

/// List every annotation, or one chapter's
pub fn list<K: AnnotationKind>(
    repo: &AnnotationRepository<K>,
    chapter: Option<&str>,
    output: &Output,
    describe: impl Fn(&K::Payload) -> String,
) -> Result<()> {
    let annotations = match chapter {
        Some(value) => {
            let (book, chapter) = parse_chapter(value)?;
            repo.for_chapter(book, chapter)
        }
        None => repo.all(),
    }
    .with_context(|| format!("Failed to list {}", K::COLLECTION))?;

    output.print_annotations(K::COLLECTION.name(), &annotations, describe);
    Ok(())
}

/// Delete by id
pub fn remove<K: AnnotationKind>(
    repo: &AnnotationRepository<K>,
    id: &str,
    output: &Output,
) -> Result<()> {
    let existed = repo.get(id)?.is_some();
    repo.remove(id)
        .with_context(|| format!("Failed to delete {}", id))?;

    if existed {
        output.success(&format!("Deleted {}", id));
    } else {
        output.message(&format!("Nothing stored at {}", id));
    }
    Ok(())
}

/// Delete every annotation of this kind, asking first
pub fn clear<K: AnnotationKind>(repo: &AnnotationRepository<K>, output: &Output) -> Result<()> {
    let count = repo.count()?;
    if count == 0 {
        output.message(&format!("No {} to delete.", K::COLLECTION));
        return Ok(());
    }

    if output.should_prompt() && !confirm(&format!("Delete all {} {}?", count, K::COLLECTION))? {
        println!("Cancelled.");
        return Ok(());
    }

    repo.clear()
        .with_context(|| format!("Failed to clear {}", K::COLLECTION))?;
    output.success(&format!("Deleted {} {}", count, K::COLLECTION));
    Ok(())
}
