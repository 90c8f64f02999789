//! Highlight add / query / remove through the public API

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tempfile::TempDir;
use versekeep_core::{AddOutcome, Config, HighlightColor, Library};

fn count_events(library: &Library) -> (Arc<AtomicUsize>, versekeep_core::Subscription) {
    let events = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&events);
    let sub = library.subscribe(move || {
        seen.fetch_add(1, Ordering::SeqCst);
    });
    (events, sub)
}

fn run_scenario(library: &Library) {
    let (events, sub) = count_events(library);
    let highlights = library.highlights();

    let outcome = highlights
        .add(19, 23, &[1, 2, 3], "yellow".parse::<HighlightColor>().unwrap())
        .unwrap();
    assert_eq!(outcome, AddOutcome::Added);

    let found = highlights.for_verse(19, 23, 2).unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id, "19/23:1-3");
    assert_eq!(found[0].verses, vec![1, 2, 3]);
    assert_eq!(found[0].payload, HighlightColor::Yellow);

    highlights.remove(&found[0].id).unwrap();
    assert!(highlights.for_verse(19, 23, 2).unwrap().is_empty());

    assert_eq!(events.load(Ordering::SeqCst), 2);
    sub.unsubscribe();
}

#[test]
fn highlight_lifecycle_in_memory() {
    run_scenario(&Library::in_memory());
}

#[test]
fn highlight_lifecycle_sqlite() {
    let temp_dir = TempDir::new().unwrap();
    let mut config = Config::default();
    config.data_dir = temp_dir.path().to_path_buf();

    run_scenario(&Library::open(&config));
}

#[test]
fn annotations_survive_reopen() {
    let temp_dir = TempDir::new().unwrap();
    let mut config = Config::default();
    config.data_dir = temp_dir.path().to_path_buf();

    {
        let library = Library::open(&config);
        library.bookmarks().add(2, 13, &[1], ()).unwrap();
        library
            .notes()
            .add(2, 3, &[14], "I AM WHO I AM".to_string())
            .unwrap();
        library.history().record(2, 3, Some(14), None).unwrap();
    }

    let library = Library::open(&config);
    assert_eq!(library.stats().unwrap().total(), 3);

    // 2/13 never leaks into chapter 3
    assert!(library.bookmarks().for_chapter(2, 3).unwrap().is_empty());
    assert_eq!(library.bookmarks().for_chapter(2, 13).unwrap().len(), 1);
    assert_eq!(
        library.notes().for_verse(2, 3, 14).unwrap()[0].payload,
        "I AM WHO I AM"
    );
    assert_eq!(library.history().list(None, 0).unwrap()[0].id, "2/3:14");
}
