//! Change notification bus
//!
//! Repositories publish a payload-free "changed" event after every logical
//! mutation; views subscribe and re-query. Fan-out is synchronous and
//! in-process. A panicking subscriber is logged and skipped so the others
//! still run.

use std::collections::BTreeMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tracing::error;

type Callback = Arc<dyn Fn() + Send + Sync>;

#[derive(Default)]
struct Subscribers {
    next_id: AtomicU64,
    callbacks: Mutex<BTreeMap<u64, Callback>>,
}

/// Session-scoped event bus, cheap to clone
///
/// Clones share one subscriber set.
#[derive(Clone, Default)]
pub struct ChangeNotifier {
    inner: Arc<Subscribers>,
}

/// Handle returned by [`ChangeNotifier::subscribe`]
#[must_use = "dropping a Subscription without calling unsubscribe keeps the callback registered"]
pub struct Subscription {
    id: u64,
    inner: Arc<Subscribers>,
}

impl Subscription {
    /// Remove the callback from the bus
    pub fn unsubscribe(self) {
        if let Ok(mut callbacks) = self.inner.callbacks.lock() {
            callbacks.remove(&self.id);
        }
    }
}

impl ChangeNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback invoked on every publish
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn() + Send + Sync + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut callbacks) = self.inner.callbacks.lock() {
            callbacks.insert(id, Arc::new(callback));
        }
        Subscription {
            id,
            inner: Arc::clone(&self.inner),
        }
    }

    /// Invoke every subscriber once, in subscription order
    ///
    /// The subscriber set is snapshotted first, so callbacks may subscribe
    /// or unsubscribe without deadlocking.
    pub fn publish(&self) {
        let snapshot: Vec<Callback> = match self.inner.callbacks.lock() {
            Ok(callbacks) => callbacks.values().cloned().collect(),
            Err(_) => return,
        };

        for callback in snapshot {
            if catch_unwind(AssertUnwindSafe(|| callback())).is_err() {
                error!("Change subscriber panicked; continuing with remaining subscribers");
            }
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.callbacks.lock().map(|c| c.len()).unwrap_or(0)
    }
}

impl std::fmt::Debug for ChangeNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeNotifier")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn counter(notifier: &ChangeNotifier) -> (Arc<AtomicUsize>, Subscription) {
        let count = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&count);
        let sub = notifier.subscribe(move || {
            seen.fetch_add(1, Ordering::SeqCst);
        });
        (count, sub)
    }

    #[test]
    fn test_publish_reaches_every_subscriber() {
        let notifier = ChangeNotifier::new();
        let (a, _sub_a) = counter(&notifier);
        let (b, _sub_b) = counter(&notifier);

        notifier.publish();
        notifier.publish();

        assert_eq!(a.load(Ordering::SeqCst), 2);
        assert_eq!(b.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_unsubscribe() {
        let notifier = ChangeNotifier::new();
        let (count, sub) = counter(&notifier);

        notifier.publish();
        sub.unsubscribe();
        notifier.publish();

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(notifier.subscriber_count(), 0);
    }

    #[test]
    fn test_panicking_subscriber_is_isolated() {
        let notifier = ChangeNotifier::new();
        let _bad = notifier.subscribe(|| panic!("view unmounted"));
        let (count, _sub) = counter(&notifier);

        notifier.publish();

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_clones_share_subscribers() {
        let notifier = ChangeNotifier::new();
        let (count, _sub) = counter(&notifier);

        let handle = notifier.clone();
        handle.publish();

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_subscribe_from_callback_does_not_deadlock() {
        let notifier = ChangeNotifier::new();
        let inner = notifier.clone();
        let _sub = notifier.subscribe(move || {
            let _ = inner.subscribe(|| {});
        });

        notifier.publish();
        assert_eq!(notifier.subscriber_count(), 2);
    }
}
