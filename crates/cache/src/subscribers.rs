//! Pub/sub fan-out of cache transitions.

use crate::state::CacheEvent;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

pub(crate) type Callback = Arc<dyn Fn(&CacheEvent) + Send + Sync>;

/// Insertion-ordered set of observers.
///
/// Notification snapshots the subscriber list before iterating, so a
/// callback that subscribes or unsubscribes mid-round cannot corrupt
/// iteration or change who gets the current event.
pub struct SubscriberRegistry {
    inner: Mutex<Inner>,
    // handed to subscriptions so they can unsubscribe on drop without
    // keeping the registry alive
    weak_self: Weak<SubscriberRegistry>,
}

#[derive(Default)]
struct Inner {
    next_id: u64,
    entries: Vec<(u64, Callback)>,
}

impl SubscriberRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new_cyclic(|weak| Self { inner: Mutex::default(), weak_self: weak.clone() })
    }

    /// Register a callback for future transitions.
    ///
    /// The returned handle unsubscribes on [`Subscription::cancel`] or
    /// drop. Callers wanting the current state immediately go through
    /// `ClubCache::subscribe`, which layers that on top.
    pub fn subscribe(&self, callback: impl Fn(&CacheEvent) + Send + Sync + 'static) -> Subscription {
        self.subscribe_arc(Arc::new(callback))
    }

    pub(crate) fn subscribe_arc(&self, callback: Callback) -> Subscription {
        let id = {
            let mut inner = self.lock();
            inner.next_id += 1;
            let id = inner.next_id;
            inner.entries.push((id, callback));
            id
        };
        Subscription { id, registry: self.weak_self.clone() }
    }

    /// Deliver one event to every subscriber registered at the start of
    /// the round.
    pub fn notify(&self, event: &CacheEvent) {
        let callbacks: Vec<Callback> = self.lock().entries.iter().map(|(_, cb)| cb.clone()).collect();
        for callback in callbacks {
            callback(event);
        }
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn remove(&self, id: u64) {
        self.lock().entries.retain(|(entry_id, _)| *entry_id != id);
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Handle for one registered observer.
pub struct Subscription {
    id: u64,
    registry: Weak<SubscriberRegistry>,
}

impl Subscription {
    /// Stop receiving events. Safe to call from inside the callback
    /// being notified; the rest of the round is unaffected.
    pub fn cancel(&self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.remove(self.id);
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel();
    }
}
