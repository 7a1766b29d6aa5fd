//! Subscriber lists shared by observables and computeds.

use super::{lock, runtime};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

pub(crate) type Listener = Arc<dyn Fn() + Send + Sync>;

static NEXT_NOTIFIER_ID: AtomicU64 = AtomicU64::new(1);

/// Change-notification hub owned by a single reactive node.
pub(crate) struct Notifier {
    id: u64,
    version: AtomicU64,
    next_listener: AtomicU64,
    listeners: Mutex<Vec<(u64, Listener)>>,
}

impl Notifier {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Notifier {
            id: NEXT_NOTIFIER_ID.fetch_add(1, Ordering::Relaxed),
            version: AtomicU64::new(0),
            next_listener: AtomicU64::new(1),
            listeners: Mutex::new(Vec::new()),
        })
    }

    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    /// Change stamp of the owning node, bumped on every change.
    pub(crate) fn version(&self) -> u64 {
        self.version.load(Ordering::SeqCst)
    }

    /// Record a change without notifying anyone.
    pub(crate) fn bump(&self) {
        self.version.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn add(self: &Arc<Self>, listener: Listener) -> Subscription {
        let id = self.next_listener.fetch_add(1, Ordering::Relaxed);
        lock(&self.listeners).push((id, listener));
        Subscription {
            notifier: Arc::downgrade(self),
            id,
        }
    }

    fn remove(&self, listener_id: u64) -> bool {
        let mut listeners = lock(&self.listeners);
        let before = listeners.len();
        listeners.retain(|(id, _)| *id != listener_id);
        listeners.len() != before
    }

    pub(crate) fn has_listeners(&self) -> bool {
        !lock(&self.listeners).is_empty()
    }

    pub(crate) fn listener_count(&self) -> usize {
        lock(&self.listeners).len()
    }

    /// Notify listeners now, or at the end of the enclosing batch.
    pub(crate) fn notify(self: &Arc<Self>) {
        self.bump();
        if runtime::defer(self) {
            return;
        }
        runtime::batch(|| runtime::defer(self));
    }

    /// Run every listener registered at the time of the call.
    ///
    /// The list is copied out first: listeners may subscribe, unsubscribe or
    /// write other cells while running.
    pub(crate) fn dispatch(&self) {
        let listeners: Vec<Listener> = lock(&self.listeners)
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();

        for listener in listeners {
            listener();
        }
    }
}

/// Handle returned by `subscribe`; pass it back to `unsubscribe` or call
/// [`Subscription::unsubscribe`] directly.
///
/// Dropping the handle does not unsubscribe. Unsubscribing twice is a no-op.
#[derive(Clone)]
pub struct Subscription {
    notifier: Weak<Notifier>,
    id: u64,
}

impl Subscription {
    /// Stop receiving notifications.
    ///
    /// Returns `false` if the subscription was already removed or its source
    /// no longer exists.
    pub fn unsubscribe(&self) -> bool {
        match self.notifier.upgrade() {
            Some(notifier) => notifier.remove(self.id),
            None => false,
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}
