//! Memoized derivation over reactive cells.

use super::notifier::{Notifier, Subscription};
use super::{lock, runtime};
use std::fmt;
use std::sync::{Arc, Mutex, Weak};

type Derivation<T> = Box<dyn Fn() -> T + Send + Sync>;

/// A memoized value derived from other reactive cells.
///
/// The derivation runs lazily on first read and again only after one of the
/// cells it read has changed. While a `Computed` has subscribers it
/// re-evaluates eagerly on change and notifies them only when the derived
/// value differs from the previous one.
///
/// Cloning yields another handle to the same memoized derivation.
pub struct Computed<T> {
    inner: Arc<ComputedInner<T>>,
}

struct ComputedInner<T> {
    derive: Derivation<T>,
    state: Mutex<ComputedState<T>>,
    notifier: Arc<Notifier>,
}

struct ComputedState<T> {
    value: Option<T>,
    dirty: bool,
    sources: Vec<Subscription>,
}

impl<T> Clone for Computed<T> {
    fn clone(&self) -> Self {
        Computed {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Computed<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    pub fn new<F>(derive: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        Computed {
            inner: Arc::new(ComputedInner {
                derive: Box::new(derive),
                state: Mutex::new(ComputedState {
                    value: None,
                    dirty: true,
                    sources: Vec::new(),
                }),
                notifier: Notifier::new(),
            }),
        }
    }

    /// Read the derived value, registering this computed as a dependency of
    /// the enclosing evaluation.
    pub fn get(&self) -> T {
        runtime::track(&self.inner.notifier);
        self.inner.current()
    }

    /// Read the derived value without dependency tracking.
    pub fn get_untracked(&self) -> T {
        self.inner.current()
    }

    /// Call `listener` with every new derived value.
    ///
    /// Subscribing evaluates the derivation if needed so that the first
    /// change after subscription is compared against a known value.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let node = Arc::downgrade(&self.inner);
        let subscription = self.inner.notifier.add(Arc::new(move || {
            if let Some(inner) = node.upgrade() {
                listener(&inner.current());
            }
        }));
        self.inner.current();
        subscription
    }

    /// Remove a listener registered with [`Computed::subscribe`].
    pub fn unsubscribe(&self, subscription: &Subscription) -> bool {
        subscription.unsubscribe()
    }

    /// Whether both handles refer to the same memoized derivation.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<T> ComputedInner<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    fn current(self: &Arc<Self>) -> T {
        {
            let state = lock(&self.state);
            if !state.dirty {
                if let Some(value) = &state.value {
                    return value.clone();
                }
            }
        }
        self.evaluate().0
    }

    /// Run the derivation, rewire dependencies and memoize the result.
    ///
    /// A source that changed after it was read invalidates the run: the
    /// result is discarded and the derivation runs again, so a concurrent
    /// write can never be masked by an older value.
    fn evaluate(self: &Arc<Self>) -> (T, bool) {
        loop {
            let (value, sources) = runtime::collect(|| (self.derive)());

            let subscriptions: Vec<Subscription> = sources
                .iter()
                .map(|(source, _)| {
                    let node: Weak<Self> = Arc::downgrade(self);
                    source.add(Arc::new(move || {
                        if let Some(inner) = node.upgrade() {
                            inner.on_source_changed();
                        }
                    }))
                })
                .collect();

            let mut state = lock(&self.state);
            if sources.iter().any(|(source, seen)| source.version() != *seen) {
                drop(state);
                for subscription in subscriptions {
                    subscription.unsubscribe();
                }
                continue;
            }

            let changed = state.value.as_ref() != Some(&value);
            state.value = Some(value.clone());
            state.dirty = false;
            let stale = std::mem::replace(&mut state.sources, subscriptions);
            drop(state);

            for subscription in stale {
                subscription.unsubscribe();
            }
            return (value, changed);
        }
    }

    fn on_source_changed(self: &Arc<Self>) {
        lock(&self.state).dirty = true;
        // Dependents without listeners learn of the change through the stamp.
        self.notifier.bump();

        if self.notifier.has_listeners() {
            let (_, changed) = self.evaluate();
            if changed {
                self.notifier.notify();
            }
        }
    }
}

impl<T> Drop for ComputedInner<T> {
    fn drop(&mut self) {
        let state = self
            .state
            .get_mut()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        for subscription in state.sources.drain(..) {
            subscription.unsubscribe();
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Computed<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = lock(&self.inner.state);
        f.debug_struct("Computed")
            .field("value", &state.value)
            .field("dirty", &state.dirty)
            .finish()
    }
}
