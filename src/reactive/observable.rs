//! Mutable reactive cell.

use super::notifier::{Notifier, Subscription};
use super::{read, runtime, write};
use std::fmt;
use std::sync::{Arc, RwLock};

/// A mutable value that notifies subscribers when it changes.
///
/// Cloning an `Observable` yields another handle to the same cell.
/// Writes of a value equal to the current one are ignored, so subscribers
/// only hear about real changes.
pub struct Observable<T> {
    inner: Arc<ObservableInner<T>>,
}

struct ObservableInner<T> {
    label: Option<String>,
    value: RwLock<T>,
    notifier: Arc<Notifier>,
}

impl<T> Clone for Observable<T> {
    fn clone(&self) -> Self {
        Observable {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Observable<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    /// Create an anonymous cell.
    pub fn new(value: T) -> Self {
        Self::build(None, value)
    }

    /// Create a cell carrying an identity tag for inspection tooling.
    pub fn named(label: impl Into<String>, value: T) -> Self {
        Self::build(Some(label.into()), value)
    }

    fn build(label: Option<String>, value: T) -> Self {
        Observable {
            inner: Arc::new(ObservableInner {
                label,
                value: RwLock::new(value),
                notifier: Notifier::new(),
            }),
        }
    }

    /// Identity tag given at creation, if any.
    pub fn label(&self) -> Option<&str> {
        self.inner.label.as_deref()
    }

    /// Read the current value, registering it as a dependency of the
    /// enclosing `Computed` evaluation.
    pub fn get(&self) -> T {
        runtime::track(&self.inner.notifier);
        self.get_untracked()
    }

    /// Read the current value without dependency tracking.
    pub fn get_untracked(&self) -> T {
        read(&self.inner.value).clone()
    }

    /// Store `value`, notifying subscribers if it differs from the current one.
    ///
    /// Returns whether the value changed.
    pub fn set(&self, value: T) -> bool {
        {
            let mut current = write(&self.inner.value);
            if *current == value {
                return false;
            }
            *current = value;
        }
        self.inner.notifier.notify();
        true
    }

    /// Call `listener` with the new value after every change.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let cell = Arc::downgrade(&self.inner);
        self.inner.notifier.add(Arc::new(move || {
            if let Some(inner) = cell.upgrade() {
                let value = read(&inner.value).clone();
                listener(&value);
            }
        }))
    }

    /// Remove a listener registered with [`Observable::subscribe`].
    pub fn unsubscribe(&self, subscription: &Subscription) -> bool {
        subscription.unsubscribe()
    }

    /// Number of active listeners, dependent computeds included.
    pub fn subscriber_count(&self) -> usize {
        self.inner.notifier.listener_count()
    }

    /// Whether both handles refer to the same cell.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<T: fmt::Debug> fmt::Debug for Observable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observable")
            .field("label", &self.inner.label)
            .field("value", &*read(&self.inner.value))
            .finish()
    }
}
