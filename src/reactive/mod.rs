//! Minimal reactive primitives the cache is layered on.
//!
//! - [`Observable`]: a mutable cell that notifies subscribers when its value changes
//! - [`Computed`]: a memoized derivation that re-evaluates when any cell it read changes
//! - [`batch`]: defers notifications until a group of writes has been applied
//!
//! Dependency tracking is ambient: reading an `Observable` or `Computed` while a
//! `Computed` is evaluating records it as a dependency of that evaluation.
//! Evaluations are synchronous, so the tracking context lives in thread-local
//! storage and never spans an `.await`.
//!
//! # Example
//!
//! ```
//! use reactive_cache::reactive::{Computed, Observable};
//!
//! let count = Observable::new(1);
//! let doubled = {
//!     let count = count.clone();
//!     Computed::new(move || count.get() * 2)
//! };
//!
//! assert_eq!(doubled.get(), 2);
//! count.set(5);
//! assert_eq!(doubled.get(), 10);
//! ```

mod computed;
mod notifier;
mod observable;
mod runtime;

pub use computed::Computed;
pub use notifier::Subscription;
pub use observable::Observable;
pub use runtime::batch;

use std::sync::{Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

// A listener that panicked must not wedge every later reader of the cell.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}
