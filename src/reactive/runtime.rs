//! Thread-local dependency tracking and notification batching.

use super::notifier::Notifier;
use std::cell::{Cell, RefCell};
use std::sync::Arc;

thread_local! {
    /// One frame per `Computed` evaluation in progress on this thread.
    static FRAMES: RefCell<Vec<Vec<Read>>> = const { RefCell::new(Vec::new()) };

    static BATCH_DEPTH: Cell<usize> = const { Cell::new(0) };

    static PENDING: RefCell<Vec<Arc<Notifier>>> = const { RefCell::new(Vec::new()) };
}

/// A node read during an evaluation, with its change stamp at first read.
pub(crate) type Read = (Arc<Notifier>, u64);

/// Record a read of `notifier`'s node in the innermost evaluation, if any.
///
/// Call before reading the node's value, so a concurrent change shows up as
/// a stamp mismatch.
pub(crate) fn track(notifier: &Arc<Notifier>) {
    FRAMES.with(|frames| {
        if let Some(frame) = frames.borrow_mut().last_mut() {
            if !frame.iter().any(|(seen, _)| seen.id() == notifier.id()) {
                frame.push((Arc::clone(notifier), notifier.version()));
            }
        }
    });
}

/// Run `f` in a fresh tracking frame and return what it read.
pub(crate) fn collect<R>(f: impl FnOnce() -> R) -> (R, Vec<Read>) {
    struct FrameGuard;

    impl Drop for FrameGuard {
        fn drop(&mut self) {
            if std::thread::panicking() {
                FRAMES.with(|frames| frames.borrow_mut().pop());
            }
        }
    }

    FRAMES.with(|frames| frames.borrow_mut().push(Vec::new()));
    let guard = FrameGuard;
    let result = f();
    std::mem::forget(guard);
    let sources = FRAMES.with(|frames| frames.borrow_mut().pop().unwrap_or_default());
    (result, sources)
}

/// Queue `notifier` if a batch is open. Returns `true` when deferred.
pub(crate) fn defer(notifier: &Arc<Notifier>) -> bool {
    if BATCH_DEPTH.with(Cell::get) == 0 {
        return false;
    }

    PENDING.with(|pending| {
        let mut pending = pending.borrow_mut();
        if !pending.iter().any(|queued| queued.id() == notifier.id()) {
            pending.push(Arc::clone(notifier));
        }
    });
    true
}

/// Apply a group of writes, notifying subscribers once afterwards.
///
/// Every cell written inside `f` notifies at most once, after the outermost
/// batch returns, in the order the cells were first changed. Subscribers
/// therefore never observe a half-applied group of writes.
///
/// ```
/// use reactive_cache::reactive::{batch, Computed, Observable};
/// use std::sync::{Arc, Mutex};
///
/// let first = Observable::new(0);
/// let second = Observable::new(0);
/// let sum = {
///     let (first, second) = (first.clone(), second.clone());
///     Computed::new(move || first.get() + second.get())
/// };
///
/// let seen = Arc::new(Mutex::new(Vec::new()));
/// let sink = Arc::clone(&seen);
/// sum.subscribe(move |total| sink.lock().unwrap().push(*total));
///
/// batch(|| {
///     first.set(1);
///     second.set(2);
/// });
///
/// assert_eq!(*seen.lock().unwrap(), vec![3]);
/// ```
pub fn batch<R>(f: impl FnOnce() -> R) -> R {
    let result = {
        let _guard = DepthGuard::open();
        f()
    };

    if BATCH_DEPTH.with(Cell::get) == 0 {
        flush();
    }
    result
}

/// Dispatch queued notifications round by round.
///
/// The batch stays open while listeners run, so a derived node that changes
/// in one round notifies its own subscribers in the next one, after every
/// sibling has caught up.
fn flush() {
    let _guard = DepthGuard::open();
    loop {
        let queued = PENDING.with(|pending| std::mem::take(&mut *pending.borrow_mut()));
        if queued.is_empty() {
            break;
        }
        for notifier in queued {
            notifier.dispatch();
        }
    }
}

struct DepthGuard;

impl DepthGuard {
    fn open() -> Self {
        BATCH_DEPTH.with(|depth| depth.set(depth.get() + 1));
        DepthGuard
    }
}

impl Drop for DepthGuard {
    fn drop(&mut self) {
        let depth = BATCH_DEPTH.with(|depth| {
            let next = depth.get().saturating_sub(1);
            depth.set(next);
            next
        });
        if depth == 0 && std::thread::panicking() {
            PENDING.with(|pending| pending.borrow_mut().clear());
        }
    }
}
