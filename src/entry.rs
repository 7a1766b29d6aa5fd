//! Per-id cache entries.

use crate::error::Error;
use crate::reactive::{batch, Observable};
use crate::status::Status;
use serde::Serialize;

/// The value, status and error of one cached entity.
///
/// Each field is an independent reactive cell, so a derivation that only
/// reads `status` is not re-run when `value` changes. Entries are mutated in
/// place by loads; every caller holding an entry sees the same cells.
pub struct CacheEntry<T> {
    key: String,
    value: Observable<Option<T>>,
    status: Observable<Status>,
    error: Observable<Option<Error>>,
    retired: Observable<bool>,
}

impl<T> CacheEntry<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    pub(crate) fn new(key: String) -> Self {
        CacheEntry {
            key,
            value: Observable::new(None),
            status: Observable::new(Status::Uninitialized),
            error: Observable::new(None),
            retired: Observable::new(false),
        }
    }

    /// Storage key of this entry.
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn value(&self) -> &Observable<Option<T>> {
        &self.value
    }

    pub fn status(&self) -> &Observable<Status> {
        &self.status
    }

    pub fn error(&self) -> &Observable<Option<Error>> {
        &self.error
    }

    /// Tracked read of all three cells.
    pub fn snapshot(&self) -> EntrySnapshot<T> {
        EntrySnapshot {
            value: self.value.get(),
            status: self.status.get(),
            error: self.error.get(),
        }
    }

    pub(crate) fn snapshot_untracked(&self) -> EntrySnapshot<T> {
        EntrySnapshot {
            value: self.value.get_untracked(),
            status: self.status.get_untracked(),
            error: self.error.get_untracked(),
        }
    }

    pub(crate) fn mark_loading(&self) {
        self.status.set(Status::Loading);
    }

    /// Value first, so a subscriber reacting to `Loaded` reads the new value.
    pub(crate) fn resolve(&self, value: T) {
        batch(|| {
            self.value.set(Some(value));
            self.error.set(None);
            self.status.set(Status::Loaded);
        });
    }

    /// The value cell is left alone: a failed reload keeps the stale value.
    pub(crate) fn reject(&self, error: Error) {
        batch(|| {
            self.error.set(Some(error));
            self.status.set(Status::Failed);
        });
    }

    /// Reset to `Uninitialized` and mark the entry as no longer reachable
    /// from its cache.
    pub(crate) fn retire(&self) {
        batch(|| {
            self.value.set(None);
            self.status.set(Status::Uninitialized);
            self.error.set(None);
            self.retired.set(true);
        });
    }

    /// Set once the entry has been evicted or cleared.
    pub(crate) fn retired(&self) -> &Observable<bool> {
        &self.retired
    }

    /// Outcome `loaded` settles with, or `None` while unsettled.
    pub(crate) fn settled_outcome(&self) -> Option<crate::Result<T>> {
        match self.status.get_untracked() {
            Status::Loaded => Some(self.value.get_untracked().ok_or_else(|| {
                Error::Other(format!("entry {} is loaded without a value", self.key))
            })),
            Status::Failed => Some(Err(self.error.get_untracked().unwrap_or_else(|| {
                Error::Other(format!("entry {} failed without an error", self.key))
            }))),
            Status::Uninitialized | Status::Loading => None,
        }
    }
}

/// Point-in-time view of an entry: `[value, status, error]`.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct EntrySnapshot<T> {
    pub value: Option<T>,
    pub status: Status,
    pub error: Option<Error>,
}

impl<T> EntrySnapshot<T> {
    /// The snapshot of an entry that was never loaded.
    pub fn uninitialized() -> Self {
        EntrySnapshot {
            value: None,
            status: Status::Uninitialized,
            error: None,
        }
    }

    pub fn into_tuple(self) -> (Option<T>, Status, Option<Error>) {
        (self.value, self.status, self.error)
    }
}

impl<T> Default for EntrySnapshot<T> {
    fn default() -> Self {
        Self::uninitialized()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_entry_is_uninitialized() {
        let entry: CacheEntry<String> = CacheEntry::new("1".to_string());
        assert_eq!(entry.key(), "1");
        assert_eq!(entry.snapshot(), EntrySnapshot::uninitialized());
        assert!(entry.settled_outcome().is_none());
    }

    #[test]
    fn test_resolve_then_reject_keeps_value() {
        let entry = CacheEntry::new("1".to_string());
        entry.mark_loading();
        entry.resolve("A".to_string());

        let err = Error::Resolution("offline".to_string());
        entry.mark_loading();
        entry.reject(err.clone());

        assert_eq!(
            entry.snapshot().into_tuple(),
            (Some("A".to_string()), Status::Failed, Some(err.clone()))
        );
        assert_eq!(entry.settled_outcome(), Some(Err(err)));
    }

    #[test]
    fn test_resolve_clears_error() {
        let entry = CacheEntry::new("1".to_string());
        entry.reject(Error::Resolution("first".to_string()));
        entry.resolve(7);

        assert_eq!(entry.snapshot().into_tuple(), (Some(7), Status::Loaded, None));
        assert_eq!(entry.settled_outcome(), Some(Ok(7)));
    }

    #[test]
    fn test_retire() {
        let entry = CacheEntry::new("1".to_string());
        entry.resolve(7);
        entry.retire();

        assert_eq!(entry.snapshot_untracked(), EntrySnapshot::uninitialized());
        assert!(entry.retired().get_untracked());
    }

    #[test]
    fn test_status_subscriber_sees_new_value() {
        use std::sync::{Arc, Mutex};

        let entry = Arc::new(CacheEntry::new("1".to_string()));
        let observed = Arc::new(Mutex::new(None));
        {
            let reader = Arc::clone(&entry);
            let observed = Arc::clone(&observed);
            entry.status().subscribe(move |status: &Status| {
                if *status == Status::Loaded {
                    *observed.lock().unwrap() = reader.value().get_untracked();
                }
            });
        }

        entry.resolve(99);
        assert_eq!(*observed.lock().unwrap(), Some(99));
    }
}
