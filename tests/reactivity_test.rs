//! Reactivity tests: what subscribers of cache accessors observe.

use reactive_cache::{batch, Cache, Computed, EntrySnapshot, Error, Source, Status};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

type Post = String;

/// Records every value emitted by `computed`.
fn record<T>(computed: &Computed<T>) -> Arc<Mutex<Vec<T>>>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    computed.subscribe(move |value: &T| sink.lock().unwrap().push(value.clone()));
    seen
}

fn snapshot(value: Option<&str>, status: Status, error: Option<Error>) -> EntrySnapshot<Post> {
    EntrySnapshot {
        value: value.map(str::to_string),
        status,
        error,
    }
}

fn rejecting(message: &str) -> Source<Post> {
    let error = Error::Resolution(message.to_string());
    Source::from_future_fn(move || async move { Err(error) })
}

#[tokio::test]
async fn test_fresh_load_emits_loading_then_loaded() {
    let cache: Cache<Post> = Cache::new();
    let seen = record(&cache.by_id(42));

    let pending = cache.load(42, "A".to_string());
    assert_eq!(*seen.lock().unwrap(), vec![snapshot(None, Status::Loading, None)]);

    pending.await;
    assert_eq!(
        *seen.lock().unwrap(),
        vec![
            snapshot(None, Status::Loading, None),
            snapshot(Some("A"), Status::Loaded, None),
        ]
    );
}

#[tokio::test]
async fn test_reload_keeps_value_visible_while_loading() {
    let cache: Cache<Post> = Cache::new();
    cache.load(1, "A".to_string()).await;
    let seen = record(&cache.by_id(1));

    cache.load(1, "B".to_string()).await;

    assert_eq!(
        *seen.lock().unwrap(),
        vec![
            snapshot(Some("A"), Status::Loading, None),
            snapshot(Some("B"), Status::Loaded, None),
        ]
    );
}

#[tokio::test]
async fn test_failure_emits_error_and_status_together() {
    let cache: Cache<Post> = Cache::new();
    let seen = record(&cache.by_id(1));

    cache.load(1, rejecting("boom")).await;

    let error = Some(Error::Resolution("boom".to_string()));
    assert_eq!(
        *seen.lock().unwrap(),
        vec![
            snapshot(None, Status::Loading, None),
            snapshot(None, Status::Failed, error),
        ]
    );
}

#[tokio::test]
async fn test_unrelated_entries_do_not_retrigger() {
    let cache: Cache<Post> = Cache::new();
    let accessor = cache.by_id(1);
    let runs = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&runs);
    let title = Computed::new(move || {
        counter.fetch_add(1, Ordering::SeqCst);
        accessor.get().value
    });
    let seen = record(&title);
    assert_eq!(runs.load(Ordering::SeqCst), 1);

    // New entries, loads and evictions of other ids
    cache.load(2, "two".to_string()).await;
    cache.load_many([3, 4], vec!["three".to_string(), "four".to_string()]).await;
    cache.evict(2);
    assert_eq!(runs.load(Ordering::SeqCst), 1);
    assert!(seen.lock().unwrap().is_empty());

    cache.load(1, "one".to_string()).await;
    assert_eq!(*seen.lock().unwrap(), vec![Some("one".to_string())]);
}

#[tokio::test]
async fn test_status_by_id_inside_computed() {
    let cache: Arc<Cache<Post>> = Arc::new(Cache::new());
    let reader = Arc::clone(&cache);
    let status = Computed::new(move || reader.status_by_id(7));
    let seen = record(&status);

    cache.load(7, "seven".to_string()).await;
    cache.load(8, "eight".to_string()).await;
    cache.load(7, rejecting("gone")).await;

    assert_eq!(
        *seen.lock().unwrap(),
        vec![Status::Loading, Status::Loaded, Status::Loading, Status::Failed]
    );
    assert_eq!(status.get(), cache.by_id(7).get().status);
}

#[tokio::test]
async fn test_status_subscriber_ignores_value_only_changes() {
    let cache: Arc<Cache<Post>> = Arc::new(Cache::new());
    cache.load(1, "A".to_string()).await;
    let reader = Arc::clone(&cache);
    let runs = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&runs);
    let settled = Computed::new(move || {
        counter.fetch_add(1, Ordering::SeqCst);
        reader.status_by_id(1).is_settled()
    });
    let seen = record(&settled);

    // Loaded -> Loading -> Loaded flips the derived flag twice
    cache.load(1, "B".to_string()).await;

    assert_eq!(*seen.lock().unwrap(), vec![false, true]);
    assert_eq!(runs.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_structure_reads_track_creation_and_removal() {
    let cache: Arc<Cache<Post>> = Arc::new(Cache::new());
    let reader = Arc::clone(&cache);
    let size = Computed::new(move || reader.len());
    let seen = record(&size);

    cache.entry(1);
    cache.entry("1");
    cache.load(2, "two".to_string()).await;
    cache.evict(1);
    cache.clear();
    cache.clear();

    assert_eq!(*seen.lock().unwrap(), vec![1, 2, 1, 0]);
}

#[tokio::test]
async fn test_keys_are_reactive() {
    let cache: Arc<Cache<Post>> = Arc::new(Cache::new());
    let reader = Arc::clone(&cache);
    let keys = Computed::new(move || reader.keys());
    let seen = record(&keys);

    cache.entry("b");
    cache.entry("a");

    assert_eq!(
        *seen.lock().unwrap(),
        vec![vec!["b".to_string()], vec!["a".to_string(), "b".to_string()]]
    );
}

#[tokio::test]
async fn test_held_accessor_after_evict_sees_reset_only() {
    let cache: Cache<Post> = Cache::new();
    cache.load(1, "A".to_string()).await;
    let before = cache.by_id(1);
    let seen = record(&before);

    cache.evict(1);
    cache.load(1, "B".to_string()).await;

    assert_eq!(*seen.lock().unwrap(), vec![EntrySnapshot::uninitialized()]);
    assert_eq!(cache.by_id(1).get().value, Some("B".to_string()));
}

#[tokio::test]
async fn test_batched_load_many_marks_loading_once() {
    let cache: Arc<Cache<Post>> = Arc::new(Cache::new());
    let (first, second) = (cache.by_id(1), cache.by_id(2));
    let pair = Computed::new(move || (first.get().status, second.get().status));
    let seen = record(&pair);

    let pending = batch(|| cache.load_many([1, 2], vec!["a".to_string(), "b".to_string()]));
    assert_eq!(*seen.lock().unwrap(), vec![(Status::Loading, Status::Loading)]);

    pending.await;
    assert_eq!(
        seen.lock().unwrap().last(),
        Some(&(Status::Loaded, Status::Loaded))
    );
}

#[tokio::test]
async fn test_loaded_listener_is_released() {
    let cache: Cache<Post> = Cache::new();
    let entry = cache.entry(1);

    let waiter = cache.loaded(1);
    assert_eq!(entry.status().subscriber_count(), 1);

    cache.load(1, "A".to_string()).await;
    assert_eq!(entry.status().subscriber_count(), 0);
    assert_eq!(waiter.await, Ok("A".to_string()));

    // A waiter dropped before settlement leaves nothing behind either
    cache.evict(1);
    let entry = cache.entry(1);
    drop(cache.loaded(1));
    assert_eq!(entry.status().subscriber_count(), 0);
}
