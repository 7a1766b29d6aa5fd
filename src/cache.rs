//! Reactive per-key cache - main entry point.

use crate::entry::{CacheEntry, EntrySnapshot};
use crate::error::{Error, Result};
use crate::key::CacheKeyBuilder;
use crate::observability::{CacheMetrics, NoOpMetrics};
use crate::reactive::{batch, lock, Computed, Observable, Subscription};
use crate::repository::DataRepository;
use crate::source::{BatchSource, Source};
use crate::status::Status;
use dashmap::DashMap;
use futures::future::{join_all, BoxFuture, FutureExt};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt::Display;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::oneshot;

/// Future returned by [`Cache::load`] and [`Cache::initialize`].
pub type LoadFuture<T> = BoxFuture<'static, Option<T>>;

/// Future returned by [`Cache::load_many`].
pub type LoadManyFuture<T> = BoxFuture<'static, Vec<Option<T>>>;

/// Future returned by [`Cache::loaded`].
pub type LoadedFuture<T> = BoxFuture<'static, Result<T>>;

/// Key -> entry mapping held in a single reactive cell.
///
/// The mapping is replaced wholesale on every structural change, and two
/// storages are equal only if they are the same allocation, so every entry
/// creation or eviction notifies the storage cell's subscribers.
struct Storage<T>(Arc<HashMap<String, Arc<CacheEntry<T>>>>);

impl<T> Clone for Storage<T> {
    fn clone(&self) -> Self {
        Storage(Arc::clone(&self.0))
    }
}

impl<T> PartialEq for Storage<T> {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl<T> Default for Storage<T> {
    fn default() -> Self {
        Storage(Arc::new(HashMap::new()))
    }
}

/// Reactive cache of entities loaded by id.
///
/// Every id maps to an entry holding `value`, `status` and `error`, each an
/// independent reactive cell. Reading an entry inside a [`Computed`]
/// subscribes that computation to exactly that entry.
///
/// # Example
///
/// ```
/// use reactive_cache::{Cache, Status};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let posts: Cache<String> = Cache::named("posts");
///
/// let load = posts.load(42, "Hello".to_string());
/// assert_eq!(posts.status_by_id(42), Status::Loading);
///
/// assert_eq!(load.await, Some("Hello".to_string()));
/// let (value, status, error) = posts.by_id(42).get().into_tuple();
/// assert_eq!((value.as_deref(), status, error), (Some("Hello"), Status::Loaded, None));
/// # }
/// ```
///
/// # Overlapping loads
///
/// Loads of the same id are not serialized. When two loads overlap, the entry
/// ends up reflecting whichever resolver settles last, even if that one was
/// started first.
pub struct Cache<T> {
    name: Option<String>,
    storage: Observable<Storage<T>>,
    accessors: DashMap<String, Computed<EntrySnapshot<T>>>,
    structure: Mutex<()>,
    metrics: Arc<dyn CacheMetrics>,
}

impl<T> Cache<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    /// Create an anonymous cache.
    ///
    /// The storage cell carries no identity tag, which keeps values that
    /// cannot or should not be inspected (dynamically loaded modules, handles)
    /// away from inspection tooling.
    pub fn new() -> Self {
        Self::build(None)
    }

    /// Create a cache whose storage cell is tagged `"{name}Cache"`.
    pub fn named(name: impl Into<String>) -> Self {
        Self::build(Some(name.into()))
    }

    fn build(name: Option<String>) -> Self {
        let storage = match &name {
            Some(name) => Observable::named(CacheKeyBuilder::storage_label(name), Storage::default()),
            None => Observable::new(Storage::default()),
        };

        Cache {
            name,
            storage,
            accessors: DashMap::new(),
            structure: Mutex::new(()),
            metrics: Arc::new(NoOpMetrics),
        }
    }

    /// Set custom metrics handler.
    pub fn with_metrics(mut self, metrics: Box<dyn CacheMetrics>) -> Self {
        self.metrics = Arc::from(metrics);
        self
    }

    /// Name given at construction, if any.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Identity tag of the storage cell (`"{name}Cache"`), if named.
    pub fn label(&self) -> Option<&str> {
        self.storage.label()
    }

    // ========================================================================
    // Entry storage
    // ========================================================================

    /// Existing entry for `key`, or a fresh `Uninitialized` one installed in
    /// storage. Repeated calls return the same entry.
    fn cache_entry(&self, key: &str) -> Arc<CacheEntry<T>> {
        if let Some(entry) = self.storage.get_untracked().0.get(key) {
            return Arc::clone(entry);
        }

        batch(|| {
            let _guard = lock(&self.structure);
            self.install_entry(key)
        })
    }

    /// Entry for `key`, inserted if absent. Caller holds `structure`.
    fn install_entry(&self, key: &str) -> Arc<CacheEntry<T>> {
        let current = self.storage.get_untracked();
        if let Some(entry) = current.0.get(key) {
            return Arc::clone(entry);
        }

        let entry = Arc::new(CacheEntry::new(key.to_string()));
        let mut next = HashMap::clone(&current.0);
        next.insert(key.to_string(), Arc::clone(&entry));
        self.storage.set(Storage(Arc::new(next)));

        debug!("✓ Cache entry created for {}", key);
        entry
    }

    /// Entry for `id`, creating it if needed.
    pub fn entry(&self, id: impl Display) -> Arc<CacheEntry<T>> {
        self.cache_entry(&CacheKeyBuilder::build(&id))
    }

    /// Number of entries. Tracked: re-evaluates on entry creation and removal.
    pub fn len(&self) -> usize {
        self.storage.get().0.len()
    }

    /// Tracked, like [`Cache::len`].
    pub fn is_empty(&self) -> bool {
        self.storage.get().0.is_empty()
    }

    /// Whether an entry exists for `id`, without creating one.
    pub fn contains(&self, id: impl Display) -> bool {
        self.storage.get().0.contains_key(&CacheKeyBuilder::build(&id))
    }

    /// Sorted storage keys. Tracked.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.storage.get().0.keys().cloned().collect();
        keys.sort();
        keys
    }

    // ========================================================================
    // Read accessors
    // ========================================================================

    /// Memoized `[value, status, error]` accessor for `id`.
    ///
    /// The same [`Computed`] is returned on every call until the id is
    /// evicted or the cache cleared. Reading it inside another computation
    /// subscribes to that one entry's three cells and nothing else.
    pub fn by_id(&self, id: impl Display) -> Computed<EntrySnapshot<T>> {
        let key = CacheKeyBuilder::build(&id);
        if let Some(accessor) = self.accessors.get(&key) {
            return accessor.value().clone();
        }

        // Entry and accessor are installed together; `evict` takes the same lock.
        batch(|| {
            let _guard = lock(&self.structure);
            if let Some(accessor) = self.accessors.get(&key) {
                return accessor.value().clone();
            }

            let entry = self.install_entry(&key);
            let accessor = Computed::new(move || entry.snapshot());
            self.accessors.insert(key, accessor.clone());
            accessor
        })
    }

    /// Status of `id`. Tracked on the status cell only.
    pub fn status_by_id(&self, id: impl Display) -> Status {
        self.cache_entry(&CacheKeyBuilder::build(&id)).status().get()
    }

    // ========================================================================
    // Loads
    // ========================================================================

    /// Load `id` from `source`.
    ///
    /// The entry switches to `Loading` and a resolver source is invoked
    /// before this function returns; only awaiting the resolver's outcome is
    /// left to the returned future.
    ///
    /// On success the value, error and status cells are updated together and
    /// the future yields the value. On failure the error is stored, the status
    /// becomes `Failed`, the previous value is kept and the future yields
    /// `None`. The error is never returned to the caller; read it through
    /// [`Cache::by_id`] or await [`Cache::loaded`].
    ///
    /// Inside a tokio runtime the load settles on a spawned task, so dropping
    /// the returned future does not stop it. Outside a runtime the returned
    /// future drives the load itself; dropping it before the resolver settles
    /// fails the entry with [`Error::Cancelled`].
    pub fn load(&self, id: impl Display, source: impl Into<Source<T>>) -> LoadFuture<T> {
        let key = CacheKeyBuilder::build(&id);
        let entry = self.cache_entry(&key);

        entry.mark_loading();
        self.metrics.record_load_started(&key);
        debug!("» Cache load for key: {}", key);

        let pending = source.into().start();
        let mut guard = PendingLoad {
            entry,
            key,
            metrics: Arc::clone(&self.metrics),
            started: Instant::now(),
            settled: false,
        };

        let settlement = async move {
            let outcome = pending.await;
            guard.settle(outcome)
        };

        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                let task = runtime.spawn(settlement);
                async move {
                    task.await.unwrap_or_else(|e| {
                        warn!("✗ Cache load task did not complete: {}", e);
                        None
                    })
                }
                .boxed()
            }
            Err(_) => settlement.boxed(),
        }
    }

    /// Load `id` only if it has never loaded or its last load failed.
    ///
    /// Returns `None`, without touching the entry or invoking the resolver,
    /// when the entry is `Loading` or `Loaded`.
    pub fn initialize(&self, id: impl Display, source: impl Into<Source<T>>) -> Option<LoadFuture<T>> {
        let key = CacheKeyBuilder::build(&id);
        let status = self.cache_entry(&key).status().get_untracked();

        if status.accepts_initialize() {
            Some(self.load(key, source))
        } else {
            debug!("Cache initialize skipped for {} ({})", key, status);
            None
        }
    }

    /// Load several ids from one batch source.
    ///
    /// The batch resolver is invoked exactly once and every id awaits the
    /// same outcome, projecting out the value at its own position. All ids
    /// switch to `Loading` immediately and settle independently: when the
    /// batch fails, every id fails with the same error; when it returns too
    /// few values, only the ids without a value fail.
    pub fn load_many<I: Display>(
        &self,
        ids: impl IntoIterator<Item = I>,
        source: impl Into<BatchSource<T>>,
    ) -> LoadManyFuture<T> {
        let keys = CacheKeyBuilder::build_many(ids);
        debug!("» Cache batch load for {} keys", keys.len());

        self.fan_out(keys, source.into().start(), |values: &[T], index, _key| {
            values
                .get(index)
                .cloned()
                .ok_or(Error::MissingBatchValue { index })
        })
    }

    fn fan_out<V, P>(
        &self,
        keys: Vec<String>,
        batch_outcome: BoxFuture<'static, Result<Vec<V>>>,
        project: P,
    ) -> LoadManyFuture<T>
    where
        V: Clone + Send + Sync + 'static,
        P: Fn(&[V], usize, &str) -> Result<T> + Clone + Send + Sync + 'static,
    {
        let shared = batch_outcome.shared();

        let loads: Vec<LoadFuture<T>> = keys
            .into_iter()
            .enumerate()
            .map(|(index, key)| {
                let shared = shared.clone();
                let project = project.clone();
                let lookup = key.clone();
                self.load(
                    key,
                    Source::from_future(async move {
                        let values = shared.await?;
                        project(&values, index, &lookup)
                    }),
                )
            })
            .collect();

        join_all(loads).boxed()
    }

    /// Load `id` through a repository. A missing entity fails the entry with
    /// [`Error::NotFound`].
    pub fn load_from<R>(&self, id: impl Display, repository: Arc<R>) -> LoadFuture<T>
    where
        R: DataRepository<T> + 'static,
    {
        let key = CacheKeyBuilder::build(&id);
        let lookup = key.clone();

        self.load(
            key,
            Source::from_future_fn(move || async move {
                let found = repository.fetch_by_id(&lookup).await?;
                found.ok_or(Error::NotFound(lookup))
            }),
        )
    }

    /// Load several ids with a single `fetch_by_ids` call.
    pub fn load_many_from<I, R>(
        &self,
        ids: impl IntoIterator<Item = I>,
        repository: Arc<R>,
    ) -> LoadManyFuture<T>
    where
        I: Display,
        R: DataRepository<T> + 'static,
    {
        let keys = CacheKeyBuilder::build_many(ids);
        let lookup = keys.clone();
        let fetch = async move { repository.fetch_by_ids(&lookup).await }.boxed();

        self.fan_out(keys, fetch, |values: &[Option<T>], index, key| {
            match values.get(index) {
                Some(Some(value)) => Ok(value.clone()),
                Some(None) => Err(Error::NotFound(key.to_string())),
                None => Err(Error::MissingBatchValue { index }),
            }
        })
    }

    // ========================================================================
    // Waiting for settlement
    // ========================================================================

    /// Resolve with the value the first time `id` is `Loaded`, or fail with
    /// its error the first time it is `Failed`.
    ///
    /// An entry that has already settled resolves immediately. Fails with
    /// [`Error::Evicted`] if the entry is evicted or cleared first. The
    /// subscriptions are dropped as soon as the outcome is known.
    pub fn loaded(&self, id: impl Display) -> LoadedFuture<T> {
        let key = CacheKeyBuilder::build(&id);
        let entry = self.cache_entry(&key);
        let (sender, receiver) = oneshot::channel();

        let (watch, settle) = watch_settlement(&entry, sender);
        if let Some(outcome) = entry.settled_outcome() {
            settle(outcome);
        }
        drop((entry, settle));

        async move {
            let outcome = receiver
                .await
                .unwrap_or_else(|_| Err(Error::Evicted(key)));
            drop(watch);
            outcome
        }
        .boxed()
    }

    /// [`Cache::loaded`] with a deadline.
    pub fn loaded_timeout(&self, id: impl Display, timeout: Duration) -> LoadedFuture<T> {
        let key = CacheKeyBuilder::build(&id);
        let waiter = self.loaded(&key);

        async move {
            match tokio::time::timeout(timeout, waiter).await {
                Ok(outcome) => outcome,
                Err(_) => Err(Error::Timeout(format!(
                    "{} did not settle within {:?}",
                    key, timeout
                ))),
            }
        }
        .boxed()
    }

    // ========================================================================
    // Removal
    // ========================================================================

    /// Reset `id` to `Uninitialized`, drop its accessor and remove it from
    /// storage. The next access allocates a fresh entry; subscriptions held on
    /// the old entry's cells receive the reset and nothing afterwards.
    pub fn evict(&self, id: impl Display) {
        let key = CacheKeyBuilder::build(&id);

        batch(|| {
            let _guard = lock(&self.structure);
            let current = self.storage.get_untracked();

            self.accessors.remove(&key);
            if let Some(entry) = current.0.get(&key) {
                entry.retire();
                let mut next = HashMap::clone(&current.0);
                next.remove(&key);
                self.storage.set(Storage(Arc::new(next)));
            }
        });

        self.metrics.record_evict(&key);
        debug!("✓ Cache evicted {}", key);
    }

    /// Drop every entry and accessor.
    ///
    /// Entries still referenced elsewhere (held accessors, in-flight loads)
    /// are reset to `Uninitialized` as if evicted one by one.
    pub fn clear(&self) {
        let previous = batch(|| {
            let _guard = lock(&self.structure);
            let previous = self.storage.get_untracked();

            self.accessors.clear();
            self.storage.set(Storage::default());
            for entry in previous.0.values() {
                entry.retire();
            }
            previous
        });

        self.metrics.record_clear(previous.0.len());
        warn!("⚠ Cache CLEAR executed - {} entries dropped", previous.0.len());
    }
}

impl<T> Cache<T>
where
    T: Clone + PartialEq + Send + Sync + Serialize + 'static,
{
    /// JSON view of a named cache for inspection tooling.
    ///
    /// Returns `Ok(None)` for anonymous caches.
    ///
    /// # Errors
    /// Returns `Error::Serialization` if a cached value fails to serialize
    pub fn inspect(&self) -> Result<Option<serde_json::Value>> {
        let Some(label) = self.label() else {
            return Ok(None);
        };

        let storage = self.storage.get_untracked();
        let mut entries = serde_json::Map::new();
        for (key, entry) in storage.0.iter() {
            entries.insert(key.clone(), serde_json::to_value(entry.snapshot_untracked())?);
        }

        Ok(Some(serde_json::json!({
            "name": label,
            "entries": entries,
        })))
    }
}

impl<T> Default for Cache<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

/// Settlement side of one `load`.
///
/// Dropped unsettled, it fails the entry so that it does not stay `Loading`
/// with nothing left to resolve it.
struct PendingLoad<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    entry: Arc<CacheEntry<T>>,
    key: String,
    metrics: Arc<dyn CacheMetrics>,
    started: Instant,
    settled: bool,
}

impl<T> PendingLoad<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    fn settle(&mut self, outcome: Result<T>) -> Option<T> {
        self.settled = true;
        let elapsed = self.started.elapsed();

        match outcome {
            Ok(value) => {
                self.entry.resolve(value.clone());
                self.metrics.record_loaded(&self.key, elapsed);
                debug!("✓ Cache load for {} succeeded in {:?}", self.key, elapsed);
                Some(value)
            }
            Err(error) => {
                self.metrics.record_failed(&self.key, &error, elapsed);
                warn!("✗ Cache load for {} failed: {}", self.key, error);
                self.entry.reject(error);
                None
            }
        }
    }
}

impl<T> Drop for PendingLoad<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    fn drop(&mut self) {
        if self.settled || self.entry.status().get_untracked() != Status::Loading {
            return;
        }
        let error = Error::Cancelled(self.key.clone());
        self.metrics.record_failed(&self.key, &error, self.started.elapsed());
        warn!("⚠ Cache load for {} dropped before settling", self.key);
        self.entry.reject(error);
    }
}

type Settle<T> = Arc<dyn Fn(Result<T>) + Send + Sync>;

/// Listeners backing one `loaded` future.
///
/// Unsubscribes on drop, so a `loaded` future dropped early leaves no listener.
struct SettlementWatch(Vec<Subscription>);

impl Drop for SettlementWatch {
    fn drop(&mut self) {
        for subscription in &self.0 {
            subscription.unsubscribe();
        }
    }
}

/// Send the first outcome of `entry` to `sender`: its value or error once
/// settled, or `Error::Evicted` once it is evicted or cleared.
///
/// The returned closure settles by hand. The sender lives only in the entry's
/// listeners and that closure, so dropping the entry drops the sender.
fn watch_settlement<T>(
    entry: &Arc<CacheEntry<T>>,
    sender: oneshot::Sender<Result<T>>,
) -> (SettlementWatch, Settle<T>)
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    let sender = Mutex::new(Some(sender));
    let own: Arc<Mutex<Vec<Subscription>>> = Arc::new(Mutex::new(Vec::new()));

    let settle: Settle<T> = {
        let own = Arc::clone(&own);
        Arc::new(move |outcome: Result<T>| {
            if let Some(sender) = lock(&sender).take() {
                let _ = sender.send(outcome);
            }
            for subscription in lock(&own).drain(..) {
                subscription.unsubscribe();
            }
        })
    };

    let on_status = {
        let settle = Arc::clone(&settle);
        let watched = Arc::downgrade(entry);
        entry.status().subscribe(move |status: &Status| {
            if !status.is_settled() {
                return;
            }
            if let Some(outcome) = watched.upgrade().and_then(|entry| entry.settled_outcome()) {
                settle(outcome);
            }
        })
    };

    let on_retire = {
        let settle = Arc::clone(&settle);
        let key = entry.key().to_string();
        entry.retired().subscribe(move |retired: &bool| {
            if *retired {
                settle(Err(Error::Evicted(key.clone())));
            }
        })
    };

    let subscriptions = vec![on_status, on_retire];
    lock(&own).extend(subscriptions.iter().cloned());

    (SettlementWatch(subscriptions), settle)
}
