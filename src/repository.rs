//! Data repository trait for repository-backed loads.
//!
//! A `DataRepository` is a ready-made resolver: `Cache::load_from` and
//! `Cache::load_many_from` wrap it so the cache tracks status and errors of
//! every fetch.
//!
//! # Implementing DataRepository
//!
//! Implement this trait for any source of entities:
//! - SQL databases: SQLx, tokio-postgres, Diesel
//! - HTTP APIs
//! - In-memory: For testing (provided in this module)
//!
//! # Error Handling
//!
//! Return `Ok(None)` when the entity does not exist; the cache turns that into
//! [`Error::NotFound`](crate::Error::NotFound). Return `Err` for:
//! - Connectivity issues
//! - Query timeouts
//! - Decoding failures
//!
//! # Example
//!
//! ```
//! use reactive_cache::repository::{DataRepository, InMemoryRepository};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let mut repo = InMemoryRepository::new();
//! repo.insert(1, "Alice".to_string());
//!
//! let user = repo.fetch_by_id("1").await.unwrap();
//! assert_eq!(user.as_deref(), Some("Alice"));
//! # }
//! ```

use crate::error::Result;
use std::collections::HashMap;
use std::fmt::Display;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Trait for data repository implementations.
///
/// Ids arrive already coerced to their storage key (see
/// [`CacheKeyBuilder`](crate::key::CacheKeyBuilder)).
///
/// Futures must be `Send` so loads can be driven from any tokio task.
pub trait DataRepository<T: Send>: Send + Sync {
    /// Fetch entity by id from the primary data source.
    ///
    /// # Returns
    /// - `Ok(Some(entity))` - Entity found
    /// - `Ok(None)` - Entity not found
    /// - `Err(e)` - Data source error
    ///
    /// # Errors
    /// Returns `Err` if the data source is unavailable or the fetch fails
    fn fetch_by_id(&self, id: &str) -> impl Future<Output = Result<Option<T>>> + Send;

    /// Batch fetch entities by ids, positionally aligned with `ids`.
    ///
    /// Default implementation calls `fetch_by_id()` for each id in turn.
    /// Override for efficiency (e.g., SQL `WHERE id IN (...)`).
    ///
    /// # Errors
    /// Returns `Err` if the data source is unavailable or any fetch fails
    fn fetch_by_ids(&self, ids: &[String]) -> impl Future<Output = Result<Vec<Option<T>>>> + Send {
        async move {
            let mut results = Vec::with_capacity(ids.len());
            for id in ids {
                results.push(self.fetch_by_id(id).await?);
            }
            Ok(results)
        }
    }
}

// ============================================================================
// In-Memory Test Repository
// ============================================================================

/// Simple in-memory repository for tests and demos.
///
/// Counts every call so tests can assert how often the cache went to the
/// source, e.g. that `initialize` on a loaded entry fetches nothing.
pub struct InMemoryRepository<T> {
    data: HashMap<String, T>,
    single_fetches: AtomicUsize,
    batch_fetches: AtomicUsize,
}

impl<T: Clone + Send + Sync> InMemoryRepository<T> {
    /// Create a new empty in-memory repository.
    pub fn new() -> Self {
        InMemoryRepository {
            data: HashMap::new(),
            single_fetches: AtomicUsize::new(0),
            batch_fetches: AtomicUsize::new(0),
        }
    }

    /// Insert or update an entity by id.
    pub fn insert(&mut self, id: impl Display, value: T) {
        self.data.insert(id.to_string(), value);
    }

    /// Remove an entity; later fetches report it as missing.
    pub fn remove(&mut self, id: impl Display) -> Option<T> {
        self.data.remove(&id.to_string())
    }

    /// Return the number of entities in the repository.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Return true if the repository contains no entities.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Number of `fetch_by_id` calls served.
    pub fn single_fetches(&self) -> usize {
        self.single_fetches.load(Ordering::SeqCst)
    }

    /// Number of `fetch_by_ids` calls served.
    pub fn batch_fetches(&self) -> usize {
        self.batch_fetches.load(Ordering::SeqCst)
    }
}

impl<T: Clone + Send + Sync> Default for InMemoryRepository<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Send + Sync> DataRepository<T> for InMemoryRepository<T> {
    fn fetch_by_id(&self, id: &str) -> impl Future<Output = Result<Option<T>>> + Send {
        self.single_fetches.fetch_add(1, Ordering::SeqCst);
        let found = self.data.get(id).cloned();
        async move { Ok(found) }
    }

    fn fetch_by_ids(&self, ids: &[String]) -> impl Future<Output = Result<Vec<Option<T>>>> + Send {
        self.batch_fetches.fetch_add(1, Ordering::SeqCst);
        let found: Vec<Option<T>> = ids.iter().map(|id| self.data.get(id).cloned()).collect();
        async move { Ok(found) }
    }
}
