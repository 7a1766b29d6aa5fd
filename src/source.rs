//! What a load resolves: an immediate value, a pending future, or a resolver.
//!
//! ```
//! use reactive_cache::{BatchSource, Source};
//!
//! // Already resolved
//! let _s: Source<u32> = 7.into();
//!
//! // Synchronous resolver, invoked when the load starts
//! let _s: Source<u32> = Source::from_fn(|| Ok(7));
//!
//! // Asynchronous resolver
//! let _s: Source<u32> = Source::from_future_fn(|| async { Ok(7) });
//!
//! // One resolver for a whole batch
//! let _b: BatchSource<u32> = BatchSource::from_future_fn(|| async { Ok(vec![1, 2]) });
//! ```

use crate::error::Result;
use futures::future::{self, BoxFuture, FutureExt};
use std::future::Future;

type Resolver<V> = Box<dyn FnOnce() -> BoxFuture<'static, Result<V>> + Send>;

/// Input of a single-entry load.
pub enum Source<T> {
    /// A value that is already resolved.
    Value(T),

    /// An awaitable that was created before the load started.
    Pending(BoxFuture<'static, Result<T>>),

    /// A zero-argument resolver invoked exactly once, after the entry has
    /// switched to `Loading`.
    Resolver(Resolver<T>),
}

impl<T: Send + 'static> Source<T> {
    pub fn value(value: T) -> Self {
        Source::Value(value)
    }

    pub fn from_future<Fut>(pending: Fut) -> Self
    where
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        Source::Pending(pending.boxed())
    }

    /// Resolver returning a plain result.
    pub fn from_fn<F>(resolver: F) -> Self
    where
        F: FnOnce() -> Result<T> + Send + 'static,
    {
        Source::Resolver(Box::new(move || future::ready(resolver()).boxed()))
    }

    /// Resolver returning an awaitable result.
    pub fn from_future_fn<F, Fut>(resolver: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        Source::Resolver(Box::new(move || resolver().boxed()))
    }

    /// Invoke the resolver, if any, and hand back the awaitable outcome.
    pub(crate) fn start(self) -> BoxFuture<'static, Result<T>> {
        match self {
            Source::Value(value) => future::ready(Ok(value)).boxed(),
            Source::Pending(pending) => pending,
            Source::Resolver(resolve) => resolve(),
        }
    }
}

impl<T> From<T> for Source<T> {
    fn from(value: T) -> Self {
        Source::Value(value)
    }
}

/// Input of a batch load: one vector of values, positionally aligned with the
/// requested ids.
pub enum BatchSource<T> {
    Values(Vec<T>),
    Pending(BoxFuture<'static, Result<Vec<T>>>),
    Resolver(Resolver<Vec<T>>),
}

impl<T: Send + 'static> BatchSource<T> {
    pub fn values(values: Vec<T>) -> Self {
        BatchSource::Values(values)
    }

    pub fn from_future<Fut>(pending: Fut) -> Self
    where
        Fut: Future<Output = Result<Vec<T>>> + Send + 'static,
    {
        BatchSource::Pending(pending.boxed())
    }

    pub fn from_fn<F>(resolver: F) -> Self
    where
        F: FnOnce() -> Result<Vec<T>> + Send + 'static,
    {
        BatchSource::Resolver(Box::new(move || future::ready(resolver()).boxed()))
    }

    pub fn from_future_fn<F, Fut>(resolver: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<Vec<T>>> + Send + 'static,
    {
        BatchSource::Resolver(Box::new(move || resolver().boxed()))
    }

    pub(crate) fn start(self) -> BoxFuture<'static, Result<Vec<T>>> {
        match self {
            BatchSource::Values(values) => future::ready(Ok(values)).boxed(),
            BatchSource::Pending(pending) => pending,
            BatchSource::Resolver(resolve) => resolve(),
        }
    }
}

impl<T> From<Vec<T>> for BatchSource<T> {
    fn from(values: Vec<T>) -> Self {
        BatchSource::Values(values)
    }
}
