//! # reactive-cache
//!
//! A reactive, per-key asynchronous entity cache.
//!
//! ## Features
//!
//! - **Per-entry lifecycle:** Every id tracks `value`, `status` and `error`
//!   (`Uninitialized`, `Loading`, `Loaded`, `Failed`)
//! - **Reactive reads:** Computations reading an entry re-evaluate when that
//!   entry changes, and only then
//! - **Stale-while-failing:** A failed reload keeps the last good value next to
//!   the error
//! - **Load-once and batch loads:** `initialize` and `load_many` are built on
//!   the single-entry `load`
//! - **Runtime agnostic loads:** Load futures are plain `Send + 'static`
//!   futures; tokio is only needed for deadlines
//!
//! ## Quick Start
//!
//! ```
//! use reactive_cache::{Cache, Error, Source, Status};
//!
//! #[derive(Clone, Debug, PartialEq)]
//! struct Post {
//!     title: String,
//! }
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let posts: Cache<Post> = Cache::named("posts");
//!
//! // 1. Load from any resolver
//! posts
//!     .load(42, Source::from_future_fn(|| async {
//!         Ok(Post { title: "A".to_string() })
//!     }))
//!     .await;
//!
//! // 2. Read reactively
//! let post = posts.by_id(42);
//! assert_eq!(post.get().status, Status::Loaded);
//!
//! // 3. Failures are stored, not thrown; the stale value survives
//! posts
//!     .load(42, Source::<Post>::from_fn(|| Err(Error::Resolution("offline".into()))))
//!     .await;
//! let snapshot = post.get();
//! assert_eq!(snapshot.status, Status::Failed);
//! assert_eq!(snapshot.value.map(|p| p.title), Some("A".to_string()));
//! # }
//! ```

#[macro_use]
extern crate log;

pub mod cache;
pub mod entry;
pub mod error;
pub mod key;
pub mod observability;
pub mod reactive;
pub mod repository;
pub mod source;
pub mod status;

// Re-exports for convenience
pub use cache::{Cache, LoadFuture, LoadManyFuture, LoadedFuture};
pub use entry::{CacheEntry, EntrySnapshot};
pub use error::{Error, Result};
pub use observability::{CacheMetrics, NoOpMetrics};
pub use reactive::{batch, Computed, Observable, Subscription};
pub use repository::{DataRepository, InMemoryRepository};
pub use source::{BatchSource, Source};
pub use status::Status;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
