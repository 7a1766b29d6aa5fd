//! Observability hooks for cache lifecycle events.
//!
//! Implement [`CacheMetrics`] to feed load timings and failures into your
//! monitoring system:
//!
//! ```ignore
//! use reactive_cache::observability::CacheMetrics;
//! use std::time::Duration;
//!
//! struct PrometheusMetrics;
//!
//! impl CacheMetrics for PrometheusMetrics {
//!     fn record_loaded(&self, _key: &str, _duration: Duration) {
//!         // histogram!("cache_load_latency").record(duration);
//!     }
//!     // ... other hooks fall back to debug logging
//! }
//!
//! // let cache = Cache::<Post>::named("posts")
//! //     .with_metrics(Box::new(PrometheusMetrics));
//! ```
//!
//! Caches default to [`NoOpMetrics`]. The cache logs every transition through
//! the `log` crate regardless of the metrics sink in use.
//!
//! # Hooks
//!
//! | Hook | Fired when |
//! |------|------------|
//! | `record_load_started` | An entry switches to `Loading` |
//! | `record_loaded` | A load resolves; carries the time spent awaiting |
//! | `record_failed` | A load rejects; carries the error and time spent |
//! | `record_evict` | `evict` removes an entry |
//! | `record_clear` | `clear` drops every entry |

use crate::error::Error;
use std::time::Duration;

/// Trait for cache metrics collection.
pub trait CacheMetrics: Send + Sync {
    /// Record an entry switching to `Loading`.
    fn record_load_started(&self, key: &str) {
        debug!("Cache LOAD start: {}", key);
    }

    /// Record a successful load.
    fn record_loaded(&self, key: &str, duration: Duration) {
        debug!("Cache LOADED: {} took {:?}", key, duration);
    }

    /// Record a failed load.
    fn record_failed(&self, key: &str, error: &Error, duration: Duration) {
        warn!("Cache FAILED for {} after {:?}: {}", key, duration, error);
    }

    /// Record an eviction.
    fn record_evict(&self, key: &str) {
        debug!("Cache EVICT: {}", key);
    }

    /// Record a full clear.
    fn record_clear(&self, entries: usize) {
        debug!("Cache CLEAR: {} entries", entries);
    }
}

/// Default metrics implementation (no-op).
#[derive(Clone, Default)]
pub struct NoOpMetrics;

impl CacheMetrics for NoOpMetrics {
    fn record_load_started(&self, _key: &str) {}
    fn record_loaded(&self, _key: &str, _duration: Duration) {}
    fn record_failed(&self, _key: &str, _error: &Error, _duration: Duration) {}
    fn record_evict(&self, _key: &str) {}
    fn record_clear(&self, _entries: usize) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    struct LoggingMetrics;
    impl CacheMetrics for LoggingMetrics {}

    #[test]
    fn test_noop_metrics() {
        let metrics = NoOpMetrics;
        metrics.record_load_started("key");
        metrics.record_loaded("key", Duration::from_millis(1));
        metrics.record_failed("key", &Error::Other("x".into()), Duration::from_millis(2));
    }

    #[test]
    fn test_default_hooks_log() {
        let _ = env_logger::builder().is_test(true).try_init();
        let metrics = LoggingMetrics;
        metrics.record_loaded("key", Duration::from_millis(3));
        metrics.record_evict("key");
        metrics.record_clear(4);
    }
}
