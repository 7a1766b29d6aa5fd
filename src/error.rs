//! Error types for the reactive cache.

use serde::{Serialize, Serializer};
use std::fmt;

/// Result type for cache operations and resolvers.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the reactive cache.
///
/// Resolver failures never escape `load`, `initialize` or `load_many`; they are
/// stored on the entry's error cell and surface through `by_id`, or as the
/// rejection of `loaded`.
///
/// `Error` is `Clone + PartialEq` because it lives inside a reactive cell, which
/// only notifies subscribers when the stored value actually changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// A resolver reported a failure.
    ///
    /// This is the catch-all for anything a caller-supplied resolver returns
    /// as `Err`, e.g. a failed HTTP request or a rejected database query.
    Resolution(String),

    /// A repository-backed load found no entity for the key.
    NotFound(String),

    /// A batch resolver produced fewer values than ids were requested.
    ///
    /// Only the entries at missing positions fail; the others load normally.
    MissingBatchValue {
        /// Position in the requested id list
        index: usize,
    },

    /// The entry was evicted or cleared while a `loaded` waiter was pending.
    Evicted(String),

    /// A load future was dropped before its resolver settled, outside any
    /// tokio runtime.
    Cancelled(String),

    /// Waiting for an entry to settle exceeded the given deadline.
    Timeout(String),

    /// I/O failure inside a resolver.
    Io(String),

    /// Serialization failed, either in a resolver or while inspecting a cache.
    Serialization(String),

    /// Generic error with custom message.
    Other(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Resolution(msg) => write!(f, "Resolution error: {}", msg),
            Error::NotFound(key) => write!(f, "Entity not found: {}", key),
            Error::MissingBatchValue { index } => {
                write!(f, "Batch resolver returned no value at index {}", index)
            }
            Error::Evicted(key) => write!(f, "Entry evicted before settling: {}", key),
            Error::Cancelled(key) => write!(f, "Load dropped before settling: {}", key),
            Error::Timeout(msg) => write!(f, "Timeout: {}", msg),
            Error::Io(msg) => write!(f, "I/O error: {}", msg),
            Error::Serialization(msg) => write!(f, "Serialization error: {}", msg),
            Error::Other(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

// Inspection output carries errors as their display text.
impl Serialize for Error {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

// ============================================================================
// Conversions from other error types
// ============================================================================

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        if e.is_io() {
            Error::Io(e.to_string())
        } else {
            Error::Serialization(e.to_string())
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e.to_string())
    }
}

impl From<String> for Error {
    fn from(e: String) -> Self {
        Error::Resolution(e)
    }
}

impl From<&str> for Error {
    fn from(e: &str) -> Self {
        Error::Resolution(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::Resolution("boom".to_string());
        assert_eq!(err.to_string(), "Resolution error: boom");

        let err = Error::MissingBatchValue { index: 3 };
        assert_eq!(err.to_string(), "Batch resolver returned no value at index 3");

        let err = Error::Cancelled("7".to_string());
        assert_eq!(err.to_string(), "Load dropped before settling: 7");
    }

    #[test]
    fn test_error_from_string() {
        let err: Error = "test error".into();
        assert_eq!(err, Error::Resolution("test error".to_string()));
    }

    #[test]
    fn test_error_from_io() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk gone");
        let err: Error = io.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_error_serializes_as_text() {
        let err = Error::NotFound("42".to_string());
        let json = serde_json::to_value(&err).expect("Failed to serialize");
        assert_eq!(json, serde_json::json!("Entity not found: 42"));
    }
}
