//! Cache key management utilities.

use std::fmt::Display;

/// Builder for storage keys and storage labels.
///
/// Ids are coerced to their string form, so ids that print the same share an
/// entry: `42_u64`, `42_i32` and `"42"` all address key `"42"`.
pub struct CacheKeyBuilder;

impl CacheKeyBuilder {
    /// Storage key for an entity id.
    pub fn build(id: &dyn Display) -> String {
        id.to_string()
    }

    /// Storage keys for a list of ids, in order.
    pub fn build_many<I: Display>(ids: impl IntoIterator<Item = I>) -> Vec<String> {
        ids.into_iter().map(|id| Self::build(&id)).collect()
    }

    /// Identity tag of a named cache's storage cell.
    pub fn storage_label(name: &str) -> String {
        format!("{}Cache", name)
    }
}
