//! Per-entry load lifecycle.
//!
//! ```text
//!                  load()                 resolver Ok
//! Uninitialized ──────────► Loading ─────────────────► Loaded
//!       ▲                    │  ▲                        │
//!       │                    │  └──────── load() ────────┘
//!       │                    │ resolver Err
//!       │                    ▼
//!       └── evict()/clear() Failed ──── load()/initialize() ──► Loading
//! ```
//!
//! No transition happens on its own: every move out of a state is caused by an
//! explicit `load`, `initialize`, `load_many`, `evict` or `clear`.

use serde::{Deserialize, Serialize};

/// Load status of a cache entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    /// Never loaded, or reset by eviction.
    #[default]
    Uninitialized,

    /// A load is in flight. The entry keeps whatever value it had before.
    Loading,

    /// The last load succeeded; the error slot is empty.
    Loaded,

    /// The last load failed; the value slot still holds the last good value.
    Failed,
}

impl Status {
    /// Whether a load has finished, successfully or not.
    pub fn is_settled(self) -> bool {
        matches!(self, Status::Loaded | Status::Failed)
    }

    /// Whether `initialize` would start a load from this state.
    pub fn accepts_initialize(self) -> bool {
        matches!(self, Status::Uninitialized | Status::Failed)
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Status::Uninitialized => write!(f, "UNINITIALIZED"),
            Status::Loading => write!(f, "LOADING"),
            Status::Loaded => write!(f, "LOADED"),
            Status::Failed => write!(f, "FAILED"),
        }
    }
}
