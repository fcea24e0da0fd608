use std::sync::Arc;

use chrono::{DateTime, Utc};

/// Where a cache entry stands relative to the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FetchStatus {
    /// Never fetched, or dropped.
    Absent,
    /// A fetch is in flight. A previous value may still be readable.
    Loading,
    /// Holds the result of the latest fetch and nothing has invalidated it.
    Fresh,
    /// Holds a value that must be refetched before it is trusted again.
    Stale,
    /// The latest fetch failed. Stays this way until the next fetch.
    Error,
}

/// Snapshot of one entry, as returned by `EntityCache::get`.
#[derive(Debug, Clone)]
pub struct CacheEntry<V, E> {
    pub status: FetchStatus,
    pub value: Option<Arc<V>>,
    pub error: Option<E>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl<V, E> CacheEntry<V, E> {
    pub fn absent() -> Self {
        Self {
            status: FetchStatus::Absent,
            value: None,
            error: None,
            updated_at: None,
        }
    }

    pub fn is_fresh(&self) -> bool {
        self.status == FetchStatus::Fresh
    }

    pub fn is_loading(&self) -> bool {
        self.status == FetchStatus::Loading
    }
}

/// Broadcast to subscribers whenever an entry changes status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEvent<K> {
    pub key: K,
    pub status: FetchStatus,
}
