//! In-memory query cache: one entry per key, shared fetches, invalidation
//! and change notification.

pub mod cache;
pub mod entry;
pub mod subscription;

pub use cache::{CacheConfig, CacheKey, EntityCache};
pub use entry::{CacheEntry, CacheEvent, FetchStatus};
pub use subscription::Subscription;
