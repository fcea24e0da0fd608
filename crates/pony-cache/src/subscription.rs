use tokio::sync::broadcast::{self, error::RecvError};
use tracing::trace;

use crate::cache::{CacheKey, EntityCache};
use crate::entry::{CacheEntry, CacheEvent, FetchStatus};

/// Interest in one key. Keeps the key refetching on invalidation for as
/// long as it lives, and yields that key's status changes.
pub struct Subscription<K: CacheKey, V: Send + Sync + 'static, E: Clone + Send + Sync + 'static> {
    key: K,
    rx: broadcast::Receiver<CacheEvent<K>>,
    cache: EntityCache<K, V, E>,
}

impl<K, V, E> Subscription<K, V, E>
where
    K: CacheKey,
    V: Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    pub(crate) fn new(key: K, rx: broadcast::Receiver<CacheEvent<K>>, cache: EntityCache<K, V, E>) -> Self {
        Self { key, rx, cache }
    }

    pub fn key(&self) -> &K {
        &self.key
    }

    /// Current entry for the subscribed key.
    pub fn current(&self) -> CacheEntry<V, E> {
        self.cache.get(&self.key)
    }

    /// Wait for the next status change of the subscribed key. If this
    /// subscriber fell behind, the missed changes collapse into the current
    /// status. `None` once the cache itself is gone.
    pub async fn changed(&mut self) -> Option<FetchStatus> {
        loop {
            match self.rx.recv().await {
                Ok(event) if event.key == self.key => return Some(event.status),
                Ok(_) => continue,
                Err(RecvError::Lagged(n)) => {
                    trace!("subscription for {:?} lagged by {}", self.key, n);
                    return Some(self.cache.status(&self.key));
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }
}

impl<K, V, E> Drop for Subscription<K, V, E>
where
    K: CacheKey,
    V: Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    fn drop(&mut self) {
        self.cache.unsubscribe(&self.key);
    }
}
