use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use futures_util::future::{BoxFuture, FutureExt, Shared};
use tokio::sync::broadcast;
use tracing::{debug, trace, warn};

use crate::entry::{CacheEntry, CacheEvent, FetchStatus};
use crate::subscription::Subscription;

/// Anything usable as a cache key. Keys compare by value, so
/// `Messages(7)` and `Messages(8)` are unrelated entries.
pub trait CacheKey: Clone + Eq + Hash + fmt::Debug + Send + Sync + 'static {}

impl<T> CacheKey for T where T: Clone + Eq + Hash + fmt::Debug + Send + Sync + 'static {}

type Loader<V, E> = Arc<dyn Fn() -> BoxFuture<'static, Result<V, E>> + Send + Sync>;
type PendingFetch<V, E> = Shared<BoxFuture<'static, Result<Arc<V>, E>>>;

#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Age after which a fresh entry is refetched on the next read.
    /// `None` keeps entries fresh until invalidated.
    pub stale_after: Option<Duration>,
    /// Buffered change events per subscriber before it starts lagging.
    pub event_capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            stale_after: None,
            event_capacity: 256,
        }
    }
}

struct InFlight<V, E> {
    id: u64,
    fetch: PendingFetch<V, E>,
}

struct Slot<V, E> {
    status: FetchStatus,
    value: Option<Arc<V>>,
    error: Option<E>,
    fetched_at: Option<Instant>,
    updated_at: Option<DateTime<Utc>>,
    /// Bumped by every invalidation; a fetch that started under an older
    /// generation lands as stale.
    generation: u64,
    in_flight: Option<InFlight<V, E>>,
    /// The most recent loader, kept so invalidation can refetch for
    /// subscribers without a caller supplying one.
    loader: Option<Loader<V, E>>,
    fetch_count: u64,
}

impl<V, E: Clone> Slot<V, E> {
    fn new() -> Self {
        Self {
            status: FetchStatus::Absent,
            value: None,
            error: None,
            fetched_at: None,
            updated_at: None,
            generation: 0,
            in_flight: None,
            loader: None,
            fetch_count: 0,
        }
    }

    fn snapshot(&self) -> CacheEntry<V, E> {
        CacheEntry {
            status: self.status,
            value: self.value.clone(),
            error: self.error.clone(),
            updated_at: self.updated_at,
        }
    }

    fn is_expired(&self, stale_after: Option<Duration>) -> bool {
        match (stale_after, self.fetched_at) {
            (Some(max_age), Some(at)) => at.elapsed() >= max_age,
            _ => false,
        }
    }
}

struct State<K, V, E> {
    slots: HashMap<K, Slot<V, E>>,
    /// Kept apart from `slots` so `clear` cannot lose track of live
    /// subscriptions.
    subscribers: HashMap<K, usize>,
}

struct CacheInner<K, V, E> {
    state: Mutex<State<K, V, E>>,
    events_tx: broadcast::Sender<CacheEvent<K>>,
    config: CacheConfig,
    next_fetch_id: AtomicU64,
}

enum Lookup<V, E> {
    Hit(Arc<V>),
    Pending(PendingFetch<V, E>),
}

/// Keyed store of fetched results with per-key request deduplication,
/// invalidation and change subscriptions.
///
/// At most one loader runs per key at a time; concurrent readers of a
/// loading key share its result. Each fetch runs on its own task, so a
/// reader that goes away does not cancel it.
pub struct EntityCache<K, V, E> {
    inner: Arc<CacheInner<K, V, E>>,
}

impl<K, V, E> Clone for EntityCache<K, V, E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K, V, E> Default for EntityCache<K, V, E>
where
    K: CacheKey,
    V: Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, E> EntityCache<K, V, E>
where
    K: CacheKey,
    V: Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::with_config(CacheConfig::default())
    }

    pub fn with_config(config: CacheConfig) -> Self {
        let (events_tx, _) = broadcast::channel(config.event_capacity.max(1));
        Self {
            inner: Arc::new(CacheInner {
                state: Mutex::new(State {
                    slots: HashMap::new(),
                    subscribers: HashMap::new(),
                }),
                events_tx,
                config,
                next_fetch_id: AtomicU64::new(1),
            }),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.inner.config
    }

    /// Snapshot of the entry for `key`; `Absent` if there is none.
    pub fn get(&self, key: &K) -> CacheEntry<V, E> {
        self.inner
            .lock()
            .slots
            .get(key)
            .map(Slot::snapshot)
            .unwrap_or_else(CacheEntry::absent)
    }

    pub fn status(&self, key: &K) -> FetchStatus {
        self.inner
            .lock()
            .slots
            .get(key)
            .map_or(FetchStatus::Absent, |slot| slot.status)
    }

    /// Last stored value regardless of status.
    pub fn peek(&self, key: &K) -> Option<Arc<V>> {
        self.inner.lock().slots.get(key).and_then(|slot| slot.value.clone())
    }

    /// Number of times a loader has been started for `key`.
    pub fn fetch_count(&self, key: &K) -> u64 {
        self.inner.lock().slots.get(key).map_or(0, |slot| slot.fetch_count)
    }

    /// Return the fresh value for `key`, or run `loader` and store what it
    /// yields. A read arriving while a fetch is in flight waits for that
    /// fetch instead of starting another. Loader errors reach every waiting
    /// caller and leave the entry in `Error` until the next fetch.
    pub async fn fetch<F, Fut>(&self, key: K, loader: F) -> Result<Arc<V>, E>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
    {
        let loader: Loader<V, E> = Arc::new(move || loader().boxed());
        match self.inner.lookup(key, loader) {
            Lookup::Hit(value) => Ok(value),
            Lookup::Pending(fetch) => fetch.await,
        }
    }

    /// Refetch with the last loader registered for `key`, ignoring
    /// freshness. Joins an in-flight fetch if there is one. `None` if the key
    /// has never been fetched.
    pub async fn refetch(&self, key: &K) -> Option<Result<Arc<V>, E>> {
        let pending = {
            let mut state = self.inner.lock();
            let slot = state.slots.get_mut(key)?;
            match &slot.in_flight {
                Some(in_flight) => in_flight.fetch.clone(),
                None => {
                    let loader = slot.loader.clone()?;
                    self.inner.start_fetch(key, slot, loader)
                }
            }
        };
        Some(pending.await)
    }

    /// Mark `key` stale. If anyone is subscribed to it a refetch starts
    /// right away. Returns whether there was an entry to invalidate.
    pub fn invalidate(&self, key: &K) -> bool {
        let mut guard = self.inner.lock();
        let State { slots, subscribers } = &mut *guard;
        let Some(slot) = slots.get_mut(key) else {
            trace!("invalidate {:?}: no entry", key);
            return false;
        };
        let watched = subscribers.get(key).copied().unwrap_or(0) > 0;
        self.inner.invalidate_slot(key, slot, watched);
        true
    }

    /// Invalidate every key matching `predicate`. Returns how many entries
    /// were touched.
    pub fn invalidate_where<P>(&self, predicate: P) -> usize
    where
        P: Fn(&K) -> bool,
    {
        let mut guard = self.inner.lock();
        let State { slots, subscribers } = &mut *guard;
        let mut touched = 0;
        for (key, slot) in slots.iter_mut().filter(|(key, _)| predicate(*key)) {
            let watched = subscribers.get(key).copied().unwrap_or(0) > 0;
            self.inner.invalidate_slot(key, slot, watched);
            touched += 1;
        }
        touched
    }

    /// Drop the entry for `key`. An in-flight fetch for it still completes,
    /// but its result is discarded.
    pub fn remove(&self, key: &K) -> bool {
        let removed = self.inner.lock().slots.remove(key).is_some();
        if removed {
            self.inner.emit(key, FetchStatus::Absent);
        }
        removed
    }

    /// Drop every entry. Subscriptions stay registered.
    pub fn clear(&self) {
        let keys: Vec<K> = {
            let mut state = self.inner.lock();
            state.slots.drain().map(|(key, _)| key).collect()
        };
        debug!("cache cleared ({} entries)", keys.len());
        for key in &keys {
            self.inner.emit(key, FetchStatus::Absent);
        }
    }

    /// Register interest in `key`. While the returned subscription lives,
    /// invalidating `key` triggers an immediate refetch.
    pub fn subscribe(&self, key: K) -> Subscription<K, V, E> {
        let rx = self.inner.events_tx.subscribe();
        *self.inner.lock().subscribers.entry(key.clone()).or_insert(0) += 1;
        trace!("subscribed to {:?}", key);
        Subscription::new(key, rx, self.clone())
    }

    /// Every status change for every key.
    pub fn events(&self) -> broadcast::Receiver<CacheEvent<K>> {
        self.inner.events_tx.subscribe()
    }

    pub fn subscriber_count(&self, key: &K) -> usize {
        self.inner.lock().subscribers.get(key).copied().unwrap_or(0)
    }

    pub(crate) fn unsubscribe(&self, key: &K) {
        let mut state = self.inner.lock();
        if let Some(count) = state.subscribers.get_mut(key) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                state.subscribers.remove(key);
            }
        }
    }
}

impl<K, V, E> CacheInner<K, V, E>
where
    K: CacheKey,
    V: Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    fn lock(&self) -> MutexGuard<'_, State<K, V, E>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, key: &K, status: FetchStatus) {
        let _ = self.events_tx.send(CacheEvent {
            key: key.clone(),
            status,
        });
    }

    fn lookup(self: &Arc<Self>, key: K, loader: Loader<V, E>) -> Lookup<V, E> {
        let mut state = self.lock();
        let slot = state.slots.entry(key.clone()).or_insert_with(Slot::new);
        slot.loader = Some(Arc::clone(&loader));

        if slot.status == FetchStatus::Fresh {
            if slot.is_expired(self.config.stale_after) {
                slot.status = FetchStatus::Stale;
                self.emit(&key, FetchStatus::Stale);
            } else if let Some(value) = &slot.value {
                trace!("cache hit {:?}", key);
                return Lookup::Hit(Arc::clone(value));
            }
        }

        if let Some(in_flight) = &slot.in_flight {
            trace!("joining in-flight fetch for {:?}", key);
            return Lookup::Pending(in_flight.fetch.clone());
        }

        Lookup::Pending(self.start_fetch(&key, slot, loader))
    }

    /// Kick off `loader` for `key`. The caller holds the lock.
    fn start_fetch(self: &Arc<Self>, key: &K, slot: &mut Slot<V, E>, loader: Loader<V, E>) -> PendingFetch<V, E> {
        let id = self.next_fetch_id.fetch_add(1, Ordering::Relaxed);
        let generation = slot.generation;

        let inner = Arc::clone(self);
        let owned_key = key.clone();
        let run = loader();
        let fetch = async move {
            let result = run.await.map(Arc::new);
            inner.complete(&owned_key, id, generation, &result);
            result
        }
        .boxed()
        .shared();

        slot.status = FetchStatus::Loading;
        slot.fetch_count += 1;
        slot.in_flight = Some(InFlight {
            id,
            fetch: fetch.clone(),
        });

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(fetch.clone());
            }
            Err(_) => warn!("no async runtime: fetch for {:?} only progresses while awaited", key),
        }

        debug!("fetching {:?}", key);
        self.emit(key, FetchStatus::Loading);
        fetch
    }

    /// Refetch with the remembered loader, if any, discarding the handle.
    fn restart(self: &Arc<Self>, key: &K, slot: &mut Slot<V, E>) {
        if let Some(loader) = slot.loader.clone() {
            drop(self.start_fetch(key, slot, loader));
        }
    }

    fn complete(self: &Arc<Self>, key: &K, id: u64, generation: u64, result: &Result<Arc<V>, E>) {
        let mut guard = self.lock();
        let State { slots, subscribers } = &mut *guard;

        let Some(slot) = slots.get_mut(key) else {
            debug!("discarding result for removed entry {:?}", key);
            return;
        };
        if slot.in_flight.as_ref().map(|f| f.id) != Some(id) {
            debug!("discarding superseded result for {:?}", key);
            return;
        }
        slot.in_flight = None;

        let status = match result {
            Ok(value) => {
                slot.value = Some(Arc::clone(value));
                slot.error = None;
                slot.fetched_at = Some(Instant::now());
                slot.updated_at = Some(Utc::now());
                if slot.generation == generation {
                    FetchStatus::Fresh
                } else {
                    FetchStatus::Stale
                }
            }
            Err(e) => {
                slot.error = Some(e.clone());
                FetchStatus::Error
            }
        };
        slot.status = status;
        debug!("fetch for {:?} finished: {:?}", key, status);
        self.emit(key, status);

        // Invalidated mid-flight: the value is already outdated.
        let watched = subscribers.get(key).copied().unwrap_or(0) > 0;
        if status == FetchStatus::Stale && watched {
            self.restart(key, slot);
        }
    }

    fn invalidate_slot(self: &Arc<Self>, key: &K, slot: &mut Slot<V, E>, watched: bool) {
        slot.generation += 1;

        match slot.status {
            // Never fetched: nothing to mark.
            FetchStatus::Absent => return,
            // The landing result will see the new generation.
            FetchStatus::Loading => {}
            FetchStatus::Fresh | FetchStatus::Stale | FetchStatus::Error => {
                slot.status = FetchStatus::Stale;
                self.emit(key, FetchStatus::Stale);
            }
        }
        debug!("invalidated {:?}", key);

        if watched && slot.in_flight.is_none() {
            self.restart(key, slot);
        }
    }
}
