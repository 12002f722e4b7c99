//! Feature Repository Module
//!
//! SDK-side cache of feature payloads keyed by `(host, client key)`, with
//! fetch coalescing, stale-while-revalidate refreshes and durable seeding.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::{BoxFuture, FutureExt, Shared};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use super::clock::{Clock, SystemClock};
use super::entry::CacheEntry;
use super::fetcher::{FeatureFetcher, HttpFetcher};
use super::key::RepositoryKey;
use super::persist;
use super::stats::{RepositoryStats, StatsCounters};
use super::storage::{FileStorage, KeyValueStorage, MemoryStorage};
use crate::config::RepositoryConfig;
use crate::error::{FetchError, RepositoryError};
use crate::sdk::FeatureApiResponse;

/// Shared payload handed to every caller of a load.
pub type Payload = Arc<FeatureApiResponse>;

/// A fetch every concurrent caller for the same key awaits.
type InFlightFetch = Shared<BoxFuture<'static, Option<Payload>>>;

// == Feature Repository ==
/// Process-wide feature payload cache.
///
/// Cheap to clone; clones share the same cache and in-flight fetches.
///
/// Loads never wait on the network when an entry exists. At most one fetch
/// per key is in flight at any time, and every fetch runs on its own task so
/// a caller that gives up does not strand the others.
#[derive(Clone)]
pub struct FeatureRepository {
    inner: Arc<Inner>,
}

struct Inner {
    entries: RwLock<HashMap<RepositoryKey, CacheEntry>>,
    in_flight: Mutex<HashMap<RepositoryKey, InFlightFetch>>,
    fetcher: Arc<dyn FeatureFetcher>,
    storage: Arc<dyn KeyValueStorage>,
    clock: Arc<dyn Clock>,
    stats: StatsCounters,
    ttl: Duration,
    storage_key: String,
    /// Bumped under the `entries` write lock for every snapshot taken
    generation: AtomicU64,
    /// Generation of the last snapshot that reached storage
    persisted: Mutex<u64>,
}

impl FeatureRepository {
    // == Constructor ==
    /// Creates a repository and seeds it from durable storage.
    ///
    /// Persisted entries whose deadline has passed are discarded; the rest are
    /// admitted as stale so the next load revalidates them.
    pub fn new(
        config: &RepositoryConfig,
        fetcher: Arc<dyn FeatureFetcher>,
        storage: Arc<dyn KeyValueStorage>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let entries = match storage.get(&config.storage_key) {
            Ok(Some(raw)) => persist::decode(&raw, clock.now()),
            Ok(None) => HashMap::new(),
            Err(err) => {
                warn!(error = %err, "Could not read persisted feature cache");
                HashMap::new()
            }
        };
        if !entries.is_empty() {
            info!("Restored {} feature payloads from durable storage", entries.len());
        }

        Self {
            inner: Arc::new(Inner {
                entries: RwLock::new(entries),
                in_flight: Mutex::new(HashMap::new()),
                fetcher,
                storage,
                clock,
                stats: StatsCounters::default(),
                ttl: config.ttl,
                storage_key: config.storage_key.clone(),
                generation: AtomicU64::new(0),
                persisted: Mutex::new(0),
            }),
        }
    }

    /// Creates a repository with an HTTP fetcher and the configured storage.
    pub fn from_config(config: &RepositoryConfig) -> Result<Self, FetchError> {
        let fetcher = Arc::new(HttpFetcher::new(config.fetch_timeout)?);
        let storage: Arc<dyn KeyValueStorage> = match &config.cache_dir {
            Some(dir) => Arc::new(FileStorage::new(dir)),
            None => Arc::new(MemoryStorage::new()),
        };
        Ok(Self::new(config, fetcher, storage, Arc::new(SystemClock)))
    }

    // == Load ==
    /// Returns the payload for `(host, client_key)`.
    ///
    /// A cached entry is returned immediately; if it is stale a background
    /// refresh is started. Without an entry the call waits for a fetch,
    /// joining one already in flight. `Ok(None)` means the fetch failed and
    /// nothing was cached.
    pub async fn load(
        &self,
        host: &str,
        client_key: &str,
    ) -> Result<Option<Payload>, RepositoryError> {
        let key = RepositoryKey::new(host, client_key)?;
        let now = self.inner.clock.now();

        let cached = {
            let entries = self.inner.entries.read().await;
            entries
                .get(&key)
                .map(|entry| (Arc::clone(&entry.data), entry.is_stale(now)))
        };

        match cached {
            Some((data, stale)) => {
                self.inner.stats.record_hit();
                if stale {
                    self.refresh_in_background(key).await;
                }
                Ok(Some(data))
            }
            None => {
                self.inner.stats.record_miss();
                let (pending, _) = self.inner.fetch(key).await;
                Ok(pending.await)
            }
        }
    }

    async fn refresh_in_background(&self, key: RepositoryKey) {
        let (_, started) = self.inner.fetch(key.clone()).await;
        if started {
            self.inner.stats.record_background_refresh();
            debug!(%key, "Refreshing stale features in background");
        }
    }

    // == Clear ==
    /// Drops every cached entry and persists the empty map.
    pub async fn clear(&self) {
        let snapshot = {
            let mut entries = self.inner.entries.write().await;
            entries.clear();
            self.inner.snapshot(&entries)
        };
        self.inner.persist(snapshot).await;
        info!("Feature cache cleared");
    }

    // == Introspection ==
    /// Number of cached payloads.
    pub async fn len(&self) -> usize {
        self.inner.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Number of fetches that have not settled yet.
    pub async fn in_flight(&self) -> usize {
        self.inner.in_flight.lock().await.len()
    }

    /// Freshness deadline of the cached entry for a key, if any.
    pub async fn stale_at(&self, host: &str, client_key: &str) -> Option<DateTime<Utc>> {
        let key = RepositoryKey::new(host, client_key).ok()?;
        self.inner.entries.read().await.get(&key).map(|e| e.stale_at)
    }

    pub async fn stats(&self) -> RepositoryStats {
        let total = self.len().await;
        self.inner.stats.snapshot(total)
    }
}

impl Inner {
    /// Returns the in-flight fetch for `key`, starting one if none exists.
    /// The flag reports whether this call started it.
    async fn fetch(self: &Arc<Self>, key: RepositoryKey) -> (InFlightFetch, bool) {
        let mut in_flight = self.in_flight.lock().await;
        if let Some(pending) = in_flight.get(&key) {
            return (pending.clone(), false);
        }

        let inner = Arc::clone(self);
        let pending = inner.run_fetch(key.clone()).boxed().shared();
        in_flight.insert(key, pending.clone());
        tokio::spawn(pending.clone());
        (pending, true)
    }

    async fn run_fetch(self: Arc<Self>, key: RepositoryKey) -> Option<Payload> {
        self.stats.record_fetch();

        let outcome = match self.fetcher.fetch(key.host(), key.client_key()).await {
            Ok(data) => {
                let data = Arc::new(data);
                self.store(key.clone(), Arc::clone(&data)).await;
                Some(data)
            }
            Err(err) => {
                self.stats.record_fetch_failure();
                warn!(%key, error = %err, "Feature fetch failed");
                None
            }
        };

        self.in_flight.lock().await.remove(&key);
        outcome
    }

    async fn store(&self, key: RepositoryKey, data: Payload) {
        let stale_at = self.stale_at_from(self.clock.now());
        let snapshot = {
            let mut entries = self.entries.write().await;
            entries.insert(key, CacheEntry::new(data, stale_at));
            self.snapshot(&entries)
        };
        self.persist(snapshot).await;
    }

    /// Encodes the cache map and tags it with the next generation.
    /// Must be called while holding the `entries` write lock.
    fn snapshot(&self, entries: &HashMap<RepositoryKey, CacheEntry>) -> Option<(u64, String)> {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        match persist::encode(entries) {
            Ok(raw) => Some((generation, raw)),
            Err(err) => {
                warn!(error = %err, "Could not encode feature cache");
                None
            }
        }
    }

    /// Best-effort write of a snapshot, off the `entries` lock and on the
    /// blocking pool. A snapshot older than one already written is skipped.
    async fn persist(&self, snapshot: Option<(u64, String)>) {
        let Some((generation, raw)) = snapshot else {
            return;
        };

        let mut persisted = self.persisted.lock().await;
        if *persisted >= generation {
            debug!(generation, "Skipping superseded cache snapshot");
            return;
        }

        let storage = Arc::clone(&self.storage);
        let storage_key = self.storage_key.clone();
        match tokio::task::spawn_blocking(move || storage.set(&storage_key, &raw)).await {
            Ok(Ok(())) => *persisted = generation,
            Ok(Err(err)) => warn!(error = %err, "Could not persist feature cache"),
            Err(err) => warn!(error = %err, "Feature cache write task failed"),
        }
    }

    fn stale_at_from(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        chrono::Duration::from_std(self.ttl)
            .ok()
            .and_then(|ttl| now.checked_add_signed(ttl))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}
