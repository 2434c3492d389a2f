//! Keyed cache of read results.
//!
//! Each [`QueryKey`] maps to one entry holding the last fetched value, its
//! freshness, an invalidation generation and at most one in-flight fetch.
//! Concurrent readers of a key share the in-flight fetch. Fetches run on
//! their own task, so a reader that gives up does not cancel the fetch for
//! the others.
//!
//! Freshness rules:
//! - a value younger than `stale_time` is served as-is;
//! - an older value is served immediately while a background refetch runs
//!   (unless the caller asks for [`FetchPolicy::ForceFresh`]);
//! - an invalidated value is never served: the next read awaits a refetch.

pub mod invalidation;
pub mod key;

pub use invalidation::InvalidationPlan;
pub use key::{KeyFilter, QueryKey};

use crate::error::{ApiError, ApiResult};
use chrono::{DateTime, Utc};
use futures_util::FutureExt;
use futures_util::future::{BoxFuture, Shared};
use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Default freshness window.
pub const DEFAULT_STALE_TIME: Duration = Duration::from_secs(5 * 60);

/// Default time an unread entry is kept.
pub const DEFAULT_GC_TIME: Duration = Duration::from_secs(30 * 60);

/// Default number of retries for a read failing with a transport error.
pub const DEFAULT_RETRY: u32 = 1;

/// Default delay between read retries.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Upper bound on how often garbage collection runs.
const GC_INTERVAL: Duration = Duration::from_secs(60);

type CachedValue = Arc<dyn Any + Send + Sync>;
type SharedFetch = Shared<BoxFuture<'static, ApiResult<CachedValue>>>;

/// How a read treats a cached value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FetchPolicy {
    /// Serve fresh values; serve expired values while refetching in the background.
    #[default]
    StaleWhileRevalidate,
    /// Always await a fetch that started after the latest invalidation.
    ForceFresh,
}

/// Timing and retry settings of a [`QueryCache`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheSettings {
    pub stale_time: Duration,
    pub gc_time: Duration,
    pub retry: u32,
    pub retry_delay: Duration,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            stale_time: DEFAULT_STALE_TIME,
            gc_time: DEFAULT_GC_TIME,
            retry: DEFAULT_RETRY,
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }
}

struct InFlight {
    id: u64,
    generation: u64,
    future: SharedFetch,
}

struct CacheEntry {
    value: Option<CachedValue>,
    updated_at: Option<Instant>,
    invalidated: bool,
    generation: u64,
    in_flight: Option<InFlight>,
    last_error: Option<ApiError>,
    last_accessed: Instant,
}

impl CacheEntry {
    fn new() -> Self {
        Self {
            value: None,
            updated_at: None,
            invalidated: false,
            generation: 0,
            in_flight: None,
            last_error: None,
            last_accessed: Instant::now(),
        }
    }

    fn is_fresh(&self, stale_time: Duration) -> bool {
        !self.invalidated
            && self
                .updated_at
                .is_some_and(|updated| updated.elapsed() < stale_time)
    }

    /// In-flight fetch that started after the latest invalidation.
    fn current_fetch(&self) -> Option<SharedFetch> {
        self.in_flight
            .as_ref()
            .filter(|f| f.generation == self.generation)
            .map(|f| f.future.clone())
    }
}

/// Point-in-time view of one cache entry.
#[derive(Debug, Clone, PartialEq)]
pub struct EntrySnapshot {
    pub key: QueryKey,
    pub has_value: bool,
    pub fresh: bool,
    pub invalidated: bool,
    pub fetching: bool,
    pub updated_at: Option<DateTime<Utc>>,
    pub last_error: Option<ApiError>,
}

/// Shared, cloneable handle to the cache.
#[derive(Clone)]
pub struct QueryCache {
    entries: Arc<RwLock<HashMap<QueryKey, CacheEntry>>>,
    settings: CacheSettings,
    next_fetch_id: Arc<AtomicU64>,
    /// Start time for converting Instant to DateTime
    start_instant: Instant,
    start_datetime: DateTime<Utc>,
}

impl QueryCache {
    pub fn new(settings: CacheSettings) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            settings,
            next_fetch_id: Arc::new(AtomicU64::new(1)),
            start_instant: Instant::now(),
            start_datetime: Utc::now(),
        }
    }

    pub fn settings(&self) -> &CacheSettings {
        &self.settings
    }

    /// Read a key through the cache.
    ///
    /// `fetcher` is only called when the policy and the entry's state require
    /// a fetch and none is already running for the current generation.
    pub async fn fetch<T, F, Fut>(
        &self,
        key: QueryKey,
        policy: FetchPolicy,
        fetcher: F,
    ) -> ApiResult<Arc<T>>
    where
        T: Send + Sync + 'static,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ApiResult<T>> + Send + 'static,
    {
        let pending = {
            let mut entries = self.entries.write().await;
            let entry = entries.entry(key.clone()).or_insert_with(CacheEntry::new);
            entry.last_accessed = Instant::now();

            let usable = entry.value.clone().filter(|_| !entry.invalidated);
            match (policy, usable) {
                (FetchPolicy::StaleWhileRevalidate, Some(value))
                    if entry.is_fresh(self.settings.stale_time) =>
                {
                    debug!(key = %key, "Cache hit");
                    return downcast(&key, value);
                }
                (FetchPolicy::StaleWhileRevalidate, Some(value)) => {
                    if entry.current_fetch().is_none() {
                        debug!(key = %key, "Serving stale value, refetching in background");
                        let _background = self.start_fetch(&key, entry, fetcher);
                    }
                    return downcast(&key, value);
                }
                _ => match entry.current_fetch() {
                    Some(future) => {
                        debug!(key = %key, "Joining in-flight fetch");
                        future
                    }
                    None => self.start_fetch(&key, entry, fetcher),
                },
            }
        };

        let value = pending.await?;
        downcast(&key, value)
    }

    fn start_fetch<T, F, Fut>(&self, key: &QueryKey, entry: &mut CacheEntry, fetcher: F) -> SharedFetch
    where
        T: Send + Sync + 'static,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ApiResult<T>> + Send + 'static,
    {
        let id = self.next_fetch_id.fetch_add(1, Ordering::Relaxed);
        let generation = entry.generation;
        let cache = self.clone();
        let task_key = key.clone();

        debug!(key = %key, fetch_id = id, generation, "Starting fetch");

        let task = tokio::spawn(async move {
            let result = cache.run_fetcher(&task_key, &fetcher).await;
            cache.complete(&task_key, id, generation, &result).await;
            result
        });

        let future: SharedFetch = async move {
            task.await
                .unwrap_or_else(|e| Err(ApiError::transport(format!("Fetch task failed: {}", e))))
        }
        .boxed()
        .shared();

        entry.in_flight = Some(InFlight {
            id,
            generation,
            future: future.clone(),
        });
        future
    }

    async fn run_fetcher<T, F, Fut>(&self, key: &QueryKey, fetcher: &F) -> ApiResult<CachedValue>
    where
        T: Send + Sync + 'static,
        F: Fn() -> Fut,
        Fut: Future<Output = ApiResult<T>>,
    {
        let mut attempt = 0;
        loop {
            match fetcher().await {
                Ok(value) => return Ok(Arc::new(value) as CachedValue),
                Err(e) if e.is_retryable() && attempt < self.settings.retry => {
                    attempt += 1;
                    warn!(key = %key, attempt, error = %e, "Fetch failed, retrying");
                    tokio::time::sleep(self.settings.retry_delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Record a fetch outcome, unless the fetch was superseded or the cache cleared.
    async fn complete(&self, key: &QueryKey, id: u64, generation: u64, result: &ApiResult<CachedValue>) {
        let mut entries = self.entries.write().await;
        let Some(entry) = entries.get_mut(key) else {
            debug!(key = %key, fetch_id = id, "Discarding result for evicted entry");
            return;
        };
        if entry.in_flight.as_ref().map(|f| f.id) != Some(id) {
            debug!(key = %key, fetch_id = id, "Discarding superseded fetch result");
            return;
        }
        entry.in_flight = None;

        match result {
            Ok(value) => {
                entry.value = Some(value.clone());
                entry.updated_at = Some(Instant::now());
                entry.invalidated = entry.generation != generation;
                entry.last_error = None;
            }
            Err(e) => {
                warn!(key = %key, error = %e, "Fetch failed");
                entry.last_error = Some(e.clone());
            }
        }
    }

    /// Peek at a cached value without fetching, whatever its freshness.
    pub async fn get<T: Send + Sync + 'static>(&self, key: &QueryKey) -> Option<Arc<T>> {
        let entries = self.entries.read().await;
        let value = entries.get(key)?.value.clone()?;
        value.downcast::<T>().ok()
    }

    /// Mark every matching entry invalidated. Returns the number of entries hit.
    pub async fn invalidate(&self, filters: &[KeyFilter]) -> usize {
        if filters.is_empty() {
            return 0;
        }
        let mut entries = self.entries.write().await;
        let mut count = 0;
        for (key, entry) in entries.iter_mut() {
            if filters.iter().any(|f| f.matches(key)) {
                entry.invalidated = true;
                entry.generation += 1;
                count += 1;
            }
        }
        debug!(
            filters = %filters.iter().map(|f| f.to_string()).collect::<Vec<_>>().join(","),
            count,
            "Invalidated cache entries"
        );
        count
    }

    /// Apply an invalidation plan.
    pub async fn apply(&self, plan: &InvalidationPlan) -> usize {
        self.invalidate(plan.filters()).await
    }

    /// Drop every entry. Results of fetches still running are discarded.
    pub async fn clear(&self) {
        let mut entries = self.entries.write().await;
        let count = entries.len();
        entries.clear();
        debug!(count, "Cache cleared");
    }

    /// Number of entries.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Report the state of one entry.
    pub async fn snapshot(&self, key: &QueryKey) -> Option<EntrySnapshot> {
        let entries = self.entries.read().await;
        let entry = entries.get(key)?;
        Some(EntrySnapshot {
            key: key.clone(),
            has_value: entry.value.is_some(),
            fresh: entry.is_fresh(self.settings.stale_time),
            invalidated: entry.invalidated,
            fetching: entry.in_flight.is_some(),
            updated_at: entry.updated_at.map(|at| {
                // Convert Instant to DateTime by calculating offset from start
                self.start_datetime + at.duration_since(self.start_instant)
            }),
            last_error: entry.last_error.clone(),
        })
    }

    /// Evict entries not read within `gc_time` and not being fetched.
    pub async fn collect_garbage(&self) -> usize {
        let gc_time = self.settings.gc_time;
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| {
            entry.in_flight.is_some() || entry.last_accessed.elapsed() < gc_time
        });
        let evicted = before - entries.len();
        if evicted > 0 {
            debug!(evicted, "Evicted unused cache entries");
        }
        evicted
    }

    /// Start a background task that periodically evicts unused entries.
    ///
    /// This should be called once at startup.
    pub fn start_gc_task(&self) -> JoinHandle<()> {
        let cache = self.clone();
        let period = self.settings.gc_time.min(GC_INTERVAL).max(Duration::from_millis(10));
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                interval.tick().await;
                cache.collect_garbage().await;
            }
        })
    }
}

impl Default for QueryCache {
    fn default() -> Self {
        Self::new(CacheSettings::default())
    }
}

impl std::fmt::Debug for QueryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryCache")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

fn downcast<T: Send + Sync + 'static>(key: &QueryKey, value: CachedValue) -> ApiResult<Arc<T>> {
    value
        .downcast::<T>()
        .map_err(|_| ApiError::decode(format!("Cached value for '{}' has an unexpected type", key)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn settings() -> CacheSettings {
        CacheSettings {
            retry_delay: Duration::from_millis(1),
            ..CacheSettings::default()
        }
    }

    fn counting(
        calls: &Arc<AtomicUsize>,
        value: u32,
    ) -> impl Fn() -> BoxFuture<'static, ApiResult<u32>> + Send + Sync + 'static {
        let calls = calls.clone();
        move || {
            calls.fetch_add(1, Ordering::SeqCst);
            async move { Ok(value) }.boxed()
        }
    }

    #[tokio::test]
    async fn test_fresh_value_served_from_cache() {
        let cache = QueryCache::new(settings());
        let calls = Arc::new(AtomicUsize::new(0));

        let first = cache
            .fetch(QueryKey::Tables, FetchPolicy::default(), counting(&calls, 1))
            .await
            .unwrap();
        let second = cache
            .fetch(QueryKey::Tables, FetchPolicy::default(), counting(&calls, 2))
            .await
            .unwrap();

        assert_eq!(*first, 1);
        assert_eq!(*second, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_concurrent_reads_share_one_fetch() {
        let cache = QueryCache::new(settings());
        let calls = Arc::new(AtomicUsize::new(0));

        let slow = {
            let calls = calls.clone();
            move || {
                calls.fetch_add(1, Ordering::SeqCst);
                async {
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    Ok::<_, ApiError>(7u32)
                }
                .boxed()
            }
        };
        let slow2 = slow.clone();

        let (a, b) = tokio::join!(
            cache.fetch(QueryKey::DatabaseInfo, FetchPolicy::default(), slow),
            cache.fetch(QueryKey::DatabaseInfo, FetchPolicy::default(), slow2),
        );
        assert_eq!(*a.unwrap(), 7);
        assert_eq!(*b.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_invalidated_entry_is_refetched_on_next_read() {
        let cache = QueryCache::new(settings());
        let calls = Arc::new(AtomicUsize::new(0));

        cache
            .fetch(QueryKey::Tables, FetchPolicy::default(), counting(&calls, 1))
            .await
            .unwrap();
        let hit = cache.invalidate(&[KeyFilter::Exact(QueryKey::Tables)]).await;
        assert_eq!(hit, 1);

        let snapshot = cache.snapshot(&QueryKey::Tables).await.unwrap();
        assert!(snapshot.invalidated);
        assert!(!snapshot.fresh);

        let value = cache
            .fetch(QueryKey::Tables, FetchPolicy::default(), counting(&calls, 2))
            .await
            .unwrap();
        assert_eq!(*value, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_expired_value_served_while_revalidating() {
        let cache = QueryCache::new(CacheSettings {
            stale_time: Duration::ZERO,
            ..settings()
        });
        let calls = Arc::new(AtomicUsize::new(0));

        cache
            .fetch(QueryKey::Tables, FetchPolicy::default(), counting(&calls, 1))
            .await
            .unwrap();
        let stale = cache
            .fetch(QueryKey::Tables, FetchPolicy::default(), counting(&calls, 2))
            .await
            .unwrap();
        assert_eq!(*stale, 1);

        // Let the background refetch land.
        for _ in 0..50 {
            if cache.get::<u32>(&QueryKey::Tables).await.as_deref() == Some(&2) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(cache.get::<u32>(&QueryKey::Tables).await.as_deref(), Some(&2));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_force_fresh_awaits_new_value() {
        let cache = QueryCache::new(CacheSettings {
            stale_time: Duration::ZERO,
            ..settings()
        });
        let calls = Arc::new(AtomicUsize::new(0));

        cache
            .fetch(QueryKey::Tables, FetchPolicy::default(), counting(&calls, 1))
            .await
            .unwrap();
        let fresh = cache
            .fetch(QueryKey::Tables, FetchPolicy::ForceFresh, counting(&calls, 2))
            .await
            .unwrap();
        assert_eq!(*fresh, 2);
    }

    #[tokio::test]
    async fn test_failed_read_keeps_previous_value() {
        let cache = QueryCache::new(settings());
        let calls = Arc::new(AtomicUsize::new(0));

        cache
            .fetch(QueryKey::Tables, FetchPolicy::default(), counting(&calls, 1))
            .await
            .unwrap();

        let failing = || async { Err::<u32, _>(ApiError::envelope("boom")) }.boxed();
        let err = cache
            .fetch(QueryKey::Tables, FetchPolicy::ForceFresh, failing)
            .await
            .unwrap_err();
        assert_eq!(err, ApiError::envelope("boom"));

        assert_eq!(cache.get::<u32>(&QueryKey::Tables).await.as_deref(), Some(&1));
        let snapshot = cache.snapshot(&QueryKey::Tables).await.unwrap();
        assert_eq!(snapshot.last_error, Some(ApiError::envelope("boom")));
    }

    #[tokio::test]
    async fn test_transport_errors_are_retried() {
        let cache = QueryCache::new(settings());
        let calls = Arc::new(AtomicUsize::new(0));

        let flaky = {
            let calls = calls.clone();
            move || {
                let attempt = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if attempt == 0 {
                        Err(ApiError::transport("connection reset"))
                    } else {
                        Ok(5u32)
                    }
                }
                .boxed()
            }
        };
        let value = cache
            .fetch(QueryKey::Tables, FetchPolicy::default(), flaky)
            .await
            .unwrap();
        assert_eq!(*value, 5);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_envelope_errors_are_not_retried() {
        let cache = QueryCache::new(settings());
        let calls = Arc::new(AtomicUsize::new(0));

        let failing = {
            let calls = calls.clone();
            move || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err::<u32, _>(ApiError::envelope("Table not found")) }.boxed()
            }
        };
        assert!(
            cache
                .fetch(QueryKey::columns("ghost"), FetchPolicy::default(), failing)
                .await
                .is_err()
        );
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_result_of_fetch_started_before_invalidation_stays_stale() {
        let cache = QueryCache::new(settings());
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let rx = Arc::new(tokio::sync::Mutex::new(Some(rx)));

        let gated = move || {
            let rx = rx.clone();
            async move {
                if let Some(rx) = rx.lock().await.take() {
                    let _ = rx.await;
                }
                Ok::<_, ApiError>(1u32)
            }
            .boxed()
        };

        let reader = {
            let cache = cache.clone();
            tokio::spawn(async move {
                cache
                    .fetch(QueryKey::Tables, FetchPolicy::default(), gated)
                    .await
            })
        };
        // Wait for the fetch to be registered.
        for _ in 0..50 {
            if cache.snapshot(&QueryKey::Tables).await.is_some_and(|s| s.fetching) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(2)).await;
        }

        cache.invalidate(&[KeyFilter::All]).await;
        tx.send(()).unwrap();
        assert_eq!(*reader.await.unwrap().unwrap(), 1);

        let snapshot = cache.snapshot(&QueryKey::Tables).await.unwrap();
        assert!(snapshot.has_value);
        assert!(snapshot.invalidated);
    }

    #[tokio::test]
    async fn test_clear_and_garbage_collection() {
        let cache = QueryCache::new(CacheSettings {
            gc_time: Duration::ZERO,
            ..settings()
        });
        let calls = Arc::new(AtomicUsize::new(0));
        cache
            .fetch(QueryKey::Tables, FetchPolicy::default(), counting(&calls, 1))
            .await
            .unwrap();
        cache
            .fetch(QueryKey::columns("users"), FetchPolicy::default(), counting(&calls, 1))
            .await
            .unwrap();
        assert_eq!(cache.len().await, 2);

        assert_eq!(cache.collect_garbage().await, 2);
        assert!(cache.is_empty().await);

        cache
            .fetch(QueryKey::Tables, FetchPolicy::default(), counting(&calls, 1))
            .await
            .unwrap();
        cache.clear().await;
        assert!(cache.snapshot(&QueryKey::Tables).await.is_none());
    }

    #[tokio::test]
    async fn test_invalidate_counts_only_matching_entries() {
        let cache = QueryCache::new(settings());
        let calls = Arc::new(AtomicUsize::new(0));
        for key in [
            QueryKey::Tables,
            QueryKey::columns("users"),
            QueryKey::rows("users", Default::default()),
        ] {
            cache
                .fetch(key, FetchPolicy::default(), counting(&calls, 1))
                .await
                .unwrap();
        }

        let plan = InvalidationPlan::row_change("users");
        assert_eq!(cache.apply(&plan).await, 1);
        assert!(cache.snapshot(&QueryKey::columns("users")).await.unwrap().fresh);
    }
}
