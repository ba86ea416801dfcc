//! Keyed query cache that coalesces reads and refetches on invalidation.

use futures::future::{BoxFuture, FutureExt, Shared};
use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::key::{KeyFilter, QueryKey};
use super::traits::{CacheResult, CacheSource};
use crate::error::ApiError;

type AnyData = Arc<dyn Any + Send + Sync>;
type FetchResult = Result<AnyData, ApiError>;
type Fetcher = Arc<dyn Fn() -> BoxFuture<'static, FetchResult> + Send + Sync>;
type SharedFetch = Shared<BoxFuture<'static, FetchResult>>;

struct Cached {
  value: AnyData,
  fetched_at: Instant,
}

struct InFlight {
  /// Request identity; only the current request may write its result
  id: u64,
  result: SharedFetch,
}

struct Entry {
  data: Option<Cached>,
  invalidated: bool,
  in_flight: Option<InFlight>,
  fetcher: Option<Fetcher>,
  observers: usize,
  last_used: Instant,
  version: u64,
  error: Option<ApiError>,
}

impl Entry {
  fn new() -> Self {
    Self {
      data: None,
      invalidated: false,
      in_flight: None,
      fetcher: None,
      observers: 0,
      last_used: Instant::now(),
      version: 0,
      error: None,
    }
  }
}

struct Inner {
  entries: Mutex<HashMap<QueryKey, Entry>>,
  next_request: AtomicU64,
  /// How long before cached data is considered stale
  stale_time: Duration,
  /// How long an unobserved entry is retained
  gc_time: Duration,
}

impl Inner {
  fn entries(&self) -> MutexGuard<'_, HashMap<QueryKey, Entry>> {
    // The map stays consistent across a panicking holder; every write is a single field update.
    self.entries.lock().unwrap_or_else(PoisonError::into_inner)
  }

  /// Store a finished fetch if it is still the entry's current request.
  fn complete(&self, key: &QueryKey, id: u64, result: &FetchResult) {
    let mut entries = self.entries();
    let Some(entry) = entries.get_mut(key) else {
      debug!("Discarding response for evicted {}", key);
      return;
    };
    if entry.in_flight.as_ref().map(|f| f.id) != Some(id) {
      debug!("Discarding superseded response for {}", key);
      return;
    }

    entry.in_flight = None;
    match result {
      Ok(value) => {
        entry.data = Some(Cached {
          value: Arc::clone(value),
          fetched_at: Instant::now(),
        });
        entry.invalidated = false;
        entry.error = None;
        entry.version += 1;
      }
      Err(e) => {
        warn!("Fetching {} failed: {}", key, e);
        entry.error = Some(e.clone());
      }
    }
  }
}

/// Start a fetch for `key`, superseding any fetch already in flight.
///
/// The request runs as its own task so it completes even if every reader
/// goes away; readers share its outcome.
fn start_fetch(inner: &Arc<Inner>, key: &QueryKey, entry: &mut Entry) -> Option<SharedFetch> {
  let fetcher = entry.fetcher.clone()?;
  let id = inner.next_request.fetch_add(1, Ordering::Relaxed);
  let task_inner = Arc::clone(inner);
  let task_key = key.clone();
  debug!("Fetching {} (request {})", key, id);

  let task = tokio::spawn(async move {
    let result = fetcher().await;
    task_inner.complete(&task_key, id, &result);
    result
  });

  let result = async move {
    match task.await {
      Ok(result) => result,
      Err(e) => {
        warn!("Fetch task failed: {}", e);
        Err(ApiError::transport())
      }
    }
  }
  .boxed()
  .shared();

  entry.in_flight = Some(InFlight {
    id,
    result: result.clone(),
  });
  Some(result)
}

fn downcast<T: Send + Sync + 'static>(key: &QueryKey, value: AnyData) -> Result<Arc<T>, ApiError> {
  value.downcast::<T>().map_err(|_| {
    warn!("Cached value for {} has an unexpected type", key);
    ApiError::decode()
  })
}

/// Cache layer that manages caching logic and network fetching.
///
/// One entry per structurally distinct [`QueryKey`]. Concurrent reads of a
/// key share a single request. Mutations invalidate by [`KeyFilter`]; there
/// is no partial patching of cached values.
#[derive(Clone)]
pub struct CacheLayer {
  inner: Arc<Inner>,
}

impl CacheLayer {
  pub fn new(stale_time: Duration, gc_time: Duration) -> Self {
    Self {
      inner: Arc::new(Inner {
        entries: Mutex::new(HashMap::new()),
        next_request: AtomicU64::new(1),
        stale_time,
        gc_time,
      }),
    }
  }

  /// Read `key`, fetching through `fetcher` when needed.
  ///
  /// - fresh entry: returned immediately
  /// - stale by age: returned immediately, refetched in the background
  /// - missing or invalidated: waits for the (shared) network fetch
  ///
  /// The fetcher is remembered so invalidation can refetch observed keys.
  pub async fn fetch<T, F, Fut>(&self, key: QueryKey, fetcher: F) -> Result<CacheResult<T>, ApiError>
  where
    T: Send + Sync + 'static,
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, ApiError>> + Send + 'static,
  {
    let fetcher: Fetcher = Arc::new(move || {
      let fut = fetcher();
      async move { fut.await.map(|value| Arc::new(value) as AnyData) }.boxed()
    });

    let pending = {
      let mut entries = self.inner.entries();
      let entry = entries.entry(key.clone()).or_insert_with(Entry::new);
      entry.fetcher = Some(fetcher);
      entry.last_used = Instant::now();

      let cached = match &entry.data {
        Some(cached) if !entry.invalidated => Some((
          Arc::clone(&cached.value),
          cached.fetched_at.elapsed() >= self.inner.stale_time,
        )),
        _ => None,
      };

      if let Some((value, is_stale)) = cached {
        let version = entry.version;
        if is_stale && entry.in_flight.is_none() {
          start_fetch(&self.inner, &key, entry);
        }
        return Ok(CacheResult::from_cache(
          downcast(&key, value)?,
          version,
          is_stale,
        ));
      }

      match &entry.in_flight {
        Some(in_flight) => in_flight.result.clone(),
        None => start_fetch(&self.inner, &key, entry).ok_or_else(ApiError::transport)?,
      }
    };

    let value = pending.await?;
    let version = self
      .inner
      .entries()
      .get(&key)
      .map(|entry| entry.version)
      .unwrap_or_default();
    Ok(CacheResult::from_network(downcast(&key, value)?, version))
  }

  /// Cached data for `key` without fetching.
  pub fn peek<T: Send + Sync + 'static>(&self, key: &QueryKey) -> Option<CacheResult<T>> {
    let entries = self.inner.entries();
    let entry = entries.get(key)?;
    let cached = entry.data.as_ref()?;
    let is_stale = entry.invalidated || cached.fetched_at.elapsed() >= self.inner.stale_time;
    let data = downcast(key, Arc::clone(&cached.value)).ok()?;
    Some(CacheResult::from_cache(data, entry.version, is_stale))
  }

  /// Last fetch error recorded for `key`, cleared by the next success.
  pub fn last_error(&self, key: &QueryKey) -> Option<ApiError> {
    self.inner.entries().get(key)?.error.clone()
  }

  /// Mark matching entries invalidated.
  ///
  /// Observed entries refetch right away; unobserved ones are evicted so the
  /// next read goes to the network.
  pub fn invalidate(&self, filters: &[KeyFilter]) {
    let mut entries = self.inner.entries();
    let keys: Vec<QueryKey> = entries
      .keys()
      .filter(|key| filters.iter().any(|f| f.matches(key)))
      .cloned()
      .collect();

    let mut refetched = 0;
    let mut evicted = 0;
    for key in keys {
      let Some(entry) = entries.get_mut(&key) else {
        continue;
      };
      if entry.observers == 0 {
        entries.remove(&key);
        evicted += 1;
        continue;
      }
      entry.invalidated = true;
      if start_fetch(&self.inner, &key, entry).is_some() {
        refetched += 1;
      }
    }

    info!(
      "Invalidated {:?}: {} refetching, {} evicted",
      filters, refetched, evicted
    );
  }

  /// Run a mutation; invalidate `filters` only once the server confirms it.
  ///
  /// A failed mutation leaves every cache entry untouched.
  pub async fn mutate<T, Fut>(&self, mutation: Fut, filters: &[KeyFilter]) -> Result<T, ApiError>
  where
    Fut: Future<Output = Result<T, ApiError>>,
  {
    let result = mutation.await;
    match &result {
      Ok(_) => self.invalidate(filters),
      Err(e) => warn!("Mutation failed, cache unchanged: {}", e),
    }
    result
  }

  /// Register an observer of `key` for as long as the guard lives.
  pub fn observe(&self, key: QueryKey) -> ObserverGuard {
    {
      let mut entries = self.inner.entries();
      let entry = entries.entry(key.clone()).or_insert_with(Entry::new);
      entry.observers += 1;
      entry.last_used = Instant::now();
    }
    ObserverGuard {
      inner: Arc::downgrade(&self.inner),
      key,
    }
  }

  /// Evict unobserved, idle entries older than the retention time.
  pub fn collect_garbage(&self) -> usize {
    let gc_time = self.inner.gc_time;
    let mut entries = self.inner.entries();
    let before = entries.len();
    entries.retain(|_, entry| {
      entry.observers > 0 || entry.in_flight.is_some() || entry.last_used.elapsed() < gc_time
    });
    let evicted = before - entries.len();
    if evicted > 0 {
      debug!("Garbage collected {} cache entries", evicted);
    }
    evicted
  }

  /// Periodically collect garbage until the cache is dropped.
  pub fn spawn_gc(&self, every: Duration) -> JoinHandle<()> {
    let inner = Arc::downgrade(&self.inner);
    tokio::spawn(async move {
      let mut interval = tokio::time::interval(every);
      interval.tick().await;
      loop {
        interval.tick().await;
        let Some(inner) = inner.upgrade() else {
          break;
        };
        CacheLayer { inner }.collect_garbage();
      }
    })
  }

  pub fn contains(&self, key: &QueryKey) -> bool {
    self.inner.entries().contains_key(key)
  }

  pub fn len(&self) -> usize {
    self.inner.entries().len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}

/// Keeps a key observed; dropping it releases the observation.
pub struct ObserverGuard {
  inner: Weak<Inner>,
  key: QueryKey,
}

impl ObserverGuard {
  pub fn key(&self) -> &QueryKey {
    &self.key
  }
}

impl Drop for ObserverGuard {
  fn drop(&mut self) {
    let Some(inner) = self.inner.upgrade() else {
      return;
    };
    let mut entries = inner.entries();
    if let Some(entry) = entries.get_mut(&self.key) {
      entry.observers = entry.observers.saturating_sub(1);
      entry.last_used = Instant::now();
    }
  }
}

impl std::fmt::Debug for ObserverGuard {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("ObserverGuard").field("key", &self.key).finish()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::api::params::InventoryQuery;
  use crate::cache::key::QueryCategory;
  use std::sync::atomic::AtomicU32;

  fn layer() -> CacheLayer {
    CacheLayer::new(Duration::from_secs(60), Duration::from_secs(300))
  }

  fn counting_fetcher(
    counter: Arc<AtomicU32>,
    delay: Duration,
  ) -> impl Fn() -> BoxFuture<'static, Result<u32, ApiError>> + Send + Sync + 'static {
    move || {
      let counter = Arc::clone(&counter);
      async move {
        tokio::time::sleep(delay).await;
        Ok(counter.fetch_add(1, Ordering::SeqCst) + 1)
      }
      .boxed()
    }
  }

  fn page_key(page: u32) -> QueryKey {
    QueryKey::Inventory(InventoryQuery {
      page,
      page_size: 10,
      ..Default::default()
    })
  }

  #[tokio::test]
  async fn test_concurrent_reads_share_one_request() {
    let cache = layer();
    let counter = Arc::new(AtomicU32::new(0));

    let (a, b) = tokio::join!(
      cache.fetch(
        page_key(1),
        counting_fetcher(counter.clone(), Duration::from_millis(30))
      ),
      cache.fetch(
        page_key(1),
        counting_fetcher(counter.clone(), Duration::from_millis(30))
      ),
    );

    let (a, b) = (a.unwrap(), b.unwrap());
    assert_eq!(counter.load(Ordering::SeqCst), 1);
    assert!(Arc::ptr_eq(&a.data, &b.data));
    assert_eq!(*a.data, 1);
  }

  #[tokio::test]
  async fn test_distinct_keys_fetch_separately() {
    let cache = layer();
    let counter = Arc::new(AtomicU32::new(0));

    cache
      .fetch(page_key(1), counting_fetcher(counter.clone(), Duration::ZERO))
      .await
      .unwrap();
    cache
      .fetch(page_key(2), counting_fetcher(counter.clone(), Duration::ZERO))
      .await
      .unwrap();
    assert_eq!(counter.load(Ordering::SeqCst), 2);
    assert_eq!(cache.len(), 2);
  }

  #[tokio::test]
  async fn test_fresh_entry_served_from_cache() {
    let cache = layer();
    let counter = Arc::new(AtomicU32::new(0));

    let first = cache
      .fetch(QueryKey::Labels, counting_fetcher(counter.clone(), Duration::ZERO))
      .await
      .unwrap();
    assert_eq!(first.source, CacheSource::Network);

    let second = cache
      .fetch(QueryKey::Labels, counting_fetcher(counter.clone(), Duration::ZERO))
      .await
      .unwrap();
    assert_eq!(second.source, CacheSource::CacheFresh);
    assert_eq!(*second.data, 1);
    assert_eq!(counter.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn test_stale_while_revalidate() {
    let cache = CacheLayer::new(Duration::ZERO, Duration::from_secs(300));
    let counter = Arc::new(AtomicU32::new(0));

    cache
      .fetch(QueryKey::Labels, counting_fetcher(counter.clone(), Duration::ZERO))
      .await
      .unwrap();

    let stale = cache
      .fetch(QueryKey::Labels, counting_fetcher(counter.clone(), Duration::ZERO))
      .await
      .unwrap();
    assert_eq!(stale.source, CacheSource::CacheStale);
    assert_eq!(*stale.data, 1);

    // Background refetch lands in the cache
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(counter.load(Ordering::SeqCst), 2);
    assert_eq!(*cache.peek::<u32>(&QueryKey::Labels).unwrap().data, 2);
  }

  #[tokio::test]
  async fn test_invalidation_forces_refetch() {
    let cache = layer();
    let counter = Arc::new(AtomicU32::new(0));

    cache
      .fetch(page_key(1), counting_fetcher(counter.clone(), Duration::ZERO))
      .await
      .unwrap();

    cache
      .mutate(
        async { Ok::<_, ApiError>(()) },
        &[KeyFilter::Category(QueryCategory::Inventory)],
      )
      .await
      .unwrap();

    let after = cache
      .fetch(page_key(1), counting_fetcher(counter.clone(), Duration::ZERO))
      .await
      .unwrap();
    assert_eq!(after.source, CacheSource::Network);
    assert_eq!(*after.data, 2);
  }

  #[tokio::test]
  async fn test_observed_entry_refetches_and_reader_waits() {
    let cache = layer();
    let counter = Arc::new(AtomicU32::new(0));
    let _guard = cache.observe(QueryKey::Location("l1".into()));

    cache
      .fetch(
        QueryKey::Location("l1".into()),
        counting_fetcher(counter.clone(), Duration::from_millis(20)),
      )
      .await
      .unwrap();

    cache.invalidate(&[KeyFilter::Exact(QueryKey::Location("l1".into()))]);
    assert!(cache.contains(&QueryKey::Location("l1".into())));

    // The read after invalidation joins the refetch instead of serving the old value
    let after = cache
      .fetch(
        QueryKey::Location("l1".into()),
        counting_fetcher(counter.clone(), Duration::from_millis(20)),
      )
      .await
      .unwrap();
    assert_eq!(*after.data, 2);
    assert_eq!(counter.load(Ordering::SeqCst), 2);
  }

  #[tokio::test]
  async fn test_unobserved_entry_evicted_on_invalidation() {
    let cache = layer();
    let counter = Arc::new(AtomicU32::new(0));

    cache
      .fetch(QueryKey::Labels, counting_fetcher(counter.clone(), Duration::ZERO))
      .await
      .unwrap();
    cache
      .fetch(page_key(1), counting_fetcher(counter.clone(), Duration::ZERO))
      .await
      .unwrap();

    cache.invalidate(&[KeyFilter::Category(QueryCategory::Labels)]);
    assert!(!cache.contains(&QueryKey::Labels));
    assert!(cache.contains(&page_key(1)));
  }

  #[tokio::test]
  async fn test_failed_mutation_leaves_cache_untouched() {
    let cache = layer();
    let counter = Arc::new(AtomicU32::new(0));

    let before = cache
      .fetch(page_key(1), counting_fetcher(counter.clone(), Duration::ZERO))
      .await
      .unwrap();

    let err = cache
      .mutate(
        async {
          Err::<(), _>(ApiError::from_response(
            reqwest::StatusCode::BAD_REQUEST,
            Some("quantity must be >= 0".into()),
          ))
        },
        &[KeyFilter::Category(QueryCategory::Inventory)],
      )
      .await
      .unwrap_err();
    assert_eq!(err.to_string(), "quantity must be >= 0");

    let after = cache.peek::<u32>(&page_key(1)).unwrap();
    assert!(Arc::ptr_eq(&before.data, &after.data));
    assert_eq!(after.version, before.version);
    assert_eq!(counter.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn test_superseded_response_discarded() {
    let cache = layer();
    let key = QueryKey::Item("i1".into());
    let _guard = cache.observe(key.clone());
    let calls = Arc::new(AtomicU32::new(0));

    // First request is slow; the refetch started by invalidation is fast
    let fetcher = move || {
      let calls = Arc::clone(&calls);
      async move {
        if calls.fetch_add(1, Ordering::SeqCst) == 0 {
          tokio::time::sleep(Duration::from_millis(60)).await;
          Ok::<_, ApiError>("old".to_string())
        } else {
          Ok("new".to_string())
        }
      }
    };

    let slow = {
      let cache = cache.clone();
      let key = key.clone();
      tokio::spawn(async move { cache.fetch(key, fetcher).await })
    };
    tokio::time::sleep(Duration::from_millis(10)).await;

    cache.invalidate(&[KeyFilter::Exact(key.clone())]);
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(cache.peek::<String>(&key).unwrap().data.as_str(), "new");

    // The slow response arrives late and must not overwrite the entry
    slow.await.unwrap().unwrap();
    assert_eq!(cache.peek::<String>(&key).unwrap().data.as_str(), "new");
    assert_eq!(cache.peek::<String>(&key).unwrap().version, 1);
  }

  #[tokio::test]
  async fn test_fetch_error_recorded_and_retry_succeeds() {
    let cache = layer();
    let attempts = Arc::new(AtomicU32::new(0));

    let fetcher = {
      let attempts = attempts.clone();
      move || {
        let attempts = attempts.clone();
        async move {
          if attempts.fetch_add(1, Ordering::SeqCst) == 0 {
            Err(ApiError::transport())
          } else {
            Ok(7u32)
          }
        }
      }
    };

    let err = cache.fetch(QueryKey::Labels, fetcher.clone()).await.unwrap_err();
    assert_eq!(err, ApiError::transport());
    assert_eq!(cache.last_error(&QueryKey::Labels), Some(ApiError::transport()));

    let retried = cache.fetch(QueryKey::Labels, fetcher).await.unwrap();
    assert_eq!(*retried.data, 7);
    assert_eq!(cache.last_error(&QueryKey::Labels), None);
  }

  #[tokio::test]
  async fn test_garbage_collection_skips_observed() {
    let cache = CacheLayer::new(Duration::from_secs(60), Duration::ZERO);
    let counter = Arc::new(AtomicU32::new(0));

    cache
      .fetch(QueryKey::Labels, counting_fetcher(counter.clone(), Duration::ZERO))
      .await
      .unwrap();
    let guard = cache.observe(page_key(1));

    assert_eq!(cache.collect_garbage(), 1);
    assert!(cache.contains(&page_key(1)));

    drop(guard);
    assert_eq!(cache.collect_garbage(), 1);
    assert!(cache.is_empty());
  }

  #[tokio::test]
  async fn test_type_mismatch_is_error() {
    let cache = layer();
    cache
      .fetch(QueryKey::Labels, || async { Ok::<_, ApiError>(1u32) })
      .await
      .unwrap();
    assert!(cache.peek::<String>(&QueryKey::Labels).is_none());
  }
}
