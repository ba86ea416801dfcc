//! Observed query over the shared cache.
//!
//! A `Query<P, T>` is what a view holds for one piece of server state. It
//! registers as an observer of its key (so invalidation refetches instead of
//! evicting), reads through the [`CacheLayer`] and reports results through a
//! channel that the owner drains with `poll()`.
//!
//! # Example
//!
//! ```ignore
//! let api = inventory_api.clone();
//! let session = session.clone();
//! let mut query = Query::new(cache.clone(), first_page, QueryKey::Inventory, move |q| {
//!   let api = api.clone();
//!   let session = session.clone();
//!   async move { api.get_inventory(&session, &q).await }
//! });
//!
//! query.fetch();
//!
//! // In the loop
//! if query.poll() {
//!   render(query.data());
//! }
//! ```

use futures::future::{BoxFuture, FutureExt};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::cache::{CacheLayer, CacheResult, KeyFilter, ObserverGuard, QueryKey};
use crate::error::ApiError;

/// The state of a query
#[derive(Debug, Clone)]
pub enum QueryState<T> {
  /// Query has not been started
  Idle,
  /// Query is currently fetching data
  Loading,
  /// Query completed successfully
  Success(Arc<T>),
  /// Query failed; the message is user-facing
  Error(ApiError),
}

impl<T> QueryState<T> {
  pub fn is_loading(&self) -> bool {
    matches!(self, QueryState::Loading)
  }

  pub fn is_success(&self) -> bool {
    matches!(self, QueryState::Success(_))
  }

  pub fn is_error(&self) -> bool {
    matches!(self, QueryState::Error(_))
  }

  pub fn error(&self) -> Option<&ApiError> {
    match self {
      QueryState::Error(e) => Some(e),
      _ => None,
    }
  }
}

type FetcherFn<P, T> = Arc<dyn Fn(P) -> BoxFuture<'static, Result<T, ApiError>> + Send + Sync>;

pub struct Query<P, T> {
  cache: CacheLayer,
  params: P,
  key_fn: fn(P) -> QueryKey,
  fetcher: FetcherFn<P, T>,
  guard: ObserverGuard,
  state: QueryState<T>,
  /// Data from the previous params, shown while the new params load
  previous: Option<Arc<T>>,
  version: Option<u64>,
  receiver: Option<mpsc::UnboundedReceiver<Result<CacheResult<T>, ApiError>>>,
}

impl<P, T> Query<P, T>
where
  P: Clone + PartialEq + Send + Sync + 'static,
  T: Send + Sync + 'static,
{
  /// Create a query for `params`; `key_fn` maps params onto the cache key.
  ///
  /// The fetcher performs the network call. It only runs when the cache
  /// cannot serve the key.
  pub fn new<F, Fut>(cache: CacheLayer, params: P, key_fn: fn(P) -> QueryKey, fetcher: F) -> Self
  where
    F: Fn(P) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, ApiError>> + Send + 'static,
  {
    let guard = cache.observe(key_fn(params.clone()));
    Self {
      cache,
      params,
      key_fn,
      fetcher: Arc::new(move |p: P| fetcher(p).boxed()),
      guard,
      state: QueryState::Idle,
      previous: None,
      version: None,
      receiver: None,
    }
  }

  pub fn key(&self) -> &QueryKey {
    self.guard.key()
  }

  pub fn params(&self) -> &P {
    &self.params
  }

  pub fn state(&self) -> &QueryState<T> {
    &self.state
  }

  /// Current data, or the previous params' data while the new ones load.
  pub fn data(&self) -> Option<&T> {
    match &self.state {
      QueryState::Success(data) => Some(data.as_ref()),
      _ => self.previous.as_deref(),
    }
  }

  /// True when `data()` belongs to the previous params.
  pub fn is_placeholder(&self) -> bool {
    !self.state.is_success() && self.previous.is_some()
  }

  pub fn is_loading(&self) -> bool {
    self.state.is_loading()
  }

  pub fn is_error(&self) -> bool {
    self.state.is_error()
  }

  pub fn error(&self) -> Option<&ApiError> {
    self.state.error()
  }

  /// Start fetching if not already loading.
  pub fn fetch(&mut self) {
    if self.state.is_loading() {
      return;
    }
    self.start_fetch();
  }

  /// Manual retry: bypass the cache for this key and fetch again.
  ///
  /// Any pending result from an earlier fetch is dropped.
  pub fn refetch(&mut self) {
    self.receiver = None;
    self.cache.invalidate(&[KeyFilter::Exact(self.key().clone())]);
    self.start_fetch();
  }

  /// Switch to new params, keeping the old data visible until the new
  /// result arrives. Same params are a no-op.
  pub fn set_params(&mut self, params: P) {
    if params == self.params {
      return;
    }

    if let QueryState::Success(data) = &self.state {
      self.previous = Some(Arc::clone(data));
    }
    self.guard = self.cache.observe((self.key_fn)(params.clone()));
    self.params = params;
    self.version = None;
    self.receiver = None;
    self.start_fetch();
  }

  /// Drain a pending result or pick up a refetch made by someone else,
  /// such as an invalidation after a mutation. That also clears an error.
  ///
  /// Returns `true` if the state changed.
  pub fn poll(&mut self) -> bool {
    if let Some(receiver) = &mut self.receiver {
      return match receiver.try_recv() {
        Ok(Ok(result)) => {
          self.receiver = None;
          self.apply(result);
          true
        }
        Ok(Err(error)) => {
          self.fail(error);
          true
        }
        Err(mpsc::error::TryRecvError::Empty) => false,
        Err(mpsc::error::TryRecvError::Disconnected) => {
          self.fail(ApiError::transport());
          true
        }
      };
    }

    // Loading and idle queries wait for their own fetch
    if !(self.state.is_success() || self.state.is_error()) {
      return false;
    }
    match self.cache.peek::<T>(self.key()) {
      Some(cached) if self.version.map_or(true, |v| cached.version > v) => {
        self.apply(cached);
        true
      }
      _ => false,
    }
  }

  /// Enter the error state. Only data written after this point clears it.
  fn fail(&mut self, error: ApiError) {
    self.receiver = None;
    if let Some(cached) = self.cache.peek::<T>(self.key()) {
      self.version = Some(cached.version);
    }
    self.state = QueryState::Error(error);
  }

  fn apply(&mut self, result: CacheResult<T>) {
    self.version = Some(result.version);
    self.state = QueryState::Success(result.data);
    self.previous = None;
  }

  fn start_fetch(&mut self) {
    let (tx, rx) = mpsc::unbounded_channel();
    self.receiver = Some(rx);
    self.state = QueryState::Loading;

    let cache = self.cache.clone();
    let key = self.key().clone();
    let params = self.params.clone();
    let fetcher = Arc::clone(&self.fetcher);
    tokio::spawn(async move {
      let result = cache.fetch(key, move || fetcher(params.clone())).await;
      // Receiver may have been dropped by a refetch or new params
      let _ = tx.send(result);
    });
  }
}

impl<P: std::fmt::Debug, T: std::fmt::Debug> std::fmt::Debug for Query<P, T> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Query")
      .field("params", &self.params)
      .field("state", &self.state)
      .field("version", &self.version)
      .finish_non_exhaustive()
  }
}
