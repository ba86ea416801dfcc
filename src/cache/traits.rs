//! Core types for the caching system.

use std::sync::Arc;

/// Result from a cache read, including data and metadata about the source.
#[derive(Debug)]
pub struct CacheResult<T> {
  /// The actual data, shared with the cache entry
  pub data: Arc<T>,
  /// Where the data came from
  pub source: CacheSource,
  /// Entry version the data belongs to; bumps on every stored fetch
  pub version: u64,
}

impl<T> CacheResult<T> {
  pub fn from_network(data: Arc<T>, version: u64) -> Self {
    Self {
      data,
      source: CacheSource::Network,
      version,
    }
  }

  pub fn from_cache(data: Arc<T>, version: u64, is_stale: bool) -> Self {
    Self {
      data,
      source: if is_stale {
        CacheSource::CacheStale
      } else {
        CacheSource::CacheFresh
      },
      version,
    }
  }
}

impl<T> Clone for CacheResult<T> {
  fn clone(&self) -> Self {
    Self {
      data: Arc::clone(&self.data),
      source: self.source,
      version: self.version,
    }
  }
}

/// Indicates where cached data came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheSource {
  /// Awaited a network fetch (possibly one started by another reader)
  Network,
  /// Data from cache, still considered fresh
  CacheFresh,
  /// Data from cache past its stale time; a background refetch is running
  CacheStale,
}

impl CacheSource {
  pub fn is_cached(&self) -> bool {
    !matches!(self, CacheSource::Network)
  }
}
