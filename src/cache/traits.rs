//! Core traits and types for the caching system.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Trait for cache query keys.
///
/// A query key identifies one paginated/sorted/searched request. Two queries
/// with the same hash are the same cache entry.
pub trait QueryKey {
  /// Stable, fixed-length key for storage lookups.
  fn cache_hash(&self) -> String;

  /// Human-readable description for logging.
  fn description(&self) -> String;
}

/// One page of entries plus the collection-wide total for that query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
  pub entries: Vec<T>,
  pub total: u64,
}

/// Result from a cache operation, including data and metadata about the source.
#[derive(Debug, Clone)]
pub struct CacheResult<T> {
  /// The actual data
  pub data: T,
  /// Where the data came from
  pub source: CacheSource,
  /// When the data was cached (if from cache)
  pub cached_at: Option<DateTime<Utc>>,
}

impl<T> CacheResult<T> {
  /// Create a new cache result from fresh network data.
  pub fn from_network(data: T) -> Self {
    Self {
      data,
      source: CacheSource::Network,
      cached_at: None,
    }
  }

  /// Create a new cache result from a fresh cache entry.
  pub fn from_cache(data: T, cached_at: DateTime<Utc>) -> Self {
    Self {
      data,
      source: CacheSource::CacheFresh,
      cached_at: Some(cached_at),
    }
  }

  /// Create a new cache result for offline mode (exact cached query match).
  pub fn offline(data: T, cached_at: DateTime<Utc>) -> Self {
    Self {
      data,
      source: CacheSource::Offline,
      cached_at: Some(cached_at),
    }
  }

  /// Create a new cache result for offline mode, filtered from the full mirror.
  pub fn offline_mirror(data: T, cached_at: DateTime<Utc>) -> Self {
    Self {
      data,
      source: CacheSource::OfflineMirror,
      cached_at: Some(cached_at),
    }
  }

  /// Create a new cache result for a failed remote fetch recovered from cache.
  pub fn network_failed(data: T, cached_at: DateTime<Utc>) -> Self {
    Self {
      data,
      source: CacheSource::NetworkFailed,
      cached_at: Some(cached_at),
    }
  }

  /// Whether this result was served from local data instead of a live fetch.
  pub fn is_degraded(&self) -> bool {
    matches!(
      self.source,
      CacheSource::Offline | CacheSource::OfflineMirror | CacheSource::NetworkFailed
    )
  }

  /// Advisory message to show alongside a degraded result.
  pub fn notice(&self) -> Option<&'static str> {
    match self.source {
      CacheSource::Network | CacheSource::CacheFresh => None,
      CacheSource::Offline | CacheSource::OfflineMirror => {
        Some("offline, showing cached results")
      }
      CacheSource::NetworkFailed => Some("network unavailable, showing cached results"),
    }
  }
}

/// Indicates where cached data came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheSource {
  /// Fresh data from network
  Network,
  /// Data from cache, still considered fresh
  CacheFresh,
  /// Offline mode - exact cached entry for this query, freshness ignored
  Offline,
  /// Offline mode - query evaluated locally against the full mirror
  OfflineMirror,
  /// Remote fetch failed, serving whatever cached entry exists
  NetworkFailed,
}
