//! Cache layer that orchestrates caching logic with network fetching.

use chrono::{DateTime, Duration, Utc};
use color_eyre::Result;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

use super::storage::{KvStore, StorageError};
use super::traits::{CacheResult, Page, QueryKey};

/// Storage key for the query-result map (one serialized blob).
const QUERY_CACHE_KEY: &str = "query_cache";
/// Storage key for the full-collection mirror.
const MIRROR_CACHE_KEY: &str = "full_mirror";

/// Terminal cache-layer failures. Anything else degrades to cached data.
#[derive(Debug, Error)]
pub enum CacheError {
  #[error("offline and no cached data is available")]
  OfflineNoData,
}

/// A cached query result with its timestamp.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredEntry<T> {
  entries: Vec<T>,
  total: u64,
  cached_at: DateTime<Utc>,
}

impl<T: Clone> StoredEntry<T> {
  fn page(&self) -> Page<T> {
    Page {
      entries: self.entries.clone(),
      total: self.total,
    }
  }
}

/// The full-collection snapshot used for offline filtering.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredMirror<T> {
  entries: Vec<T>,
  fetched_at: DateTime<Utc>,
}

type StoredMap<T> = HashMap<String, StoredEntry<T>>;

/// Cache layer that manages caching logic, offline fallback, and network
/// fetching for one entry type.
///
/// This layer sits between the application and the network client. Queries are
/// resolved in a fixed precedence order:
///
/// 1. offline: exact cached entry (any age), else the full mirror filtered
///    locally, else fail
/// 2. online: fresh exact cached entry, no network call
/// 3. online: remote fetch, cache the result, opportunistically refresh the
///    mirror
/// 4. fetch failure: fall back to any cached entry for the query
///
/// Concurrent resolves for the same key may both fetch; the store is a
/// whole-blob replace, so the last writer wins. In-flight requests are not
/// deduplicated.
pub struct CacheLayer<T, S: KvStore> {
  storage: Arc<S>,
  /// How long before cached data is considered stale
  cache_duration: Duration,
  _entry: PhantomData<fn() -> T>,
}

impl<T, S> CacheLayer<T, S>
where
  T: Clone + Serialize + DeserializeOwned,
  S: KvStore,
{
  /// Create a new cache layer with the given storage backend.
  pub fn new(storage: S) -> Self {
    Self {
      storage: Arc::new(storage),
      cache_duration: Duration::days(7),
      _entry: PhantomData,
    }
  }

  /// Set the freshness window for cached data.
  #[allow(dead_code)]
  pub fn with_cache_duration(mut self, cache_duration: Duration) -> Self {
    self.cache_duration = cache_duration;
    self
  }

  /// Check if cached data is fresh based on its timestamp.
  fn is_fresh(&self, cached_at: DateTime<Utc>) -> bool {
    Utc::now() - cached_at < self.cache_duration
  }

  /// Resolve a query against the cache, the network, or the offline mirror.
  ///
  /// `fetch` issues the equivalent remote query; `fetch_all` retrieves the
  /// unpaged collection for the mirror; `offline_query` evaluates the query
  /// (filter + sort + slice) against mirror entries in-process.
  pub async fn resolve<K, F, Fut, G, GFut, Q>(
    &self,
    key: &K,
    online: bool,
    fetch: F,
    fetch_all: G,
    offline_query: Q,
  ) -> Result<CacheResult<Page<T>>>
  where
    K: QueryKey,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<Page<T>>>,
    G: FnOnce() -> GFut,
    GFut: Future<Output = Result<Vec<T>>>,
    Q: FnOnce(&[T]) -> Page<T>,
  {
    let hash = key.cache_hash();

    if !online {
      // Serve stale data rather than fail
      if let Some(entry) = self.entry_any_age(&hash) {
        debug!(query = %key.description(), "offline, serving cached entry");
        return Ok(CacheResult::offline(entry.page(), entry.cached_at));
      }

      if let Some(mirror) = self.load_mirror() {
        debug!(query = %key.description(), "offline, filtering full mirror");
        let page = offline_query(&mirror.entries);
        return Ok(CacheResult::offline_mirror(page, mirror.fetched_at));
      }

      return Err(CacheError::OfflineNoData.into());
    }

    if let Some(entry) = self.fresh_entry(&hash) {
      // Cache is fresh, no network call
      return Ok(CacheResult::from_cache(entry.page(), entry.cached_at));
    }

    match fetch().await {
      Ok(page) => {
        self.store_entry(&hash, &page);
        self.refresh_mirror_if_needed(fetch_all).await;
        Ok(CacheResult::from_network(page))
      }
      Err(err) => {
        // Fall back to any existing entry for this query, regardless of age
        if let Some(entry) = self.entry_any_age(&hash) {
          warn!(
            query = %key.description(),
            error = %err,
            "remote fetch failed, serving cached entry"
          );
          return Ok(CacheResult::network_failed(entry.page(), entry.cached_at));
        }
        Err(err)
      }
    }
  }

  /// Delete the cached entry for a query so the next resolve refetches.
  /// Optionally clears the full mirror as well.
  pub fn invalidate<K: QueryKey>(&self, key: &K, clear_mirror: bool) {
    let hash = key.cache_hash();
    let mut map = self.load_map();
    if map.remove(&hash).is_some() {
      self.write_map(&mut map);
    }

    if clear_mirror {
      if let Err(err) = self.storage.delete(MIRROR_CACHE_KEY) {
        warn!(error = %err, "failed to clear mirror");
      }
    }

    debug!(query = %key.description(), "invalidated cache entry");
  }

  /// Remove every cached entry past the freshness window, and clear the
  /// mirror if it is past the window. Safe to invoke at any time.
  pub fn sweep(&self) {
    let mut map = self.load_map();
    let before = map.len();
    map.retain(|_, entry| self.is_fresh(entry.cached_at));

    if map.len() != before {
      debug!(removed = before - map.len(), "swept stale cache entries");
      self.write_map(&mut map);
    }

    if let Some(mirror) = self.load_mirror() {
      if !self.is_fresh(mirror.fetched_at) {
        if let Err(err) = self.storage.delete(MIRROR_CACHE_KEY) {
          warn!(error = %err, "failed to clear stale mirror");
        }
      }
    }
  }

  /// Load the query map, treating a missing or unparsable blob as empty.
  fn load_map(&self) -> StoredMap<T> {
    self
      .storage
      .get(QUERY_CACHE_KEY)
      .ok()
      .flatten()
      .and_then(|bytes| serde_json::from_slice(&bytes).ok())
      .unwrap_or_default()
  }

  fn fresh_entry(&self, hash: &str) -> Option<StoredEntry<T>> {
    self
      .load_map()
      .remove(hash)
      .filter(|entry| self.is_fresh(entry.cached_at))
  }

  fn entry_any_age(&self, hash: &str) -> Option<StoredEntry<T>> {
    self.load_map().remove(hash)
  }

  fn store_entry(&self, hash: &str, page: &Page<T>) {
    self.store_entry_at(hash, page, Utc::now());
  }

  fn store_entry_at(&self, hash: &str, page: &Page<T>, cached_at: DateTime<Utc>) {
    let mut map = self.load_map();
    map.insert(
      hash.to_string(),
      StoredEntry {
        entries: page.entries.clone(),
        total: page.total,
        cached_at,
      },
    );
    self.write_map(&mut map);
  }

  /// Persist the query map. On a capacity failure, sweep stale entries and
  /// retry once; a second failure drops the write (the in-memory result has
  /// already been returned to the caller).
  fn write_map(&self, map: &mut StoredMap<T>) {
    let bytes = match serde_json::to_vec(&map) {
      Ok(bytes) => bytes,
      Err(err) => {
        warn!(error = %err, "failed to serialize cache");
        return;
      }
    };

    match self.storage.put(QUERY_CACHE_KEY, &bytes) {
      Ok(()) => {}
      Err(StorageError::QuotaExceeded) => {
        map.retain(|_, entry| self.is_fresh(entry.cached_at));
        if let Err(err) = self.storage.delete(MIRROR_CACHE_KEY) {
          warn!(error = %err, "failed to clear mirror while reclaiming space");
        }

        let bytes = match serde_json::to_vec(&map) {
          Ok(bytes) => bytes,
          Err(_) => return,
        };
        if let Err(err) = self.storage.put(QUERY_CACHE_KEY, &bytes) {
          warn!(error = %err, "cache write dropped after sweep");
        }
      }
      Err(err) => warn!(error = %err, "cache write failed"),
    }
  }

  fn load_mirror(&self) -> Option<StoredMirror<T>> {
    self
      .storage
      .get(MIRROR_CACHE_KEY)
      .ok()
      .flatten()
      .and_then(|bytes| serde_json::from_slice(&bytes).ok())
  }

  fn store_mirror(&self, entries: &[T]) {
    let mirror = StoredMirror {
      entries: entries.to_vec(),
      fetched_at: Utc::now(),
    };
    let bytes = match serde_json::to_vec(&mirror) {
      Ok(bytes) => bytes,
      Err(err) => {
        warn!(error = %err, "failed to serialize mirror");
        return;
      }
    };

    match self.storage.put(MIRROR_CACHE_KEY, &bytes) {
      Ok(()) => {}
      Err(StorageError::QuotaExceeded) => {
        self.sweep();
        if let Err(err) = self.storage.put(MIRROR_CACHE_KEY, &bytes) {
          warn!(error = %err, "mirror write dropped after sweep");
        }
      }
      Err(err) => warn!(error = %err, "mirror write failed"),
    }
  }

  /// Refresh the mirror after a successful paged fetch when it is absent or
  /// stale. Failures are logged, never propagated.
  async fn refresh_mirror_if_needed<G, GFut>(&self, fetch_all: G)
  where
    G: FnOnce() -> GFut,
    GFut: Future<Output = Result<Vec<T>>>,
  {
    let needs_refresh = match self.load_mirror() {
      None => true,
      Some(mirror) => !self.is_fresh(mirror.fetched_at),
    };
    if !needs_refresh {
      return;
    }

    match fetch_all().await {
      Ok(entries) => {
        debug!(entries = entries.len(), "refreshed full mirror");
        self.store_mirror(&entries);
      }
      Err(err) => debug!(error = %err, "mirror refresh failed"),
    }
  }
}

impl<T, S: KvStore> Clone for CacheLayer<T, S> {
  fn clone(&self) -> Self {
    Self {
      storage: Arc::clone(&self.storage),
      cache_duration: self.cache_duration,
      _entry: PhantomData,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::storage::MemoryStore;
  use crate::cache::traits::CacheSource;
  use color_eyre::eyre::eyre;
  use std::sync::atomic::{AtomicU32, Ordering};

  struct TestKey(&'static str);

  impl QueryKey for TestKey {
    fn cache_hash(&self) -> String {
      self.0.to_string()
    }

    fn description(&self) -> String {
      format!("test query {}", self.0)
    }
  }

  fn page(entries: &[&str]) -> Page<String> {
    Page {
      entries: entries.iter().map(|s| s.to_string()).collect(),
      total: entries.len() as u64,
    }
  }

  /// Offline evaluator used by tests: pass the mirror through unchanged.
  fn passthrough(entries: &[String]) -> Page<String> {
    Page {
      entries: entries.to_vec(),
      total: entries.len() as u64,
    }
  }

  fn layer() -> CacheLayer<String, MemoryStore> {
    CacheLayer::new(MemoryStore::new())
  }

  async fn no_mirror() -> Result<Vec<String>> {
    Err(eyre!("no mirror in this test"))
  }

  async fn must_not_fetch() -> Result<Page<String>> {
    panic!("fetch must not run in this branch")
  }

  #[tokio::test]
  async fn test_second_resolve_is_cache_served() {
    let layer = layer();
    let key = TestKey("k1");
    let fetches = AtomicU32::new(0);

    for _ in 0..2 {
      let result = layer
        .resolve(
          &key,
          true,
          || async {
            fetches.fetch_add(1, Ordering::SeqCst);
            Ok(page(&["a", "b"]))
          },
          no_mirror,
          passthrough,
        )
        .await
        .unwrap();
      assert_eq!(result.data.entries, vec!["a", "b"]);
    }

    assert_eq!(fetches.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn test_stale_entry_not_fresh_served_but_usable_degraded() {
    let layer = layer();
    let key = TestKey("k1");

    // Entry aged past the 7-day window
    let old = Utc::now() - Duration::days(8);
    layer.store_entry_at(&key.cache_hash(), &page(&["stale"]), old);

    // Online: the fresh-cache path must not serve it; the fetch wins
    let result = layer
      .resolve(
        &key,
        true,
        || async { Ok(page(&["fresh"])) },
        no_mirror,
        passthrough,
      )
      .await
      .unwrap();
    assert_eq!(result.source, CacheSource::Network);
    assert_eq!(result.data.entries, vec!["fresh"]);

    // Age the entry again for the remaining branches
    layer.store_entry_at(&key.cache_hash(), &page(&["stale"]), old);

    // Offline: the exact-match path ignores freshness
    let result = layer
      .resolve(
        &key,
        false,
        must_not_fetch,
        no_mirror,
        passthrough,
      )
      .await
      .unwrap();
    assert_eq!(result.source, CacheSource::Offline);
    assert_eq!(result.data.entries, vec!["stale"]);

    // Online with a failing fetch: the fallback path ignores freshness too
    let result = layer
      .resolve(
        &key,
        true,
        || async { Err(eyre!("connection refused")) },
        no_mirror,
        passthrough,
      )
      .await
      .unwrap();
    assert_eq!(result.source, CacheSource::NetworkFailed);
    assert_eq!(result.data.entries, vec!["stale"]);
    assert_eq!(
      result.notice(),
      Some("network unavailable, showing cached results")
    );
  }

  #[tokio::test]
  async fn test_fetch_failure_without_entry_propagates() {
    let layer = layer();
    let key = TestKey("k1");

    let err = layer
      .resolve(
        &key,
        true,
        || async { Err(eyre!("connection refused")) },
        no_mirror,
        passthrough,
      )
      .await
      .unwrap_err();
    assert!(err.to_string().contains("connection refused"));
  }

  #[tokio::test]
  async fn test_offline_no_data_error() {
    let layer = layer();
    let key = TestKey("k1");

    let err = layer
      .resolve(
        &key,
        false,
        must_not_fetch,
        no_mirror,
        passthrough,
      )
      .await
      .unwrap_err();
    assert!(err.downcast_ref::<CacheError>().is_some());
  }

  #[tokio::test]
  async fn test_offline_falls_back_to_mirror() {
    let layer = layer();
    let key = TestKey("unseen-query");

    layer.store_mirror(&["m1".to_string(), "m2".to_string(), "m3".to_string()]);

    let result = layer
      .resolve(
        &key,
        false,
        || async { panic!("no fetch while offline") },
        no_mirror,
        |entries| Page {
          // Evaluate "the query" as: take the first two
          entries: entries[..2].to_vec(),
          total: entries.len() as u64,
        },
      )
      .await
      .unwrap();

    assert_eq!(result.source, CacheSource::OfflineMirror);
    assert_eq!(result.data.entries, vec!["m1", "m2"]);
    assert_eq!(result.data.total, 3);
    assert_eq!(result.notice(), Some("offline, showing cached results"));
  }

  #[tokio::test]
  async fn test_mirror_refreshed_after_fetch_when_absent() {
    let layer = layer();
    let key = TestKey("k1");

    let result = layer
      .resolve(
        &key,
        true,
        || async { Ok(page(&["a"])) },
        || async { Ok(vec!["m1".to_string(), "m2".to_string()]) },
        passthrough,
      )
      .await
      .unwrap();
    assert_eq!(result.source, CacheSource::Network);

    let mirror = layer.load_mirror().expect("mirror should be populated");
    assert_eq!(mirror.entries, vec!["m1", "m2"]);
  }

  #[tokio::test]
  async fn test_fresh_mirror_not_refetched() {
    let layer = layer();
    layer.store_mirror(&["m1".to_string()]);

    let mirror_fetches = AtomicU32::new(0);
    let result = layer
      .resolve(
        &TestKey("k1"),
        true,
        || async { Ok(page(&["a"])) },
        || async {
          mirror_fetches.fetch_add(1, Ordering::SeqCst);
          Ok(vec![])
        },
        passthrough,
      )
      .await
      .unwrap();

    assert_eq!(result.source, CacheSource::Network);
    assert_eq!(mirror_fetches.load(Ordering::SeqCst), 0);
  }

  #[test]
  fn test_sweep_age_boundaries() {
    let layer = layer();
    let now = Utc::now();

    let ages = [
      ("age_zero", Duration::zero(), true),
      ("age_6d23h", Duration::hours(6 * 24 + 23), true),
      ("age_7d", Duration::days(7), false),
      ("age_7d1h", Duration::hours(7 * 24 + 1), false),
    ];

    for (hash, age, _) in &ages {
      layer.store_entry_at(hash, &page(&["x"]), now - *age);
    }

    layer.sweep();

    for (hash, _, retained) in &ages {
      assert_eq!(
        layer.entry_any_age(hash).is_some(),
        *retained,
        "entry {hash} retention mismatch"
      );
    }
  }

  #[test]
  fn test_sweep_clears_stale_mirror() {
    let layer = layer();

    // Backdate the mirror by writing the blob directly
    let mirror = StoredMirror {
      entries: vec!["m1".to_string()],
      fetched_at: Utc::now() - Duration::days(8),
    };
    layer
      .storage
      .put(MIRROR_CACHE_KEY, &serde_json::to_vec(&mirror).unwrap())
      .unwrap();

    layer.sweep();
    assert!(layer.load_mirror().is_none());
  }

  #[tokio::test]
  async fn test_force_refresh_defeats_fresh_entry() {
    let layer = layer();
    let key = TestKey("k1");
    let fetches = AtomicU32::new(0);

    let fetch = || async {
      fetches.fetch_add(1, Ordering::SeqCst);
      Ok(page(&["a"]))
    };

    layer
      .resolve(&key, true, fetch, no_mirror, passthrough)
      .await
      .unwrap();
    assert_eq!(fetches.load(Ordering::SeqCst), 1);

    // Entry is fresh; an invalidate must force the next resolve to refetch
    layer.invalidate(&key, true);

    let result = layer
      .resolve(&key, true, fetch, no_mirror, passthrough)
      .await
      .unwrap();
    assert_eq!(result.source, CacheSource::Network);
    assert_eq!(fetches.load(Ordering::SeqCst), 2);
  }

  #[test]
  fn test_quota_exceeded_sweeps_and_retries() {
    // Capacity fits roughly one entry's blob plus overhead, so the second
    // write trips the quota until the stale entry is reclaimed.
    let store = MemoryStore::with_capacity(256);
    let layer: CacheLayer<String, MemoryStore> = CacheLayer::new(store);

    let old = Utc::now() - Duration::days(8);
    let filler: String = "x".repeat(128);
    layer.store_entry_at(
      "stale",
      &Page {
        entries: vec![filler],
        total: 1,
      },
      old,
    );
    assert!(layer.entry_any_age("stale").is_some());

    // This write exceeds capacity; the layer sweeps the stale entry and lands
    layer.store_entry("new", &page(&["a", "b"]));

    assert!(layer.entry_any_age("stale").is_none());
    assert!(layer.fresh_entry("new").is_some());
  }
}
