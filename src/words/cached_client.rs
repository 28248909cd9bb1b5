//! Cached words client that wraps WordsClient with transparent caching.

use color_eyre::Result;
use std::sync::Arc;
use std::time::Duration;

use crate::cache::{CacheLayer, CacheResult, Page, SqliteStore};
use crate::config::Config;
use crate::net::NetworkStatus;

use super::client::WordsClient;
use super::offline;
use super::types::{WordEntry, WordQuery};
use super::watch::{self, Subscription};

/// Upper bound on the full-mirror fetch.
const MIRROR_FETCH_LIMIT: u64 = 5000;

/// Words client with transparent caching and offline fallback.
///
/// This wraps the underlying WordsClient and provides the same API, but
/// resolves listings through the cache layer: fresh cache entries skip the
/// network, failed fetches fall back to stale entries, and offline queries
/// are answered from cached pages or the full mirror.
pub struct CachedWordsClient {
  inner: WordsClient,
  cache: CacheLayer<WordEntry, SqliteStore>,
  net: Arc<dyn NetworkStatus>,
}

impl CachedWordsClient {
  /// Create a new cached words client. Sweeps stale cache entries at startup.
  pub fn new(config: &Config, net: Arc<dyn NetworkStatus>) -> Result<Self> {
    let inner = WordsClient::new(config)?;
    let storage = SqliteStore::open()?;
    let cache = CacheLayer::new(storage);
    cache.sweep();

    Ok(Self { inner, cache, net })
  }

  /// List words for a query, resolving through the cache layer.
  pub async fn list_words(&self, query: &WordQuery) -> Result<CacheResult<Page<WordEntry>>> {
    let online = self.net.is_online();

    self
      .cache
      .resolve(
        query,
        online,
        || {
          let inner = self.inner.clone();
          let query = query.clone();
          async move { inner.list_words(&query).await }
        },
        || {
          let inner = self.inner.clone();
          async move { inner.fetch_all_words(MIRROR_FETCH_LIMIT).await }
        },
        |entries| offline::query_mirror(entries, query),
      )
      .await
  }

  /// Drop the cached entry (and the mirror) for a query, then refetch.
  pub async fn force_refresh(&self, query: &WordQuery) -> Result<CacheResult<Page<WordEntry>>> {
    self.cache.invalidate(query, true);
    self.list_words(query).await
  }

  /// Get a single word, bypassing the cache.
  pub async fn get_word(&self, id: &str) -> Result<WordEntry> {
    self.inner.get_word(id).await
  }

  /// Like a word: remote like count becomes the caller's value plus one.
  /// Returns the server-confirmed entry; nothing is updated locally first.
  pub async fn like(&self, entry: &WordEntry) -> Result<WordEntry> {
    self.inner.set_likes(&entry.id, entry.likes + 1).await
  }

  /// Unlike a word: remote like count becomes the caller's value minus one,
  /// never below zero.
  pub async fn unlike(&self, entry: &WordEntry) -> Result<WordEntry> {
    self
      .inner
      .set_likes(&entry.id, entry.likes.saturating_sub(1))
      .await
  }

  /// Submit a free-text suggestion.
  pub async fn suggest(&self, text: &str, name: Option<&str>) -> Result<()> {
    self.inner.create_suggestion(text, name).await
  }

  /// Remove cache entries past the freshness window.
  pub fn sweep(&self) {
    self.cache.sweep();
  }

  /// Watch a word's like count for out-of-band changes.
  pub fn watch_likes(&self, id: &str, interval: Duration) -> Subscription {
    watch::watch_likes(self.inner.clone(), id.to_string(), interval)
  }
}

impl Clone for CachedWordsClient {
  fn clone(&self) -> Self {
    Self {
      inner: self.inner.clone(),
      cache: self.cache.clone(),
      net: Arc::clone(&self.net),
    }
  }
}
