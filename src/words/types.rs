//! Domain types for dictionary entries and queries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::cache::QueryKey;

/// A dictionary entry. Owned by the remote service; local copies are
/// read-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WordEntry {
  pub id: String,
  /// The headword
  pub word: String,
  pub pronunciation: String,
  /// Ordered definition texts
  pub definitions: Vec<String>,
  pub date_added: DateTime<Utc>,
  pub last_modified: DateTime<Utc>,
  pub likes: u32,
  /// Pre-normalization headword, set during bulk imports
  #[serde(default)]
  pub original_word: Option<String>,
  /// Bulk-import bookkeeping flag
  #[serde(default)]
  pub modified: Option<bool>,
}

/// Sort field for word listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum SortField {
  Word,
  DateAdded,
  Likes,
}

impl std::fmt::Display for SortField {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    let name = match self {
      SortField::Word => "word",
      SortField::DateAdded => "date-added",
      SortField::Likes => "likes",
    };
    write!(f, "{name}")
  }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum SortOrder {
  Asc,
  Desc,
}

impl std::fmt::Display for SortOrder {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    let name = match self {
      SortOrder::Asc => "asc",
      SortOrder::Desc => "desc",
    };
    write!(f, "{name}")
  }
}

/// One paginated/sorted/searched word-listing request.
///
/// Two queries with identical normalized tuples are the same cache entry.
#[derive(Debug, Clone, PartialEq)]
pub struct WordQuery {
  pub offset: u64,
  pub limit: u64,
  pub search: Option<String>,
  pub sort: SortField,
  pub order: SortOrder,
}

impl WordQuery {
  pub fn new(offset: u64, limit: u64) -> Self {
    Self {
      offset,
      limit,
      search: None,
      sort: SortField::Word,
      order: SortOrder::Asc,
    }
  }

  pub fn with_search(mut self, search: Option<String>) -> Self {
    self.search = search;
    self
  }

  pub fn with_sort(mut self, sort: SortField, order: SortOrder) -> Self {
    self.sort = sort;
    self.order = order;
    self
  }

  /// Search term with lookup normalization applied (trimmed, lowercased).
  /// Empty terms count as no search.
  pub fn normalized_search(&self) -> Option<String> {
    self
      .search
      .as_deref()
      .map(|s| s.trim().to_lowercase())
      .filter(|s| !s.is_empty())
  }
}

impl QueryKey for WordQuery {
  fn cache_hash(&self) -> String {
    let input = format!(
      "words:{}:{}:{}:{}:{}",
      self.offset,
      self.limit,
      self.normalized_search().unwrap_or_default(),
      self.sort,
      self.order
    );

    // SHA256 hash for stable, fixed-length keys
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    let result = hasher.finalize();
    hex::encode(result)
  }

  fn description(&self) -> String {
    let mut desc = format!("words offset {} limit {}", self.offset, self.limit);
    if let Some(term) = self.normalized_search() {
      desc.push_str(&format!(" search '{term}'"));
    }
    desc.push_str(&format!(" sort {} {}", self.sort, self.order));
    desc
  }
}
