//! Key-value storage trait and backends for the cache.

use rusqlite::{params, Connection, ErrorCode};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;
use thiserror::Error;

/// Storage failures the cache layer needs to tell apart.
///
/// `QuotaExceeded` is recoverable (the layer sweeps stale entries and retries);
/// everything else is reported as a backend failure.
#[derive(Debug, Error)]
pub enum StorageError {
  #[error("storage capacity exceeded")]
  QuotaExceeded,
  #[error("storage backend error: {0}")]
  Backend(String),
}

/// Trait for persistent key-value backends.
///
/// Values are opaque serialized blobs; the cache layer owns the format.
pub trait KvStore: Send + Sync {
  /// Read the blob stored under `key`, if any.
  fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError>;

  /// Store `value` under `key`, replacing any previous blob.
  fn put(&self, key: &str, value: &[u8]) -> Result<(), StorageError>;

  /// Remove the blob stored under `key`. Removing a missing key is not an error.
  fn delete(&self, key: &str) -> Result<(), StorageError>;
}

/// SQLite-backed store, one row per key.
pub struct SqliteStore {
  conn: Mutex<Connection>,
}

/// Schema for the key-value table.
const KV_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS kv_cache (
    key TEXT PRIMARY KEY,
    value BLOB NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);
"#;

impl SqliteStore {
  /// Open the store at the default location.
  pub fn open() -> Result<Self, StorageError> {
    let path = Self::default_path()?;

    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| StorageError::Backend(format!("failed to create cache directory: {e}")))?;
    }

    let conn = Connection::open(&path).map_err(|e| {
      StorageError::Backend(format!("failed to open cache database at {}: {e}", path.display()))
    })?;

    Self::from_connection(conn)
  }

  /// Open an in-memory store. Nothing survives the process; useful for tests
  /// and for embedding without a writable data directory.
  pub fn open_in_memory() -> Result<Self, StorageError> {
    let conn = Connection::open_in_memory()
      .map_err(|e| StorageError::Backend(format!("failed to open in-memory database: {e}")))?;

    Self::from_connection(conn)
  }

  fn from_connection(conn: Connection) -> Result<Self, StorageError> {
    conn
      .execute_batch(KV_SCHEMA)
      .map_err(|e| StorageError::Backend(format!("failed to run cache migrations: {e}")))?;

    Ok(Self {
      conn: Mutex::new(conn),
    })
  }

  /// Get the default database path.
  fn default_path() -> Result<PathBuf, StorageError> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| StorageError::Backend("could not determine data directory".into()))?;

    Ok(data_dir.join("otji").join("cache.db"))
  }

  fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, StorageError> {
    self
      .conn
      .lock()
      .map_err(|e| StorageError::Backend(format!("lock poisoned: {e}")))
  }
}

/// Map a rusqlite error, surfacing capacity exhaustion as `QuotaExceeded`.
fn map_sqlite_error(err: rusqlite::Error) -> StorageError {
  if let rusqlite::Error::SqliteFailure(failure, _) = &err {
    if matches!(failure.code, ErrorCode::DiskFull | ErrorCode::TooBig) {
      return StorageError::QuotaExceeded;
    }
  }
  StorageError::Backend(err.to_string())
}

impl KvStore for SqliteStore {
  fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
    let conn = self.lock()?;

    let mut stmt = conn
      .prepare("SELECT value FROM kv_cache WHERE key = ?")
      .map_err(map_sqlite_error)?;

    let value: Option<Vec<u8>> = stmt.query_row(params![key], |row| row.get(0)).ok();

    Ok(value)
  }

  fn put(&self, key: &str, value: &[u8]) -> Result<(), StorageError> {
    let conn = self.lock()?;

    conn
      .execute(
        "INSERT OR REPLACE INTO kv_cache (key, value, updated_at) VALUES (?, ?, datetime('now'))",
        params![key, value],
      )
      .map_err(map_sqlite_error)?;

    Ok(())
  }

  fn delete(&self, key: &str) -> Result<(), StorageError> {
    let conn = self.lock()?;

    conn
      .execute("DELETE FROM kv_cache WHERE key = ?", params![key])
      .map_err(map_sqlite_error)?;

    Ok(())
  }
}

/// In-memory store with an optional byte capacity.
///
/// The capacity covers the sum of stored blob sizes; an over-capacity put is
/// rejected with `QuotaExceeded` and leaves the store unchanged.
#[derive(Default)]
pub struct MemoryStore {
  entries: Mutex<HashMap<String, Vec<u8>>>,
  capacity: Option<usize>,
}

impl MemoryStore {
  pub fn new() -> Self {
    Self::default()
  }

  /// Cap the total stored bytes, for exercising quota handling.
  pub fn with_capacity(capacity: usize) -> Self {
    Self {
      entries: Mutex::new(HashMap::new()),
      capacity: Some(capacity),
    }
  }

  fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, Vec<u8>>>, StorageError> {
    self
      .entries
      .lock()
      .map_err(|e| StorageError::Backend(format!("lock poisoned: {e}")))
  }
}

impl KvStore for MemoryStore {
  fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
    Ok(self.lock()?.get(key).cloned())
  }

  fn put(&self, key: &str, value: &[u8]) -> Result<(), StorageError> {
    let mut entries = self.lock()?;

    if let Some(capacity) = self.capacity {
      let other_bytes: usize = entries
        .iter()
        .filter(|(k, _)| k.as_str() != key)
        .map(|(_, v)| v.len())
        .sum();
      if other_bytes + value.len() > capacity {
        return Err(StorageError::QuotaExceeded);
      }
    }

    entries.insert(key.to_string(), value.to_vec());
    Ok(())
  }

  fn delete(&self, key: &str) -> Result<(), StorageError> {
    self.lock()?.remove(key);
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_sqlite_roundtrip() {
    let store = SqliteStore::open_in_memory().unwrap();

    assert!(store.get("missing").unwrap().is_none());

    store.put("k", b"hello").unwrap();
    assert_eq!(store.get("k").unwrap().unwrap(), b"hello");

    store.put("k", b"replaced").unwrap();
    assert_eq!(store.get("k").unwrap().unwrap(), b"replaced");

    store.delete("k").unwrap();
    assert!(store.get("k").unwrap().is_none());

    // Deleting a missing key is fine
    store.delete("k").unwrap();
  }

  #[test]
  fn test_memory_store_quota() {
    let store = MemoryStore::with_capacity(10);

    store.put("a", b"12345").unwrap();
    store.put("b", b"12345").unwrap();

    let err = store.put("c", b"x").unwrap_err();
    assert!(matches!(err, StorageError::QuotaExceeded));

    // Rejected put leaves the store unchanged
    assert!(store.get("c").unwrap().is_none());

    // Replacing an existing key only counts the new size
    store.put("a", b"1234567890").unwrap_err();
    store.put("a", b"12345").unwrap();
  }

  #[test]
  fn test_memory_store_unbounded() {
    let store = MemoryStore::new();
    store.put("k", &vec![0u8; 1 << 20]).unwrap();
    assert_eq!(store.get("k").unwrap().unwrap().len(), 1 << 20);
  }
}
