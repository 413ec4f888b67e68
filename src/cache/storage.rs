//! SQLite implementation of the key-value store.

use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::traits::KeyValueStore;

/// SQLite-based key-value storage.
pub struct SqliteStorage {
  conn: Mutex<Connection>,
}

impl SqliteStorage {
  /// Open (or create) the store at `path`.
  pub fn open(path: &Path) -> Result<Self> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| eyre!("Failed to create cache directory: {}", e))?;
    }

    let conn = Connection::open(path)
      .map_err(|e| eyre!("Failed to open cache database at {}: {}", path.display(), e))?;

    Self::from_connection(conn)
  }

  /// Open a store that lives only as long as this value.
  #[cfg(test)]
  pub fn in_memory() -> Result<Self> {
    let conn = Connection::open_in_memory()
      .map_err(|e| eyre!("Failed to open in-memory cache database: {}", e))?;
    Self::from_connection(conn)
  }

  /// Path of the store inside `data_dir`.
  pub fn path_in(data_dir: &Path) -> PathBuf {
    data_dir.join("cache.db")
  }

  fn from_connection(conn: Connection) -> Result<Self> {
    let storage = Self {
      conn: Mutex::new(conn),
    };
    storage.run_migrations()?;
    Ok(storage)
  }

  /// Run database migrations for cache tables.
  fn run_migrations(&self) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute_batch(CACHE_SCHEMA)
      .map_err(|e| eyre!("Failed to run cache migrations: {}", e))?;

    Ok(())
  }
}

/// Schema for cache tables.
const CACHE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS kv_cache (
    key TEXT PRIMARY KEY,
    value BLOB NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);
"#;

impl KeyValueStore for SqliteStorage {
  fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .query_row(
        "SELECT value FROM kv_cache WHERE key = ?",
        params![key],
        |row| row.get(0),
      )
      .optional()
      .map_err(|e| eyre!("Failed to read {}: {}", key, e))
  }

  fn set(&self, key: &str, value: &[u8]) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute(
        "INSERT OR REPLACE INTO kv_cache (key, value, updated_at)
         VALUES (?, ?, datetime('now'))",
        params![key, value],
      )
      .map_err(|e| eyre!("Failed to store {}: {}", key, e))?;

    Ok(())
  }

  fn delete(&self, key: &str) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute("DELETE FROM kv_cache WHERE key = ?", params![key])
      .map_err(|e| eyre!("Failed to delete {}: {}", key, e))?;

    Ok(())
  }

  fn list_by_prefix(&self, prefix: &str) -> Result<Vec<(String, Vec<u8>)>> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    // substr instead of LIKE so '%' and '_' in ids need no escaping
    let mut stmt = conn
      .prepare(
        "SELECT key, value FROM kv_cache
         WHERE substr(key, 1, length(?1)) = ?1
         ORDER BY key",
      )
      .map_err(|e| eyre!("Failed to prepare prefix query: {}", e))?;

    let rows = stmt
      .query_map(params![prefix], |row| Ok((row.get(0)?, row.get(1)?)))
      .map_err(|e| eyre!("Failed to list keys under {}: {}", prefix, e))?
      .collect::<rusqlite::Result<Vec<(String, Vec<u8>)>>>()
      .map_err(|e| eyre!("Failed to read row under {}: {}", prefix, e))?;

    Ok(rows)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_set_get_delete() {
    let storage = SqliteStorage::in_memory().unwrap();
    assert_eq!(storage.get("a").unwrap(), None);

    storage.set("a", b"one").unwrap();
    assert_eq!(storage.get("a").unwrap(), Some(b"one".to_vec()));

    storage.set("a", b"two").unwrap();
    assert_eq!(storage.get("a").unwrap(), Some(b"two".to_vec()));

    storage.delete("a").unwrap();
    assert_eq!(storage.get("a").unwrap(), None);
    // Deleting again is fine
    storage.delete("a").unwrap();
  }

  #[test]
  fn test_list_by_prefix() {
    let storage = SqliteStorage::in_memory().unwrap();
    storage.set("review:1:en", b"x").unwrap();
    storage.set("review:1:pl", b"y").unwrap();
    storage.set("review:10:en", b"z").unwrap();
    storage.set("review:1", b"legacy").unwrap();
    storage.set("audio:1", b"wav").unwrap();

    let keys: Vec<String> = storage
      .list_by_prefix("review:1:")
      .unwrap()
      .into_iter()
      .map(|(k, _)| k)
      .collect();
    assert_eq!(keys, vec!["review:1:en", "review:1:pl"]);
  }

  #[test]
  fn test_prefix_with_wildcard_characters() {
    let storage = SqliteStorage::in_memory().unwrap();
    storage.set("review:a_b:en", b"x").unwrap();
    storage.set("review:axb:en", b"y").unwrap();

    let found = storage.list_by_prefix("review:a_b:").unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].0, "review:a_b:en");
  }

  #[test]
  fn test_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = SqliteStorage::path_in(dir.path());

    {
      let storage = SqliteStorage::open(&path).unwrap();
      storage.set("offline_entries", b"[]").unwrap();
    }

    let storage = SqliteStorage::open(&path).unwrap();
    assert_eq!(storage.get("offline_entries").unwrap(), Some(b"[]".to_vec()));
  }
}
