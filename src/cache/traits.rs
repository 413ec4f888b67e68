//! Core traits and types for the local key-value cache.

use color_eyre::{eyre::eyre, Result};
use serde::{de::DeserializeOwned, Serialize};

use super::keys::StorageKey;

/// Trait for key-value storage backends.
///
/// Keys are plain strings at this level; callers go through [`StorageKey`] so
/// the string layout stays in one place. Every write must be visible to the
/// very next read.
pub trait KeyValueStore: Send + Sync {
  /// Read the raw value stored under `key`.
  fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

  /// Store `value` under `key`, replacing any previous value.
  fn set(&self, key: &str, value: &[u8]) -> Result<()>;

  /// Delete `key`. Deleting a missing key is not an error.
  fn delete(&self, key: &str) -> Result<()>;

  /// List all `(key, value)` pairs whose key starts with `prefix`, ordered by key.
  fn list_by_prefix(&self, prefix: &str) -> Result<Vec<(String, Vec<u8>)>>;

  /// Read and deserialize a JSON value.
  fn get_json<T: DeserializeOwned>(&self, key: &StorageKey) -> Result<Option<T>>
  where
    Self: Sized,
  {
    match self.get(&key.render())? {
      Some(data) => {
        let value = serde_json::from_slice(&data)
          .map_err(|e| eyre!("Failed to deserialize {}: {}", key.render(), e))?;
        Ok(Some(value))
      }
      None => Ok(None),
    }
  }

  /// Serialize and store a JSON value.
  fn set_json<T: Serialize>(&self, key: &StorageKey, value: &T) -> Result<()>
  where
    Self: Sized,
  {
    let data =
      serde_json::to_vec(value).map_err(|e| eyre!("Failed to serialize {}: {}", key.render(), e))?;
    self.set(&key.render(), &data)
  }
}

/// Result of a load, including where the data came from.
#[derive(Debug, Clone)]
pub struct CacheResult<T> {
  /// The actual data
  pub data: T,
  /// Where the data came from
  pub source: CacheSource,
}

impl<T> CacheResult<T> {
  /// Fresh data from the network.
  pub fn from_network(data: T) -> Self {
    Self {
      data,
      source: CacheSource::Network,
    }
  }

  /// Network unavailable, serving local data.
  pub fn offline(data: T) -> Self {
    Self {
      data,
      source: CacheSource::Offline,
    }
  }
}

/// Indicates where loaded data came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheSource {
  /// Fresh data from network
  Network,
  /// Offline mode - network unavailable, serving cached data
  Offline,
}
