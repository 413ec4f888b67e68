use color_eyre::{eyre::eyre, Result};
use std::sync::{Arc, Mutex};

use crate::api::Entry;
use crate::cache::{KeyValueStore, StorageKey};

/// Persisted FIFO of entries the server has not confirmed yet.
///
/// The whole queue lives under one key, so every change is a
/// read-modify-write; `write_lock` keeps those from interleaving.
pub struct OfflineQueue<S: KeyValueStore> {
  storage: Arc<S>,
  write_lock: Mutex<()>,
}

impl<S: KeyValueStore> OfflineQueue<S> {
  pub fn new(storage: Arc<S>) -> Self {
    Self {
      storage,
      write_lock: Mutex::new(()),
    }
  }

  /// All queued entries in enqueue order.
  pub fn load(&self) -> Result<Vec<Entry>> {
    Ok(
      self
        .storage
        .get_json::<Vec<Entry>>(&StorageKey::OfflineQueue)?
        .unwrap_or_default(),
    )
  }

  pub fn contains(&self, id: &str) -> Result<bool> {
    Ok(self.load()?.iter().any(|e| e.id == id))
  }

  /// Append `entry`; an entry with the same id is replaced in place.
  pub fn push(&self, entry: &Entry) -> Result<()> {
    let _guard = self
      .write_lock
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let mut queue = self.load()?;
    match queue.iter_mut().find(|e| e.id == entry.id) {
      Some(existing) => *existing = entry.clone(),
      None => queue.push(entry.clone()),
    }
    self.storage.set_json(&StorageKey::OfflineQueue, &queue)
  }

  /// Remove `id`. Returns whether it was queued.
  pub fn remove(&self, id: &str) -> Result<bool> {
    let _guard = self
      .write_lock
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let mut queue = self.load()?;
    let before = queue.len();
    queue.retain(|e| e.id != id);
    if queue.len() == before {
      return Ok(false);
    }
    self.storage.set_json(&StorageKey::OfflineQueue, &queue)?;
    Ok(true)
  }
}
