use color_eyre::Result;
use std::sync::Arc;
use tracing::debug;

use crate::cache::{KeyValueStore, StorageKey};

/// Recorded audio per entry id. Local only, never uploaded with the entry.
pub struct AudioCache<S: KeyValueStore> {
  storage: Arc<S>,
}

impl<S: KeyValueStore> AudioCache<S> {
  pub fn new(storage: Arc<S>) -> Self {
    Self { storage }
  }

  pub fn save(&self, entry_id: &str, audio: &[u8]) -> Result<()> {
    self
      .storage
      .set(&StorageKey::audio(entry_id).render(), audio)
  }

  pub fn load(&self, entry_id: &str) -> Result<Option<Vec<u8>>> {
    self.storage.get(&StorageKey::audio(entry_id).render())
  }

  /// Re-key the audio of `old_id` to `new_id`, copy before delete.
  pub fn move_to(&self, old_id: &str, new_id: &str) -> Result<bool> {
    if old_id == new_id {
      return Ok(false);
    }
    let Some(audio) = self.load(old_id)? else {
      return Ok(false);
    };

    self.save(new_id, &audio)?;
    self.purge(old_id)?;
    debug!(old_id, new_id, bytes = audio.len(), "Moved cached audio");
    Ok(true)
  }

  pub fn purge(&self, entry_id: &str) -> Result<()> {
    self.storage.delete(&StorageKey::audio(entry_id).render())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::SqliteStorage;

  #[test]
  fn test_move_to_rekeys_once() {
    let audio = AudioCache::new(Arc::new(SqliteStorage::in_memory().unwrap()));
    audio.save("offline_1", b"RIFF").unwrap();

    assert!(audio.move_to("offline_1", "42").unwrap());
    assert_eq!(audio.load("42").unwrap(), Some(b"RIFF".to_vec()));
    assert_eq!(audio.load("offline_1").unwrap(), None);

    assert!(!audio.move_to("offline_1", "42").unwrap());
    assert_eq!(audio.load("42").unwrap(), Some(b"RIFF".to_vec()));
  }
}
