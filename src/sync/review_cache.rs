//! Per-entry, per-UI-language review cache.

use color_eyre::Result;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::api::ReviewRecord;
use crate::cache::{KeyValueStore, StorageKey};

/// Which lookup tier produced a cached review.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewTier {
  /// Written for the requested UI language
  Exact,
  /// Written before reviews were partitioned by UI language; its language is unknown
  Legacy,
}

/// A review read back from the cache.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedReview {
  pub record: ReviewRecord,
  pub tier: ReviewTier,
}

/// Review records keyed by `(entry_id, ui_language)`.
pub struct ReviewCache<S: KeyValueStore> {
  storage: Arc<S>,
}

impl<S: KeyValueStore> ReviewCache<S> {
  pub fn new(storage: Arc<S>) -> Self {
    Self { storage }
  }

  /// Store `record`, replacing any review for the same entry and language.
  pub fn save(&self, entry_id: &str, ui_language: &str, record: &ReviewRecord) -> Result<()> {
    self
      .storage
      .set_json(&StorageKey::review(entry_id, ui_language), record)
  }

  /// Read only the review written for `ui_language`.
  pub fn load_exact(&self, entry_id: &str, ui_language: &str) -> Result<Option<ReviewRecord>> {
    self
      .storage
      .get_json(&StorageKey::review(entry_id, ui_language))
  }

  /// Two-tier lookup: the review for `ui_language`, else the legacy review.
  ///
  /// The legacy tier is a compatibility shim for caches written before
  /// partitioning. Its language is unknown, so it comes back tagged
  /// [`ReviewTier::Legacy`] and callers decide whether to trust it.
  pub fn load(&self, entry_id: &str, ui_language: &str) -> Result<Option<CachedReview>> {
    if let Some(record) = self.load_exact(entry_id, ui_language)? {
      return Ok(Some(CachedReview {
        record,
        tier: ReviewTier::Exact,
      }));
    }

    Ok(self.load_legacy(entry_id)?.map(|record| {
      debug!(entry_id, ui_language, "Falling back to legacy review");
      CachedReview {
        record,
        tier: ReviewTier::Legacy,
      }
    }))
  }

  fn load_legacy(&self, entry_id: &str) -> Result<Option<ReviewRecord>> {
    let key = StorageKey::legacy_review(entry_id);
    match self.storage.get(&key.render())? {
      Some(data) => match serde_json::from_slice(&data) {
        Ok(record) => Ok(Some(record)),
        Err(e) => {
          // Old clients wrote other shapes; an unreadable legacy record is just a miss
          warn!(entry_id, error = %e, "Ignoring unreadable legacy review");
          Ok(None)
        }
      },
      None => Ok(None),
    }
  }

  /// Move every review of `old_id` (all languages plus legacy) to `new_id`.
  ///
  /// All copies are written before any original is deleted. Running it again
  /// finds nothing left under `old_id` and changes nothing. Returns how many
  /// records were moved.
  pub fn migrate(&self, old_id: &str, new_id: &str) -> Result<usize> {
    if old_id == new_id {
      return Ok(0);
    }

    let records = self
      .storage
      .list_by_prefix(&StorageKey::review_prefix(old_id))?;
    let legacy_key = StorageKey::legacy_review(old_id).render();
    let legacy = self.storage.get(&legacy_key)?;

    for (key, value) in &records {
      if let Some(lang) = StorageKey::review_language(old_id, key) {
        self
          .storage
          .set(&StorageKey::review(new_id, lang).render(), value)?;
      }
    }
    if let Some(value) = &legacy {
      self
        .storage
        .set(&StorageKey::legacy_review(new_id).render(), value)?;
    }

    for (key, _) in &records {
      self.storage.delete(key)?;
    }
    if legacy.is_some() {
      self.storage.delete(&legacy_key)?;
    }

    let moved = records.len() + usize::from(legacy.is_some());
    if moved > 0 {
      debug!(old_id, new_id, moved, "Migrated cached reviews");
    }
    Ok(moved)
  }

  /// Delete every review of `entry_id`, all languages and legacy.
  pub fn purge(&self, entry_id: &str) -> Result<()> {
    for (key, _) in self
      .storage
      .list_by_prefix(&StorageKey::review_prefix(entry_id))?
    {
      self.storage.delete(&key)?;
    }
    self
      .storage
      .delete(&StorageKey::legacy_review(entry_id).render())
  }

  /// Promote the legacy review of `entry_id` to `ui_language` and drop the legacy key.
  ///
  /// An existing review for `ui_language` wins over the legacy one. Returns
  /// whether a legacy record was retired.
  pub fn retire_legacy(&self, entry_id: &str, ui_language: &str) -> Result<bool> {
    let legacy_key = StorageKey::legacy_review(entry_id).render();
    let Some(value) = self.storage.get(&legacy_key)? else {
      return Ok(false);
    };

    if self.load_exact(entry_id, ui_language)?.is_none()
      && serde_json::from_slice::<ReviewRecord>(&value).is_ok()
    {
      self
        .storage
        .set(&StorageKey::review(entry_id, ui_language).render(), &value)?;
    }
    self.storage.delete(&legacy_key)?;
    Ok(true)
  }
}
