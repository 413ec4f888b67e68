//! Offline-first entry handling and the sync engine.

use chrono::Utc;
use color_eyre::{eyre::eyre, Result};
use futures::future::join_all;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::api::{
  ApiError, ClientContext, DiaryApi, Entry, NewEntry, ReviewRecord, ReviewRequest,
  OFFLINE_ID_PREFIX,
};
use crate::cache::{CacheResult, KeyValueStore};
use crate::prefs::Preferences;

use super::audio_cache::AudioCache;
use super::entry_store::EntryStore;
use super::offline_queue::OfflineQueue;
use super::review_cache::{CachedReview, ReviewCache, ReviewTier};

/// Entries requested per page when loading from the server.
pub const DEFAULT_PAGE_SIZE: u32 = 50;

/// What happened to a saved entry.
#[derive(Debug, Clone, PartialEq)]
pub enum SaveOutcome {
  /// Confirmed by the server
  Saved(Entry),
  /// Server unreachable or refused; queued under an offline id
  Offline(Entry),
}

impl SaveOutcome {
  pub fn entry(&self) -> &Entry {
    match self {
      Self::Saved(entry) | Self::Offline(entry) => entry,
    }
  }
}

/// Summary of one sync pass.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct SyncReport {
  /// `(offline_id, server_id)` for every entry confirmed in this pass
  pub synced: Vec<(String, String)>,
  /// Entries whose upload failed and stay queued
  pub failed: usize,
  /// Entries another pass was already uploading
  pub skipped: usize,
}

/// Summary of a UI language switch.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct LanguageSwitchReport {
  /// Entries that already had a review in the new language
  pub cached: usize,
  /// Entries reviewed fresh for the new language
  pub fetched: usize,
  /// Entries left showing their original text
  pub failed: usize,
}

enum Resolution {
  Cached,
  Fetched,
  Failed,
}

/// Marks an offline entry as being uploaded; released on drop.
struct InFlight<'a> {
  set: &'a Mutex<HashSet<String>>,
  id: String,
}

impl Drop for InFlight<'_> {
  fn drop(&mut self) {
    if let Ok(mut set) = self.set.lock() {
      set.remove(&self.id);
    }
  }
}

/// Offline-first diary state for one client session.
///
/// Owns the session's [`ClientContext`], the in-memory [`EntryStore`] and the
/// persisted queue and caches. All backend traffic goes through `A`.
pub struct OfflineSyncCache<A: DiaryApi, S: KeyValueStore> {
  api: A,
  context: RwLock<ClientContext>,
  page_size: u32,
  store: Mutex<EntryStore>,
  queue: OfflineQueue<S>,
  reviews: ReviewCache<S>,
  audio: AudioCache<S>,
  prefs: Preferences<S>,
  in_flight: Mutex<HashSet<String>>,
}

impl<A: DiaryApi, S: KeyValueStore> OfflineSyncCache<A, S> {
  /// Create the cache and show whatever is still queued from earlier sessions.
  pub fn new(api: A, storage: Arc<S>, context: ClientContext) -> Result<Self> {
    let cache = Self {
      api,
      context: RwLock::new(context),
      page_size: DEFAULT_PAGE_SIZE,
      store: Mutex::new(EntryStore::default()),
      queue: OfflineQueue::new(storage.clone()),
      reviews: ReviewCache::new(storage.clone()),
      audio: AudioCache::new(storage.clone()),
      prefs: Preferences::new(storage),
      in_flight: Mutex::new(HashSet::new()),
    };

    let ui_language = cache.ui_language()?;
    let mut queued = cache.queue.load()?;
    for entry in &mut queued {
      cache.annotate(entry, &ui_language)?;
    }
    cache.lock_store()?.merge(queued);

    Ok(cache)
  }

  pub fn with_page_size(mut self, page_size: u32) -> Self {
    self.page_size = page_size;
    self
  }

  pub fn api(&self) -> &A {
    &self.api
  }

  pub fn ui_language(&self) -> Result<String> {
    Ok(
      self
        .context
        .read()
        .map_err(|e| eyre!("Lock poisoned: {}", e))?
        .ui_language
        .clone(),
    )
  }

  /// Snapshot of all entries, newest first.
  pub fn entries(&self) -> Result<Vec<Entry>> {
    Ok(self.lock_store()?.entries().to_vec())
  }

  /// Entries still waiting for the server, in upload order.
  pub fn pending(&self) -> Result<Vec<Entry>> {
    self.queue.load()
  }

  pub fn audio_for(&self, entry_id: &str) -> Result<Option<Vec<u8>>> {
    self.audio.load(entry_id)
  }

  fn lock_store(&self) -> Result<std::sync::MutexGuard<'_, EntryStore>> {
    self.store.lock().map_err(|e| eyre!("Lock poisoned: {}", e))
  }

  /// Fill the display correction of `entry` from the review cache.
  ///
  /// Only reviews in `ui_language` are shown in the list; a legacy review is
  /// reachable through [`Self::review_entry`], where it is flagged.
  fn annotate(&self, entry: &mut Entry, ui_language: &str) -> Result<()> {
    entry.corrected_html = self
      .reviews
      .load_exact(&entry.id, ui_language)?
      .map(|record| record.corrected_html);
    Ok(())
  }

  /// Offline id derived from the current time, unique among known entries.
  fn next_offline_id(&self) -> Result<String> {
    let queued: HashSet<String> = self.queue.load()?.into_iter().map(|e| e.id).collect();
    let store = self.lock_store()?;

    let mut millis = Utc::now().timestamp_millis();
    loop {
      let id = format!("{}{}", OFFLINE_ID_PREFIX, millis);
      if !queued.contains(&id) && store.get(&id).is_none() {
        return Ok(id);
      }
      millis += 1;
    }
  }

  async fn fetch_review(&self, entry: &Entry, ui_language: &str) -> Result<ReviewRecord, ApiError> {
    self
      .api
      .review(&ReviewRequest {
        text: entry.text.clone(),
        language: entry.language.clone(),
        ui_language: ui_language.to_string(),
      })
      .await
  }

  // ==========================================================================
  // Entries
  // ==========================================================================

  /// Save a new entry, falling back to the offline queue on any API failure.
  ///
  /// Only local storage failures are returned as errors.
  pub async fn save_entry(
    &self,
    text: &str,
    language: &str,
    duration: Option<f64>,
    audio: Option<&[u8]>,
  ) -> Result<SaveOutcome> {
    let text = text.trim();
    if text.is_empty() {
      return Err(eyre!("Entry text is empty"));
    }

    let request = NewEntry {
      text: text.to_string(),
      language: language.to_string(),
      audio_duration: duration,
    };

    match self.api.create_entry(&request).await {
      Ok(entry) => {
        if let Some(audio) = audio {
          self.audio.save(&entry.id, audio)?;
        }
        self.lock_store()?.add(entry.clone());
        info!(id = %entry.id, "Saved entry");
        Ok(SaveOutcome::Saved(entry))
      }
      Err(e) => {
        let entry = Entry::offline(
          self.next_offline_id()?,
          request.text,
          request.language,
          Utc::now(),
          duration,
        );
        warn!(id = %entry.id, network = e.is_network(), error = %e, "Saving entry offline");

        if let Some(audio) = audio {
          self.audio.save(&entry.id, audio)?;
        }
        self.queue.push(&entry)?;
        self.lock_store()?.add(entry.clone());
        Ok(SaveOutcome::Offline(entry))
      }
    }
  }

  /// Load server entries and merge in the offline queue.
  ///
  /// When the server is unreachable the current view is kept (plus anything
  /// queued) and the result is marked offline.
  pub async fn load_from_server(&self) -> Result<CacheResult<Vec<Entry>>> {
    let ui_language = self.ui_language()?;
    let fetched = self.api.list_entries(self.page_size).await;

    // Read the queue after the request so a concurrent sync is not undone
    let mut queued = self.queue.load()?;
    for entry in &mut queued {
      self.annotate(entry, &ui_language)?;
    }

    match fetched {
      Ok(page) => {
        if page.pages > 1 {
          info!(
            total = page.total,
            pages = page.pages,
            "Only the newest page of entries was loaded"
          );
        }
        let mut entries = page.entries;
        for entry in &mut entries {
          self.annotate(entry, &ui_language)?;
        }
        entries.extend(queued);

        let mut store = self.lock_store()?;
        store.set_all(entries);
        debug!(count = store.entries().len(), "Loaded entries from server");
        Ok(CacheResult::from_network(store.entries().to_vec()))
      }
      Err(e) => {
        warn!(error = %e, "Failed to load entries, showing cached entries");
        let mut store = self.lock_store()?;
        store.merge(queued);
        Ok(CacheResult::offline(store.entries().to_vec()))
      }
    }
  }

  /// Delete an entry with its reviews and audio.
  ///
  /// Server-known entries are deleted remotely first; if that fails the entry
  /// stays and the error is returned.
  pub async fn delete_entry(&self, id: &str) -> Result<()> {
    let queued = self.queue.contains(id)?;

    if queued || Entry::is_offline_id(id) {
      self.queue.remove(id)?;
    } else {
      self
        .api
        .delete_entry(id)
        .await
        .map_err(|e| eyre!("Failed to delete entry {}: {}", id, e))?;
    }

    self.reviews.purge(id)?;
    self.audio.purge(id)?;
    self.lock_store()?.remove(id);
    info!(id, "Deleted entry");
    Ok(())
  }

  // ==========================================================================
  // Sync
  // ==========================================================================

  fn claim(&self, id: &str) -> Result<Option<InFlight<'_>>> {
    let mut set = self
      .in_flight
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    if !set.insert(id.to_string()) {
      return Ok(None);
    }
    Ok(Some(InFlight {
      set: &self.in_flight,
      id: id.to_string(),
    }))
  }

  /// Upload every queued entry, oldest first.
  ///
  /// A failed upload leaves the entry queued and moves on to the next one.
  /// Passes may overlap: an entry is claimed before its upload and skipped
  /// by any other pass, and re-checked against the queue once claimed.
  pub async fn sync(&self) -> Result<SyncReport> {
    let queued = self.queue.load()?;
    let mut report = SyncReport::default();
    if queued.is_empty() {
      return Ok(report);
    }
    info!(count = queued.len(), "Syncing offline entries");

    for item in queued {
      let Some(_claim) = self.claim(&item.id)? else {
        debug!(id = %item.id, "Entry already being synced");
        report.skipped += 1;
        continue;
      };
      if !self.queue.contains(&item.id)? {
        // Finished by an earlier pass
        continue;
      }

      match self.api.create_entry(&NewEntry::from(&item)).await {
        Ok(saved) => {
          let server_id = saved.id.clone();
          match self.promote(&item, saved).await {
            Ok(()) => report.synced.push((item.id.clone(), server_id)),
            Err(e) => {
              // Still queued, so the next pass retries it
              warn!(id = %item.id, server_id = %server_id, error = %e, "Failed to dequeue synced entry");
              report.failed += 1;
            }
          }
        }
        Err(e) => {
          warn!(id = %item.id, error = %e, "Sync of offline entry failed");
          report.failed += 1;
        }
      }
    }

    info!(
      synced = report.synced.len(),
      failed = report.failed,
      "Sync pass finished"
    );
    Ok(report)
  }

  /// Move a freshly confirmed entry from its offline id to the server id.
  ///
  /// Only a failure to dequeue the entry is returned; everything after that
  /// is logged so the rest of the pass goes on.
  async fn promote(&self, offline: &Entry, saved: Entry) -> Result<()> {
    let (old_id, new_id) = (offline.id.as_str(), saved.id.clone());

    // Copies land before originals are removed; a failure leaves data under the old id
    if let Err(e) = self.reviews.migrate(old_id, &new_id) {
      warn!(old_id, new_id = %new_id, error = %e, "Failed to migrate cached reviews");
    }
    if let Err(e) = self.audio.move_to(old_id, &new_id) {
      warn!(old_id, new_id = %new_id, error = %e, "Failed to move cached audio");
    }

    if !self.queue.remove(old_id)? {
      // Deleted locally while the upload was in flight
      warn!(old_id, new_id = %new_id, "Entry deleted during sync, removing server copy");
      if let Err(e) = self.api.delete_entry(&new_id).await {
        warn!(new_id = %new_id, error = %e, "Failed to delete server copy");
      }
      return Ok(());
    }
    info!(old_id, new_id = %new_id, "Offline entry synced");

    if let Err(e) = self.show_synced(old_id, saved).await {
      warn!(old_id, new_id = %new_id, error = %e, "Failed to refresh synced entry");
    }
    Ok(())
  }

  /// Swap the synced entry into the store and review it in the current UI language.
  async fn show_synced(&self, old_id: &str, mut saved: Entry) -> Result<()> {
    let ui_language = self.ui_language()?;
    self.annotate(&mut saved, &ui_language)?;
    self.lock_store()?.replace(old_id, saved.clone());

    // Best effort: the entry stays synced without a review
    match self.fetch_review(&saved, &ui_language).await {
      Ok(record) => {
        self.reviews.save(&saved.id, &ui_language, &record)?;
        self
          .lock_store()?
          .annotate(&saved.id, Some(record.corrected_html));
      }
      Err(e) => debug!(id = %saved.id, error = %e, "Review after sync failed"),
    }
    Ok(())
  }

  // ==========================================================================
  // Reviews
  // ==========================================================================

  /// Review of `id` in the current UI language.
  ///
  /// Cached review first; otherwise a fresh one is requested and cached. If
  /// that fails the legacy review is returned when there is one, else `None`
  /// and the entry keeps its original text.
  pub async fn review_entry(&self, id: &str) -> Result<Option<CachedReview>> {
    let ui_language = self.ui_language()?;
    let entry = self
      .lock_store()?
      .get(id)
      .cloned()
      .ok_or_else(|| eyre!("Unknown entry: {}", id))?;

    if let Some(record) = self.reviews.load_exact(id, &ui_language)? {
      return Ok(Some(CachedReview {
        record,
        tier: ReviewTier::Exact,
      }));
    }

    match self.fetch_review(&entry, &ui_language).await {
      Ok(record) => {
        self.reviews.save(id, &ui_language, &record)?;
        self
          .lock_store()?
          .annotate(id, Some(record.corrected_html.clone()));
        Ok(Some(CachedReview {
          record,
          tier: ReviewTier::Exact,
        }))
      }
      Err(e) => {
        warn!(id, error = %e, "Review failed");
        self.reviews.load(id, &ui_language)
      }
    }
  }

  /// Re-resolve one entry's correction for `ui_language`, never reusing another language.
  async fn resolve_for_language(&self, entry: &Entry, ui_language: &str) -> Result<Resolution> {
    if let Some(record) = self.reviews.load_exact(&entry.id, ui_language)? {
      self
        .lock_store()?
        .annotate(&entry.id, Some(record.corrected_html));
      return Ok(Resolution::Cached);
    }

    match self.fetch_review(entry, ui_language).await {
      Ok(record) => {
        self.reviews.save(&entry.id, ui_language, &record)?;
        self
          .lock_store()?
          .annotate(&entry.id, Some(record.corrected_html));
        Ok(Resolution::Fetched)
      }
      Err(e) => {
        debug!(id = %entry.id, error = %e, "No review for new UI language");
        self.lock_store()?.annotate(&entry.id, None);
        Ok(Resolution::Failed)
      }
    }
  }

  /// Switch the UI language and re-resolve every displayed entry for it.
  pub async fn set_ui_language(&self, ui_language: &str) -> Result<LanguageSwitchReport> {
    self
      .context
      .write()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?
      .ui_language = ui_language.to_string();
    self.prefs.set_ui_language(ui_language)?;

    let entries = self.entries()?;
    let results = join_all(
      entries
        .iter()
        .map(|entry| self.resolve_for_language(entry, ui_language)),
    )
    .await;

    let mut report = LanguageSwitchReport::default();
    for result in results {
      match result? {
        Resolution::Cached => report.cached += 1,
        Resolution::Fetched => report.fetched += 1,
        Resolution::Failed => report.failed += 1,
      }
    }
    info!(
      ui_language,
      cached = report.cached,
      fetched = report.fetched,
      failed = report.failed,
      "UI language switched"
    );
    Ok(report)
  }

  /// Promote legacy reviews of all known entries to the current UI language.
  pub fn retire_legacy_reviews(&self) -> Result<usize> {
    let ui_language = self.ui_language()?;
    let mut retired = 0;
    for entry in self.entries()? {
      if self.reviews.retire_legacy(&entry.id, &ui_language)? {
        retired += 1;
      }
    }
    Ok(retired)
  }
}
