use std::collections::HashSet;

use crate::api::Entry;

/// In-memory view of all entries, newest first, one entry per id.
#[derive(Debug, Default)]
pub struct EntryStore {
  entries: Vec<Entry>,
}

impl EntryStore {
  pub fn entries(&self) -> &[Entry] {
    &self.entries
  }

  pub fn get(&self, id: &str) -> Option<&Entry> {
    self.entries.iter().find(|e| e.id == id)
  }

  /// Insert `entry`, replacing any entry with the same id.
  pub fn add(&mut self, entry: Entry) {
    self.entries.retain(|e| e.id != entry.id);
    self.entries.push(entry);
    self.sort();
  }

  pub fn remove(&mut self, id: &str) -> Option<Entry> {
    let pos = self.entries.iter().position(|e| e.id == id)?;
    Some(self.entries.remove(pos))
  }

  /// Rename `old_id` to `entry.id`, dropping any stale copy under either id.
  pub fn replace(&mut self, old_id: &str, entry: Entry) {
    self.entries.retain(|e| e.id != old_id);
    self.add(entry);
  }

  /// Replace the whole view. Later duplicates of an id are dropped.
  pub fn set_all(&mut self, entries: Vec<Entry>) {
    let mut seen = HashSet::new();
    self.entries = entries
      .into_iter()
      .filter(|e| seen.insert(e.id.clone()))
      .collect();
    self.sort();
  }

  /// Add entries whose ids are not present yet; existing entries are kept.
  pub fn merge(&mut self, entries: Vec<Entry>) {
    for entry in entries {
      if self.get(&entry.id).is_none() {
        self.entries.push(entry);
      }
    }
    self.sort();
  }

  /// Set the display correction of `id`.
  pub fn annotate(&mut self, id: &str, corrected_html: Option<String>) {
    if let Some(entry) = self.entries.iter_mut().find(|e| e.id == id) {
      entry.corrected_html = corrected_html;
    }
  }

  fn sort(&mut self) {
    self.entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::{TimeZone, Utc};

  fn entry(id: &str, hour: u32, offline: bool) -> Entry {
    Entry {
      id: id.to_string(),
      text: format!("entry {}", id),
      language: "ru-RU".to_string(),
      timestamp: Utc.with_ymd_and_hms(2024, 5, 1, hour, 0, 0).unwrap(),
      duration: None,
      is_offline: offline,
      corrected_html: None,
    }
  }

  fn ids(store: &EntryStore) -> Vec<&str> {
    store.entries().iter().map(|e| e.id.as_str()).collect()
  }

  #[test]
  fn test_add_sorts_newest_first() {
    let mut store = EntryStore::default();
    store.add(entry("1", 8, false));
    store.add(entry("3", 12, false));
    store.add(entry("2", 10, false));
    assert_eq!(ids(&store), vec!["3", "2", "1"]);
  }

  #[test]
  fn test_add_same_id_replaces() {
    let mut store = EntryStore::default();
    store.add(entry("1", 8, false));
    let mut edited = entry("1", 8, false);
    edited.text = "edited".to_string();
    store.add(edited);
    assert_eq!(store.entries().len(), 1);
    assert_eq!(store.get("1").unwrap().text, "edited");
  }

  #[test]
  fn test_replace_renames() {
    let mut store = EntryStore::default();
    store.add(entry("offline_1", 9, true));
    store.add(entry("5", 7, false));

    store.replace("offline_1", entry("42", 9, false));
    assert_eq!(ids(&store), vec!["42", "5"]);
    assert!(!store.get("42").unwrap().is_offline);
  }

  #[test]
  fn test_set_all_and_merge_are_unions() {
    let mut store = EntryStore::default();
    store.set_all(vec![entry("1", 8, false), entry("offline_1", 9, true), entry("1", 8, false)]);
    assert_eq!(ids(&store), vec!["offline_1", "1"]);

    store.merge(vec![entry("offline_2", 10, true), entry("1", 1, false)]);
    assert_eq!(ids(&store), vec!["offline_2", "offline_1", "1"]);
  }
}
