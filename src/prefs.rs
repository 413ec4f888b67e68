use color_eyre::Result;
use std::sync::Arc;

use crate::cache::{KeyValueStore, StorageKey};

/// UI language used when nothing has been chosen yet.
pub const DEFAULT_UI_LANGUAGE: &str = "ru";

/// Persisted user preferences
pub struct Preferences<S: KeyValueStore> {
  storage: Arc<S>,
}

impl<S: KeyValueStore> Preferences<S> {
  pub fn new(storage: Arc<S>) -> Self {
    Self { storage }
  }

  pub fn ui_language(&self) -> Result<String> {
    Ok(
      self
        .storage
        .get_json::<String>(&StorageKey::UiLanguage)?
        .filter(|lang| !lang.is_empty())
        .unwrap_or_else(|| DEFAULT_UI_LANGUAGE.to_string()),
    )
  }

  pub fn set_ui_language(&self, language: &str) -> Result<()> {
    self
      .storage
      .set_json(&StorageKey::UiLanguage, &language.to_string())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::SqliteStorage;

  #[test]
  fn test_default_and_update() {
    let prefs = Preferences::new(Arc::new(SqliteStorage::in_memory().unwrap()));
    assert_eq!(prefs.ui_language().unwrap(), "ru");
    prefs.set_ui_language("pl").unwrap();
    assert_eq!(prefs.ui_language().unwrap(), "pl");
  }
}
