//! Typed storage keys.
//!
//! Every persisted value is addressed through [`StorageKey`]. The string form
//! is kept compatible with the prefixes the web and mobile clients already
//! write, so an existing cache can be read as-is.

/// A typed key into the local key-value store.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum StorageKey {
  /// The persisted offline entry queue
  OfflineQueue,
  /// A review for one entry in one UI language
  Review { entry_id: String, ui_language: String },
  /// A review written before reviews were partitioned by UI language
  LegacyReview { entry_id: String },
  /// Recorded audio for one entry
  Audio { entry_id: String },
  /// Map of known accounts
  Accounts,
  /// Name of the active account
  ActiveAccount,
  /// UI language preference
  UiLanguage,
}

impl StorageKey {
  pub fn review(entry_id: &str, ui_language: &str) -> Self {
    Self::Review {
      entry_id: entry_id.to_string(),
      ui_language: ui_language.to_string(),
    }
  }

  pub fn legacy_review(entry_id: &str) -> Self {
    Self::LegacyReview {
      entry_id: entry_id.to_string(),
    }
  }

  pub fn audio(entry_id: &str) -> Self {
    Self::Audio {
      entry_id: entry_id.to_string(),
    }
  }

  /// Render the key to its stored string form.
  pub fn render(&self) -> String {
    match self {
      Self::OfflineQueue => "offline_entries".to_string(),
      Self::Review {
        entry_id,
        ui_language,
      } => format!("review:{}:{}", entry_id, ui_language),
      Self::LegacyReview { entry_id } => format!("review:{}", entry_id),
      Self::Audio { entry_id } => format!("audio:{}", entry_id),
      Self::Accounts => "accounts".to_string(),
      Self::ActiveAccount => "active_account".to_string(),
      Self::UiLanguage => "ui_language".to_string(),
    }
  }

  /// Prefix matching every per-language review of `entry_id`.
  ///
  /// The trailing separator keeps `review:7:` from matching `review:70:en`.
  pub fn review_prefix(entry_id: &str) -> String {
    format!("review:{}:", entry_id)
  }

  /// Parse the UI language back out of a rendered per-language review key.
  pub fn review_language<'a>(entry_id: &str, rendered: &'a str) -> Option<&'a str> {
    rendered
      .strip_prefix(&Self::review_prefix(entry_id))
      .filter(|lang| !lang.is_empty())
  }
}
