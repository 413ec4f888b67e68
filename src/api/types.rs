use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Prefix of ids handed out to entries the server has not confirmed yet.
pub const OFFLINE_ID_PREFIX: &str = "offline_";

/// A diary entry, either server-confirmed or pending offline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
  pub id: String,
  pub text: String,
  pub language: String,
  pub timestamp: DateTime<Utc>,
  #[serde(default)]
  pub duration: Option<f64>,
  #[serde(default)]
  pub is_offline: bool,
  /// Cached correction for the current UI language, display only
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub corrected_html: Option<String>,
}

impl Entry {
  /// Build an entry that has not reached the server yet.
  pub fn offline(
    id: String,
    text: String,
    language: String,
    timestamp: DateTime<Utc>,
    duration: Option<f64>,
  ) -> Self {
    Self {
      id,
      text,
      language,
      timestamp,
      duration,
      is_offline: true,
      corrected_html: None,
    }
  }

  /// Whether `id` is a temporary offline id.
  pub fn is_offline_id(id: &str) -> bool {
    id.starts_with(OFFLINE_ID_PREFIX)
  }
}

/// Body for entry creation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewEntry {
  pub text: String,
  pub language: String,
  pub audio_duration: Option<f64>,
}

impl From<&Entry> for NewEntry {
  fn from(entry: &Entry) -> Self {
    Self {
      text: entry.text.clone(),
      language: entry.language.clone(),
      audio_duration: entry.duration,
    }
  }
}

/// A page of server entries
#[derive(Debug, Clone)]
pub struct EntriesPage {
  pub entries: Vec<Entry>,
  pub total: u64,
  /// Number of pages at the requested page size
  pub pages: u64,
}

/// Body for a review request
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReviewRequest {
  pub text: String,
  pub language: String,
  pub ui_language: String,
}

/// A grammar review for one entry in one UI language
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewRecord {
  pub original_text: String,
  pub corrected_text: String,
  pub corrected_html: String,
  pub explanations_html: String,
  #[serde(default)]
  pub tts_audio_data_url: Option<String>,
  /// Language of the reviewed text, if the server reported it
  #[serde(default)]
  pub language: Option<String>,
}

/// Result of a transcription
#[derive(Debug, Clone, PartialEq)]
pub struct Transcription {
  pub text: String,
  pub language: Option<String>,
}

/// Result of a successful Telegram login
#[derive(Debug, Clone)]
pub struct TelegramSession {
  pub user: serde_json::Value,
  pub access_token: String,
}

impl TelegramSession {
  /// Human-friendly account name derived from the user payload.
  pub fn account_name(&self) -> String {
    let field = |name: &str| match self.user.get(name) {
      Some(serde_json::Value::String(s)) if !s.is_empty() => Some(s.clone()),
      Some(serde_json::Value::Number(n)) => Some(n.to_string()),
      _ => None,
    };

    field("username")
      .or_else(|| field("first_name"))
      .or_else(|| field("id"))
      .unwrap_or_else(|| "telegram".to_string())
  }
}
