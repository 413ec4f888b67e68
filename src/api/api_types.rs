//! Serde types matching the diary backend's JSON.
//!
//! Fields are optional here so a 2xx body that lacks something we need turns
//! into [`ApiError::EmptyResponse`] instead of a silent default.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use super::error::ApiError;
use super::types::{EntriesPage, Entry, ReviewRecord, TelegramSession, Transcription};

/// Accept an id sent either as a JSON number or a string.
fn deserialize_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
  D: Deserializer<'de>,
{
  #[derive(Deserialize)]
  #[serde(untagged)]
  enum RawId {
    Number(i64),
    Text(String),
  }

  Ok(Option::<RawId>::deserialize(deserializer)?.map(|id| match id {
    RawId::Number(n) => n.to_string(),
    RawId::Text(s) => s,
  }))
}

/// Parse a server timestamp.
///
/// The backend emits naive ISO-8601 (no offset); those are taken as UTC.
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
  if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
    return Some(dt.with_timezone(&Utc));
  }
  NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
    .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f"))
    .map(|dt| dt.and_utc())
    .ok()
}

/// Error body: `{"error": "..."}`
#[derive(Debug, Deserialize)]
pub struct ApiErrorBody {
  pub error: Option<String>,
  pub message: Option<String>,
}

// ============================================================================
// Entries
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ApiEntry {
  #[serde(default, deserialize_with = "deserialize_id")]
  pub id: Option<String>,
  pub text: Option<String>,
  pub timestamp: Option<String>,
  pub language: Option<String>,
  pub audio_duration: Option<f64>,
}

impl ApiEntry {
  /// Convert into a server-confirmed entry.
  pub fn into_entry(self) -> Result<Entry, ApiError> {
    let id = self
      .id
      .filter(|id| !id.is_empty())
      .ok_or_else(|| ApiError::EmptyResponse("entry id".to_string()))?;
    let text = self
      .text
      .ok_or_else(|| ApiError::EmptyResponse(format!("text of entry {}", id)))?;
    // A missing or unreadable timestamp still sorts the entry as newest
    let timestamp = self
      .timestamp
      .as_deref()
      .and_then(parse_timestamp)
      .unwrap_or_else(Utc::now);

    Ok(Entry {
      id,
      text,
      language: self.language.unwrap_or_default(),
      timestamp,
      duration: self.audio_duration,
      is_offline: false,
      corrected_html: None,
    })
  }
}

#[derive(Debug, Deserialize)]
pub struct ApiEntriesResponse {
  pub entries: Option<Vec<ApiEntry>>,
  #[serde(default)]
  pub total: u64,
  #[serde(default)]
  pub pages: u64,
}

impl ApiEntriesResponse {
  pub fn into_page(self) -> Result<EntriesPage, ApiError> {
    let entries = self
      .entries
      .ok_or_else(|| ApiError::EmptyResponse("entries".to_string()))?
      .into_iter()
      .map(ApiEntry::into_entry)
      .collect::<Result<Vec<_>, _>>()?;

    Ok(EntriesPage {
      entries,
      total: self.total,
      pages: self.pages,
    })
  }
}

// ============================================================================
// Review
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ApiReviewResponse {
  pub corrected_text: Option<String>,
  pub corrected_html: Option<String>,
  pub explanations_html: Option<String>,
  pub tts_audio_data_url: Option<String>,
  pub language: Option<String>,
}

impl ApiReviewResponse {
  /// Build a cache record for `original_text`.
  pub fn into_record(self, original_text: &str) -> Result<ReviewRecord, ApiError> {
    let (corrected_text, corrected_html) = match (self.corrected_text, self.corrected_html) {
      (None, None) => return Err(ApiError::EmptyResponse("corrected_html".to_string())),
      (Some(text), Some(html)) => (text, html),
      (Some(text), None) => (text.clone(), text),
      (None, Some(html)) => (html.clone(), html),
    };

    Ok(ReviewRecord {
      original_text: original_text.to_string(),
      corrected_text,
      corrected_html,
      explanations_html: self.explanations_html.unwrap_or_default(),
      tts_audio_data_url: self.tts_audio_data_url.filter(|url| !url.is_empty()),
      language: self.language,
    })
  }
}

// ============================================================================
// Transcribe / translate / health / auth
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ApiTranscribeResponse {
  pub text: Option<String>,
  pub language: Option<String>,
}

impl ApiTranscribeResponse {
  pub fn into_transcription(self) -> Result<Transcription, ApiError> {
    Ok(Transcription {
      text: self
        .text
        .ok_or_else(|| ApiError::EmptyResponse("text".to_string()))?,
      language: self.language,
    })
  }
}

#[derive(Debug, Serialize)]
pub struct ApiTranslateRequest<'a> {
  pub text: &'a str,
  pub target_language: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct ApiTranslateResponse {
  pub translated: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ApiHealthResponse {
  pub status: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ApiTelegramAuthRequest<'a> {
  pub init_data: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct ApiTelegramAuthResponse {
  #[serde(default)]
  pub user: serde_json::Value,
  pub access_token: Option<String>,
}

impl ApiTelegramAuthResponse {
  pub fn into_session(self) -> Result<TelegramSession, ApiError> {
    let access_token = self
      .access_token
      .filter(|t| !t.is_empty())
      .ok_or_else(|| ApiError::EmptyResponse("access_token".to_string()))?;
    Ok(TelegramSession {
      user: self.user,
      access_token,
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_numeric_and_string_ids() {
    let numeric: ApiEntry =
      serde_json::from_str(r#"{"id": 42, "text": "hi", "timestamp": "2024-05-01T10:00:00"}"#)
        .unwrap();
    assert_eq!(numeric.into_entry().unwrap().id, "42");

    let text: ApiEntry = serde_json::from_str(r#"{"id": "abc", "text": "hi"}"#).unwrap();
    assert_eq!(text.into_entry().unwrap().id, "abc");
  }

  #[test]
  fn test_missing_id_is_empty_response() {
    let entry: ApiEntry = serde_json::from_str(r#"{"text": "hi"}"#).unwrap();
    assert!(matches!(
      entry.into_entry(),
      Err(ApiError::EmptyResponse(_))
    ));
  }

  #[test]
  fn test_parse_timestamp_forms() {
    let naive = parse_timestamp("2024-05-01T10:00:00.123456").unwrap();
    let zoned = parse_timestamp("2024-05-01T12:00:00.123456+02:00").unwrap();
    assert_eq!(naive, zoned);
    assert!(parse_timestamp("yesterday").is_none());
  }

  #[test]
  fn test_review_requires_a_correction() {
    let empty: ApiReviewResponse = serde_json::from_str(r#"{"explanations_html": ""}"#).unwrap();
    assert!(empty.into_record("x").is_err());

    let text_only: ApiReviewResponse =
      serde_json::from_str(r#"{"corrected_text": "Hello."}"#).unwrap();
    let record = text_only.into_record("hello").unwrap();
    assert_eq!(record.original_text, "hello");
    assert_eq!(record.corrected_html, "Hello.");
  }
}
