//! In-memory backend for tests.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;

use super::{
  ApiError, DiaryApi, EntriesPage, Entry, NewEntry, ReviewRecord, ReviewRequest, TelegramSession,
  Transcription,
};

/// Fake backend with a network switch and call counters.
pub struct FakeApi {
  online: AtomicBool,
  review_online: AtomicBool,
  delete_online: AtomicBool,
  next_id: AtomicU64,
  /// Texts whose creation fails even while online
  rejected_texts: Mutex<HashSet<String>>,
  server_entries: Mutex<Vec<Entry>>,
  pub creates: AtomicUsize,
  pub reviews: Mutex<Vec<(String, String)>>,
  pub health_checks: AtomicUsize,
}

impl FakeApi {
  pub fn new(online: bool) -> Self {
    Self {
      online: AtomicBool::new(online),
      review_online: AtomicBool::new(true),
      delete_online: AtomicBool::new(true),
      next_id: AtomicU64::new(42),
      rejected_texts: Mutex::new(HashSet::new()),
      server_entries: Mutex::new(Vec::new()),
      creates: AtomicUsize::new(0),
      reviews: Mutex::new(Vec::new()),
      health_checks: AtomicUsize::new(0),
    }
  }

  pub fn set_online(&self, online: bool) {
    self.online.store(online, Ordering::SeqCst);
  }

  pub fn set_review_online(&self, online: bool) {
    self.review_online.store(online, Ordering::SeqCst);
  }

  pub fn set_delete_online(&self, online: bool) {
    self.delete_online.store(online, Ordering::SeqCst);
  }

  pub fn reject_text(&self, text: &str) {
    self.rejected_texts.lock().unwrap().insert(text.to_string());
  }

  pub fn server_entries(&self) -> Vec<Entry> {
    self.server_entries.lock().unwrap().clone()
  }

  pub fn review_count(&self) -> usize {
    self.reviews.lock().unwrap().len()
  }

  fn is_online(&self) -> bool {
    self.online.load(Ordering::SeqCst)
  }

  fn offline_error() -> ApiError {
    ApiError::Network("connection refused".to_string())
  }
}

#[async_trait]
impl DiaryApi for FakeApi {
  async fn list_entries(&self, _per_page: u32) -> Result<EntriesPage, ApiError> {
    tokio::task::yield_now().await;
    if !self.is_online() {
      return Err(Self::offline_error());
    }
    let entries = self.server_entries();
    let total = entries.len() as u64;
    Ok(EntriesPage {
      entries,
      total,
      pages: 1,
    })
  }

  async fn create_entry(&self, entry: &NewEntry) -> Result<Entry, ApiError> {
    // Let a concurrent caller run while this request is "in flight"
    tokio::task::yield_now().await;
    if !self.is_online() {
      return Err(Self::offline_error());
    }
    if self.rejected_texts.lock().unwrap().contains(&entry.text) {
      return Err(ApiError::Server {
        status: 500,
        message: "rejected".to_string(),
      });
    }

    self.creates.fetch_add(1, Ordering::SeqCst);
    let saved = Entry {
      id: self.next_id.fetch_add(1, Ordering::SeqCst).to_string(),
      text: entry.text.clone(),
      language: entry.language.clone(),
      timestamp: Utc::now(),
      duration: entry.audio_duration,
      is_offline: false,
      corrected_html: None,
    };
    self.server_entries.lock().unwrap().push(saved.clone());
    Ok(saved)
  }

  async fn delete_entry(&self, id: &str) -> Result<(), ApiError> {
    if !self.is_online() || !self.delete_online.load(Ordering::SeqCst) {
      return Err(Self::offline_error());
    }
    self.server_entries.lock().unwrap().retain(|e| e.id != id);
    Ok(())
  }

  async fn review(&self, request: &ReviewRequest) -> Result<ReviewRecord, ApiError> {
    tokio::task::yield_now().await;
    if !self.is_online() || !self.review_online.load(Ordering::SeqCst) {
      return Err(Self::offline_error());
    }
    self
      .reviews
      .lock()
      .unwrap()
      .push((request.text.clone(), request.ui_language.clone()));

    let corrected = format!("[{}] {}", request.ui_language, request.text);
    Ok(ReviewRecord {
      original_text: request.text.clone(),
      corrected_text: corrected.clone(),
      corrected_html: corrected,
      explanations_html: String::new(),
      tts_audio_data_url: None,
      language: Some(request.language.clone()),
    })
  }

  async fn transcribe(
    &self,
    _audio: Vec<u8>,
    _file_name: &str,
    language: &str,
  ) -> Result<Transcription, ApiError> {
    if !self.is_online() {
      return Err(Self::offline_error());
    }
    Ok(Transcription {
      text: "transcribed".to_string(),
      language: Some(language.to_string()),
    })
  }

  async fn translate(&self, text: &str, target_language: &str) -> Result<String, ApiError> {
    if !self.is_online() {
      return Err(Self::offline_error());
    }
    Ok(format!("{}:{}", target_language, text))
  }

  async fn health(&self) -> Result<String, ApiError> {
    self.health_checks.fetch_add(1, Ordering::SeqCst);
    if !self.is_online() {
      return Err(Self::offline_error());
    }
    Ok("ok".to_string())
  }

  async fn telegram_auth(&self, _init_data: &str) -> Result<TelegramSession, ApiError> {
    if !self.is_online() {
      return Err(Self::offline_error());
    }
    Ok(TelegramSession {
      user: serde_json::json!({"id": 1, "username": "tester"}),
      access_token: "token".to_string(),
    })
  }
}
