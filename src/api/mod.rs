//! Remote diary backend: wire types, errors and the HTTP client.

mod api_types;
mod client;
mod context;
mod error;
mod types;

#[cfg(test)]
pub mod fake;

use async_trait::async_trait;
use std::sync::Arc;

pub use client::DiaryClient;
pub use context::ClientContext;
pub use error::ApiError;
pub use types::{
  EntriesPage, Entry, NewEntry, ReviewRecord, ReviewRequest, TelegramSession, Transcription,
  OFFLINE_ID_PREFIX,
};

/// Operations the backend offers.
///
/// The sync cache only talks to the backend through this trait, so the
/// transport can be swapped out (tests use an in-memory fake).
#[async_trait]
pub trait DiaryApi: Send + Sync {
  /// GET `/entries?per_page=N`
  async fn list_entries(&self, per_page: u32) -> Result<EntriesPage, ApiError>;

  /// POST `/entries`
  async fn create_entry(&self, entry: &NewEntry) -> Result<Entry, ApiError>;

  /// DELETE `/entries/{id}`
  async fn delete_entry(&self, id: &str) -> Result<(), ApiError>;

  /// POST `/review`
  async fn review(&self, request: &ReviewRequest) -> Result<ReviewRecord, ApiError>;

  /// POST `/transcribe` (multipart)
  async fn transcribe(
    &self,
    audio: Vec<u8>,
    file_name: &str,
    language: &str,
  ) -> Result<Transcription, ApiError>;

  /// POST `/translate`
  async fn translate(&self, text: &str, target_language: &str) -> Result<String, ApiError>;

  /// GET `/health`, returning the reported status
  async fn health(&self) -> Result<String, ApiError>;

  /// POST `/auth/telegram`
  async fn telegram_auth(&self, init_data: &str) -> Result<TelegramSession, ApiError>;
}

#[async_trait]
impl<T: DiaryApi + ?Sized> DiaryApi for Arc<T> {
  async fn list_entries(&self, per_page: u32) -> Result<EntriesPage, ApiError> {
    (**self).list_entries(per_page).await
  }

  async fn create_entry(&self, entry: &NewEntry) -> Result<Entry, ApiError> {
    (**self).create_entry(entry).await
  }

  async fn delete_entry(&self, id: &str) -> Result<(), ApiError> {
    (**self).delete_entry(id).await
  }

  async fn review(&self, request: &ReviewRequest) -> Result<ReviewRecord, ApiError> {
    (**self).review(request).await
  }

  async fn transcribe(
    &self,
    audio: Vec<u8>,
    file_name: &str,
    language: &str,
  ) -> Result<Transcription, ApiError> {
    (**self).transcribe(audio, file_name, language).await
  }

  async fn translate(&self, text: &str, target_language: &str) -> Result<String, ApiError> {
    (**self).translate(text, target_language).await
  }

  async fn health(&self) -> Result<String, ApiError> {
    (**self).health().await
  }

  async fn telegram_auth(&self, init_data: &str) -> Result<TelegramSession, ApiError> {
    (**self).telegram_auth(init_data).await
  }
}
