use async_trait::async_trait;
use reqwest::{multipart, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use tracing::debug;

use super::api_types::{
  ApiEntriesResponse, ApiEntry, ApiErrorBody, ApiHealthResponse, ApiReviewResponse,
  ApiTelegramAuthRequest, ApiTelegramAuthResponse, ApiTranscribeResponse, ApiTranslateRequest,
  ApiTranslateResponse,
};
use super::context::ClientContext;
use super::error::ApiError;
use super::types::{
  EntriesPage, Entry, NewEntry, ReviewRecord, ReviewRequest, TelegramSession, Transcription,
};
use super::DiaryApi;

/// HTTP client for the diary backend
#[derive(Clone)]
pub struct DiaryClient {
  http: reqwest::Client,
  ctx: ClientContext,
}

impl DiaryClient {
  pub fn new(ctx: &ClientContext) -> Result<Self, ApiError> {
    let http = reqwest::Client::builder()
      .timeout(ctx.timeout)
      .build()
      .map_err(|e| ApiError::Network(format!("Failed to build HTTP client: {}", e)))?;

    Ok(Self {
      http,
      ctx: ctx.clone(),
    })
  }

  fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
    match &self.ctx.token {
      Some(token) => request.bearer_auth(token),
      None => request,
    }
  }

  /// Send a request and decode a JSON body from a 2xx response.
  async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ApiError> {
    let response = self.authorize(request).send().await?;
    let response = check_status(response).await?;
    Ok(response.json::<T>().await?)
  }
}

/// Turn a non-2xx response into [`ApiError::Server`].
async fn check_status(response: Response) -> Result<Response, ApiError> {
  let status = response.status();
  if status.is_success() {
    return Ok(response);
  }

  let body = response.text().await.unwrap_or_default();
  let message = serde_json::from_str::<ApiErrorBody>(&body)
    .ok()
    .and_then(|b| b.error.or(b.message))
    .or_else(|| Some(body.trim().to_string()).filter(|b| !b.is_empty()))
    .unwrap_or_else(|| status.canonical_reason().unwrap_or("unknown").to_string());

  Err(ApiError::Server {
    status: status.as_u16(),
    message,
  })
}

/// Content type for an uploaded recording, by file extension.
fn audio_mime(file_name: &str) -> &'static str {
  let ext = file_name
    .rsplit_once('.')
    .map(|(_, ext)| ext.to_ascii_lowercase())
    .unwrap_or_default();
  match ext.as_str() {
    "webm" => "audio/webm",
    "m4a" => "audio/m4a",
    "wav" => "audio/wav",
    "ogg" | "oga" => "audio/ogg",
    "mp3" => "audio/mpeg",
    _ => "application/octet-stream",
  }
}

#[async_trait]
impl DiaryApi for DiaryClient {
  async fn list_entries(&self, per_page: u32) -> Result<EntriesPage, ApiError> {
    let request = self
      .http
      .get(self.ctx.endpoint("/entries"))
      .query(&[("per_page", per_page)]);

    let response: ApiEntriesResponse = self.send_json(request).await?;
    let page = response.into_page()?;
    debug!(count = page.entries.len(), total = page.total, pages = page.pages, "Listed entries");
    Ok(page)
  }

  async fn create_entry(&self, entry: &NewEntry) -> Result<Entry, ApiError> {
    let request = self.http.post(self.ctx.endpoint("/entries")).json(entry);
    let response: ApiEntry = self.send_json(request).await?;
    response.into_entry()
  }

  async fn delete_entry(&self, id: &str) -> Result<(), ApiError> {
    let request = self.http.delete(self.ctx.resource(&["entries", id]));
    let response = self.authorize(request).send().await?;
    check_status(response).await?;
    Ok(())
  }

  async fn review(&self, request: &ReviewRequest) -> Result<ReviewRecord, ApiError> {
    let http_request = self.http.post(self.ctx.endpoint("/review")).json(request);
    let response: ApiReviewResponse = self.send_json(http_request).await?;
    response.into_record(&request.text)
  }

  async fn transcribe(
    &self,
    audio: Vec<u8>,
    file_name: &str,
    language: &str,
  ) -> Result<Transcription, ApiError> {
    let part = multipart::Part::bytes(audio)
      .file_name(file_name.to_string())
      .mime_str(audio_mime(file_name))?;
    let form = multipart::Form::new()
      .part("audio", part)
      .text("language", language.to_string());

    let request = self
      .http
      .post(self.ctx.endpoint("/transcribe"))
      .multipart(form);
    let response: ApiTranscribeResponse = self.send_json(request).await?;
    response.into_transcription()
  }

  async fn translate(&self, text: &str, target_language: &str) -> Result<String, ApiError> {
    let request = self
      .http
      .post(self.ctx.endpoint("/translate"))
      .json(&ApiTranslateRequest {
        text,
        target_language,
      });
    let response: ApiTranslateResponse = self.send_json(request).await?;
    response
      .translated
      .ok_or_else(|| ApiError::EmptyResponse("translated".to_string()))
  }

  async fn health(&self) -> Result<String, ApiError> {
    let request = self.http.get(self.ctx.endpoint("/health"));
    let response: ApiHealthResponse = self.send_json(request).await?;
    response
      .status
      .ok_or_else(|| ApiError::EmptyResponse("status".to_string()))
  }

  async fn telegram_auth(&self, init_data: &str) -> Result<TelegramSession, ApiError> {
    let request = self
      .http
      .post(self.ctx.endpoint("/auth/telegram"))
      .json(&ApiTelegramAuthRequest { init_data });
    let response: ApiTelegramAuthResponse = self.send_json(request).await?;
    response.into_session()
  }
}
