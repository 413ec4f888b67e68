use color_eyre::{eyre::eyre, Result};
use std::time::Duration;
use url::Url;

/// Default request timeout, after which a call counts as a network error.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);

/// Everything a client session needs to talk to the backend.
///
/// One context per session, owned by the sync cache; nothing global.
#[derive(Debug, Clone)]
pub struct ClientContext {
  pub base_url: Url,
  pub token: Option<String>,
  pub ui_language: String,
  pub timeout: Duration,
}

impl ClientContext {
  pub fn new(base_url: &str, token: Option<String>, ui_language: &str) -> Result<Self> {
    let base_url =
      Url::parse(base_url).map_err(|e| eyre!("Invalid API url '{}': {}", base_url, e))?;
    if base_url.cannot_be_a_base() {
      return Err(eyre!("Invalid API url '{}': not a base url", base_url));
    }

    Ok(Self {
      base_url,
      token: token.filter(|t| !t.is_empty()),
      ui_language: ui_language.to_string(),
      timeout: DEFAULT_TIMEOUT,
    })
  }

  pub fn with_timeout(mut self, timeout: Duration) -> Self {
    self.timeout = timeout;
    self
  }

  /// Absolute url for an API path such as `/entries`.
  pub fn endpoint(&self, path: &str) -> String {
    format!(
      "{}/{}",
      self.base_url.as_str().trim_end_matches('/'),
      path.trim_start_matches('/')
    )
  }

  /// Url for a resource below the base url. Each segment is percent-encoded,
  /// so an id can never add path segments or a query.
  pub fn resource(&self, segments: &[&str]) -> Url {
    let mut url = self.base_url.clone();
    if let Ok(mut path) = url.path_segments_mut() {
      path.pop_if_empty().extend(segments);
    }
    url
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_endpoint_keeps_base_path() {
    let ctx = ClientContext::new("https://diary.example/api/", None, "en").unwrap();
    assert_eq!(ctx.endpoint("/entries"), "https://diary.example/api/entries");

    let ctx = ClientContext::new("http://localhost:5000/api", None, "en").unwrap();
    assert_eq!(ctx.endpoint("entries/7"), "http://localhost:5000/api/entries/7");
  }

  #[test]
  fn test_resource_escapes_segments() {
    let ctx = ClientContext::new("http://localhost:5000/api/", None, "en").unwrap();
    assert_eq!(
      ctx.resource(&["entries", "7"]).as_str(),
      "http://localhost:5000/api/entries/7"
    );
    assert_eq!(
      ctx.resource(&["entries", "a/b?c#d"]).as_str(),
      "http://localhost:5000/api/entries/a%2Fb%3Fc%23d"
    );
  }

  #[test]
  fn test_rejects_bad_url_and_blank_token() {
    assert!(ClientContext::new("not a url", None, "en").is_err());
    let ctx = ClientContext::new("http://x", Some(String::new()), "en").unwrap();
    assert!(ctx.token.is_none());
  }
}
