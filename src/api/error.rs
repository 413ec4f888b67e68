use thiserror::Error;

/// Errors returned by the remote diary API.
#[derive(Debug, Error)]
pub enum ApiError {
  /// Request failed or timed out before a response arrived
  #[error("network error: {0}")]
  Network(String),

  /// Server answered with a non-2xx status
  #[error("server error {status}: {message}")]
  Server { status: u16, message: String },

  /// Server answered 2xx without the expected field
  #[error("empty response: missing {0}")]
  EmptyResponse(String),
}

impl ApiError {
  /// Whether the failure came from the transport rather than the server.
  pub fn is_network(&self) -> bool {
    matches!(self, Self::Network(_))
  }
}

impl From<reqwest::Error> for ApiError {
  fn from(e: reqwest::Error) -> Self {
    if e.is_decode() {
      Self::EmptyResponse(format!("decodable body ({})", e))
    } else if e.is_timeout() {
      Self::Network(format!("request timed out: {}", e))
    } else {
      Self::Network(e.to_string())
    }
  }
}
