use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_API_URL: &str = "http://localhost:5000/api";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  #[serde(default)]
  pub api: ApiConfig,
  /// Entries requested per page
  #[serde(default = "default_per_page")]
  pub per_page: u32,
  /// Overrides the stored UI language preference
  pub ui_language: Option<String>,
  /// Where the local cache and logs live (defaults to the platform data dir)
  pub data_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
  #[serde(default = "default_api_url")]
  pub url: String,
  /// Request timeout in seconds
  #[serde(default = "default_timeout_secs")]
  pub timeout_secs: u64,
}

fn default_api_url() -> String {
  DEFAULT_API_URL.to_string()
}

fn default_timeout_secs() -> u64 {
  20
}

fn default_per_page() -> u32 {
  50
}

impl Default for ApiConfig {
  fn default() -> Self {
    Self {
      url: default_api_url(),
      timeout_secs: default_timeout_secs(),
    }
  }
}

impl Default for Config {
  fn default() -> Self {
    Self {
      api: ApiConfig::default(),
      per_page: default_per_page(),
      ui_language: None,
      data_dir: None,
    }
  }
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./vdiary.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/vdiary/config.yaml
  ///
  /// Without any file the defaults are used.
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      None => Ok(Self::default()),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("vdiary.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("vdiary").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::parse(&contents).map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  fn parse(contents: &str) -> Result<Self> {
    let config: Config = serde_yaml::from_str(contents).map_err(|e| eyre!("{}", e))?;
    if config.per_page == 0 {
      return Err(eyre!("per_page must be at least 1"));
    }
    Ok(config)
  }

  pub fn timeout(&self) -> Duration {
    Duration::from_secs(self.api.timeout_secs.max(1))
  }

  /// Directory for the cache database and log files.
  pub fn data_dir(&self) -> Result<PathBuf> {
    if let Some(dir) = &self.data_dir {
      return Ok(dir.clone());
    }

    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| eyre!("Could not determine data directory"))?;

    Ok(data_dir.join("vdiary"))
  }

  /// Get the API token from the environment.
  ///
  /// Checks VDIARY_TOKEN. Without it the active account's token is used.
  pub fn env_token() -> Option<String> {
    std::env::var("VDIARY_TOKEN")
      .ok()
      .filter(|t| !t.trim().is_empty())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_parse_full_config() {
    let config = Config::parse(
      r#"
api:
  url: https://diary.example/api
  timeout_secs: 5
per_page: 20
ui_language: pl
data_dir: /tmp/vdiary-test
"#,
    )
    .unwrap();

    assert_eq!(config.api.url, "https://diary.example/api");
    assert_eq!(config.timeout(), Duration::from_secs(5));
    assert_eq!(config.per_page, 20);
    assert_eq!(config.ui_language.as_deref(), Some("pl"));
    assert_eq!(config.data_dir().unwrap(), PathBuf::from("/tmp/vdiary-test"));
  }

  #[test]
  fn test_defaults_fill_missing_fields() {
    let config = Config::parse("ui_language: en\n").unwrap();
    assert_eq!(config.api.url, DEFAULT_API_URL);
    assert_eq!(config.timeout(), Duration::from_secs(20));
    assert_eq!(config.per_page, 50);
  }

  #[test]
  fn test_rejects_zero_page_size() {
    assert!(Config::parse("per_page: 0\n").is_err());
  }

  #[test]
  fn test_missing_explicit_path_is_an_error() {
    assert!(Config::load(Some(Path::new("/definitely/not/here.yaml"))).is_err());
  }
}
