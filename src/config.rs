use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tokio::time::Duration;

use crate::manager::{CacheSettings, DEFAULT_PAGE_SIZE};

/// Environment variable overriding `backend.url`
pub const BACKEND_URL_ENV: &str = "LISTDECK_BACKEND_URL";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
  #[serde(default)]
  pub backend: BackendConfig,
  #[serde(default)]
  pub cache: CacheConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BackendConfig {
  /// Base url; commands are posted to `{url}/invoke/{command}`
  #[serde(default = "default_backend_url")]
  pub url: String,
  #[serde(default = "default_timeout_secs")]
  pub timeout_secs: u64,
}

impl Default for BackendConfig {
  fn default() -> Self {
    Self {
      url: default_backend_url(),
      timeout_secs: default_timeout_secs(),
    }
  }
}

fn default_backend_url() -> String {
  "http://127.0.0.1:7878".to_string()
}

fn default_timeout_secs() -> u64 {
  30
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
  /// How long cached entries stay valid
  #[serde(default = "default_ttl_secs")]
  pub ttl_secs: u64,
  /// Events requested per page
  #[serde(default = "default_page_size")]
  pub page_size: usize,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      ttl_secs: default_ttl_secs(),
      page_size: default_page_size(),
    }
  }
}

fn default_ttl_secs() -> u64 {
  5 * 60
}

fn default_page_size() -> usize {
  DEFAULT_PAGE_SIZE
}

impl Config {
  /// Load configuration from file, falling back to defaults when none exists.
  ///
  /// Search order:
  /// 1. Explicit path if provided (must exist)
  /// 2. ./listdeck.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/listdeck/config.yaml
  ///
  /// `LISTDECK_BACKEND_URL` overrides the backend url afterwards.
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

    let mut config = match path {
      Some(p) => Self::load_from_path(&p)?,
      None => Config::default(),
    };

    if let Ok(url) = std::env::var(BACKEND_URL_ENV) {
      config.backend.url = url;
    }
    config.validate()?;
    Ok(config)
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("listdeck.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("listdeck").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::from_yaml(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  pub fn from_yaml(contents: &str) -> Result<Self> {
    // An empty file deserializes to null
    if contents.trim().is_empty() {
      return Ok(Config::default());
    }
    let config: Config = serde_yaml::from_str(contents)?;
    Ok(config)
  }

  fn validate(&self) -> Result<()> {
    if self.cache.page_size == 0 {
      return Err(eyre!("cache.page_size must be at least 1"));
    }
    if self.backend.url.trim().is_empty() {
      return Err(eyre!("backend.url must not be empty"));
    }
    Ok(())
  }

  pub fn timeout(&self) -> Duration {
    Duration::from_secs(self.backend.timeout_secs)
  }

  pub fn cache_settings(&self) -> CacheSettings {
    CacheSettings {
      ttl: Duration::from_secs(self.cache.ttl_secs),
      page_size: self.cache.page_size,
    }
  }
}
