use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
  #[serde(default)]
  pub api: ApiConfig,
  #[serde(default)]
  pub bff: BffConfig,
  #[serde(default)]
  pub cache: CacheConfig,
  #[serde(default)]
  pub inventory: InventoryConfig,
}

/// Where the typed client sends requests: the BFF, or the inventory service directly.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
  #[serde(default = "default_api_url")]
  pub url: String,
  #[serde(default = "default_timeout_secs")]
  pub timeout_secs: u64,
}

impl Default for ApiConfig {
  fn default() -> Self {
    Self {
      url: default_api_url(),
      timeout_secs: default_timeout_secs(),
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BffConfig {
  #[serde(default = "default_listen")]
  pub listen: SocketAddr,
  /// Base URL of the remote inventory service (e.g. "https://inventory.example/api/v1/")
  #[serde(default = "default_upstream_url")]
  pub upstream_url: String,
  #[serde(default = "default_timeout_secs")]
  pub timeout_secs: u64,
}

impl Default for BffConfig {
  fn default() -> Self {
    Self {
      listen: default_listen(),
      upstream_url: default_upstream_url(),
      timeout_secs: default_timeout_secs(),
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
  /// Seconds before a cached read is served stale and revalidated in the background
  #[serde(default = "default_stale_secs")]
  pub stale_secs: u64,
  /// Seconds an unobserved entry is retained before eviction
  #[serde(default = "default_gc_secs")]
  pub gc_secs: u64,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      stale_secs: default_stale_secs(),
      gc_secs: default_gc_secs(),
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
pub struct InventoryConfig {
  #[serde(default = "default_page_size")]
  pub page_size: u32,
  #[serde(default = "default_debounce_ms")]
  pub search_debounce_ms: u64,
}

impl Default for InventoryConfig {
  fn default() -> Self {
    Self {
      page_size: default_page_size(),
      search_debounce_ms: default_debounce_ms(),
    }
  }
}

fn default_api_url() -> String {
  "http://127.0.0.1:3000/api/".to_string()
}

fn default_upstream_url() -> String {
  "http://127.0.0.1:3100/api/v1/".to_string()
}

fn default_listen() -> SocketAddr {
  SocketAddr::from(([127, 0, 0, 1], 3000))
}

fn default_timeout_secs() -> u64 {
  30
}

fn default_stale_secs() -> u64 {
  60
}

fn default_gc_secs() -> u64 {
  300
}

fn default_page_size() -> u32 {
  10
}

fn default_debounce_ms() -> u64 {
  500
}

impl Config {
  /// Load configuration from file, then apply environment overrides.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./stockpile.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/stockpile/config.yaml
  ///
  /// Without a file, built-in defaults are used.
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

    let config = match path {
      Some(p) => Self::load_from_path(&p)?,
      None => Config::default(),
    };

    config.with_env_overrides(|key| std::env::var(key).ok())
  }

  fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from("stockpile.yaml");
    if local.exists() {
      return Some(local);
    }

    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("stockpile").join("config.yaml");
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
    let config: Config = serde_yaml::from_str(contents)?;
    Ok(config)
  }

  /// Apply STOCKPILE_API_URL, STOCKPILE_UPSTREAM_URL and STOCKPILE_LISTEN.
  fn with_env_overrides(mut self, var: impl Fn(&str) -> Option<String>) -> Result<Self> {
    if let Some(url) = var("STOCKPILE_API_URL") {
      self.api.url = url;
    }
    if let Some(url) = var("STOCKPILE_UPSTREAM_URL") {
      self.bff.upstream_url = url;
    }
    if let Some(listen) = var("STOCKPILE_LISTEN") {
      self.bff.listen = listen
        .parse()
        .map_err(|e| eyre!("Invalid STOCKPILE_LISTEN '{}': {}", listen, e))?;
    }
    Ok(self)
  }

  /// Get the login password from the environment.
  pub fn get_password() -> Option<String> {
    std::env::var("STOCKPILE_PASSWORD").ok()
  }
}

impl ApiConfig {
  pub fn timeout(&self) -> Duration {
    Duration::from_secs(self.timeout_secs)
  }
}

impl BffConfig {
  pub fn timeout(&self) -> Duration {
    Duration::from_secs(self.timeout_secs)
  }
}

impl CacheConfig {
  pub fn stale_time(&self) -> Duration {
    Duration::from_secs(self.stale_secs)
  }

  pub fn gc_time(&self) -> Duration {
    Duration::from_secs(self.gc_secs)
  }
}

impl InventoryConfig {
  pub fn debounce(&self) -> Duration {
    Duration::from_millis(self.search_debounce_ms)
  }
}
