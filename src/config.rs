use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use url::Url;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  pub remote: RemoteConfig,
  #[serde(default)]
  pub cache: CacheConfig,
  #[serde(default)]
  pub probe: ProbeConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RemoteConfig {
  /// Base URL of the hosted backend; REST and storage endpoints live under it
  pub url: String,
  /// Storage bucket that store images are uploaded into
  #[serde(default = "default_bucket")]
  pub bucket: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
  /// Seconds between remote count validations while a snapshot is held
  #[serde(default = "default_cooldown_secs")]
  pub cooldown_secs: u64,
  /// Rows per page on a full refetch
  #[serde(default = "default_page_size")]
  pub page_size: usize,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      cooldown_secs: default_cooldown_secs(),
      page_size: default_page_size(),
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProbeConfig {
  /// Path under the remote URL used for connectivity probes
  #[serde(default = "default_probe_path")]
  pub path: String,
  /// Hard timeout for a probe before it counts as offline
  #[serde(default = "default_probe_timeout_ms")]
  pub timeout_ms: u64,
}

impl Default for ProbeConfig {
  fn default() -> Self {
    Self {
      path: default_probe_path(),
      timeout_ms: default_probe_timeout_ms(),
    }
  }
}

fn default_bucket() -> String {
  "store-images".to_string()
}

fn default_cooldown_secs() -> u64 {
  60
}

fn default_page_size() -> usize {
  1000
}

fn default_probe_path() -> String {
  "auth/v1/health".to_string()
}

fn default_probe_timeout_ms() -> u64 {
  5000
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./vistore.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/vistore/config.yaml
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
      None => Err(eyre!(
        "No configuration file found. Create one at ~/.config/vistore/config.yaml\n\
                 with at least a remote.url entry."
      )),
    }
  }

  /// Programmatic configuration for embedders that don't ship a config file.
  pub fn default_with_url(url: impl Into<String>) -> Self {
    Self {
      remote: RemoteConfig {
        url: url.into(),
        bucket: default_bucket(),
      },
      cache: CacheConfig::default(),
      probe: ProbeConfig::default(),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("vistore.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("vistore").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    let config: Config = serde_yaml::from_str(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))?;

    Ok(config)
  }

  /// Get the backend API key from the environment.
  pub fn get_api_key() -> Result<String> {
    std::env::var("VISTORE_API_KEY").map_err(|_| {
      eyre!("Backend API key not found. Set the VISTORE_API_KEY environment variable.")
    })
  }

  /// Full URL the connectivity probe targets.
  pub fn probe_url(&self) -> Result<Url> {
    let base = Url::parse(&format!("{}/", self.remote.url.trim_end_matches('/')))
      .map_err(|e| eyre!("Invalid remote URL {}: {}", self.remote.url, e))?;

    base
      .join(self.probe.path.trim_start_matches('/'))
      .map_err(|e| eyre!("Invalid probe path {}: {}", self.probe.path, e))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_minimal_config_gets_defaults() {
    let config: Config = serde_yaml::from_str(
      "remote:\n  url: https://backend.example.com\n",
    )
    .unwrap();

    assert_eq!(config.remote.bucket, "store-images");
    assert_eq!(config.cache.cooldown_secs, 60);
    assert_eq!(config.cache.page_size, 1000);
    assert_eq!(config.probe.timeout_ms, 5000);
  }

  #[test]
  fn test_full_config_overrides_defaults() {
    let config: Config = serde_yaml::from_str(
      "remote:\n  url: https://backend.example.com\n  bucket: photos\n\
       cache:\n  cooldown_secs: 5\n  page_size: 50\n\
       probe:\n  path: /ping\n  timeout_ms: 1000\n",
    )
    .unwrap();

    assert_eq!(config.remote.bucket, "photos");
    assert_eq!(config.cache.cooldown_secs, 5);
    assert_eq!(config.cache.page_size, 50);
    assert_eq!(config.probe.path, "/ping");
    assert_eq!(config.probe.timeout_ms, 1000);
  }

  #[test]
  fn test_probe_url_joins_cleanly() {
    let config = Config::default_with_url("https://backend.example.com/");
    assert_eq!(
      config.probe_url().unwrap().as_str(),
      "https://backend.example.com/auth/v1/health"
    );

    let mut config = Config::default_with_url("https://backend.example.com");
    config.probe.path = "/ping".to_string();
    assert_eq!(
      config.probe_url().unwrap().as_str(),
      "https://backend.example.com/ping"
    );
  }
}
