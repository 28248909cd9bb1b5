use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Default listing page size when the config doesn't set one.
const DEFAULT_PAGE_SIZE: u64 = 6;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  pub appwrite: AppwriteConfig,
  /// Default number of words per listing page
  pub page_size: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppwriteConfig {
  /// API endpoint, e.g. https://cloud.appwrite.io/v1
  pub endpoint: String,
  pub project_id: String,
  pub database_id: String,
  pub words_collection_id: String,
  pub messages_collection_id: String,
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./otji.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/otji/config.yaml
  /// 4. ~/.config/otji/config.yaml
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
        "No configuration file found. Create one at ~/.config/otji/config.yaml\n\
                 See config.example.yaml for the format."
      )),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("otji.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("otji").join("config.yaml");
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

  /// Get the optional API key from environment variables.
  ///
  /// Checks OTJI_APPWRITE_KEY first, then APPWRITE_API_KEY as fallback.
  /// Public read access needs no key; mutations may, depending on the
  /// collection's permissions.
  pub fn get_api_key() -> Option<String> {
    std::env::var("OTJI_APPWRITE_KEY")
      .or_else(|_| std::env::var("APPWRITE_API_KEY"))
      .ok()
      .filter(|key| !key.is_empty())
  }

  pub fn page_size(&self) -> u64 {
    self.page_size.unwrap_or(DEFAULT_PAGE_SIZE)
  }
}
