//! Application settings and configuration management

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_CATALOG_URL: &str =
    "https://drive.google.com/uc?id=1Civ_XqRNn49IFHIvlIP1sJng-xE0UG2h&export=download";

/// Application settings
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Settings {
    /// URL of the JSON catalog listing the media items
    #[serde(default = "default_catalog_url")]
    pub catalog_url: String,
    /// Directory downloaded items are written into
    #[serde(default = "default_download_dir")]
    pub download_dir: PathBuf,
    /// Playback progress sampling interval in milliseconds
    #[serde(default = "default_progress_interval_ms")]
    pub progress_interval_ms: u64,
    /// Read buffer size used by the download pipeline
    #[serde(default = "default_download_chunk_size")]
    pub download_chunk_size: usize,
    /// Timeout applied to catalog and download HTTP requests
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,
    #[serde(default = "default_command_buffer_size")]
    pub command_buffer_size: usize,
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

fn default_catalog_url() -> String {
    DEFAULT_CATALOG_URL.to_string()
}

fn default_download_dir() -> PathBuf {
    dirs::download_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join("medialist")
}

fn default_progress_interval_ms() -> u64 {
    500
}

fn default_download_chunk_size() -> usize {
    8192
}

fn default_http_timeout_secs() -> u64 {
    30
}

fn default_command_buffer_size() -> usize {
    64
}

fn default_event_capacity() -> usize {
    256
}

/// Error types for configuration operations
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),
    #[error("Parse error: {0}")]
    ParseError(#[from] serde_json::Error),
    #[error("Validation error: {0}")]
    ValidationError(String),
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            catalog_url: default_catalog_url(),
            download_dir: default_download_dir(),
            progress_interval_ms: default_progress_interval_ms(),
            download_chunk_size: default_download_chunk_size(),
            http_timeout_secs: default_http_timeout_secs(),
            command_buffer_size: default_command_buffer_size(),
            event_capacity: default_event_capacity(),
        }
    }
}

impl Settings {
    /// Load settings from a file, falling back to defaults when it does not exist
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)?;
        let settings: Settings = serde_json::from_str(&content)?;
        Ok(settings)
    }

    /// Save settings to a file
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = serde_json::to_string_pretty(&self)?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        fs::write(path, content)?;
        Ok(())
    }

    /// Get the default config file path
    pub fn default_path() -> PathBuf {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        home.join(".config").join("medialist").join("config.json")
    }

    pub fn progress_interval(&self) -> Duration {
        Duration::from_millis(self.progress_interval_ms)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    /// Validate settings
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.catalog_url.trim().is_empty() {
            return Err(ConfigError::ValidationError("Catalog URL cannot be empty".to_string()));
        }
        if url::Url::parse(&self.catalog_url).is_err() {
            return Err(ConfigError::ValidationError(format!(
                "Catalog URL is not a valid URL: {}",
                self.catalog_url
            )));
        }
        if self.progress_interval_ms == 0 {
            return Err(ConfigError::ValidationError(
                "Progress interval must be greater than zero".to_string(),
            ));
        }
        if self.download_chunk_size == 0 {
            return Err(ConfigError::ValidationError(
                "Download chunk size must be greater than zero".to_string(),
            ));
        }
        if self.command_buffer_size == 0 || self.event_capacity == 0 {
            return Err(ConfigError::ValidationError(
                "Channel capacities must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
