//! Integration tests for configuration management
//!
//! These tests verify that the configuration system works correctly
//! across module boundaries.

use r_medialist::config::{ConfigError, Settings};
use r_medialist::coordinator::CoordinatorOptions;
use std::error::Error;
use std::time::Duration;
use tempfile::tempdir;

#[cfg(test)]
mod config_integration_tests {
    use super::*;

    /// Test complete configuration workflow
    #[test]
    fn test_config_lifecycle() -> Result<(), Box<dyn Error>> {
        let dir = tempdir()?;
        let config_path = dir.path().join("config.json");

        let mut settings = Settings::default();
        settings.catalog_url = "https://catalog.example.com/list.json".to_string();
        settings.download_dir = dir.path().join("downloads");
        settings.progress_interval_ms = 250;

        settings.validate()?;
        settings.save(&config_path)?;

        let loaded = Settings::load(&config_path)?;
        assert_eq!(loaded.catalog_url, "https://catalog.example.com/list.json");
        assert_eq!(loaded.download_dir, dir.path().join("downloads"));

        // The loaded values flow into the coordinator's options.
        let options = CoordinatorOptions::from_settings(&loaded);
        assert_eq!(options.progress_interval, Duration::from_millis(250));
        assert_eq!(options.chunk_size, loaded.download_chunk_size);

        let mut updated = loaded;
        updated.catalog_url = "https://other.example.com/list.json".to_string();
        updated.save(&config_path)?;
        assert_eq!(Settings::load(&config_path)?.catalog_url, "https://other.example.com/list.json");

        Ok(())
    }

    /// Test invalid configuration handling
    #[test]
    fn test_invalid_config_validation() {
        let mut settings = Settings::default();
        settings.catalog_url = String::new();
        assert!(matches!(settings.validate(), Err(ConfigError::ValidationError(_))));

        let mut settings = Settings::default();
        settings.progress_interval_ms = 0;
        assert!(settings.validate().is_err());
    }
}
