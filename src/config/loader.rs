use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::config::types::Config;
use crate::persistence::{FileStorage, MirrorOptions};

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file '{path}': {source}")]
    ParseError {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Config validation failed: {message}")]
    ValidationError { message: String },
}

impl Config {
    /// Returns the path to the configuration file.
    ///
    /// Uses `~/.config/teamhub/config.toml` on Unix,
    /// or equivalent on other platforms via `dirs::config_dir()`.
    pub fn config_path() -> PathBuf {
        let config_dir = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        config_dir.join("teamhub").join("config.toml")
    }

    /// Loads configuration from the default config file.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_path())
    }

    /// Loads configuration from `path`.
    ///
    /// - If the file doesn't exist, returns `Config::default()`.
    /// - Otherwise parses it as TOML and validates.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file; using defaults");
            return Ok(Config::default());
        }

        let content = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration.
    ///
    /// Checks:
    /// - The debounce window is not zero
    /// - An explicit storage directory is not empty
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.persistence.debounce_ms == 0 {
            return Err(ConfigError::ValidationError {
                message: "persistence.debounce_ms must be greater than 0".to_string(),
            });
        }

        if let Some(dir) = &self.persistence.directory {
            if dir.as_os_str().is_empty() {
                return Err(ConfigError::ValidationError {
                    message: "persistence.directory must not be empty".to_string(),
                });
            }
        }

        Ok(())
    }

    pub fn storage(&self) -> FileStorage {
        match &self.persistence.directory {
            Some(dir) => FileStorage::new(dir),
            None => FileStorage::new(FileStorage::default_dir()),
        }
    }

    pub fn mirror_options(&self) -> MirrorOptions {
        MirrorOptions::debounce_ms(self.persistence.debounce_ms)
    }
}
