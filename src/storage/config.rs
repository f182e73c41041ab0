//! Application configuration.
//!
//! Loaded from `config.toml` in the platform data directory. Every section
//! is optional; missing keys take their defaults.

use crate::metrics::calculator::StatisticsSettings;
use crate::rides::types::{CachePolicy, MissingCrankPolicy};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Application version
    pub version: String,
    /// Data directory path
    #[serde(skip)]
    pub data_dir: PathBuf,
    /// Storage settings
    pub storage: StorageSettings,
    /// Statistics thresholds and conversions
    pub statistics: StatisticsSettings,
    /// Ingestion settings
    pub ingest: IngestSettings,
    /// Summary cache settings
    pub cache: CacheSettings,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            data_dir: PathBuf::new(),
            storage: StorageSettings::default(),
            statistics: StatisticsSettings::default(),
            ingest: IngestSettings::default(),
            cache: CacheSettings::default(),
        }
    }
}

impl AppConfig {
    /// Resolved database path. Relative paths are taken from the data directory.
    pub fn database_path(&self) -> PathBuf {
        if self.storage.database_file.is_absolute() {
            self.storage.database_file.clone()
        } else {
            self.data_dir.join(&self.storage.database_file)
        }
    }
}

/// Storage-related settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// SQLite database file
    pub database_file: PathBuf,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            database_file: PathBuf::from("rides.db"),
        }
    }
}

/// Ingestion-related settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestSettings {
    /// Crank columns for packets without crank data
    pub missing_crank: MissingCrankPolicy,
}

/// Summary cache settings.
///
/// The default `tracked` policy serves a stored summary only while no sample
/// has been added since it was computed. Set `policy = "legacy_distance"` to
/// serve any stored summary with a non-zero distance instead, recomputing
/// zero-distance rides on every read.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// When a stored summary is served without recomputation
    pub policy: CachePolicy,
}

/// Get the application data directory.
pub fn get_data_dir() -> PathBuf {
    directories::ProjectDirs::from("com", "ridestat", "RideStat")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Get the configuration file path.
pub fn get_config_path() -> PathBuf {
    get_data_dir().join("config.toml")
}

/// Load application configuration from the default location.
pub fn load_config() -> Result<AppConfig, ConfigError> {
    load_config_from(&get_config_path(), get_data_dir())
}

/// Load application configuration from a file.
///
/// A missing file yields the defaults.
pub fn load_config_from(path: &Path, data_dir: PathBuf) -> Result<AppConfig, ConfigError> {
    if !path.exists() {
        tracing::debug!("No config at {}, using defaults", path.display());
        return Ok(AppConfig {
            data_dir,
            ..Default::default()
        });
    }

    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::IoError(e.to_string()))?;

    let mut config: AppConfig =
        toml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))?;

    config.data_dir = data_dir;

    Ok(config)
}

/// Save application configuration to a file.
pub fn save_config(config: &AppConfig, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| ConfigError::IoError(e.to_string()))?;
    }

    let content =
        toml::to_string_pretty(config).map_err(|e| ConfigError::SerializeError(e.to_string()))?;

    std::fs::write(path, content).map_err(|e| ConfigError::IoError(e.to_string()))?;

    Ok(())
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Serialize error: {0}")]
    SerializeError(String),
}
