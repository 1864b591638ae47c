//! Configuration management for traveljournal.
//!
//! This module provides configuration loading and validation using figment,
//! supporting TOML config files, environment variables, and defaults.

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::live::SortPolicy;

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Default data directory name.
const DATA_DIR_NAME: &str = "traveljournal";

/// Default database file name.
const DATABASE_FILE_NAME: &str = "journal.db";

/// Application configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. Environment variables (prefixed with `TRAVELJOURNAL_`)
/// 2. TOML config file at `~/.config/traveljournal/config.toml`
/// 3. Default values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Collection store configuration.
    pub store: StoreConfig,
    /// Maps and directions configuration.
    pub maps: MapsConfig,
    /// List presentation configuration.
    pub view: ViewConfig,
}

/// Collection store configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Path to the database file.
    /// Defaults to `~/.local/share/traveljournal/journal.db`
    pub database_path: Option<PathBuf>,
    /// Collection holding location records.
    pub collection: String,
    /// Collection holding expenses.
    pub expense_collection: String,
    /// How often to check for writes committed by other processes.
    /// Set to 0 to disable.
    pub poll_interval_ms: u64,
}

/// Maps-related configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapsConfig {
    /// Host used for turn-by-turn directions links.
    pub provider_host: String,
    /// Directions API endpoint.
    pub directions_endpoint: String,
    /// API key for the directions endpoint. Route planning is skipped without one.
    pub api_key: Option<String>,
    /// Travel mode passed to the directions endpoint.
    pub travel_mode: String,
    /// Request timeout for the directions endpoint in seconds.
    pub request_timeout_secs: u64,
}

/// List presentation configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewConfig {
    /// Display order for collection snapshots.
    pub sort: SortPolicy,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database_path: None, // Will be resolved to default at runtime
            collection: "points".to_string(),
            expense_collection: "expenses".to_string(),
            poll_interval_ms: 500,
        }
    }
}

impl Default for MapsConfig {
    fn default() -> Self {
        Self {
            provider_host: "www.google.com".to_string(),
            directions_endpoint: "https://maps.googleapis.com/maps/api/directions/json"
                .to_string(),
            api_key: None,
            travel_mode: "driving".to_string(),
            request_timeout_secs: 10,
        }
    }
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration with an optional custom config path.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);

        let figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_file).nested())
            .merge(Env::prefixed("TRAVELJOURNAL_").split("__"));

        let config: Config = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default configuration file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(DATA_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Get the default data directory path.
    #[must_use]
    pub fn default_data_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from(".local/share"))
            .join(DATA_DIR_NAME)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        for (key, name) in [
            ("collection", &self.store.collection),
            ("expense_collection", &self.store.expense_collection),
        ] {
            if name.trim().is_empty() || name.contains('/') {
                return Err(Error::ConfigValidation {
                    message: format!("{key} must be a non-empty name without '/', got '{name}'"),
                });
            }
        }

        if self.store.collection == self.store.expense_collection {
            return Err(Error::ConfigValidation {
                message: "collection and expense_collection must differ".to_string(),
            });
        }

        if self.maps.provider_host.trim().is_empty() {
            return Err(Error::ConfigValidation {
                message: "provider_host must not be empty".to_string(),
            });
        }

        if self.maps.request_timeout_secs == 0 {
            return Err(Error::ConfigValidation {
                message: "request_timeout_secs must be greater than 0".to_string(),
            });
        }

        Ok(())
    }

    /// Get the database path, resolving defaults if not set.
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        self.store
            .database_path
            .clone()
            .unwrap_or_else(|| Self::default_data_dir().join(DATABASE_FILE_NAME))
    }

    /// Get the external change poll interval, if enabled.
    #[must_use]
    pub fn poll_interval(&self) -> Option<Duration> {
        if self.store.poll_interval_ms == 0 {
            None
        } else {
            Some(Duration::from_millis(self.store.poll_interval_ms))
        }
    }

    /// Get the directions request timeout as a Duration.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.maps.request_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_store_config() {
        let store = StoreConfig::default();

        assert!(store.database_path.is_none());
        assert_eq!(store.collection, "points");
        assert_eq!(store.expense_collection, "expenses");
        assert_eq!(store.poll_interval_ms, 500);
    }

    #[test]
    fn test_default_maps_config() {
        let maps = MapsConfig::default();

        assert_eq!(maps.provider_host, "www.google.com");
        assert!(maps.api_key.is_none());
        assert_eq!(maps.travel_mode, "driving");
        assert_eq!(maps.request_timeout_secs, 10);
    }

    #[test]
    fn test_default_view_sorts_by_creation() {
        assert_eq!(ViewConfig::default().sort, SortPolicy::Creation);
    }

    #[test]
    fn test_validate_valid_config() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_validate_nested_collection_name() {
        let mut config = Config::default();
        config.store.collection = "points/nested".to_string();

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("collection"));
    }

    #[test]
    fn test_validate_same_collections() {
        let mut config = Config::default();
        config.store.expense_collection = "points".to_string();

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("must differ"));
    }

    #[test]
    fn test_validate_empty_provider_host() {
        let mut config = Config::default();
        config.maps.provider_host = " ".to_string();

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_zero_timeout() {
        let mut config = Config::default();
        config.maps.request_timeout_secs = 0;

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("request_timeout_secs"));
    }

    #[test]
    fn test_database_path_default() {
        let path = Config::default().database_path();
        assert!(path.to_string_lossy().contains("journal.db"));
    }

    #[test]
    fn test_database_path_custom() {
        let mut config = Config::default();
        config.store.database_path = Some(PathBuf::from("/custom/path/db.sqlite"));

        assert_eq!(
            config.database_path(),
            PathBuf::from("/custom/path/db.sqlite")
        );
    }

    #[test]
    fn test_poll_interval() {
        let mut config = Config::default();
        assert_eq!(config.poll_interval(), Some(Duration::from_millis(500)));

        config.store.poll_interval_ms = 0;
        assert!(config.poll_interval().is_none());
    }

    #[test]
    fn test_request_timeout() {
        assert_eq!(Config::default().request_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_default_config_path() {
        let path = Config::default_config_path();
        assert!(path.to_string_lossy().contains("traveljournal"));
        assert!(path.to_string_lossy().contains("config.toml"));
    }

    #[test]
    fn test_load_nonexistent_config() {
        let config = Config::load_from(Some(PathBuf::from("/nonexistent/config.toml"))).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_view_config_deserialize() {
        let view: ViewConfig = serde_json::from_str(r#"{"sort": "name"}"#).unwrap();
        assert_eq!(view.sort, SortPolicy::Name);
    }

    #[test]
    fn test_store_config_deserialize() {
        let json = r#"{"collection": "trips", "poll_interval_ms": 0}"#;
        let store: StoreConfig = serde_json::from_str(json).unwrap();
        assert_eq!(store.collection, "trips");
        assert_eq!(store.expense_collection, "expenses");
        assert_eq!(store.poll_interval_ms, 0);
    }
}
