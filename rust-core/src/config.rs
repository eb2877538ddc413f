//! Client settings
//!
//! Serialized as JSON. Fields use `#[serde(default)]` so a config file only
//! needs the keys it wants to override.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::ports::{port_map_for, PortDirection, PortMapping, DEFAULT_CLIENT};

/// Returns the path to the config file: `~/.config/jacked/config.json`
pub fn config_path() -> PathBuf {
    let mut path = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
    path.push("jacked");
    path.push("config.json");
    path
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Name requested from the JACK server
    pub name: String,
    /// Client whose ports the default maps connect to
    pub remote_client: String,
    pub channels_in: usize,
    pub channels_out: usize,
    /// Ring depth per channel, in server periods
    pub ring_periods: usize,
    /// Longest wait for a process cycle before giving up
    pub process_timeout_ms: u64,
    /// Let libjack spawn a server if none is running
    pub start_server: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            name: "jacked".to_string(),
            remote_client: DEFAULT_CLIENT.to_string(),
            channels_in: 2,
            channels_out: 2,
            ring_periods: 4,
            process_timeout_ms: 2000,
            start_server: false,
        }
    }
}

impl ClientConfig {
    /// Load settings from the default location, falling back to defaults on any error.
    pub fn load() -> Self {
        Self::load_from_or(&config_path(), Self::default())
    }

    /// Load settings from `path`, or return `fallback` when the file is
    /// missing or unreadable
    ///
    /// # Arguments
    /// * `path` - JSON file to read
    /// * `fallback` - Settings used when `path` gives nothing usable
    ///
    /// # Returns
    /// The file's settings whenever it parses, so callers with their own
    /// defaults still honour saved settings
    pub fn load_from_or(path: &Path, fallback: Self) -> Self {
        match Self::load_from(path) {
            Ok(config) => {
                log::info!("Loaded config from {}", path.display());
                config
            }
            Err(e) => {
                log::info!("No usable config at {} ({}), using defaults", path.display(), e);
                fallback
            }
        }
    }

    /// Load settings from an explicit JSON file
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config = serde_json::from_str(&contents)?;
        Ok(config)
    }

    /// Save settings as pretty JSON, creating parent directories
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn process_timeout(&self) -> Duration {
        Duration::from_millis(self.process_timeout_ms)
    }

    pub fn input_map(&self) -> Vec<PortMapping> {
        port_map_for(&self.remote_client, self.channels_in, PortDirection::Input)
    }

    pub fn output_map(&self) -> Vec<PortMapping> {
        port_map_for(&self.remote_client, self.channels_out, PortDirection::Output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: ClientConfig =
            serde_json::from_str(r#"{ "name": "captest", "channels_out": 1 }"#).unwrap();

        assert_eq!(config.name, "captest");
        assert_eq!(config.channels_out, 1);
        assert_eq!(config.channels_in, 2);
        assert_eq!(config.remote_client, "system");
        assert_eq!(config.ring_periods, 4);
        assert!(!config.start_server);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let config = ClientConfig {
            name: "recorder".to_string(),
            process_timeout_ms: 500,
            ..Default::default()
        };
        config.save_to(&path).unwrap();

        let loaded = ClientConfig::load_from(&path).unwrap();
        assert_eq!(loaded, config);
        assert_eq!(loaded.process_timeout(), Duration::from_millis(500));
    }

    #[test]
    fn test_bad_json_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();

        assert!(ClientConfig::load_from(&path).is_err());
    }

    #[test]
    fn test_maps_follow_remote_client() {
        let config = ClientConfig {
            remote_client: "pulse".to_string(),
            channels_in: 1,
            channels_out: 2,
            ..Default::default()
        };

        assert_eq!(config.input_map()[0].remote, "pulse:capture_1");
        assert_eq!(config.output_map()[1].remote, "pulse:playback_2");
    }

    #[test]
    fn test_saved_file_wins_over_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{ "name": "studio", "channels_out": 4 }"#).unwrap();

        let fallback = ClientConfig {
            name: "captest".to_string(),
            channels_out: 1,
            ..Default::default()
        };
        let config = ClientConfig::load_from_or(&path, fallback);

        assert_eq!(config.name, "studio");
        assert_eq!(config.channels_out, 4);
        // keys the file leaves out come from the stock defaults
        assert_eq!(config.channels_in, 2);
    }

    #[test]
    fn test_missing_file_uses_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let fallback = ClientConfig {
            name: "captest".to_string(),
            channels_out: 1,
            ..Default::default()
        };

        let config = ClientConfig::load_from_or(&dir.path().join("absent.json"), fallback.clone());
        assert_eq!(config, fallback);
    }
}
