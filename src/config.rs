// Copyright 2026 Daniel Pelikan
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Configuration module.
//!
//! Handles loading and saving application settings.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::location::GeoPoint;

const APP_DIR: &str = "fuelwatch";

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Data directory for the settings store.
    #[serde(skip)]
    pub data_dir: PathBuf,

    /// OBD-II link settings.
    #[serde(default)]
    pub obd: ObdConfig,

    /// Fixed vehicle location used for the gas station search.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<GeoPoint>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObdConfig {
    /// Look up the SPP service record before dialing `rfcomm_channel`.
    pub service_lookup: bool,

    /// RFCOMM channel used when the service lookup is off or fails.
    pub rfcomm_channel: u8,

    /// Seconds between fuel queries.
    pub poll_interval_secs: u64,

    /// Seconds to wait after a failed connection attempt.
    pub reconnect_delay_secs: u64,

    /// Threshold written to the store on first run.
    pub default_fuel_threshold: u32,
}

impl Default for ObdConfig {
    fn default() -> Self {
        Self {
            service_lookup: true,
            rfcomm_channel: 1,
            poll_interval_secs: 30,
            reconnect_delay_secs: 5,
            default_fuel_threshold: crate::storage::DEFAULT_FUEL_THRESHOLD,
        }
    }
}

impl ObdConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_secs(self.reconnect_delay_secs)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(APP_DIR),
            obd: ObdConfig::default(),
            location: None,
        }
    }
}

impl Config {
    /// Load configuration from file or create default.
    pub fn load() -> Result<Self> {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR);

        let mut config = Self::load_from(&config_dir.join("config.toml"))?;

        // Set data directory
        config.data_dir = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR);
        std::fs::create_dir_all(&config.data_dir)?;

        Ok(config)
    }

    /// Load from an explicit path, writing defaults if it does not exist.
    pub fn load_from(config_path: &Path) -> Result<Self> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let config = if config_path.exists() {
            let content = std::fs::read_to_string(config_path)?;
            toml::from_str(&content)?
        } else {
            let config = Self::default();
            let content = toml::to_string_pretty(&config)?;
            std::fs::write(config_path, content)?;
            config
        };

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_written_on_first_load() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join("config.toml");

        let config = Config::load_from(&path)?;
        assert!(path.exists());
        assert_eq!(config.obd.poll_interval(), Duration::from_secs(30));
        assert_eq!(config.obd.reconnect_delay(), Duration::from_secs(5));
        assert_eq!(config.obd.rfcomm_channel, 1);
        assert!(config.obd.service_lookup);
        assert!(config.location.is_none());

        Ok(())
    }

    #[test]
    fn test_partial_file_uses_defaults() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[obd]\npoll_interval_secs = 10\nservice_lookup = false\n\n[location]\nlatitude = 1.5\nlongitude = -2.0\n",
        )?;

        let config = Config::load_from(&path)?;
        assert_eq!(config.obd.poll_interval_secs, 10);
        assert_eq!(config.obd.reconnect_delay_secs, 5);
        assert!(!config.obd.service_lookup);
        assert_eq!(
            config.location,
            Some(GeoPoint {
                latitude: 1.5,
                longitude: -2.0
            })
        );

        Ok(())
    }
}
