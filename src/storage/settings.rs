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

//! Key/value settings store.
//!
//! Single-key reads and writes are atomic. Nothing is transactional across keys.

use anyhow::Result;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Key holding the selected adapter's hardware address.
pub const KEY_MAC_ADDRESS: &str = "MAC_ADDRESS";

/// Key holding the low-fuel threshold in percent.
pub const KEY_LOW_FUEL: &str = "LOW_FUEL";

/// Threshold used when `LOW_FUEL` is absent or not a number.
pub const DEFAULT_FUEL_THRESHOLD: u32 = 20;

/// Hardware address of the chosen OBD-II adapter.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceAddress(String);

impl DeviceAddress {
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Durable string key/value storage.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn clear(&self) -> Result<()>;
}

/// Read the low-fuel threshold, falling back to the default.
pub fn fuel_threshold(store: &dyn KeyValueStore) -> u32 {
    match store.get(KEY_LOW_FUEL) {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("Ignoring unparseable {} value {:?}", KEY_LOW_FUEL, raw);
            DEFAULT_FUEL_THRESHOLD
        }),
        None => DEFAULT_FUEL_THRESHOLD,
    }
}

/// Settings persisted as a JSON object on disk.
pub struct FileStore {
    path: PathBuf,
    values: Mutex<HashMap<String, String>>,
}

impl FileStore {
    /// Create or open the settings file in `data_dir`.
    pub fn new(data_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(data_dir)?;
        let path = data_dir.join("settings.json");
        let values = if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            serde_json::from_str(&content)?
        } else {
            HashMap::new()
        };
        debug!("Opened settings store at {:?}", path);

        Ok(Self {
            path,
            values: Mutex::new(values),
        })
    }

    fn save(&self, values: &HashMap<String, String>) -> Result<()> {
        let content = serde_json::to_string_pretty(values)?;
        // Replace atomically.
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, content)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.lock().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut values = self.values.lock();
        let mut updated = values.clone();
        updated.insert(key.to_string(), value.to_string());
        // Memory only changes once the file does.
        self.save(&updated)?;
        *values = updated;
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        let mut values = self.values.lock();
        let cleared = HashMap::new();
        self.save(&cleared)?;
        *values = cleared;
        Ok(())
    }
}

/// In-memory store, used when nothing should touch the disk.
#[derive(Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(entries: &[(&str, &str)]) -> Self {
        let values = entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Self {
            values: Mutex::new(values),
        }
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.lock().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.values.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        self.values.lock().clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_file_store_persists_across_reopen() -> Result<()> {
        let temp_dir = TempDir::new()?;

        let store = FileStore::new(temp_dir.path())?;
        store.set(KEY_MAC_ADDRESS, "00:1D:A5:68:98:8B")?;
        drop(store);

        let reopened = FileStore::new(temp_dir.path())?;
        assert_eq!(
            reopened.get(KEY_MAC_ADDRESS).as_deref(),
            Some("00:1D:A5:68:98:8B")
        );
        assert_eq!(reopened.get(KEY_LOW_FUEL), None);

        Ok(())
    }

    #[test]
    fn test_file_store_clear() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let store = FileStore::new(temp_dir.path())?;
        store.set(KEY_LOW_FUEL, "15")?;
        store.clear()?;

        assert_eq!(store.get(KEY_LOW_FUEL), None);
        assert_eq!(FileStore::new(temp_dir.path())?.get(KEY_LOW_FUEL), None);

        Ok(())
    }

    #[test]
    fn test_failed_save_leaves_values_unchanged() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let data_dir = temp_dir.path().join("fuelwatch");
        let store = FileStore::new(&data_dir)?;
        store.set(KEY_LOW_FUEL, "15")?;

        std::fs::remove_dir_all(&data_dir)?;

        assert!(store.set(KEY_MAC_ADDRESS, "00:1D:A5:68:98:8B").is_err());
        assert_eq!(store.get(KEY_MAC_ADDRESS), None);

        assert!(store.clear().is_err());
        assert_eq!(store.get(KEY_LOW_FUEL).as_deref(), Some("15"));

        Ok(())
    }

    #[test]
    fn test_fuel_threshold_defaults() {
        assert_eq!(fuel_threshold(&MemoryStore::new()), DEFAULT_FUEL_THRESHOLD);
        assert_eq!(
            fuel_threshold(&MemoryStore::with(&[(KEY_LOW_FUEL, "abc")])),
            DEFAULT_FUEL_THRESHOLD
        );
        assert_eq!(fuel_threshold(&MemoryStore::with(&[(KEY_LOW_FUEL, " 35 ")])), 35);
    }
}
