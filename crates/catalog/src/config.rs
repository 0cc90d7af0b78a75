//! Repository configuration
//!
//! Stored at `.bkp/config.toml`. Every field has a default, so a missing
//! file or a partial one is fine:
//! ```toml
//! [store]
//! compression_threshold = 1000000000
//! compression_level = 3
//!
//! [backup]
//! default_message = "New Backup"
//! ```

use anyhow::{Context, Result};
use bkp_core::store::DEFAULT_COMPRESSION_THRESHOLD;
use bkp_core::StoreOptions;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub store: StoreConfig,
    pub backup: BackupConfig,
}

/// Object store tunables
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Files of at least this many bytes are stored verbatim (default: 1 GB).
    /// Applies to new objects only; stored objects keep their encoding.
    pub compression_threshold: u64,

    /// zstd level for compressed objects (default: 3)
    pub compression_level: i32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            compression_threshold: DEFAULT_COMPRESSION_THRESHOLD,
            compression_level: bkp_core::codec::DEFAULT_LEVEL,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackupConfig {
    /// Message used when `bkp backup` is run without `-m`
    pub default_message: String,
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            default_message: "New Backup".to_string(),
        }
    }
}

impl Config {
    /// Load from `path`, falling back to defaults if the file does not exist
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!("no config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))
    }

    pub fn store_options(&self) -> StoreOptions {
        StoreOptions {
            compression_threshold: self.store.compression_threshold,
            compression_level: self.store.compression_level,
        }
    }
}
