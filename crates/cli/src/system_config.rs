//! User-wide configuration for bkp
//!
//! Stored at `~/.config/bkp/config.toml` (Linux/macOS) or
//! `%APPDATA%\bkp\config.toml` (Windows). Repository settings such as the
//! compression threshold live in `.bkp/config.toml` instead.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemConfig {
    pub log: LogConfig,
    pub backup: BackupDefaults,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Backups shown by `bkp log` without `--limit` (default: 20)
    pub default_limit: usize,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self { default_limit: 20 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackupDefaults {
    /// Write `settings/recover` after every backup (default: true)
    pub export_recover_setting: bool,
}

impl Default for BackupDefaults {
    fn default() -> Self {
        Self {
            export_recover_setting: true,
        }
    }
}

pub fn config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "macos")]
    {
        dirs::home_dir().map(|h| h.join(".config/bkp"))
    }

    #[cfg(not(target_os = "macos"))]
    {
        dirs::config_dir().map(|c| c.join("bkp"))
    }
}

pub fn config_file_path() -> Option<PathBuf> {
    config_dir().map(|d| d.join("config.toml"))
}

/// Load the user config, falling back to defaults when there is none
pub fn load() -> Result<SystemConfig> {
    let Some(config_path) = config_file_path() else {
        tracing::debug!("could not determine config directory, using defaults");
        return Ok(SystemConfig::default());
    };

    if !config_path.exists() {
        tracing::debug!("system config not found at {}, using defaults", config_path.display());
        return Ok(SystemConfig::default());
    }

    let content = fs::read_to_string(&config_path)
        .with_context(|| format!("Failed to read system config at {}", config_path.display()))?;
    let config: SystemConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse system config at {}", config_path.display()))?;

    tracing::debug!("loaded system config from {}", config_path.display());
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SystemConfig::default();
        assert_eq!(config.log.default_limit, 20);
        assert!(config.backup.export_recover_setting);
    }

    #[test]
    fn test_partial_toml() -> Result<()> {
        let config: SystemConfig = toml::from_str("[log]\ndefault_limit = 5\n")?;
        assert_eq!(config.log.default_limit, 5);
        assert!(config.backup.export_recover_setting);
        Ok(())
    }
}
