//! Import and export setting files

use crate::util;
use anyhow::Result;
use clap::ValueEnum;
use owo_colors::OwoColorize;
use std::path::PathBuf;

/// Which mapping a setting file holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SettingKind {
    /// `path => nickname`
    Backup,
    /// `nickname => path`
    Recover,
}

pub fn export(kind: SettingKind, file: Option<PathBuf>) -> Result<()> {
    let manager = util::open_manager()?;
    let written = match kind {
        SettingKind::Backup => manager.create_backup_setting(file.as_deref())?,
        SettingKind::Recover => manager.create_recover_setting(file.as_deref())?,
    };
    println!("{} Wrote {}", "✓".green(), written.display());
    Ok(())
}

/// Importing a backup setting also replaces the recover mapping with its inverse
pub fn import(kind: SettingKind, file: Option<PathBuf>) -> Result<()> {
    let mut manager = util::open_manager()?;
    match kind {
        SettingKind::Backup => {
            manager.load_backup_setting(file.as_deref())?;
            println!(
                "{} Loaded backup setting ({} mappings)",
                "✓".green(),
                manager.builder().len()
            );
            println!("  {}", "Recover mapping reset to match".dimmed());
        }
        SettingKind::Recover => {
            manager.load_recover_setting(file.as_deref())?;
            println!(
                "{} Loaded recover setting ({} mappings)",
                "✓".green(),
                manager.restorer().len()
            );
        }
    }
    Ok(())
}
