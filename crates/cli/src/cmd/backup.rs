//! Create a backup

use crate::system_config;
use crate::util;
use anyhow::Result;
use owo_colors::OwoColorize;
use std::path::PathBuf;

/// `setting` is `Some(None)` for the default backup setting file
pub fn run(message: Option<String>, setting: Option<Option<PathBuf>>) -> Result<()> {
    let mut manager = util::open_manager()?;
    let system = system_config::load()?;

    if let Some(file) = setting {
        manager.load_backup_setting(file.as_deref())?;
        println!("{} Loaded backup setting ({} mappings)", "✓".green(), manager.builder().len());
    }

    if manager.builder().is_empty() {
        println!("{} Nothing is mapped, the backup will be empty", "!".yellow());
        println!("  {}", "Add paths with: bkp add <path> [nickname]".dimmed());
    }

    let message = message.unwrap_or_else(|| manager.config().backup.default_message.clone());
    let backup = manager.new_backup(&message)?;

    println!("{} Created backup {}", "✓".green(), backup.id.cyan());
    println!("  {} {}", "Tree:".dimmed(), backup.tree.short().bright_green());
    println!("  {} {}", "Message:".dimmed(), backup.message);

    if system.backup.export_recover_setting {
        let file = manager.create_recover_setting(None)?;
        tracing::debug!("exported recover setting to {}", file.display());
    }
    Ok(())
}
