//! Show backup details

use crate::util;
use anyhow::Result;
use owo_colors::OwoColorize;

pub fn run(backup_ref: Option<&str>, adopt: bool) -> Result<()> {
    let mut manager = util::open_manager()?;
    let id = util::resolve_backup_ref(&manager, backup_ref)?;
    let summary = manager.show(&id)?;
    let backup = &summary.backup;

    println!("{} {}", "backup".yellow().bold(), backup.id.cyan());
    println!(
        "{} {} ({})",
        "Date:    ".dimmed(),
        util::format_absolute_time(backup.ts_unix_ms),
        util::format_relative_time(backup.ts_unix_ms).dimmed()
    );
    println!("{} {}", "Message: ".dimmed(), backup.message);
    println!("{} {}", "Tree:    ".dimmed(), backup.tree.to_hex().bright_green());
    println!("{} {}", "Mapping: ".dimmed(), backup.builder.to_hex().bright_green());

    println!("\n{} ({})", "Captured paths:".bold(), summary.builder.len());
    for (path, nickname) in summary.builder.iter() {
        println!("  {} {} {}", path, "→".cyan(), nickname.yellow());
    }

    println!("\n{}", "Contents:".bold());
    for line in summary.listing.lines() {
        println!("  {}", line);
    }

    if adopt {
        manager.adopt_backup_setting(&id)?;
        let backup_file = manager.create_backup_setting(None)?;
        let recover_file = manager.create_recover_setting(None)?;
        println!();
        println!("{} Adopted mapping of {}", "✓".green(), id.cyan());
        println!("  {} {}", "→".cyan(), backup_file.display());
        println!("  {} {}", "→".cyan(), recover_file.display());
    }
    Ok(())
}
