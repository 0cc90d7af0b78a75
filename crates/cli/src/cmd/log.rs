//! Display backup history

use crate::system_config;
use crate::util;
use anyhow::Result;
use owo_colors::OwoColorize;

pub fn run(limit: Option<usize>) -> Result<()> {
    let manager = util::open_manager()?;
    let limit = match limit {
        Some(limit) => limit,
        None => system_config::load()?.log.default_limit,
    };

    let history = manager.history();
    if history.is_empty() {
        println!("{}", "No backups yet".dimmed());
        println!();
        println!("{}", "Tip: bkp backup -m \"message\"".dimmed());
        return Ok(());
    }

    println!("{} ({} total)", "Backups:".bold(), history.len());
    for id in history.iter().rev().take(limit) {
        match manager.backup(id) {
            Ok(backup) => println!(
                "  {}  {}  {}",
                backup.id.cyan(),
                util::format_relative_time(backup.ts_unix_ms).dimmed(),
                backup.message
            ),
            Err(e) => println!("  {}  {} {:#}", id.cyan(), "unreadable:".red(), e),
        }
    }

    if history.len() > limit {
        println!("  {} ({} older backups)", "...".dimmed(), history.len() - limit);
    }
    Ok(())
}
