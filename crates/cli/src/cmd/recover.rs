//! Recover a backup

use crate::util;
use anyhow::Result;
use bkp_core::RestoreReport;
use owo_colors::OwoColorize;
use std::path::PathBuf;

pub fn run(
    backup_ref: Option<&str>,
    setting: Option<Option<PathBuf>>,
    captured: bool,
    to: Option<PathBuf>,
) -> Result<()> {
    let mut manager = util::open_manager()?;
    let id = util::resolve_backup_ref(&manager, backup_ref)?;

    if let Some(target) = to {
        let target = util::absolute_path(&target)?;
        manager.restore_all(&id, &target)?;
        println!(
            "{} Restored backup {} into {}",
            "✓".green(),
            id.cyan(),
            target.display()
        );
        return Ok(());
    }

    let report = if captured {
        manager.recover_captured(&id)?
    } else {
        if let Some(file) = setting {
            manager.load_recover_setting(file.as_deref())?;
            println!(
                "{} Loaded recover setting ({} mappings)",
                "✓".green(),
                manager.restorer().len()
            );
        }
        manager.recover(&id)?
    };

    print_report(&id, &report);
    Ok(())
}

fn print_report(id: &str, report: &RestoreReport) {
    println!(
        "{} Recovered {} ({} restored)",
        "✓".green(),
        id.cyan(),
        report.restored.len()
    );
    for nickname in &report.restored {
        println!("  {} {}", "→".cyan(), nickname);
    }
    for nickname in &report.missing {
        println!("  {} {} {}", "!".yellow(), nickname, "(not in this backup)".dimmed());
    }
}
