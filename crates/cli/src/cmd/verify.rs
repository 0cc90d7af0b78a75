//! Integrity check

use crate::util;
use anyhow::Result;
use owo_colors::OwoColorize;

pub fn run() -> Result<()> {
    let manager = util::open_manager()?;

    println!("{}", "Verifying backups...".bold());
    let report = bkp_catalog::verify(&manager);

    println!("  Backups:  {}/{} healthy", report.healthy, manager.history().len());
    println!("  Objects:  {} checked", report.objects);

    if report.is_ok() {
        println!("{} Repository is consistent", "✓".green());
        return Ok(());
    }

    println!();
    println!("{} ({})", "Problems:".red().bold(), report.problems.len());
    for problem in &report.problems {
        println!("  {} {}", "✗".red(), problem);
    }
    anyhow::bail!("Integrity check failed")
}
