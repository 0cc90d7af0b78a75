//! Print active mappings

use crate::util;
use anyhow::Result;
use owo_colors::OwoColorize;

pub fn run() -> Result<()> {
    let manager = util::open_manager()?;

    println!("{}", "Backup mapping (path → nickname):".bold());
    if manager.builder().is_empty() {
        println!("  {}", "(empty)".dimmed());
    }
    for (path, nickname) in manager.builder().iter() {
        println!("  {} {} {}", path, "→".cyan(), nickname.yellow());
    }

    println!();
    println!("{}", "Recover mapping (nickname → path):".bold());
    if manager.restorer().is_empty() {
        println!("  {}", "(empty)".dimmed());
    }
    for (nickname, path) in manager.restorer().iter() {
        println!("  {} {} {}", nickname.yellow(), "→".cyan(), path);
    }
    Ok(())
}
