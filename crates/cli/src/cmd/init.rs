//! Initialize a bkp repository

use anyhow::{Context, Result};
use bkp_catalog::{Layout, Manager};
use owo_colors::OwoColorize;
use std::env;
use std::path::Path;

pub fn run(force: bool) -> Result<()> {
    let current_dir = env::current_dir().context("Failed to get current directory")?;
    run_in(&current_dir, force)
}

pub fn run_in(workspace: &Path, force: bool) -> Result<()> {
    let layout = Layout::new(workspace);

    if layout.manager_file().exists() {
        if !force {
            println!("{}", "Error: bkp already initialized".red());
            println!("Location: {}", layout.root().display());
            println!("{}", "Use --force to reset history and mappings".dimmed());
            anyhow::bail!("Repository already exists");
        }

        let mut manager = Manager::open(workspace)?;
        manager.reset()?;
        println!("{} Reset repository at {}", "✓".green(), layout.root().display());
        println!("  {}", "Stored objects and backup records were kept".dimmed());
        return Ok(());
    }

    let manager = Manager::init(workspace)?;

    println!("{} Initialized bkp repository", "✓".green());
    println!("  Location: {}", manager.layout().root().display().to_string().cyan());
    println!();
    println!("{}", "Next steps:".bold());
    println!("  {} bkp add <path> [nickname]", "→".cyan());
    println!("  {} bkp backup -m \"first backup\"", "→".cyan());
    Ok(())
}
