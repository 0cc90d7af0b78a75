//! Add a path mapping

use crate::util;
use anyhow::Result;
use owo_colors::OwoColorize;
use std::path::Path;

pub fn run(path: &Path, nickname: Option<&str>) -> Result<()> {
    let mut manager = util::open_manager()?;
    let absolute = util::absolute_path(path)?;

    if !absolute.exists() {
        println!(
            "{} {} does not exist yet, backups will fail until it does",
            "!".yellow(),
            absolute.display()
        );
    }

    let added = match nickname {
        Some(nickname) => manager
            .add_mapping(&absolute, nickname)?
            .then(|| nickname.to_string()),
        None => manager.add_default_mapping(&absolute)?,
    };

    match added {
        Some(nickname) => {
            println!(
                "{} {} {} {}",
                "✓".green(),
                absolute.display(),
                "→".cyan(),
                nickname.yellow()
            );
            Ok(())
        }
        None => {
            if let Some(existing) = manager.builder().nickname(&absolute) {
                println!(
                    "{} {} is already mapped to {}",
                    "!".yellow(),
                    absolute.display(),
                    existing.yellow()
                );
            } else {
                println!("{} Nickname is already in use", "!".yellow());
            }
            anyhow::bail!("Mapping not added")
        }
    }
}
