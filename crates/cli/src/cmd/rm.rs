//! Remove a path mapping

use crate::util;
use anyhow::Result;
use owo_colors::OwoColorize;
use std::path::Path;

pub fn run(path: &Path) -> Result<()> {
    let mut manager = util::open_manager()?;
    let absolute = util::absolute_path(path)?;

    // Mappings may have been added with the path as typed
    let removed = match manager.remove_mapping(&absolute)? {
        Some(nickname) => Some(nickname),
        None => manager.remove_mapping(path)?,
    };

    match removed {
        Some(nickname) => {
            println!("{} Removed {} ({})", "✓".green(), absolute.display(), nickname.dimmed());
            Ok(())
        }
        None => anyhow::bail!("{} is not mapped", absolute.display()),
    }
}
