//! Shared helpers for CLI commands

use anyhow::{Context, Result};
use bkp_catalog::{Manager, REPO_DIR};
use chrono::{Local, TimeZone};
use std::path::{Path, PathBuf};

/// Walk up from the current directory to the workspace holding `.bkp`
pub fn find_repo_root() -> Result<PathBuf> {
    let current = std::env::current_dir().context("Failed to get current directory")?;
    find_repo_root_from(&current)
}

pub fn find_repo_root_from(start: &Path) -> Result<PathBuf> {
    let mut current = start.to_path_buf();
    loop {
        if current.join(REPO_DIR).is_dir() {
            return Ok(current);
        }
        match current.parent() {
            Some(parent) => current = parent.to_path_buf(),
            None => anyhow::bail!("Not a bkp repository (no {} directory found)", REPO_DIR),
        }
    }
}

/// Open the manager of the enclosing repository
pub fn open_manager() -> Result<Manager> {
    let root = find_repo_root().context("Failed to find repository")?;
    Manager::open(&root)
}

/// Resolve a backup reference to a history id
///
/// Accepts nothing or `latest` for the newest backup, `latest~N` for the
/// Nth before it, a full id, or a unique id prefix.
pub fn resolve_backup_ref(manager: &Manager, reference: Option<&str>) -> Result<String> {
    let history = manager.history();
    if history.is_empty() {
        anyhow::bail!("No backups yet");
    }

    let reference = reference.unwrap_or("latest");
    if reference == "latest" {
        return Ok(history[history.len() - 1].clone());
    }
    if let Some(back) = reference.strip_prefix("latest~") {
        let back: usize = back
            .parse()
            .with_context(|| format!("Invalid backup reference: '{}'", reference))?;
        return history
            .len()
            .checked_sub(back)
            .and_then(|i| i.checked_sub(1))
            .map(|i| history[i].clone())
            .with_context(|| format!("Only {} backup(s) in history", history.len()));
    }

    if history.iter().any(|id| id == reference) {
        return Ok(reference.to_string());
    }

    let matches: Vec<&String> = history.iter().filter(|id| id.starts_with(reference)).collect();
    match matches.as_slice() {
        [one] => Ok((*one).clone()),
        [] => anyhow::bail!("Unknown backup reference: '{}'", reference),
        many => anyhow::bail!(
            "Ambiguous backup reference '{}' matches {} backups",
            reference,
            many.len()
        ),
    }
}

/// Make a user-supplied path absolute without requiring it to exist
pub fn absolute_path(path: &Path) -> Result<PathBuf> {
    if let Ok(canonical) = std::fs::canonicalize(path) {
        return Ok(canonical);
    }
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    Ok(std::env::current_dir()
        .context("Failed to get current directory")?
        .join(path))
}

/// Format timestamp as relative time ("2 hours ago")
pub fn format_relative_time(ts_ms: u64) -> String {
    let now = bkp_catalog::backup::current_timestamp_ms();
    let Some(elapsed_ms) = now.checked_sub(ts_ms) else {
        return "in the future".to_string();
    };
    let seconds = elapsed_ms / 1000;

    if seconds < 60 {
        format!("{} seconds ago", seconds)
    } else if seconds < 3600 {
        format!("{} minutes ago", seconds / 60)
    } else if seconds < 86400 {
        format!("{} hours ago", seconds / 3600)
    } else if seconds < 604800 {
        format!("{} days ago", seconds / 86400)
    } else {
        format!("{} weeks ago", seconds / 604800)
    }
}

/// Format timestamp as local time ("2024-01-03 14:30:00")
pub fn format_absolute_time(ts_ms: u64) -> String {
    match Local.timestamp_millis_opt(ts_ms as i64).single() {
        Some(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
        None => format!("@{}", ts_ms),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_find_repo_root_walks_up() -> Result<()> {
        let temp = TempDir::new()?;
        std::fs::create_dir_all(temp.path().join(".bkp"))?;
        std::fs::create_dir_all(temp.path().join("a/b/c"))?;

        let found = find_repo_root_from(&temp.path().join("a/b/c"))?;
        assert_eq!(found, temp.path());
        Ok(())
    }

    #[test]
    fn test_resolve_backup_ref() -> Result<()> {
        let temp = TempDir::new()?;
        std::fs::write(temp.path().join("f.txt"), b"f")?;
        let mut manager = Manager::init(temp.path())?;
        assert!(resolve_backup_ref(&manager, None).is_err());

        manager.add_mapping(Path::new("f.txt"), "f")?;
        let first = manager.new_backup("one")?.id;
        let second = manager.new_backup("two")?.id;

        assert_eq!(resolve_backup_ref(&manager, None)?, second);
        assert_eq!(resolve_backup_ref(&manager, Some("latest~1"))?, first);
        assert!(resolve_backup_ref(&manager, Some("latest~2")).is_err());
        let far_back = format!("latest~{}", usize::MAX);
        assert!(resolve_backup_ref(&manager, Some(&far_back)).is_err());
        assert_eq!(resolve_backup_ref(&manager, Some(&first))?, first);
        assert_eq!(resolve_backup_ref(&manager, Some(&second))?, second);
        assert!(resolve_backup_ref(&manager, Some("1999")).is_err());
        Ok(())
    }

    #[test]
    fn test_format_relative_time() {
        let now = bkp_catalog::backup::current_timestamp_ms();
        assert!(format_relative_time(now).ends_with("seconds ago"));
        assert_eq!(format_relative_time(now - 2 * 3600 * 1000), "2 hours ago");
        assert_eq!(format_relative_time(now + 60_000), "in the future");
    }
}
