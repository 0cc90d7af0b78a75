//! On-disk repository layout
//!
//! ```text
//! <workspace>/
//!   .bkp/
//!     config.toml
//!     manager
//!     objects/
//!     backups/
//!     settings/
//!       backup
//!       recover
//!     tmp/
//! ```

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Name of the repository directory inside a workspace
pub const REPO_DIR: &str = ".bkp";

#[derive(Debug, Clone)]
pub struct Layout {
    workspace: PathBuf,
    root: PathBuf,
}

impl Layout {
    pub fn new(workspace: &Path) -> Self {
        Self {
            workspace: workspace.to_path_buf(),
            root: workspace.join(REPO_DIR),
        }
    }

    /// Directory relative mapped paths resolve against
    pub fn workspace(&self) -> &Path {
        &self.workspace
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn objects(&self) -> PathBuf {
        self.root.join("objects")
    }

    pub fn backups(&self) -> PathBuf {
        self.root.join("backups")
    }

    pub fn settings(&self) -> PathBuf {
        self.root.join("settings")
    }

    pub fn tmp(&self) -> PathBuf {
        self.root.join("tmp")
    }

    pub fn manager_file(&self) -> PathBuf {
        self.root.join("manager")
    }

    pub fn config_file(&self) -> PathBuf {
        self.root.join("config.toml")
    }

    /// Default Builder setting file
    pub fn backup_setting(&self) -> PathBuf {
        self.settings().join("backup")
    }

    /// Default Restorer setting file
    pub fn recover_setting(&self) -> PathBuf {
        self.settings().join("recover")
    }

    pub fn create_dirs(&self) -> Result<()> {
        for dir in [
            self.root.clone(),
            self.objects(),
            self.backups(),
            self.settings(),
            self.tmp(),
        ] {
            std::fs::create_dir_all(&dir)
                .with_context(|| format!("Failed to create {}", dir.display()))?;
        }
        Ok(())
    }

    /// Check the directories `create_dirs` makes are all present
    pub fn validate(&self) -> Result<()> {
        if !self.root.is_dir() {
            anyhow::bail!(
                "Not a bkp repository (no {} directory in {})",
                REPO_DIR,
                self.workspace.display()
            );
        }
        for dir in [self.objects(), self.backups(), self.settings()] {
            if !dir.is_dir() {
                anyhow::bail!("Repository is missing {}", dir.display());
            }
        }
        Ok(())
    }
}
