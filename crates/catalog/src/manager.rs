//! Backup catalog
//!
//! A [`Manager`] is opened over a workspace and owns the repository state:
//! the ordered backup history plus the active Builder and Restorer. Every
//! mutating call writes the whole [`ManagerState`] back to `.bkp/manager`
//! before returning, through a temp file and rename.

use crate::backup::{self, Backup};
use crate::config::Config;
use crate::layout::Layout;
use crate::recovery;
use anyhow::{Context, Result};
use bkp_core::{atomic_write, default_nickname, Builder, ObjectStore, RestoreReport, Restorer, Tree};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Everything the manager persists
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagerState {
    /// Backup ids, oldest first
    pub history: Vec<String>,
    pub builder: Builder,
    pub restorer: Restorer,
}

impl ManagerState {
    /// Empty mappings and no history
    pub fn fresh() -> Self {
        let builder = Builder::new();
        let restorer = builder.get_restorer();
        Self {
            history: Vec::new(),
            builder,
            restorer,
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let bytes = fs::read(path)
            .with_context(|| format!("Failed to read manager state: {}", path.display()))?;
        serde_json::from_slice(&bytes)
            .with_context(|| format!("Manager state is corrupt: {}", path.display()))
    }

    pub fn save(&self, path: &Path, tmp_dir: &Path) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(self)?;
        atomic_write(tmp_dir, path, &bytes)
            .with_context(|| format!("Failed to write manager state: {}", path.display()))
    }
}

/// What `show` reports about one backup
#[derive(Debug, Clone)]
pub struct BackupSummary {
    pub backup: Backup,
    /// Builder the backup was captured with
    pub builder: Builder,
    /// Full tree listing
    pub listing: String,
}

pub struct Manager {
    layout: Layout,
    config: Config,
    store: ObjectStore,
    state: ManagerState,
}

impl Manager {
    /// Create a repository in `workspace` and open it
    pub fn init(workspace: &Path) -> Result<Self> {
        let layout = Layout::new(workspace);
        if layout.manager_file().exists() {
            anyhow::bail!("Repository already initialized at {}", workspace.display());
        }

        layout.create_dirs()?;
        if !layout.config_file().exists() {
            Config::default().save(&layout.config_file())?;
        }

        tracing::info!("initialized repository at {}", layout.root().display());
        Self::open(workspace)
    }

    /// Open an existing repository
    ///
    /// Leftovers of interrupted writes are cleaned up first. A repository
    /// without a manager file starts from a fresh state, which is persisted
    /// immediately.
    pub fn open(workspace: &Path) -> Result<Self> {
        let layout = Layout::new(workspace);
        layout.validate()?;

        recovery::recover_on_startup(&layout)?;

        let config = Config::load(&layout.config_file())?;
        let store = ObjectStore::open(&layout.objects(), &layout.tmp(), config.store_options())
            .context("Failed to open object store")?;

        let manager_file = layout.manager_file();
        let fresh = !manager_file.exists();
        let state = if fresh {
            ManagerState::fresh()
        } else {
            ManagerState::load(&manager_file)?
        };

        let manager = Self {
            layout,
            config,
            store,
            state,
        };
        if fresh {
            manager.persist()?;
        }
        Ok(manager)
    }

    /// Open the repository in `workspace`, creating it if needed
    pub fn open_or_init(workspace: &Path) -> Result<Self> {
        if Layout::new(workspace).root().is_dir() {
            Self::open(workspace)
        } else {
            Self::init(workspace)
        }
    }

    /// Drop history and mappings; stored objects and records stay on disk
    pub fn reset(&mut self) -> Result<()> {
        self.state = ManagerState::fresh();
        self.persist()?;
        tracing::info!("manager state reset");
        Ok(())
    }

    fn persist(&self) -> Result<()> {
        self.state.save(&self.layout.manager_file(), &self.layout.tmp())
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &ObjectStore {
        &self.store
    }

    pub fn state(&self) -> &ManagerState {
        &self.state
    }

    pub fn builder(&self) -> &Builder {
        &self.state.builder
    }

    pub fn restorer(&self) -> &Restorer {
        &self.state.restorer
    }

    /// Backup ids, oldest first
    pub fn history(&self) -> &[String] {
        &self.state.history
    }

    pub fn latest(&self) -> Option<&str> {
        self.state.history.last().map(String::as_str)
    }

    /// Capture `path` under `nickname` and restore it back to `path`
    ///
    /// Returns `false` without touching anything when the path or nickname is
    /// already part of the Builder.
    pub fn add_mapping(&mut self, path: &Path, nickname: &str) -> Result<bool> {
        if !self.state.builder.add(path, nickname)? {
            return Ok(false);
        }
        if !self.state.restorer.add(nickname, path)? {
            tracing::warn!(
                "restorer already maps {} or {}, leaving it unchanged",
                nickname,
                path.display()
            );
        }
        self.persist()?;
        Ok(true)
    }

    /// Add a mapping with the nickname derived from the absolute path
    ///
    /// Returns the nickname used, or `None` on a conflict.
    pub fn add_default_mapping(&mut self, path: &Path) -> Result<Option<String>> {
        let absolute = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.layout.workspace().join(path)
        };
        let nickname = default_nickname(&absolute)?;
        Ok(self.add_mapping(path, &nickname)?.then_some(nickname))
    }

    /// Stop capturing `path`; returns the nickname it had
    pub fn remove_mapping(&mut self, path: &Path) -> Result<Option<String>> {
        let removed = self.state.builder.delete(path);
        if let Some(nickname) = &removed {
            self.state.restorer.delete(nickname);
        }
        self.persist()?;
        Ok(removed)
    }

    /// Replace the Builder from a setting file and derive a matching Restorer
    pub fn load_backup_setting(&mut self, file: Option<&Path>) -> Result<()> {
        let file = file.map_or_else(|| self.layout.backup_setting(), Path::to_path_buf);
        let builder = Builder::import(&file)
            .with_context(|| format!("Failed to load backup setting {}", file.display()))?;

        self.state.restorer = builder.get_restorer();
        self.state.builder = builder;
        self.persist()
    }

    /// Replace the Restorer from a setting file
    pub fn load_recover_setting(&mut self, file: Option<&Path>) -> Result<()> {
        let file = file.map_or_else(|| self.layout.recover_setting(), Path::to_path_buf);
        self.state.restorer = Restorer::import(&file)
            .with_context(|| format!("Failed to load recover setting {}", file.display()))?;
        self.persist()
    }

    /// Export the Builder; returns the file written
    pub fn create_backup_setting(&self, file: Option<&Path>) -> Result<PathBuf> {
        let file = file.map_or_else(|| self.layout.backup_setting(), Path::to_path_buf);
        self.state
            .builder
            .export(&file)
            .with_context(|| format!("Failed to write backup setting {}", file.display()))?;
        Ok(file)
    }

    /// Export the Restorer; returns the file written
    pub fn create_recover_setting(&self, file: Option<&Path>) -> Result<PathBuf> {
        let file = file.map_or_else(|| self.layout.recover_setting(), Path::to_path_buf);
        self.state
            .restorer
            .export(&file)
            .with_context(|| format!("Failed to write recover setting {}", file.display()))?;
        Ok(file)
    }

    /// Capture everything the active Builder maps
    ///
    /// The id only enters the history once the tree, the Builder and the
    /// record are all stored; on any failure the history is left as it was.
    pub fn new_backup(&mut self, message: &str) -> Result<Backup> {
        if self.state.builder.is_empty() {
            tracing::warn!("backup mapping is empty, the snapshot will be empty too");
        }

        let root = Tree::build(&self.store, self.layout.workspace(), &self.state.builder)
            .context("Failed to capture mapped paths")?;
        let tree = self
            .store
            .tree(&root)?
            .save(&self.store)
            .context("Failed to store tree")?;
        let builder = self
            .state
            .builder
            .save(&self.store)
            .context("Failed to store backup mapping")?;

        let ts = backup::current_timestamp_ms();
        let backups_dir = self.layout.backups();
        let id = backup::next_id(ts, |candidate| {
            self.state.history.iter().any(|h| h == candidate) || backups_dir.join(candidate).exists()
        });

        let record = Backup::new(id, builder, tree, ts, message);
        record.save(&backups_dir, &self.layout.tmp())?;

        self.state.history.push(record.id.clone());
        if let Err(e) = self.persist() {
            self.state.history.pop();
            return Err(e);
        }

        tracing::info!("created backup {} ({})", record.id, record.tree);
        Ok(record)
    }

    /// Load a backup record listed in the history
    pub fn backup(&self, id: &str) -> Result<Backup> {
        if !self.state.history.iter().any(|h| h == id) {
            anyhow::bail!("Unknown backup: {}", id);
        }
        Backup::load(&self.layout.backups(), id)
    }

    fn backup_tree(&self, backup: &Backup) -> Result<std::sync::Arc<Tree>> {
        Tree::load(&self.store, &backup.tree)
            .with_context(|| format!("Failed to load tree of backup {}", backup.id))
    }

    /// Restore a backup through the active Restorer
    pub fn recover(&self, id: &str) -> Result<RestoreReport> {
        self.recover_with(id, &self.state.restorer)
    }

    /// Restore a backup through an explicit Restorer
    pub fn recover_with(&self, id: &str, restorer: &Restorer) -> Result<RestoreReport> {
        let backup = self.backup(id)?;
        let tree = self.backup_tree(&backup)?;
        let report = tree
            .restore_with(&self.store, restorer, self.layout.workspace())
            .with_context(|| format!("Failed to recover backup {}", id))?;

        tracing::info!(
            "recovered {} ({} restored, {} missing)",
            id,
            report.restored.len(),
            report.missing.len()
        );
        Ok(report)
    }

    /// Restore a backup to the paths it was captured from
    pub fn recover_captured(&self, id: &str) -> Result<RestoreReport> {
        let backup = self.backup(id)?;
        let builder = Builder::load(&self.store, &backup.builder)
            .with_context(|| format!("Failed to load mapping of backup {}", id))?;
        self.recover_with(id, &builder.get_restorer())
    }

    /// Restore the whole tree of a backup under `target`
    pub fn restore_all(&self, id: &str, target: &Path) -> Result<()> {
        let backup = self.backup(id)?;
        self.backup_tree(&backup)?
            .restore_all(&self.store, target)
            .with_context(|| format!("Failed to restore backup {} into {}", id, target.display()))
    }

    /// Make a backup's Builder (and its inverse) the active mappings
    pub fn adopt_backup_setting(&mut self, id: &str) -> Result<()> {
        let backup = self.backup(id)?;
        let builder = Builder::load(&self.store, &backup.builder)
            .with_context(|| format!("Failed to load mapping of backup {}", id))?;

        self.state.restorer = builder.get_restorer();
        self.state.builder = builder;
        self.persist()
    }

    pub fn show(&self, id: &str) -> Result<BackupSummary> {
        let backup = self.backup(id)?;
        let builder = Builder::load(&self.store, &backup.builder)
            .with_context(|| format!("Failed to load mapping of backup {}", id))?;
        let listing = self.backup_tree(&backup)?.list_all(&self.store)?;

        Ok(BackupSummary {
            backup,
            builder,
            listing,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_init_creates_layout_and_state() -> Result<()> {
        let temp = TempDir::new()?;
        let manager = Manager::init(temp.path())?;

        let layout = manager.layout();
        assert!(layout.objects().is_dir());
        assert!(layout.backups().is_dir());
        assert!(layout.settings().is_dir());
        assert!(layout.config_file().is_file());
        assert!(layout.manager_file().is_file());
        assert!(manager.history().is_empty());
        assert!(manager.builder().is_empty());
        assert!(manager.restorer().is_empty());

        assert!(Manager::init(temp.path()).is_err());
        Ok(())
    }

    #[test]
    fn test_open_requires_repository() -> Result<()> {
        let temp = TempDir::new()?;
        assert!(Manager::open(temp.path()).is_err());

        let manager = Manager::open_or_init(temp.path())?;
        assert!(manager.layout().root().is_dir());
        Ok(())
    }

    #[test]
    fn test_mapping_changes_are_persisted() -> Result<()> {
        let temp = TempDir::new()?;
        {
            let mut manager = Manager::init(temp.path())?;
            assert!(manager.add_mapping(Path::new("src/a.txt"), "alias/a")?);
            assert!(!manager.add_mapping(Path::new("src/b.txt"), "alias/a")?);
            assert!(manager.add_mapping(Path::new("src/dir"), "alias/dir")?);
        }

        let mut manager = Manager::open(temp.path())?;
        assert_eq!(manager.builder().len(), 2);
        assert_eq!(manager.restorer().path("alias/a"), Some("src/a.txt"));

        assert_eq!(
            manager.remove_mapping(Path::new("src/a.txt"))?.as_deref(),
            Some("alias/a")
        );
        drop(manager);

        let manager = Manager::open(temp.path())?;
        assert_eq!(manager.builder().len(), 1);
        assert_eq!(manager.restorer().path("alias/a"), None);
        Ok(())
    }

    #[test]
    fn test_default_mapping_uses_absolute_path() -> Result<()> {
        let temp = TempDir::new()?;
        let mut manager = Manager::init(temp.path())?;

        let nickname = manager.add_default_mapping(Path::new("/srv/www"))?;
        assert_eq!(nickname.as_deref(), Some("srv/www"));
        assert_eq!(manager.add_default_mapping(Path::new("/srv/www"))?, None);
        Ok(())
    }

    #[test]
    fn test_settings_export_and_load() -> Result<()> {
        let temp = TempDir::new()?;
        let mut manager = Manager::init(temp.path())?;
        manager.add_mapping(Path::new("/data/photos"), "photos")?;

        let file = manager.create_backup_setting(None)?;
        assert_eq!(file, manager.layout().backup_setting());
        assert_eq!(fs::read_to_string(&file)?, "/data/photos => photos\n");

        fs::write(&file, "/data/music => music\n/data/films => films\n")?;
        manager.load_backup_setting(None)?;
        assert_eq!(manager.builder().len(), 2);
        assert_eq!(manager.restorer().path("music"), Some("/data/music"));

        let recover = temp.path().join("custom-recover");
        fs::write(&recover, "music => /restore/music\n")?;
        manager.load_recover_setting(Some(&recover))?;
        assert_eq!(manager.restorer().len(), 1);
        // The Builder is untouched by a recover setting
        assert_eq!(manager.builder().len(), 2);

        let reopened = Manager::open(temp.path())?;
        assert_eq!(reopened.restorer().path("music"), Some("/restore/music"));
        Ok(())
    }

    #[test]
    fn test_load_missing_setting_keeps_state() -> Result<()> {
        let temp = TempDir::new()?;
        let mut manager = Manager::init(temp.path())?;
        manager.add_mapping(Path::new("a"), "a")?;

        assert!(manager.load_backup_setting(Some(&temp.path().join("nope"))).is_err());
        assert_eq!(manager.builder().len(), 1);
        Ok(())
    }

    #[test]
    fn test_unknown_backup_is_rejected() -> Result<()> {
        let temp = TempDir::new()?;
        let manager = Manager::init(temp.path())?;
        assert!(manager.backup("20240101_000000").is_err());
        assert!(manager.recover("../manager").is_err());
        Ok(())
    }

    #[test]
    fn test_reset_clears_state() -> Result<()> {
        let temp = TempDir::new()?;
        let mut manager = Manager::init(temp.path())?;
        fs::write(temp.path().join("f.txt"), b"f")?;
        manager.add_mapping(Path::new("f.txt"), "f")?;
        manager.new_backup("one")?;

        manager.reset()?;
        assert!(manager.history().is_empty());
        assert!(manager.builder().is_empty());

        let reopened = Manager::open(temp.path())?;
        assert_eq!(reopened.state(), &ManagerState::fresh());
        Ok(())
    }
}
