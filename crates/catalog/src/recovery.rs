//! Crash recovery and consistency verification

use crate::layout::Layout;
use crate::manager::Manager;
use anyhow::{Context, Result};
use bkp_core::{Builder, Digest, ObjectStore, Tree};
use std::collections::HashSet;
use std::path::Path;

/// Clean up after an unclean shutdown
///
/// Anything left in `.bkp/tmp/` is a write that never reached its rename;
/// the object or state it belonged to is either absent or intact, so the
/// staging files can simply go. Returns how many entries were removed.
pub fn recover_on_startup(layout: &Layout) -> Result<usize> {
    let removed = cleanup_temp_files(&layout.tmp())?;
    if removed > 0 {
        tracing::info!("recovery: removed {} incomplete write(s)", removed);
    }
    Ok(removed)
}

fn cleanup_temp_files(tmp_dir: &Path) -> Result<usize> {
    if !tmp_dir.exists() {
        return Ok(0);
    }

    let mut removed = 0;
    for entry in std::fs::read_dir(tmp_dir)
        .with_context(|| format!("Failed to read {}", tmp_dir.display()))?
    {
        let path = entry?.path();
        if path.is_dir() {
            std::fs::remove_dir_all(&path)?;
        } else {
            std::fs::remove_file(&path)?;
        }
        tracing::debug!("recovery: removed {}", path.display());
        removed += 1;
    }
    Ok(removed)
}

/// Result of [`verify`]
#[derive(Debug, Clone, Default)]
pub struct IntegrityReport {
    /// Backups whose record, mapping and tree were all readable
    pub healthy: usize,
    /// Distinct objects checked
    pub objects: usize,
    /// One line per problem found
    pub problems: Vec<String>,
}

impl IntegrityReport {
    pub fn is_ok(&self) -> bool {
        self.problems.is_empty()
    }
}

/// Check every backup in the history against the object store
///
/// Problems are collected rather than returned as errors, so one damaged
/// backup does not hide the state of the others.
pub fn verify(manager: &Manager) -> IntegrityReport {
    let store = manager.store();
    let mut report = IntegrityReport::default();
    let mut seen = HashSet::new();

    for id in manager.history() {
        let problems_before = report.problems.len();

        let backup = match manager.backup(id) {
            Ok(backup) => backup,
            Err(e) => {
                report.problems.push(format!("{id}: {e:#}"));
                continue;
            }
        };

        if seen.insert(backup.builder) {
            report.objects += 1;
            if let Err(e) = Builder::load(store, &backup.builder) {
                report.problems.push(format!("{id}: mapping {}: {e}", backup.builder));
            }
        }

        check_tree(store, &backup.tree, id, &mut seen, &mut report);

        if report.problems.len() == problems_before {
            report.healthy += 1;
        }
    }

    report
}

fn check_tree(
    store: &ObjectStore,
    digest: &Digest,
    id: &str,
    seen: &mut HashSet<Digest>,
    report: &mut IntegrityReport,
) {
    if !seen.insert(*digest) {
        return;
    }
    report.objects += 1;

    let tree = match Tree::load(store, digest) {
        Ok(tree) => tree,
        Err(e) => {
            report.problems.push(format!("{id}: tree {digest}: {e}"));
            return;
        }
    };

    for (name, blob) in tree.blobs() {
        if !seen.insert(blob.digest) {
            continue;
        }
        report.objects += 1;
        if let Err(e) = store.check_blob(blob) {
            report.problems.push(format!("{id}: {name}: {e}"));
        }
    }
    for (_, child) in tree.subtrees() {
        check_tree(store, child, id, seen, report);
    }
}
