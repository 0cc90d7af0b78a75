//! Backup records

use anyhow::{Context, Result};
use bkp_core::{atomic_write, Digest};
use chrono::{DateTime, Local, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// `strftime` pattern of backup identifiers
pub const ID_FORMAT: &str = "%Y%m%d_%H%M%S";

/// An immutable snapshot record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Backup {
    /// Local creation time formatted with [`ID_FORMAT`], possibly suffixed
    pub id: String,
    /// Builder mapping the snapshot was captured with
    pub builder: Digest,
    /// Root tree of the snapshot
    pub tree: Digest,
    /// Timestamp (Unix milliseconds)
    pub ts_unix_ms: u64,
    pub message: String,
}

impl Backup {
    pub fn new(id: String, builder: Digest, tree: Digest, ts_unix_ms: u64, message: &str) -> Self {
        Self {
            id,
            builder,
            tree,
            ts_unix_ms,
            message: message.to_string(),
        }
    }

    pub fn serialize(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Self> {
        Ok(bincode::deserialize(bytes)?)
    }

    /// Write the record to `dir/<id>`; existing records are never replaced
    pub fn save(&self, dir: &Path, tmp_dir: &Path) -> Result<()> {
        let path = dir.join(&self.id);
        if path.exists() {
            anyhow::bail!("Backup record {} already exists", self.id);
        }
        atomic_write(tmp_dir, &path, &self.serialize()?)
            .with_context(|| format!("Failed to write backup record {}", self.id))
    }

    pub fn load(dir: &Path, id: &str) -> Result<Self> {
        let path = dir.join(id);
        let bytes = std::fs::read(&path)
            .with_context(|| format!("Failed to read backup record {}", path.display()))?;
        let backup = Self::deserialize(&bytes)
            .with_context(|| format!("Backup record {} is corrupt", id))?;
        if backup.id != id {
            anyhow::bail!("Backup record {} claims to be {}", id, backup.id);
        }
        Ok(backup)
    }

    pub fn created_at(&self) -> DateTime<Local> {
        local_time(self.ts_unix_ms)
    }
}

/// Identifier for a backup taken at `ts_unix_ms`
///
/// When `taken` reports the plain timestamp as used (two backups in the same
/// second), `_1`, `_2`, ... is appended until a free id is found.
pub fn next_id(ts_unix_ms: u64, taken: impl Fn(&str) -> bool) -> String {
    let base = local_time(ts_unix_ms).format(ID_FORMAT).to_string();
    if !taken(&base) {
        return base;
    }
    let mut n = 1u32;
    loop {
        let candidate = format!("{base}_{n}");
        if !taken(&candidate) {
            return candidate;
        }
        n += 1;
    }
}

pub fn current_timestamp_ms() -> u64 {
    Utc::now().timestamp_millis().max(0) as u64
}

fn local_time(ts_unix_ms: u64) -> DateTime<Local> {
    match Local.timestamp_millis_opt(ts_unix_ms as i64).single() {
        Some(dt) => dt,
        None => Utc::now().with_timezone(&Local),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bkp_core::hash_bytes;
    use tempfile::TempDir;

    fn sample(id: &str) -> Backup {
        Backup::new(
            id.to_string(),
            hash_bytes(b"builder"),
            hash_bytes(b"tree"),
            current_timestamp_ms(),
            "nightly",
        )
    }

    #[test]
    fn test_serialization_roundtrip() -> Result<()> {
        let backup = sample("20240101_120000");
        let bytes = backup.serialize()?;
        assert_eq!(Backup::deserialize(&bytes)?, backup);
        Ok(())
    }

    #[test]
    fn test_save_load_and_immutability() -> Result<()> {
        let temp = TempDir::new()?;
        let dir = temp.path().join("backups");
        let tmp = temp.path().join("tmp");

        let backup = sample("20240101_120000");
        backup.save(&dir, &tmp)?;
        assert_eq!(Backup::load(&dir, &backup.id)?, backup);

        let mut altered = backup.clone();
        altered.message = "rewritten".to_string();
        assert!(altered.save(&dir, &tmp).is_err());
        assert_eq!(Backup::load(&dir, &backup.id)?.message, "nightly");
        Ok(())
    }

    #[test]
    fn test_load_rejects_garbage() -> Result<()> {
        let temp = TempDir::new()?;
        std::fs::write(temp.path().join("20240101_000000"), b"\x01")?;
        assert!(Backup::load(temp.path(), "20240101_000000").is_err());
        assert!(Backup::load(temp.path(), "20240101_999999").is_err());
        Ok(())
    }

    #[test]
    fn test_id_format() {
        let id = next_id(current_timestamp_ms(), |_| false);
        assert_eq!(id.len(), 15);
        assert_eq!(id.as_bytes()[8], b'_');
        assert!(id.chars().filter(|c| *c != '_').all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn test_id_suffix_on_collision() {
        let ts = current_timestamp_ms();
        let base = next_id(ts, |_| false);

        let taken = [base.clone(), format!("{base}_1")];
        let id = next_id(ts, |candidate| taken.iter().any(|t| t == candidate));
        assert_eq!(id, format!("{base}_2"));
    }
}
