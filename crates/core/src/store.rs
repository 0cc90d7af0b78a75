//! Content-addressed object store
//!
//! Objects live under a single root, fanned out by the first two hex
//! characters of their digest:
//! ```text
//! objects/
//!   3f/
//!     a9c2...   zstd stream or verbatim copy
//! ```
//! Every object is written through a uuid-named file in the staging
//! directory and renamed into place, so a crash never leaves a partial
//! object under its final name. Writing a digest that already exists is a
//! no-op.

use crate::codec;
use crate::error::{Error, IoContext, Result};
use crate::pathmap::SEPARATOR;
use crate::hash::{hash_bytes, hash_file, hash_path, Digest};
use crate::tree::Tree;
use dashmap::DashMap;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

/// Default size at which files stop being compressed and get copied verbatim
pub const DEFAULT_COMPRESSION_THRESHOLD: u64 = 1_000_000_000;

/// Tunables for newly written objects
///
/// An existing object keeps the encoding it was written with, so the
/// threshold may change between runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreOptions {
    pub compression_threshold: u64,
    pub compression_level: i32,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            compression_threshold: DEFAULT_COMPRESSION_THRESHOLD,
            compression_level: codec::DEFAULT_LEVEL,
        }
    }
}

pub struct ObjectStore {
    /// Root of the fan-out directories
    root: PathBuf,
    /// Staging area for atomic writes
    tmp_dir: PathBuf,
    options: StoreOptions,
    /// Digest-keyed table of every tree seen by this process
    trees: DashMap<Digest, Arc<Tree>>,
}

impl ObjectStore {
    /// Open (creating if needed) an object store
    pub fn open(root: &Path, tmp_dir: &Path, options: StoreOptions) -> Result<Self> {
        fs::create_dir_all(root).at(root)?;
        fs::create_dir_all(tmp_dir).at(tmp_dir)?;

        Ok(Self {
            root: root.to_path_buf(),
            tmp_dir: tmp_dir.to_path_buf(),
            options,
            trees: DashMap::new(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn options(&self) -> &StoreOptions {
        &self.options
    }

    pub fn object_path(&self, digest: &Digest) -> PathBuf {
        self.root.join(digest.fan_out())
    }

    pub fn contains(&self, digest: &Digest) -> bool {
        self.object_path(digest).exists()
    }

    /// Hash `data` and store it compressed
    pub fn put(&self, data: &[u8]) -> Result<Digest> {
        let digest = hash_bytes(data);
        self.write_compressed(digest, data)?;
        Ok(digest)
    }

    /// Store `data` compressed under `digest`
    ///
    /// Returns `false` when the object already existed and nothing was written.
    pub fn write_compressed(&self, digest: Digest, data: &[u8]) -> Result<bool> {
        let target = self.object_path(&digest);
        if target.exists() {
            tracing::debug!("object {} already stored", digest);
            return Ok(false);
        }

        let encoded = codec::compress(data, self.options.compression_level).at(&target)?;
        tracing::debug!(
            "compress {} from {} to {} bytes",
            digest,
            data.len(),
            encoded.len()
        );
        atomic_write(&self.tmp_dir, &target, &encoded)?;
        Ok(true)
    }

    /// Store the file at `source` verbatim under `digest`
    pub fn copy_verbatim(&self, digest: Digest, source: &Path) -> Result<bool> {
        let target = self.object_path(&digest);
        if target.exists() {
            tracing::debug!("object {} already stored", digest);
            return Ok(false);
        }

        atomic_copy(&self.tmp_dir, source, &target)?;
        Ok(true)
    }

    /// Read and decompress an object, verifying it against its digest
    pub fn read_compressed(&self, digest: &Digest) -> Result<Vec<u8>> {
        let path = self.object_path(digest);
        let stored = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::NotFound(*digest))
            }
            Err(e) => return Err(e).at(&path),
        };

        let data = codec::decompress(&stored)
            .map_err(|e| Error::corrupt(*digest, format!("cannot decompress: {e}")))?;

        let actual = hash_bytes(&data);
        if actual != *digest {
            return Err(Error::corrupt(*digest, format!("content hashes to {actual}")));
        }
        Ok(data)
    }

    /// Encoding of a stored object, or `None` if there is no object
    ///
    /// `Some(true)` is a zstd stream and `Some(false)` a verbatim copy.
    pub fn stored_encoding(&self, digest: &Digest) -> Result<Option<bool>> {
        use std::io::Read;

        let path = self.object_path(digest);
        let file = match fs::File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e).at(&path),
        };
        let len = file.metadata().at(&path)?.len();

        let mut prefix = Vec::with_capacity(4);
        file.take(4).read_to_end(&mut prefix).at(&path)?;
        if !codec::has_frame_magic(&prefix) {
            return Ok(Some(false));
        }

        // A verbatim copy of zstd data starts with the magic too
        Ok(Some(hash_path(&path, len)? != *digest))
    }

    /// Check that a verbatim object still hashes to its digest
    pub fn verify_verbatim(&self, digest: &Digest) -> Result<()> {
        let path = self.object_path(digest);
        if !path.exists() {
            return Err(Error::NotFound(*digest));
        }
        let actual = hash_file(&path)?;
        if actual != *digest {
            return Err(Error::corrupt(*digest, format!("content hashes to {actual}")));
        }
        Ok(())
    }

    /// Register a tree in the in-memory table and return its digest
    ///
    /// Nothing is written to disk until [`Tree::save`].
    pub fn insert_tree(&self, tree: Tree) -> Digest {
        let digest = tree.digest();
        self.trees.entry(digest).or_insert_with(|| Arc::new(tree));
        digest
    }

    pub(crate) fn cached_tree(&self, digest: &Digest) -> Option<Arc<Tree>> {
        self.trees.get(digest).map(|entry| Arc::clone(entry.value()))
    }

    pub(crate) fn cache_tree(&self, digest: Digest, tree: Arc<Tree>) {
        self.trees.insert(digest, tree);
    }
}

/// Atomically write `data` to `target` via a temp file in `tmp_dir`
///
/// Writes to a temp file, fsyncs it, renames it over `target` and makes a
/// best-effort fsync of the parent directory.
pub fn atomic_write(tmp_dir: &Path, target: &Path, data: &[u8]) -> Result<()> {
    use std::io::Write;

    fs::create_dir_all(tmp_dir).at(tmp_dir)?;
    let temp_path = tmp_dir.join(uuid::Uuid::new_v4().to_string());

    let mut temp_file = fs::File::create(&temp_path).at(&temp_path)?;
    temp_file.write_all(data).at(&temp_path)?;
    temp_file.sync_all().at(&temp_path)?;
    drop(temp_file);

    commit(&temp_path, target)
}

/// Atomically copy `source` to `target` via a temp file in `tmp_dir`
pub fn atomic_copy(tmp_dir: &Path, source: &Path, target: &Path) -> Result<()> {
    fs::create_dir_all(tmp_dir).at(tmp_dir)?;
    let temp_path = tmp_dir.join(uuid::Uuid::new_v4().to_string());

    fs::copy(source, &temp_path).at(source)?;
    fs::File::open(&temp_path)
        .and_then(|f| f.sync_all())
        .at(&temp_path)?;

    commit(&temp_path, target)
}

fn commit(temp_path: &Path, target: &Path) -> Result<()> {
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent).at(parent)?;
    }

    if let Err(e) = fs::rename(temp_path, target) {
        let _ = fs::remove_file(temp_path);
        return Err(e).at(target);
    }

    if let Some(parent) = target.parent() {
        if let Ok(dir) = fs::File::open(parent) {
            let _ = dir.sync_all();
        }
    }

    Ok(())
}

/// Normalize a slash-separated nickname
///
/// Strips `./` and `.` segments, collapses repeated slashes and converts
/// backslashes. Rejects absolute nicknames, `..`, control characters and
/// nicknames that end up empty.
pub fn normalize_nickname(raw: &str) -> Result<String> {
    let unified = raw.trim().replace('\\', "/");

    if unified.starts_with('/') || Path::new(&unified).has_root() {
        return Err(Error::InvalidNickname(raw.to_string()));
    }
    if unified.chars().any(char::is_control) || unified.contains(SEPARATOR) {
        return Err(Error::InvalidNickname(raw.to_string()));
    }

    let mut segments = Vec::new();
    for segment in unified.split('/') {
        match segment {
            "" | "." => continue,
            ".." => return Err(Error::InvalidNickname(raw.to_string())),
            s => segments.push(s),
        }
    }

    // Windows drive prefixes like `C:`
    if let Some(first) = segments.first() {
        if matches!(Path::new(first).components().next(), Some(Component::Prefix(_))) {
            return Err(Error::InvalidNickname(raw.to_string()));
        }
    }

    if segments.is_empty() {
        return Err(Error::InvalidNickname(raw.to_string()));
    }
    Ok(segments.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn open_store(temp: &TempDir) -> Result<ObjectStore> {
        ObjectStore::open(
            &temp.path().join("objects"),
            &temp.path().join("tmp"),
            StoreOptions::default(),
        )
    }

    #[test]
    fn test_put_is_idempotent() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let store = open_store(&temp)?;

        let digest = store.put(b"listing")?;
        assert!(store.contains(&digest));
        assert!(!store.write_compressed(digest, b"listing")?);
        assert_eq!(store.read_compressed(&digest)?, b"listing");
        Ok(())
    }

    #[test]
    fn test_object_path_fans_out() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let store = open_store(&temp)?;

        let digest = store.put(b"fan out")?;
        let hex = digest.to_hex();
        let expected = temp.path().join("objects").join(&hex[..2]).join(&hex[2..]);
        assert_eq!(store.object_path(&digest), expected);
        assert!(expected.is_file());
        Ok(())
    }

    #[test]
    fn test_missing_object_is_not_found() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let store = open_store(&temp)?;

        let digest = hash_bytes(b"never stored");
        assert!(matches!(
            store.read_compressed(&digest),
            Err(Error::NotFound(d)) if d == digest
        ));
        Ok(())
    }

    #[test]
    fn test_corrupt_object_is_reported() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let store = open_store(&temp)?;

        let digest = store.put(b"soon to be damaged")?;
        fs::write(store.object_path(&digest), b"garbage")?;
        assert!(matches!(
            store.read_compressed(&digest),
            Err(Error::Corrupt { .. })
        ));

        // Valid zstd, wrong content
        let other = codec::compress(b"something else", 3)?;
        fs::write(store.object_path(&digest), other)?;
        assert!(matches!(
            store.read_compressed(&digest),
            Err(Error::Corrupt { .. })
        ));
        Ok(())
    }

    #[test]
    fn test_atomic_write_leaves_no_temp_files() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let tmp_dir = temp.path().join("tmp");
        let target = temp.path().join("nested/dir/file");

        atomic_write(&tmp_dir, &target, b"data")?;
        assert_eq!(fs::read(&target)?, b"data");
        assert_eq!(fs::read_dir(&tmp_dir)?.count(), 0);

        atomic_write(&tmp_dir, &target, b"replaced")?;
        assert_eq!(fs::read(&target)?, b"replaced");
        Ok(())
    }

    #[test]
    fn test_normalize_nickname() -> anyhow::Result<()> {
        assert_eq!(normalize_nickname("alias/a")?, "alias/a");
        assert_eq!(normalize_nickname("./alias//dir/")?, "alias/dir");
        assert_eq!(normalize_nickname("alias\\win")?, "alias/win");
        assert_eq!(normalize_nickname("with space")?, "with space");

        let bad_nicknames = [
            "", "/", "/abs", "../up", "a/../b", ".", "line\nbreak", "x => y", "dir/a => b",
        ];
        for bad in bad_nicknames {
            assert!(
                matches!(normalize_nickname(bad), Err(Error::InvalidNickname(_))),
                "{bad:?} should be rejected"
            );
        }
        Ok(())
    }
}
