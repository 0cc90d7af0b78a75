//! Path ↔ nickname mappings
//!
//! A [`Builder`] says which source paths to capture and under which
//! nickname; a [`Restorer`] says where each nickname goes back to. Both are
//! bijective by construction: an insert is refused when either side is
//! already present.
//!
//! Setting files hold one mapping per line:
//! ```text
//! /home/me/notes => home/me/notes
//! ```
//! The same text, sorted, is the canonical form stored in the object store.

use crate::error::{Error, IoContext, Result};
use crate::hash::{hash_bytes, Digest};
use crate::store::{normalize_nickname, ObjectStore};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Component, Path, PathBuf};

/// Token between the two sides of a setting-file line
pub const SEPARATOR: &str = " => ";

/// Map that keeps both its keys and its values unique
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "BTreeMap<String, String>", into = "BTreeMap<String, String>")]
pub struct PathMap {
    forward: BTreeMap<String, String>,
    reverse: BTreeMap<String, String>,
}

impl PathMap {
    /// Insert unless `key` or `value` is already present
    pub fn insert(&mut self, key: String, value: String) -> bool {
        if self.forward.contains_key(&key) || self.reverse.contains_key(&value) {
            return false;
        }
        self.reverse.insert(value.clone(), key.clone());
        self.forward.insert(key, value);
        true
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        let value = self.forward.remove(key)?;
        self.reverse.remove(&value);
        Some(value)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.forward.get(key).map(String::as_str)
    }

    pub fn key_of(&self, value: &str) -> Option<&str> {
        self.reverse.get(value).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.forward.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.forward.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }

    /// Swap keys and values
    pub fn inverted(&self) -> PathMap {
        PathMap {
            forward: self.reverse.clone(),
            reverse: self.forward.clone(),
        }
    }

    /// Sorted setting-file text
    pub fn to_text(&self) -> String {
        self.iter()
            .map(|(left, right)| format!("{left}{SEPARATOR}{right}\n"))
            .collect()
    }
}

impl TryFrom<BTreeMap<String, String>> for PathMap {
    type Error = Error;

    fn try_from(forward: BTreeMap<String, String>) -> Result<Self> {
        let mut map = PathMap::default();
        for (key, value) in forward {
            if !map.insert(key, value.clone()) {
                return Err(Error::format("path map", format!("{value:?} is mapped twice")));
            }
        }
        Ok(map)
    }
}

impl From<PathMap> for BTreeMap<String, String> {
    fn from(map: PathMap) -> Self {
        map.forward
    }
}

/// Split setting-file text into `(left, right)` pairs
///
/// Blank lines and lines without exactly one separator are ignored.
pub fn parse_setting(text: &str) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    for (number, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let parts: Vec<&str> = line.split(SEPARATOR).collect();
        let [left, right] = parts.as_slice() else {
            tracing::debug!("ignoring setting line {}: {:?}", number + 1, line);
            continue;
        };
        let (left, right) = (left.trim(), right.trim());
        if left.is_empty() || right.is_empty() {
            tracing::debug!("ignoring setting line {}: {:?}", number + 1, line);
            continue;
        }
        pairs.push((left.to_string(), right.to_string()));
    }
    pairs
}

fn path_key(path: &Path) -> Result<String> {
    let Some(text) = path.to_str() else {
        return Err(Error::format("path", format!("{} is not valid UTF-8", path.display())));
    };
    let text = text.trim();
    if text.is_empty() || text.contains(SEPARATOR) || text.chars().any(char::is_control) {
        return Err(Error::format(
            "path",
            format!("{text:?} cannot be written to a setting file"),
        ));
    }
    Ok(text.to_string())
}

/// Resolve a mapped path against the workspace directory
pub fn resolve_path(base: &Path, path: &str) -> PathBuf {
    let path = Path::new(path);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

/// Nickname used when a mapping is added without one
///
/// Built from the normal components of `path`, prefixed with the drive
/// letter on Windows: `/home/me/notes` becomes `home/me/notes`.
pub fn default_nickname(path: &Path) -> Result<String> {
    let mut segments: Vec<String> = Vec::new();
    for component in path.components() {
        match component {
            Component::Prefix(prefix) => {
                let drive = prefix.as_os_str().to_string_lossy();
                segments.push(drive.trim_end_matches(':').to_string());
            }
            Component::RootDir | Component::CurDir => {}
            Component::ParentDir => {
                return Err(Error::InvalidNickname(path.display().to_string()))
            }
            Component::Normal(part) => match part.to_str() {
                Some(part) => segments.push(part.to_string()),
                None => return Err(Error::InvalidNickname(path.display().to_string())),
            },
        }
    }
    normalize_nickname(&segments.join("/"))
}

/// Capture-time mapping: source path → nickname
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Builder {
    map: PathMap,
}

impl Builder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Map `path` to `nickname`
    ///
    /// Returns `false` and leaves the map unchanged when the path or the
    /// nickname is already mapped.
    pub fn add(&mut self, path: &Path, nickname: &str) -> Result<bool> {
        let key = path_key(path)?;
        let nickname = normalize_nickname(nickname)?;
        Ok(self.map.insert(key, nickname))
    }

    /// Remove the mapping for `path`, returning its nickname
    pub fn delete(&mut self, path: &Path) -> Option<String> {
        self.map.remove(path.to_str()?.trim())
    }

    pub fn nickname(&self, path: &Path) -> Option<&str> {
        self.map.get(path.to_str()?.trim())
    }

    /// `(path, nickname)` pairs ordered by path
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.map.iter()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Restorer that puts every nickname back where it was captured from
    pub fn get_restorer(&self) -> Restorer {
        Restorer {
            map: self.map.inverted(),
        }
    }

    pub fn to_setting(&self) -> String {
        self.map.to_text()
    }

    /// Build from setting-file text, skipping duplicate and invalid lines
    pub fn from_setting(text: &str) -> Self {
        let mut builder = Builder::new();
        for (path, nickname) in parse_setting(text) {
            match builder.add(Path::new(&path), &nickname) {
                Ok(true) => {}
                Ok(false) => tracing::warn!("{} => {} conflicts with an earlier line", path, nickname),
                Err(e) => tracing::warn!("skipping {} => {}: {}", path, nickname, e),
            }
        }
        builder
    }

    pub fn import(file: &Path) -> Result<Self> {
        let text = fs::read_to_string(file).at(file)?;
        Ok(Self::from_setting(&text))
    }

    pub fn export(&self, file: &Path) -> Result<()> {
        write_setting(file, &self.to_setting())
    }

    pub fn digest(&self) -> Digest {
        hash_bytes(self.to_setting().as_bytes())
    }

    /// Store the canonical text as an object
    pub fn save(&self, store: &ObjectStore) -> Result<Digest> {
        store.put(self.to_setting().as_bytes())
    }

    pub fn load(store: &ObjectStore, digest: &Digest) -> Result<Self> {
        let text = load_text(store, digest)?;
        Ok(Self::from_setting(&text))
    }
}

/// Restore-time mapping: nickname → destination path
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Restorer {
    map: PathMap,
}

impl Restorer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Send `nickname` to `path`
    ///
    /// Returns `false` and leaves the map unchanged when the nickname or the
    /// path is already mapped.
    pub fn add(&mut self, nickname: &str, path: &Path) -> Result<bool> {
        let nickname = normalize_nickname(nickname)?;
        let value = path_key(path)?;
        Ok(self.map.insert(nickname, value))
    }

    /// Remove the mapping for `nickname`, returning its path
    pub fn delete(&mut self, nickname: &str) -> Option<String> {
        let nickname = normalize_nickname(nickname).ok()?;
        self.map.remove(&nickname)
    }

    pub fn path(&self, nickname: &str) -> Option<&str> {
        self.map.get(nickname)
    }

    /// `(nickname, path)` pairs ordered by nickname
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.map.iter()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn to_setting(&self) -> String {
        self.map.to_text()
    }

    pub fn from_setting(text: &str) -> Self {
        let mut restorer = Restorer::new();
        for (nickname, path) in parse_setting(text) {
            match restorer.add(&nickname, Path::new(&path)) {
                Ok(true) => {}
                Ok(false) => tracing::warn!("{} => {} conflicts with an earlier line", nickname, path),
                Err(e) => tracing::warn!("skipping {} => {}: {}", nickname, path, e),
            }
        }
        restorer
    }

    pub fn import(file: &Path) -> Result<Self> {
        let text = fs::read_to_string(file).at(file)?;
        Ok(Self::from_setting(&text))
    }

    pub fn export(&self, file: &Path) -> Result<()> {
        write_setting(file, &self.to_setting())
    }

    pub fn digest(&self) -> Digest {
        hash_bytes(self.to_setting().as_bytes())
    }

    pub fn save(&self, store: &ObjectStore) -> Result<Digest> {
        store.put(self.to_setting().as_bytes())
    }

    pub fn load(store: &ObjectStore, digest: &Digest) -> Result<Self> {
        let text = load_text(store, digest)?;
        Ok(Self::from_setting(&text))
    }
}

fn write_setting(file: &Path, text: &str) -> Result<()> {
    if let Some(parent) = file.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).at(parent)?;
    }
    fs::write(file, text).at(file)
}

fn load_text(store: &ObjectStore, digest: &Digest) -> Result<String> {
    let data = store.read_compressed(digest)?;
    String::from_utf8(data).map_err(|_| Error::corrupt(*digest, "mapping is not valid UTF-8"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StoreOptions;
    use tempfile::TempDir;

    #[test]
    fn test_add_rejects_taken_path_or_nickname() -> anyhow::Result<()> {
        let mut builder = Builder::new();
        assert!(builder.add(Path::new("src/a.txt"), "alias/a")?);

        let before = builder.clone();
        assert!(!builder.add(Path::new("src/a.txt"), "alias/other")?);
        assert!(!builder.add(Path::new("src/b.txt"), "alias/a")?);
        assert!(!builder.add(Path::new("src/c.txt"), "./alias//a")?);
        assert_eq!(builder, before);
        Ok(())
    }

    #[test]
    fn test_invalid_nickname_is_an_error() {
        let mut builder = Builder::new();
        assert!(matches!(
            builder.add(Path::new("x"), "../escape"),
            Err(Error::InvalidNickname(_))
        ));
        assert!(builder.is_empty());
    }

    #[test]
    fn test_delete_returns_nickname() -> anyhow::Result<()> {
        let mut builder = Builder::new();
        builder.add(Path::new("/data/photos"), "photos")?;

        assert_eq!(builder.delete(Path::new("/data/photos")).as_deref(), Some("photos"));
        assert_eq!(builder.delete(Path::new("/data/photos")), None);

        // The nickname is free again
        assert!(builder.add(Path::new("/elsewhere"), "photos")?);
        Ok(())
    }

    #[test]
    fn test_get_restorer_inverts() -> anyhow::Result<()> {
        let mut builder = Builder::new();
        builder.add(Path::new("src/a.txt"), "alias/a")?;
        builder.add(Path::new("src/dir"), "alias/dir")?;

        let restorer = builder.get_restorer();
        assert_eq!(restorer.path("alias/a"), Some("src/a.txt"));
        assert_eq!(restorer.path("alias/dir"), Some("src/dir"));
        assert_eq!(restorer.len(), 2);
        Ok(())
    }

    #[test]
    fn test_setting_roundtrip_ignores_malformed_lines() -> anyhow::Result<()> {
        let text = "\
/home/me/notes => notes
no separator here

/a => b => c
 /srv/www  =>  www
/dup => notes
";
        let builder = Builder::from_setting(text);
        let pairs: Vec<(&str, &str)> = builder.iter().collect();
        assert_eq!(pairs, [("/home/me/notes", "notes"), ("/srv/www", "www")]);

        let reparsed = Builder::from_setting(&builder.to_setting());
        assert_eq!(reparsed, builder);
        Ok(())
    }

    #[test]
    fn test_export_import_file() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let file = temp.path().join("settings/recover");

        let mut restorer = Restorer::new();
        restorer.add("alias/a", Path::new("out/a.txt"))?;
        restorer.export(&file)?;

        assert_eq!(std::fs::read_to_string(&file)?, "alias/a => out/a.txt\n");
        assert_eq!(Restorer::import(&file)?, restorer);
        Ok(())
    }

    #[test]
    fn test_saved_mapping_is_content_addressed() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let store = ObjectStore::open(
            &temp.path().join("objects"),
            &temp.path().join("tmp"),
            StoreOptions::default(),
        )?;

        let mut builder = Builder::new();
        builder.add(Path::new("/etc/hosts"), "etc/hosts")?;
        let digest = builder.save(&store)?;

        assert_eq!(digest, builder.digest());
        assert_eq!(Builder::load(&store, &digest)?, builder);
        Ok(())
    }

    #[test]
    fn test_serde_rejects_duplicate_values() {
        let mut raw = BTreeMap::new();
        raw.insert("a".to_string(), "same".to_string());
        raw.insert("b".to_string(), "same".to_string());
        assert!(PathMap::try_from(raw).is_err());
    }

    #[test]
    fn test_default_nickname() -> anyhow::Result<()> {
        assert_eq!(default_nickname(Path::new("/home/me/notes"))?, "home/me/notes");
        assert_eq!(default_nickname(Path::new("relative/dir"))?, "relative/dir");
        assert!(default_nickname(Path::new("/")).is_err());
        assert!(default_nickname(Path::new("/a/../b")).is_err());
        Ok(())
    }

    #[test]
    fn test_resolve_path() {
        let base = Path::new("/work");
        assert_eq!(resolve_path(base, "src/a.txt"), PathBuf::from("/work/src/a.txt"));
        assert_eq!(resolve_path(base, "/abs/file"), PathBuf::from("/abs/file"));
    }
}
