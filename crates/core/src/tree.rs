//! Directory snapshots
//!
//! A tree names its children with single path segments and keeps files and
//! subdirectories in two separate maps. Its digest is the hash of its
//! canonical listing, one line per child sorted by nickname:
//! ```text
//! blob <digest> <nickname>    compressed file
//! copy <digest> <nickname>    verbatim file
//! tree <digest> <nickname>    subdirectory
//! ```
//! Children are referenced by digest and resolved through the store's tree
//! table, so identical subdirectories are held once in memory and on disk.

use crate::blob::Blob;
use crate::error::{Error, IoContext, Result};
use crate::hash::{hash_bytes, Digest};
use crate::object::{Node, Object};
use crate::pathmap::{resolve_path, Builder, Restorer};
use crate::store::{normalize_nickname, ObjectStore};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;
use std::sync::Arc;

const KIND_BLOB: &str = "blob";
const KIND_COPY: &str = "copy";
const KIND_TREE: &str = "tree";

/// Indentation per level in [`Tree::list_all`]
const INDENT: &str = "    ";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tree {
    blobs: BTreeMap<String, Blob>,
    trees: BTreeMap<String, Digest>,
}

/// Outcome of a restore driven by a [`Restorer`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RestoreReport {
    /// Nicknames written to their destination
    pub restored: Vec<String>,
    /// Nicknames with no matching entry in the tree
    pub missing: Vec<String>,
}

impl Tree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.is_empty() && self.trees.is_empty()
    }

    pub fn len(&self) -> usize {
        self.blobs.len() + self.trees.len()
    }

    pub fn blobs(&self) -> impl Iterator<Item = (&str, &Blob)> {
        self.blobs.iter().map(|(name, blob)| (name.as_str(), blob))
    }

    pub fn subtrees(&self) -> impl Iterator<Item = (&str, &Digest)> {
        self.trees.iter().map(|(name, digest)| (name.as_str(), digest))
    }

    /// Canonical listing the digest is computed over
    pub fn listing(&self) -> String {
        let mut lines: Vec<(&str, u8, String)> = Vec::with_capacity(self.len());
        for (name, blob) in &self.blobs {
            let kind = if blob.compressed { KIND_BLOB } else { KIND_COPY };
            lines.push((name.as_str(), 0, format!("{kind} {} {name}\n", blob.digest)));
        }
        for (name, digest) in &self.trees {
            lines.push((name.as_str(), 1, format!("{KIND_TREE} {digest} {name}\n")));
        }
        lines.sort_by(|a, b| (a.0, a.1).cmp(&(b.0, b.1)));
        lines.into_iter().map(|(_, _, line)| line).collect()
    }

    pub fn digest(&self) -> Digest {
        hash_bytes(self.listing().as_bytes())
    }

    /// Parse a canonical listing
    ///
    /// Lines with fewer than three fields are skipped. A nickname repeated
    /// within one namespace is rejected; the same nickname appearing once as a
    /// file and once as a directory is accepted and resolved file-first by
    /// [`Tree::get`].
    pub fn parse(text: &str) -> Result<Self> {
        let mut tree = Tree::new();

        for line in text.lines() {
            let mut fields = line.splitn(3, ' ');
            let (Some(kind), Some(hex), Some(name)) = (fields.next(), fields.next(), fields.next())
            else {
                continue;
            };
            if name.is_empty() {
                continue;
            }

            let digest = Digest::from_hex(hex)
                .map_err(|_| Error::format("tree listing", format!("bad digest in {line:?}")))?;

            let duplicate = match kind {
                KIND_BLOB => tree.blobs.insert(name.to_string(), Blob::new(digest, true)).is_some(),
                KIND_COPY => tree.blobs.insert(name.to_string(), Blob::new(digest, false)).is_some(),
                KIND_TREE => tree.trees.insert(name.to_string(), digest).is_some(),
                other => {
                    return Err(Error::format(
                        "tree listing",
                        format!("unknown entry kind {other:?}"),
                    ))
                }
            };
            if duplicate {
                return Err(Error::format(
                    "tree listing",
                    format!("nickname {name:?} listed twice"),
                ));
            }
        }

        Ok(tree)
    }

    /// Direct child by single-segment name; a file wins over a directory
    pub fn child(&self, name: &str) -> Option<Node> {
        if let Some(blob) = self.blobs.get(name) {
            return Some(Node::Blob(*blob));
        }
        self.trees.get(name).map(|digest| Node::Tree(*digest))
    }

    fn is_taken(&self, name: &str) -> bool {
        self.blobs.contains_key(name) || self.trees.contains_key(name)
    }

    /// Resolve a slash-separated nickname
    pub fn get(&self, store: &ObjectStore, nickname: &str) -> Result<Option<Node>> {
        let nickname = normalize_nickname(nickname)?;
        let segments: Vec<&str> = nickname.split('/').collect();
        self.get_segments(store, &segments)
    }

    fn get_segments(&self, store: &ObjectStore, segments: &[&str]) -> Result<Option<Node>> {
        match segments {
            [] => Ok(None),
            [leaf] => Ok(self.child(leaf)),
            [head, rest @ ..] => match self.trees.get(*head) {
                Some(digest) => store.tree(digest)?.get_segments(store, rest),
                None => Ok(None),
            },
        }
    }

    /// File `node` under `nickname`, creating intermediate trees
    ///
    /// Returns the updated tree, or `None` if the nickname (or a file on the
    /// way to it) is already taken. `self` is never modified; every tree on
    /// the path is copied and registered in the store's table.
    pub fn add(&self, store: &ObjectStore, nickname: &str, node: Node) -> Result<Option<Tree>> {
        let nickname = normalize_nickname(nickname)?;
        let segments: Vec<&str> = nickname.split('/').collect();
        self.add_segments(store, &segments, node)
    }

    fn add_segments(&self, store: &ObjectStore, segments: &[&str], node: Node) -> Result<Option<Tree>> {
        match segments {
            [] => Err(Error::InvalidNickname(String::new())),
            [leaf] => {
                if self.is_taken(leaf) {
                    return Ok(None);
                }
                let mut next = self.clone();
                match node {
                    Node::Blob(blob) => {
                        next.blobs.insert(leaf.to_string(), blob);
                    }
                    Node::Tree(digest) => {
                        next.trees.insert(leaf.to_string(), digest);
                    }
                }
                Ok(Some(next))
            }
            [head, rest @ ..] => {
                if self.blobs.contains_key(*head) {
                    return Ok(None);
                }
                let child = match self.trees.get(*head) {
                    Some(digest) => store.tree(digest)?,
                    None => Arc::new(Tree::new()),
                };
                let Some(updated) = child.add_segments(store, rest, node)? else {
                    return Ok(None);
                };
                let digest = store.insert_tree(updated);
                let mut next = self.clone();
                next.trees.insert(head.to_string(), digest);
                Ok(Some(next))
            }
        }
    }

    /// Build the root tree for every entry of `builder`
    ///
    /// Relative source paths resolve against `base`. A nickname collision
    /// aborts the build with [`Error::NameConflict`].
    pub fn build(store: &ObjectStore, base: &Path, builder: &Builder) -> Result<Digest> {
        let mut root = Tree::new();

        for (path, nickname) in builder.iter() {
            let source = resolve_path(base, path);
            let metadata = fs::metadata(&source).at(&source)?;

            let node = if metadata.is_dir() {
                Node::Tree(Tree::build_dir(store, &source)?)
            } else {
                Node::Blob(store.save_blob(&source)?)
            };

            root = match root.add(store, nickname, node)? {
                Some(next) => next,
                None => return Err(Error::NameConflict(nickname.to_string())),
            };
        }

        Ok(store.insert_tree(root))
    }

    /// Snapshot a directory recursively, storing every file as a blob
    ///
    /// Symlinks to files are followed; symlinks to directories, dangling
    /// links and special files are skipped with a warning.
    pub fn build_dir(store: &ObjectStore, dir: &Path) -> Result<Digest> {
        let mut entries = fs::read_dir(dir)
            .at(dir)?
            .collect::<std::io::Result<Vec<_>>>()
            .at(dir)?;
        entries.sort_by_key(|entry| entry.file_name());

        let mut tree = Tree::new();
        for entry in entries {
            let path = entry.path();
            let name = match entry.file_name().into_string() {
                Ok(name) if !name.chars().any(char::is_control) => name,
                _ => {
                    tracing::warn!("skipping {}: name cannot be stored", path.display());
                    continue;
                }
            };

            let is_link = entry.file_type().at(&path)?.is_symlink();
            let metadata = match fs::metadata(&path) {
                Ok(metadata) => metadata,
                Err(e) if is_link && e.kind() == std::io::ErrorKind::NotFound => {
                    tracing::warn!("skipping dangling link {}", path.display());
                    continue;
                }
                Err(e) => return Err(e).at(&path),
            };

            if metadata.is_dir() {
                if is_link {
                    tracing::warn!("skipping directory link {}", path.display());
                    continue;
                }
                let digest = Tree::build_dir(store, &path)?;
                tree.trees.insert(name, digest);
            } else if metadata.is_file() {
                let blob = store.save_blob(&path)?;
                tree.blobs.insert(name, blob);
            } else {
                tracing::warn!("skipping {}: not a regular file or directory", path.display());
            }
        }

        Ok(store.insert_tree(tree))
    }

    /// Persist this tree and everything reachable from it
    ///
    /// Subtrees are written before their parent, so an existing object means
    /// its whole subgraph is already stored and the call stops there.
    pub fn save(&self, store: &ObjectStore) -> Result<Digest> {
        let listing = self.listing();
        let digest = hash_bytes(listing.as_bytes());
        if store.contains(&digest) {
            return Ok(digest);
        }

        for child in self.trees.values() {
            store.tree(child)?.save(store)?;
        }
        store.write_compressed(digest, listing.as_bytes())?;
        Ok(digest)
    }

    /// Load a stored tree and every subtree below it
    pub fn load(store: &ObjectStore, digest: &Digest) -> Result<Arc<Tree>> {
        if let Some(tree) = store.cached_tree(digest) {
            return Ok(tree);
        }

        let data = store.read_compressed(digest)?;
        let text = String::from_utf8(data)
            .map_err(|_| Error::corrupt(*digest, "listing is not valid UTF-8"))?;
        let tree = Tree::parse(&text)?;

        for child in tree.trees.values() {
            Tree::load(store, child)?;
        }

        let tree = Arc::new(tree);
        store.cache_tree(*digest, Arc::clone(&tree));
        Ok(tree)
    }

    /// Recreate the whole tree under `target`, overwriting existing files
    pub fn restore_all(&self, store: &ObjectStore, target: &Path) -> Result<()> {
        fs::create_dir_all(target).at(target)?;

        for (name, blob) in &self.blobs {
            store.restore_blob(blob, &target.join(name))?;
        }
        for (name, digest) in &self.trees {
            store.tree(digest)?.restore_all(store, &target.join(name))?;
        }
        Ok(())
    }

    /// Restore only the nicknames `restorer` names, each to its own path
    ///
    /// Relative destinations resolve against `base`. Nothing outside those
    /// destinations is touched, and nicknames absent from the tree are
    /// reported rather than treated as errors.
    pub fn restore_with(
        &self,
        store: &ObjectStore,
        restorer: &Restorer,
        base: &Path,
    ) -> Result<RestoreReport> {
        let mut report = RestoreReport::default();

        for (nickname, path) in restorer.iter() {
            let target = resolve_path(base, path);
            match self.get(store, nickname)? {
                Some(node) => {
                    node.restore(store, &target)?;
                    tracing::debug!("restored {} to {}", nickname, target.display());
                    report.restored.push(nickname.to_string());
                }
                None => {
                    tracing::warn!("{} is not part of this backup, skipping", nickname);
                    report.missing.push(nickname.to_string());
                }
            }
        }

        Ok(report)
    }

    /// Direct children, one per line (`name/` marks a directory)
    pub fn list(&self) -> String {
        let mut out = String::new();
        self.write_level(&mut out, "");
        out
    }

    /// Every descendant, indented four spaces per level
    pub fn list_all(&self, store: &ObjectStore) -> Result<String> {
        let mut out = String::new();
        self.write_all(store, &mut out, 0)?;
        Ok(out)
    }

    fn write_level(&self, out: &mut String, indent: &str) {
        for (name, blob) in &self.blobs {
            let _ = writeln!(out, "{indent}{name}  {}", blob.digest.short());
        }
        for name in self.trees.keys() {
            let _ = writeln!(out, "{indent}{name}/");
        }
    }

    fn write_all(&self, store: &ObjectStore, out: &mut String, depth: usize) -> Result<()> {
        let indent = INDENT.repeat(depth);
        for (name, blob) in &self.blobs {
            let _ = writeln!(out, "{indent}{name}  {}", blob.digest.short());
        }
        for (name, digest) in &self.trees {
            let _ = writeln!(out, "{indent}{name}/");
            store.tree(digest)?.write_all(store, out, depth + 1)?;
        }
        Ok(())
    }
}

impl ObjectStore {
    /// Look up a tree in the table, loading it from disk if needed
    pub fn tree(&self, digest: &Digest) -> Result<Arc<Tree>> {
        Tree::load(self, digest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StoreOptions;
    use tempfile::TempDir;

    fn open_store(temp: &TempDir) -> Result<ObjectStore> {
        ObjectStore::open(
            &temp.path().join("objects"),
            &temp.path().join("tmp"),
            StoreOptions::default(),
        )
    }

    fn blob(content: &[u8]) -> Blob {
        Blob::new(hash_bytes(content), true)
    }

    #[test]
    fn test_listing_is_sorted_by_nickname() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let store = open_store(&temp)?;

        let sub = store.insert_tree(Tree::new());
        let tree = Tree::new()
            .add(&store, "zeta", Node::Blob(blob(b"z")))?
            .unwrap()
            .add(&store, "alpha", Node::Tree(sub))?
            .unwrap()
            .add(&store, "mid", Node::Blob(Blob::new(hash_bytes(b"m"), false)))?
            .unwrap();

        let listing = tree.listing();
        let kinds: Vec<&str> = listing.lines().map(|l| l.split(' ').next().unwrap()).collect();
        let names: Vec<&str> = listing.lines().map(|l| l.splitn(3, ' ').nth(2).unwrap()).collect();
        assert_eq!(names, ["alpha", "mid", "zeta"]);
        assert_eq!(kinds, ["tree", "copy", "blob"]);
        Ok(())
    }

    #[test]
    fn test_parse_roundtrip_and_skips_short_lines() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let store = open_store(&temp)?;

        let tree = Tree::new()
            .add(&store, "with space.txt", Node::Blob(blob(b"a")))?
            .unwrap();
        let mut text = tree.listing();
        text.push_str("\nshort line\n");

        let parsed = Tree::parse(&text)?;
        assert_eq!(parsed, tree);
        Ok(())
    }

    #[test]
    fn test_parse_rejects_bad_lines() {
        let digest = hash_bytes(b"x");
        assert!(matches!(
            Tree::parse(&format!("link {digest} a\n")),
            Err(Error::Format { .. })
        ));
        assert!(matches!(
            Tree::parse("blob nothex a\n"),
            Err(Error::Format { .. })
        ));
        assert!(matches!(
            Tree::parse(&format!("blob {digest} a\ncopy {digest} a\n")),
            Err(Error::Format { .. })
        ));
    }

    #[test]
    fn test_add_creates_intermediate_trees() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let store = open_store(&temp)?;

        let leaf = blob(b"leaf");
        let tree = Tree::new().add(&store, "a/b/c.txt", Node::Blob(leaf))?.unwrap();

        assert!(tree.get(&store, "a")?.is_some_and(|n| n.is_tree()));
        assert!(tree.get(&store, "a/b")?.is_some_and(|n| n.is_tree()));
        assert_eq!(tree.get(&store, "a/b/c.txt")?, Some(Node::Blob(leaf)));
        assert_eq!(tree.get(&store, "a/missing")?, None);
        Ok(())
    }

    #[test]
    fn test_add_rejects_taken_nickname_without_mutating() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let store = open_store(&temp)?;

        let tree = Tree::new().add(&store, "a/x", Node::Blob(blob(b"1")))?.unwrap();
        let before = tree.clone();

        assert!(tree.add(&store, "a/x", Node::Blob(blob(b"2")))?.is_none());
        assert!(tree.add(&store, "a", Node::Blob(blob(b"3")))?.is_none());
        assert!(tree.add(&store, "a/x/deeper", Node::Blob(blob(b"4")))?.is_none());
        assert_eq!(tree, before);

        let extended = tree.add(&store, "a/y", Node::Blob(blob(b"5")))?.unwrap();
        assert_eq!(tree, before);
        assert_eq!(extended.get(&store, "a/x")?, before.get(&store, "a/x")?);
        Ok(())
    }

    #[test]
    fn test_blob_wins_over_same_named_subtree() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let store = open_store(&temp)?;

        let file = blob(b"file");
        let sub = store.insert_tree(Tree::new());
        let text = format!("blob {} both\ntree {} both\n", file.digest, sub);
        let tree = Tree::parse(&text)?;

        assert_eq!(tree.len(), 2);
        assert_eq!(tree.get(&store, "both")?, Some(Node::Blob(file)));
        assert_eq!(tree.listing(), text);
        Ok(())
    }

    #[test]
    fn test_identical_directories_share_digest() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let store = open_store(&temp)?;

        for root in ["one", "two"] {
            let dir = temp.path().join(root);
            fs::create_dir_all(dir.join("nested"))?;
            fs::write(dir.join("a.txt"), b"alpha")?;
            fs::write(dir.join("nested/b.txt"), b"beta")?;
        }

        let first = Tree::build_dir(&store, &temp.path().join("one"))?;
        let second = Tree::build_dir(&store, &temp.path().join("two"))?;
        assert_eq!(first, second);

        fs::write(temp.path().join("two/nested/b.txt"), b"changed")?;
        let third = Tree::build_dir(&store, &temp.path().join("two"))?;
        assert_ne!(first, third);
        Ok(())
    }

    #[test]
    fn test_save_and_load_roundtrip() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let dir = temp.path().join("data");
        fs::create_dir_all(dir.join("sub/deeper"))?;
        fs::write(dir.join("top.txt"), b"top")?;
        fs::write(dir.join("sub/deeper/leaf.txt"), b"leaf")?;

        let digest = {
            let store = open_store(&temp)?;
            let digest = Tree::build_dir(&store, &dir)?;
            assert_eq!(store.tree(&digest)?.save(&store)?, digest);
            digest
        };

        // A fresh store has an empty table and must read from disk
        let store = open_store(&temp)?;
        let loaded = Tree::load(&store, &digest)?;
        assert_eq!(loaded.digest(), digest);
        assert!(loaded.get(&store, "sub/deeper/leaf.txt")?.is_some());
        Ok(())
    }

    #[test]
    fn test_load_missing_tree() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let store = open_store(&temp)?;

        let digest = hash_bytes(b"no such listing");
        assert!(matches!(Tree::load(&store, &digest), Err(Error::NotFound(_))));
        Ok(())
    }

    #[test]
    fn test_build_reports_nickname_collision() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let store = open_store(&temp)?;
        fs::write(temp.path().join("a.txt"), b"a")?;
        fs::write(temp.path().join("b.txt"), b"b")?;

        let mut builder = Builder::new();
        assert!(builder.add(Path::new("a.txt"), "shared/x")?);
        assert!(builder.add(Path::new("b.txt"), "shared")?);

        // "a.txt" files first and claims "shared" as a directory
        let err = Tree::build(&store, temp.path(), &builder).unwrap_err();
        assert!(matches!(err, Error::NameConflict(ref n) if n == "shared"));
        Ok(())
    }

    #[test]
    fn test_list_all_indents_levels() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let store = open_store(&temp)?;

        let tree = Tree::new()
            .add(&store, "top.txt", Node::Blob(blob(b"t")))?
            .unwrap()
            .add(&store, "dir/inner.txt", Node::Blob(blob(b"i")))?
            .unwrap();

        let listing = tree.list_all(&store)?;
        let lines: Vec<&str> = listing.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("top.txt  "));
        assert_eq!(lines[1], "dir/");
        assert!(lines[2].starts_with("    inner.txt  "));
        assert_eq!(tree.list().lines().count(), 2);
        Ok(())
    }
}
