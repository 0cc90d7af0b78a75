//! Shared identity and restore capability of stored objects

use crate::blob::Blob;
use crate::error::Result;
use crate::hash::Digest;
use crate::pathmap::{Builder, Restorer};
use crate::store::ObjectStore;
use crate::tree::Tree;
use std::path::Path;

/// Anything that is addressed by digest and can be written back out
///
/// Blobs restore to a file, trees to a directory, mappings to a setting file.
pub trait Object {
    fn digest(&self) -> Digest;

    fn restore(&self, store: &ObjectStore, target: &Path) -> Result<()>;
}

/// A tree child: either a file or a subdirectory
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Node {
    Blob(Blob),
    Tree(Digest),
}

impl Node {
    pub fn is_tree(&self) -> bool {
        matches!(self, Node::Tree(_))
    }
}

impl Object for Node {
    fn digest(&self) -> Digest {
        match self {
            Node::Blob(blob) => blob.digest,
            Node::Tree(digest) => *digest,
        }
    }

    fn restore(&self, store: &ObjectStore, target: &Path) -> Result<()> {
        match self {
            Node::Blob(blob) => blob.restore(store, target),
            Node::Tree(digest) => store.tree(digest)?.restore(store, target),
        }
    }
}

impl Object for Blob {
    fn digest(&self) -> Digest {
        self.digest
    }

    fn restore(&self, store: &ObjectStore, target: &Path) -> Result<()> {
        store.restore_blob(self, target)
    }
}

impl Object for Tree {
    fn digest(&self) -> Digest {
        Tree::digest(self)
    }

    fn restore(&self, store: &ObjectStore, target: &Path) -> Result<()> {
        self.restore_all(store, target)
    }
}

impl Object for Builder {
    fn digest(&self) -> Digest {
        Builder::digest(self)
    }

    fn restore(&self, _store: &ObjectStore, target: &Path) -> Result<()> {
        self.export(target)
    }
}

impl Object for Restorer {
    fn digest(&self) -> Digest {
        Restorer::digest(self)
    }

    fn restore(&self, _store: &ObjectStore, target: &Path) -> Result<()> {
        self.export(target)
    }
}
