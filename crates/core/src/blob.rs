//! File content objects
//!
//! A blob is identified by the digest of the original file bytes. Files
//! below the store's compression threshold are kept as a zstd stream, larger
//! ones as a verbatim copy.

use crate::error::{Error, IoContext, Result};
use crate::hash::{hash_bytes, hash_path, Digest};
use crate::store::ObjectStore;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Blob {
    /// Digest of the original (uncompressed) content
    pub digest: Digest,
    /// Whether the stored object is a zstd stream rather than a plain copy
    pub compressed: bool,
}

impl Blob {
    pub fn new(digest: Digest, compressed: bool) -> Self {
        Self { digest, compressed }
    }
}

impl ObjectStore {
    /// Store the file at `source` and return its blob
    ///
    /// The file is hashed first; if an object with that digest already exists
    /// nothing is written and the blob takes the stored object's encoding.
    pub fn save_blob(&self, source: &Path) -> Result<Blob> {
        let len = fs::metadata(source).at(source)?.len();
        let compressed = len < self.options().compression_threshold;

        if compressed {
            let data = fs::read(source).at(source)?;
            let digest = hash_bytes(&data);
            if let Some(blob) = self.existing_blob(digest)? {
                return Ok(blob);
            }
            self.write_compressed(digest, &data)?;
            Ok(Blob::new(digest, true))
        } else {
            let digest = hash_path(source, len)?;
            if let Some(blob) = self.existing_blob(digest)? {
                return Ok(blob);
            }
            if self.copy_verbatim(digest, source)? {
                tracing::debug!("copied {} ({} bytes) verbatim", source.display(), len);
            }
            Ok(Blob::new(digest, false))
        }
    }

    fn existing_blob(&self, digest: Digest) -> Result<Option<Blob>> {
        let Some(compressed) = self.stored_encoding(&digest)? else {
            return Ok(None);
        };
        tracing::debug!("object {} already stored", digest);
        Ok(Some(Blob::new(digest, compressed)))
    }

    /// Write a blob's content to `target`, replacing whatever is there
    pub fn restore_blob(&self, blob: &Blob, target: &Path) -> Result<()> {
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).at(parent)?;
        }

        if blob.compressed {
            let data = self.read_compressed(&blob.digest)?;
            fs::write(target, data).at(target)?;
        } else {
            self.verify_verbatim(&blob.digest)?;
            let source = self.object_path(&blob.digest);
            fs::copy(&source, target).at(target)?;
        }
        Ok(())
    }

    /// Read a blob fully into memory, verifying its digest
    pub fn read_blob(&self, blob: &Blob) -> Result<Vec<u8>> {
        if blob.compressed {
            return self.read_compressed(&blob.digest);
        }

        let path = self.object_path(&blob.digest);
        let data = match fs::read(&path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::NotFound(blob.digest))
            }
            Err(e) => return Err(e).at(&path),
        };
        if hash_bytes(&data) != blob.digest {
            return Err(Error::corrupt(blob.digest, "verbatim copy was modified"));
        }
        Ok(data)
    }

    /// Check that the object behind a blob exists and decodes
    pub fn check_blob(&self, blob: &Blob) -> Result<()> {
        if blob.compressed {
            self.read_compressed(&blob.digest).map(|_| ())
        } else {
            self.verify_verbatim(&blob.digest)
        }
    }
}
