//! Error type shared by the object store and the path mapper

use crate::hash::Digest;
use std::io;
use std::path::{Path, PathBuf};

pub type Result<T> = std::result::Result<T, Error>;

/// Failures surfaced by `bkp-core` operations
///
/// Naming conflicts on mapper inserts are not errors: those return `false`.
/// `NameConflict` is only raised while assembling a tree, where a collision
/// aborts the build.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// File missing, unreadable or unwritable
    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// No object file exists for this digest
    #[error("object {0} not found")]
    NotFound(Digest),

    /// Stored bytes could not be decoded or do not hash to their digest
    #[error("object {digest} is corrupt: {reason}")]
    Corrupt { digest: Digest, reason: String },

    /// Text that should be a listing, a digest or a setting could not be parsed
    #[error("malformed {what}: {reason}")]
    Format { what: &'static str, reason: String },

    #[error("invalid nickname {0:?}")]
    InvalidNickname(String),

    /// A tree already holds an entry under this nickname
    #[error("nickname {0:?} is already taken")]
    NameConflict(String),
}

impl Error {
    pub(crate) fn format(what: &'static str, reason: impl Into<String>) -> Self {
        Error::Format {
            what,
            reason: reason.into(),
        }
    }

    pub(crate) fn corrupt(digest: Digest, reason: impl Into<String>) -> Self {
        Error::Corrupt {
            digest,
            reason: reason.into(),
        }
    }
}

/// Attach the offending path to a raw `io::Error`
pub trait IoContext<T> {
    fn at(self, path: &Path) -> Result<T>;
}

impl<T> IoContext<T> for std::result::Result<T, io::Error> {
    fn at(self, path: &Path) -> Result<T> {
        self.map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}
