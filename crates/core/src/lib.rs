//! bkp core: content-addressed storage primitives for the bkp backup engine
//!
//! This crate provides the storage layer:
//! - BLAKE3 digests and zstd compression
//! - Blob storage (compressed or verbatim) with dedup by digest
//! - Trees: directory snapshots addressed by their canonical listing
//! - Builder/Restorer path ↔ nickname mappings

pub mod blob;
pub mod codec;
pub mod error;
pub mod hash;
pub mod object;
pub mod pathmap;
pub mod store;
pub mod tree;

pub use blob::Blob;
pub use error::{Error, IoContext, Result};
pub use hash::{hash_bytes, hash_file, Digest};
pub use object::{Node, Object};
pub use pathmap::{default_nickname, resolve_path, Builder, PathMap, Restorer, SEPARATOR};
pub use store::{atomic_write, normalize_nickname, ObjectStore, StoreOptions};
pub use tree::{RestoreReport, Tree};
