//! BLAKE3 digests used as object identity

use crate::error::{Error, IoContext, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Files above this size are hashed through a memory map
pub const MMAP_THRESHOLD: u64 = 4 * 1024 * 1024;

/// Content digest of a stored object (32 bytes of BLAKE3)
#[derive(Copy, Clone, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct Digest([u8; 32]);

impl Digest {
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Lowercase hex rendering, 64 characters
    pub fn to_hex(&self) -> String {
        const HEX_CHARS: &[u8] = b"0123456789abcdef";
        let mut hex = String::with_capacity(64);
        for &byte in &self.0 {
            hex.push(HEX_CHARS[(byte >> 4) as usize] as char);
            hex.push(HEX_CHARS[(byte & 0xf) as usize] as char);
        }
        hex
    }

    /// First 12 hex characters, for listings
    pub fn short(&self) -> String {
        let mut hex = self.to_hex();
        hex.truncate(12);
        hex
    }

    pub fn from_hex(hex: &str) -> Result<Self> {
        if hex.len() != 64 {
            return Err(Error::format(
                "digest",
                format!("expected 64 hex characters, got {}", hex.len()),
            ));
        }

        let raw = hex.as_bytes();
        let mut bytes = [0u8; 32];
        for (i, byte) in bytes.iter_mut().enumerate() {
            let high = nibble(raw[i * 2])?;
            let low = nibble(raw[i * 2 + 1])?;
            *byte = (high << 4) | low;
        }
        Ok(Self(bytes))
    }

    /// Object location relative to the object root: `ab/cdef...`
    pub fn fan_out(&self) -> PathBuf {
        let hex = self.to_hex();
        let (dir, rest) = hex.split_at(2);
        PathBuf::from(dir).join(rest)
    }
}

fn nibble(c: u8) -> Result<u8> {
    match c {
        b'0'..=b'9' => Ok(c - b'0'),
        b'a'..=b'f' => Ok(c - b'a' + 10),
        b'A'..=b'F' => Ok(c - b'A' + 10),
        _ => Err(Error::format(
            "digest",
            format!("invalid hex character {:?}", c as char),
        )),
    }
}

impl FromStr for Digest {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_hex(s)
    }
}

impl std::fmt::Debug for Digest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Digest({})", self.to_hex())
    }
}

impl std::fmt::Display for Digest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl Serialize for Digest {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Digest {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let hex = String::deserialize(deserializer)?;
        Digest::from_hex(&hex).map_err(serde::de::Error::custom)
    }
}

pub fn hash_bytes(data: &[u8]) -> Digest {
    Digest::from_bytes(*blake3::hash(data).as_bytes())
}

/// Hash a file, streaming it through an 8KB buffer
pub fn hash_file(path: &Path) -> Result<Digest> {
    use std::fs::File;
    use std::io::{BufReader, Read};

    let file = File::open(path).at(path)?;
    let mut reader = BufReader::new(file);
    let mut hasher = blake3::Hasher::new();

    let mut buffer = [0u8; 8192];
    loop {
        let n = reader.read(&mut buffer).at(path)?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }

    Ok(Digest::from_bytes(*hasher.finalize().as_bytes()))
}

/// Hash a file through a read-only memory map
pub fn hash_file_mmap(path: &Path) -> Result<Digest> {
    use memmap2::Mmap;
    use std::fs::File;

    let file = File::open(path).at(path)?;
    // SAFETY: the map is read-only and dropped before returning. A concurrent
    // writer can only change the bytes we hash, not memory safety.
    let mmap = unsafe { Mmap::map(&file) }.at(path)?;
    Ok(hash_bytes(&mmap))
}

/// Pick the hashing strategy by file size
pub fn hash_path(path: &Path, len: u64) -> Result<Digest> {
    // Mmap of an empty file fails on some platforms
    if len > MMAP_THRESHOLD {
        hash_file_mmap(path)
    } else {
        hash_file(path)
    }
}
