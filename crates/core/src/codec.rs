//! zstd wrappers for stored objects

use std::io;

pub const DEFAULT_LEVEL: i32 = 3;

/// First four bytes of every zstd frame
const FRAME_MAGIC: [u8; 4] = [0x28, 0xB5, 0x2F, 0xFD];

pub fn has_frame_magic(prefix: &[u8]) -> bool {
    prefix.starts_with(&FRAME_MAGIC)
}

pub fn compress(data: &[u8], level: i32) -> io::Result<Vec<u8>> {
    zstd::encode_all(data, level)
}

pub fn decompress(data: &[u8]) -> io::Result<Vec<u8>> {
    zstd::decode_all(data)
}
