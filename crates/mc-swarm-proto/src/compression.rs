//! Zlib packet compression.

use std::io::{Read, Write};

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;

use crate::error::ProtoError;

/// Largest uncompressed packet the vanilla client accepts (8 MiB).
pub const MAX_UNCOMPRESSED_SIZE: usize = 8 * 1024 * 1024;

/// Compress a packet body with zlib at the given level (0-9).
pub fn compress(data: &[u8], level: u32) -> Result<Vec<u8>, ProtoError> {
    let mut encoder = ZlibEncoder::new(Vec::with_capacity(data.len() / 2), Compression::new(level));
    encoder
        .write_all(data)
        .map_err(|e| ProtoError::CompressError(e.to_string()))?;
    encoder
        .finish()
        .map_err(|e| ProtoError::CompressError(e.to_string()))
}

/// Decompress a zlib body that must inflate to exactly `expected_len` bytes.
pub fn decompress(data: &[u8], expected_len: usize) -> Result<Vec<u8>, ProtoError> {
    if expected_len > MAX_UNCOMPRESSED_SIZE {
        return Err(ProtoError::FrameTooLarge {
            len: expected_len,
            max: MAX_UNCOMPRESSED_SIZE,
        });
    }
    let mut output = Vec::with_capacity(expected_len);
    // Read one byte past the declared size so an oversized body is detected
    // without inflating it completely.
    ZlibDecoder::new(data)
        .take(expected_len as u64 + 1)
        .read_to_end(&mut output)
        .map_err(|e| ProtoError::DecompressError(e.to_string()))?;
    if output.len() != expected_len {
        return Err(ProtoError::BadDataLength {
            declared: expected_len,
            actual: output.len(),
        });
    }
    Ok(output)
}
