// Path: crates/status/src/bitstring.rs
//! GZIP + base64url encoding of status bitmaps.
//!
//! The encoded form of a status list is the base64url (no padding) of the
//! GZIP-compressed bitmap bytes, first index at the leftmost bit. The
//! in-memory [`Bitmap`] already uses that bit order, so encoding is a
//! straight compression of its byte representation.

use attestor_types::bitmap::Bitmap;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::io::{Read, Write};

/// Compresses and encodes a status bitmap.
pub fn encode(bits: &Bitmap) -> Result<String, String> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(bits.as_bytes())
        .map_err(|e| format!("bitstring compression failed: {}", e))?;
    let compressed = encoder
        .finish()
        .map_err(|e| format!("bitstring compression failed: {}", e))?;
    Ok(URL_SAFE_NO_PAD.encode(compressed))
}

/// Decodes an encoded list back into a bitmap of `len` bits.
pub fn decode(encoded: &str, len: u32) -> Result<Bitmap, String> {
    let compressed = URL_SAFE_NO_PAD
        .decode(encoded)
        .map_err(|e| format!("bitstring base64 decode failed: {}", e))?;
    let mut bytes = Vec::new();
    GzDecoder::new(compressed.as_slice())
        .read_to_end(&mut bytes)
        .map_err(|e| format!("bitstring decompression failed: {}", e))?;
    Bitmap::from_bytes(len, bytes).ok_or_else(|| "bitstring shorter than declared length".into())
}
