// Path: crates/types/src/bitmap.rs
//! A compact, MSB-first bitset.
//!
//! Bit `0` is the leftmost bit of the first byte, matching the wire layout of
//! bitstring status lists: the encoded form of a status bitmap is exactly the
//! GZIP of [`Bitmap::as_bytes`]. Block bitmaps and list-level block masks use
//! the same structure.

use serde::{Deserialize, Serialize};

/// A fixed-length bitset packed into bytes, most significant bit first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bitmap {
    len: u32,
    bytes: Vec<u8>,
}

impl Bitmap {
    /// Creates an all-zero bitmap of `len` bits.
    pub fn new(len: u32) -> Self {
        Self {
            len,
            bytes: vec![0u8; (len as usize).div_ceil(8)],
        }
    }

    /// Creates an all-one bitmap of `len` bits.
    ///
    /// Trailing bits of the final partial byte are left clear so that
    /// [`Bitmap::count_ones`] equals `len`.
    pub fn filled(len: u32) -> Self {
        let mut bm = Self::new(len);
        for i in 0..len {
            bm.set(i);
        }
        bm
    }

    /// Reconstructs a bitmap from raw bytes and a bit length.
    ///
    /// Returns `None` if the byte slice is too short for `len` bits.
    pub fn from_bytes(len: u32, bytes: Vec<u8>) -> Option<Self> {
        if bytes.len() < (len as usize).div_ceil(8) {
            return None;
        }
        Some(Self { len, bytes })
    }

    /// The number of bits in the bitmap.
    pub fn len(&self) -> u32 {
        self.len
    }

    /// Whether the bitmap has zero bits of capacity.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The packed byte representation, bit 0 in the high bit of byte 0.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Reads bit `i`. Out-of-range reads return `false`.
    pub fn get(&self, i: u32) -> bool {
        if i >= self.len {
            return false;
        }
        let byte = self.bytes.get((i / 8) as usize).copied().unwrap_or(0);
        byte & Self::mask(i) != 0
    }

    /// Sets bit `i`. Out-of-range writes are ignored.
    pub fn set(&mut self, i: u32) {
        if i >= self.len {
            return;
        }
        if let Some(b) = self.bytes.get_mut((i / 8) as usize) {
            *b |= Self::mask(i);
        }
    }

    /// Clears bit `i`. Out-of-range writes are ignored.
    pub fn clear(&mut self, i: u32) {
        if i >= self.len {
            return;
        }
        if let Some(b) = self.bytes.get_mut((i / 8) as usize) {
            *b &= !Self::mask(i);
        }
    }

    /// Writes `value` to bit `i`.
    pub fn assign(&mut self, i: u32, value: bool) {
        if value {
            self.set(i)
        } else {
            self.clear(i)
        }
    }

    /// The position of the lowest zero bit, or `None` when every bit is set.
    pub fn first_zero(&self) -> Option<u32> {
        for (idx, byte) in self.bytes.iter().enumerate() {
            if *byte == 0xFF {
                continue;
            }
            let base = idx as u32 * 8;
            for bit in 0..8u32 {
                let i = base + bit;
                if i >= self.len {
                    return None;
                }
                if *byte & Self::mask(i) == 0 {
                    return Some(i);
                }
            }
        }
        None
    }

    /// The number of set bits.
    pub fn count_ones(&self) -> u32 {
        self.bytes.iter().map(|b| b.count_ones()).sum()
    }

    /// Whether every bit is set.
    pub fn is_full(&self) -> bool {
        self.count_ones() == self.len
    }

    /// Whether at least one bit is set.
    pub fn any_set(&self) -> bool {
        self.bytes.iter().any(|b| *b != 0)
    }

    /// Whether no two bitmaps of equal length share a set bit.
    pub fn is_disjoint(&self, other: &Bitmap) -> bool {
        self.bytes
            .iter()
            .zip(other.bytes.iter())
            .all(|(a, b)| a & b == 0)
    }

    #[inline]
    fn mask(i: u32) -> u8 {
        0x80 >> (i % 8)
    }
}
