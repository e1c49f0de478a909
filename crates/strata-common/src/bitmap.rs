//! Byte-backed bitmaps and a shared, ref-counted bitmap table
//!
//! Classes keep their module visibility as a bitmap installed in a
//! [`BitmapTable`]. Equal bitmaps share one table entry.

use crate::codec::{read_len, write_u32};
use crate::CommonResult;
use rustc_hash::FxHashMap;
use std::io::{Read, Write};

/// Growable bitset stored as bytes, canonical without trailing zero bytes
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Bitmap {
    bytes: Vec<u8>,
}

impl Bitmap {
    /// Empty bitmap
    pub fn new() -> Self {
        Self::default()
    }

    /// Bitmap with only `bit` set
    pub fn with_bit(bit: usize) -> Self {
        let mut map = Self::new();
        map.set(bit);
        map
    }

    /// Build from raw bytes
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        let mut map = Self { bytes };
        map.trim();
        map
    }

    /// Set `bit`, growing as needed
    pub fn set(&mut self, bit: usize) {
        let byte = bit / 8;
        if byte >= self.bytes.len() {
            self.bytes.resize(byte + 1, 0);
        }
        self.bytes[byte] |= 1 << (bit % 8);
    }

    /// Clear `bit`
    pub fn clear(&mut self, bit: usize) {
        if let Some(b) = self.bytes.get_mut(bit / 8) {
            *b &= !(1 << (bit % 8));
        }
        self.trim();
    }

    /// Test `bit`
    pub fn test(&self, bit: usize) -> bool {
        self.bytes
            .get(bit / 8)
            .is_some_and(|b| b & (1 << (bit % 8)) != 0)
    }

    /// Number of set bits
    pub fn count_ones(&self) -> usize {
        self.bytes.iter().map(|b| b.count_ones() as usize).sum()
    }

    /// Indices of set bits in ascending order
    pub fn iter_ones(&self) -> impl Iterator<Item = usize> + '_ {
        self.bytes.iter().enumerate().flat_map(|(i, b)| {
            (0..8).filter(move |bit| b & (1 << bit) != 0).map(move |bit| i * 8 + bit)
        })
    }

    /// Raw bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Size in bytes
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// True if no bit is set
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Encode as length-prefixed bytes
    pub fn encode(&self, writer: &mut impl Write) -> std::io::Result<()> {
        write_u32(writer, self.bytes.len() as u32)?;
        writer.write_all(&self.bytes)
    }

    /// Decode a length-prefixed bitmap
    pub fn decode(reader: &mut impl Read) -> CommonResult<Self> {
        let len = read_len(reader)?;
        let mut bytes = vec![0u8; len];
        reader.read_exact(&mut bytes)?;
        Ok(Self::from_bytes(bytes))
    }

    fn trim(&mut self) {
        while self.bytes.last() == Some(&0) {
            self.bytes.pop();
        }
    }
}

/// Handle to an entry of a [`BitmapTable`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BitmapRef(u32);

impl BitmapRef {
    /// Raw slot of this entry inside its table
    pub fn index(self) -> u32 {
        self.0
    }
}

/// De-duplicating table of ref-counted bitmaps
#[derive(Debug, Default)]
pub struct BitmapTable {
    entries: Vec<Option<(Bitmap, u32)>>,
    free: Vec<u32>,
    by_value: FxHashMap<Bitmap, BitmapRef>,
}

impl BitmapTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Install `bitmap`, sharing an equal entry if one exists
    pub fn add(&mut self, bitmap: Bitmap) -> BitmapRef {
        if let Some(&r) = self.by_value.get(&bitmap) {
            self.retain(r);
            return r;
        }
        let r = match self.free.pop() {
            Some(slot) => {
                self.entries[slot as usize] = Some((bitmap.clone(), 1));
                BitmapRef(slot)
            }
            None => {
                self.entries.push(Some((bitmap.clone(), 1)));
                BitmapRef(self.entries.len() as u32 - 1)
            }
        };
        self.by_value.insert(bitmap, r);
        r
    }

    /// Add a reference to an entry
    pub fn retain(&mut self, r: BitmapRef) {
        if let Some(Some((_, count))) = self.entries.get_mut(r.0 as usize) {
            *count += 1;
        }
    }

    /// Drop a reference; returns `true` when the entry was removed
    pub fn release(&mut self, r: BitmapRef) -> bool {
        let Some(slot) = self.entries.get_mut(r.0 as usize) else {
            return false;
        };
        let Some((_, count)) = slot.as_mut() else {
            return false;
        };
        *count = count.saturating_sub(1);
        if *count > 0 {
            return false;
        }
        if let Some((bitmap, _)) = slot.take() {
            self.by_value.remove(&bitmap);
        }
        self.free.push(r.0);
        true
    }

    /// Bitmap behind a live entry
    pub fn get(&self, r: BitmapRef) -> Option<&Bitmap> {
        self.entries
            .get(r.0 as usize)
            .and_then(Option::as_ref)
            .map(|(b, _)| b)
    }

    /// Reference count of an entry (0 if released)
    pub fn count(&self, r: BitmapRef) -> u32 {
        self.entries
            .get(r.0 as usize)
            .and_then(Option::as_ref)
            .map_or(0, |(_, c)| *c)
    }

    /// Number of live entries
    pub fn len(&self) -> usize {
        self.by_value.len()
    }

    /// True if no entry is live
    pub fn is_empty(&self) -> bool {
        self.by_value.is_empty()
    }
}
