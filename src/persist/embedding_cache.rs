//! Zero-copy word embedding cache.
//!
//! The whole file is held in one 4-byte aligned buffer. Lookups
//! binary-search a [`Record`] table cast straight out of that buffer and
//! hand out [`VectorView`]s borrowing the float data. Nothing is allocated
//! per word until a caller asks for an owned vector.
//!
//! ```text
//! offset 0   "ENGRAM_GLOVE" (12) | version u8 | dim u32 | count u32 | pad → 24
//! offset 24  count × Record { word_offset u32, word_len u16, pad u16, vector_offset u32 }
//!            data: per word, utf-8 bytes padded to 4, then dim × f32
//! ```
//!
//! Records are in ascending byte order of the word. Offsets are absolute.
//! All integers and floats are little-endian.

use std::ops::Range;
use std::path::Path;
use std::time::Instant;

use bytemuck::{Pod, Zeroable, bytes_of, cast_slice, cast_slice_mut, try_cast_slice, try_from_bytes};
use tracing::{debug, info, warn};
use xxhash_rust::xxh64::xxh64;

use super::codec::{check_header, invalid, write_atomic};
use crate::{Error, Result};

pub const MAGIC: &[u8; 12] = b"ENGRAM_GLOVE";
pub const VERSION: u8 = 1;

const WHAT: &str = "embedding cache";

// Records and vectors are cast in place, which only matches the file's
// byte order on little-endian targets.
const _LITTLE_ENDIAN_CHECK: () = assert!(
    cfg!(target_endian = "little"),
    "the embedding cache layout requires a little-endian target"
);

/// Fixed 24-byte file header. The `u32` fields sit at odd offsets, so they
/// are kept as byte arrays.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct CacheHeader {
    magic: [u8; 12],
    version: u8,
    dimension: [u8; 4],
    count: [u8; 4],
    _pad: [u8; 3],
}

const HEADER_LEN: usize = std::mem::size_of::<CacheHeader>();
const _HEADER_SIZE_CHECK: () = assert!(HEADER_LEN == 24, "CacheHeader must be exactly 24 bytes");

/// One entry of the record table.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct Record {
    word_offset: u32,
    word_len: u16,
    _pad: u16,
    vector_offset: u32,
}

const RECORD_LEN: usize = std::mem::size_of::<Record>();
const _RECORD_SIZE_CHECK: () = assert!(RECORD_LEN == 12, "Record must be exactly 12 bytes");

impl Record {
    fn word(&self) -> Range<usize> {
        let start = self.word_offset as usize;
        start..start + usize::from(self.word_len)
    }
}

/// Borrowed view of one vector inside the cache buffer.
#[derive(Debug, Clone, Copy)]
pub struct VectorView<'a> {
    values: &'a [f32],
}

impl<'a> VectorView<'a> {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, i: usize) -> Option<f32> {
        self.values.get(i).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = f32> + 'a {
        self.values.iter().copied()
    }

    pub fn as_slice(&self) -> &'a [f32] {
        self.values
    }

    pub fn to_vec(&self) -> Vec<f32> {
        self.values.to_vec()
    }
}

/// Byte buffer backed by `u32` words, so 4-aligned offsets into it can be
/// cast to `Record` and `f32` slices.
#[derive(Debug, Clone)]
struct AlignedBytes {
    words: Vec<u32>,
    len: usize,
}

impl AlignedBytes {
    fn copy_from(bytes: &[u8]) -> Self {
        let mut words = vec![0u32; bytes.len().div_ceil(4)];
        cast_slice_mut::<u32, u8>(&mut words)[..bytes.len()].copy_from_slice(bytes);
        Self { words, len: bytes.len() }
    }

    fn as_bytes(&self) -> &[u8] {
        &cast_slice::<u32, u8>(&self.words)[..self.len]
    }
}

/// Immutable word → vector table.
#[derive(Debug, Clone)]
pub struct EmbeddingIndex {
    data: AlignedBytes,
    dimension: usize,
    count: usize,
    fingerprint: u64,
}

impl EmbeddingIndex {
    /// Build from `(word, vector)` pairs. All vectors must share one
    /// dimension; a repeated word keeps its first vector.
    pub fn from_entries(mut entries: Vec<(String, Vec<f32>)>) -> Result<Self> {
        let dimension = entries.first().map_or(0, |(_, v)| v.len());
        for (word, vector) in &entries {
            if word.is_empty() {
                return Err(Error::Validation("embedding word must not be empty".into()));
            }
            if vector.len() != dimension {
                return Err(Error::Validation(format!(
                    "'{word}' has dimension {}, expected {dimension}",
                    vector.len()
                )));
            }
        }
        // Stable sort, so dedup keeps the first occurrence.
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        let before = entries.len();
        entries.dedup_by(|b, a| a.0 == b.0);
        if entries.len() != before {
            warn!(dropped = before - entries.len(), "duplicate embedding words ignored");
        }

        let count = entries.len();
        let header = CacheHeader {
            magic: *MAGIC,
            version: VERSION,
            dimension: to_u32(dimension, "dimension")?.to_le_bytes(),
            count: to_u32(count, "word count")?.to_le_bytes(),
            _pad: [0; 3],
        };

        let mut offset = HEADER_LEN + count * RECORD_LEN;
        let mut records = Vec::with_capacity(count);
        for (word, _) in &entries {
            let word_len = u16::try_from(word.len())
                .map_err(|_| Error::Validation(format!("embedding word too long ({} bytes)", word.len())))?;
            let word_offset = to_u32(offset, "cache size")?;
            offset += word.len().next_multiple_of(4);
            let vector_offset = to_u32(offset, "cache size")?;
            offset += dimension * 4;
            records.push(Record { word_offset, word_len, _pad: 0, vector_offset });
        }

        let mut buf = Vec::with_capacity(offset);
        buf.extend_from_slice(bytes_of(&header));
        buf.extend_from_slice(cast_slice(&records));
        for (word, vector) in &entries {
            buf.extend_from_slice(word.as_bytes());
            buf.resize(buf.len().next_multiple_of(4), 0);
            buf.extend_from_slice(cast_slice(vector));
        }
        debug_assert_eq!(buf.len(), offset);

        Ok(Self::adopt(AlignedBytes::copy_from(&buf), dimension, count))
    }

    /// Parse GloVe text: one `word f1 f2 ...` per line. Blank lines are
    /// skipped; every line must have the same number of components.
    pub fn from_glove_text(text: &str) -> Result<Self> {
        let mut entries = Vec::new();
        for (lineno, line) in text.lines().enumerate() {
            let mut parts = line.split_whitespace();
            let Some(word) = parts.next() else { continue };
            let vector = parts
                .map(|p| {
                    p.parse::<f32>().map_err(|e| {
                        Error::Validation(format!("line {}: bad component '{p}': {e}", lineno + 1))
                    })
                })
                .collect::<Result<Vec<f32>>>()?;
            if vector.is_empty() {
                return Err(Error::Validation(format!("line {}: '{word}' has no vector", lineno + 1)));
            }
            entries.push((word.to_string(), vector));
        }
        let index = Self::from_entries(entries)?;
        info!(words = index.len(), dimension = index.dimension(), "built embedding cache");
        Ok(index)
    }

    /// Validate and adopt a serialized cache.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        check_header(data, MAGIC, VERSION, WHAT)?;
        let header: &CacheHeader = data
            .get(..HEADER_LEN)
            .and_then(|h| try_from_bytes(h).ok())
            .ok_or_else(|| invalid(WHAT, format!("truncated header ({} bytes)", data.len())))?;
        let dimension = u32::from_le_bytes(header.dimension) as usize;
        let count = u32::from_le_bytes(header.count) as usize;

        let data = AlignedBytes::copy_from(data);
        let bytes = data.as_bytes();
        let table_end = count
            .checked_mul(RECORD_LEN)
            .and_then(|n| n.checked_add(HEADER_LEN))
            .filter(|&end| end <= bytes.len())
            .ok_or_else(|| invalid(WHAT, format!("record table for {count} words is truncated")))?;
        let records: &[Record] = try_cast_slice(&bytes[HEADER_LEN..table_end])
            .map_err(|e| invalid(WHAT, format!("record table: {e}")))?;

        let vector_len = dimension * 4;
        let mut prev: Option<&[u8]> = None;
        for (i, rec) in records.iter().enumerate() {
            let word = bytes
                .get(rec.word())
                .ok_or_else(|| invalid(WHAT, format!("record {i}: word out of bounds")))?;
            if std::str::from_utf8(word).is_err() {
                return Err(invalid(WHAT, format!("record {i}: word is not UTF-8")));
            }
            let start = rec.vector_offset as usize;
            let vector = bytes
                .get(start..start + vector_len)
                .ok_or_else(|| invalid(WHAT, format!("record {i}: vector out of bounds")))?;
            if try_cast_slice::<u8, f32>(vector).is_err() {
                return Err(invalid(WHAT, format!("record {i}: vector offset {start} is not 4-byte aligned")));
            }
            if prev.is_some_and(|p| p >= word) {
                return Err(invalid(WHAT, format!("record {i}: words not in ascending order")));
            }
            prev = Some(word);
        }

        Ok(Self::adopt(data, dimension, count))
    }

    fn adopt(data: AlignedBytes, dimension: usize, count: usize) -> Self {
        let fingerprint = xxh64(data.as_bytes(), 0);
        Self { data, dimension, count, fingerprint }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let start = Instant::now();
        let data = std::fs::read(path)?;
        let index = Self::from_bytes(&data)?;
        debug!(
            path = %path.display(),
            words = index.count,
            dimension = index.dimension,
            elapsed_ms = start.elapsed().as_millis(),
            "loaded embedding cache"
        );
        Ok(index)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        write_atomic(path, self.as_bytes())
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.data.as_bytes()
    }

    /// xxh64 of the serialized cache. Two caches built from different
    /// vectors never share a fingerprint in practice.
    pub fn fingerprint(&self) -> u64 {
        self.fingerprint
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Vector for `word`, exact byte match.
    pub fn get(&self, word: &str) -> Option<VectorView<'_>> {
        let bytes = self.as_bytes();
        let records = self.records();
        let i = records
            .binary_search_by(|rec| bytes.get(rec.word()).unwrap_or_default().cmp(word.as_bytes()))
            .ok()?;
        let start = records[i].vector_offset as usize;
        let values = try_cast_slice(bytes.get(start..start + self.dimension * 4)?).ok()?;
        Some(VectorView { values })
    }

    /// Words in ascending order.
    pub fn words(&self) -> impl Iterator<Item = &str> {
        let bytes = self.as_bytes();
        self.records()
            .iter()
            .filter_map(move |rec| bytes.get(rec.word()).and_then(|w| std::str::from_utf8(w).ok()))
    }

    /// The record table, validated on construction.
    fn records(&self) -> &[Record] {
        self.as_bytes()
            .get(HEADER_LEN..HEADER_LEN + self.count * RECORD_LEN)
            .and_then(|table| try_cast_slice(table).ok())
            .unwrap_or_default()
    }
}

fn to_u32(n: usize, what: &str) -> Result<u32> {
    u32::try_from(n).map_err(|_| Error::Validation(format!("{what} too large to encode ({n})")))
}
