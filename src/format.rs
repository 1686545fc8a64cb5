//! Binary format of the jump table.
//!
//! The jump file is a flat array of fixed-width records, one per id, with no
//! header. The record for id `i` starts at byte `i * RECORD_WIDTH`.
//!
//! # Record Layout
//!
//! ```text
//! Offset  Size  Field
//! 0       8     offset: u64 LE   (absolute position in the data file)
//! 8       2     length: u16 LE   (value length in bytes)
//! ```
//!
//! Fields are encoded one by one; the in-memory struct layout is never
//! written to disk.

use std::io::Write;
use std::path::{Path, PathBuf};

/// Width of one encoded `JumpRecord` in bytes.
pub const RECORD_WIDTH: usize = 10;

/// Largest value a single entry may carry.
pub const MAX_VALUE_LEN: usize = u16::MAX as usize;

/// File extension of the jump table.
pub const JUMP_EXT: &str = "jmp";

/// File extension of the data blob.
pub const DATA_EXT: &str = "dat";

/// Location of one value inside the data file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct JumpRecord {
    /// Absolute byte offset of the value in the data file.
    pub offset: u64,
    /// Value length in bytes.
    pub length: u16,
}

impl JumpRecord {
    pub fn new(offset: u64, length: u16) -> Self {
        Self { offset, length }
    }

    /// One past the last data byte covered by this record.
    ///
    /// `None` if the sum overflows, which only a corrupt file can produce.
    pub fn end(&self) -> Option<u64> {
        self.offset.checked_add(u64::from(self.length))
    }

    /// Encode into a fixed-width buffer.
    pub fn encode(&self) -> [u8; RECORD_WIDTH] {
        let mut buf = [0u8; RECORD_WIDTH];
        buf[0..8].copy_from_slice(&self.offset.to_le_bytes());
        buf[8..10].copy_from_slice(&self.length.to_le_bytes());
        buf
    }

    /// Decode from an exactly `RECORD_WIDTH`-byte buffer.
    pub fn decode(buf: &[u8; RECORD_WIDTH]) -> Self {
        let mut offset = [0u8; 8];
        offset.copy_from_slice(&buf[0..8]);
        let mut length = [0u8; 2];
        length.copy_from_slice(&buf[8..10]);
        Self {
            offset: u64::from_le_bytes(offset),
            length: u16::from_le_bytes(length),
        }
    }

    /// Decode the record at position `index` of a jump table.
    ///
    /// Returns `None` when the table holds fewer than `index + 1` records.
    pub fn read_at(table: &[u8], index: usize) -> Option<Self> {
        let start = index.checked_mul(RECORD_WIDTH)?;
        let end = start.checked_add(RECORD_WIDTH)?;
        let bytes: &[u8; RECORD_WIDTH] = table.get(start..end)?.try_into().ok()?;
        Some(Self::decode(bytes))
    }

    /// Write the encoded record to a writer.
    pub fn write_to<W: Write>(&self, w: &mut W) -> std::io::Result<()> {
        w.write_all(&self.encode())
    }
}

/// Number of whole records in a jump table of `byte_len` bytes, or `None`
/// if the length is not a multiple of `RECORD_WIDTH`.
pub fn record_count(byte_len: u64) -> Option<u64> {
    let width = RECORD_WIDTH as u64;
    (byte_len % width == 0).then_some(byte_len / width)
}

/// `<dir>/<name>.jmp`
pub fn jump_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("{name}.{JUMP_EXT}"))
}

/// `<dir>/<name>.dat`
pub fn data_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("{name}.{DATA_EXT}"))
}

// ── Tests ──────────────────────────────────────────────────────────
