//! Index reader.
//!
//! Opens a jump-table/data-file pair read-only, memory-maps both and answers
//! `get(id)` in O(1): the jump record for `id` sits at `id * RECORD_WIDTH`,
//! and its `(offset, length)` selects a zero-copy slice of the data mapping.
//!
//! Readers are cheap to clone; clones share the same mappings, which are
//! unmapped when the last handle is dropped. Nothing is mutated after
//! `open`, so any number of threads may call `get` at once.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use memmap2::Mmap;
use rayon::prelude::*;

use crate::config::IndexConfig;
use crate::error::{LoadError, LoadResult, LookupError, LookupResult};
use crate::format::{self, JumpRecord, RECORD_WIDTH};

// ── Region ─────────────────────────────────────────────────────────

/// Read-only view of one file. Zero-length files are not mapped.
#[derive(Debug)]
struct Region {
    path: PathBuf,
    mmap: Option<Mmap>,
}

impl Region {
    fn open(path: &Path) -> LoadResult<Self> {
        let file = File::open(path).map_err(|e| LoadError::io(path, e))?;
        let len = file.metadata().map_err(|e| LoadError::io(path, e))?.len();

        let mmap = if len == 0 {
            None
        } else {
            // Safety: index files are immutable once built; the store does
            // not support serving a pair that is still being written.
            let mmap = unsafe { Mmap::map(&file) }.map_err(|e| LoadError::io(path, e))?;
            advise_random(&mmap, path);
            Some(mmap)
        };

        Ok(Self {
            path: path.to_path_buf(),
            mmap,
        })
    }

    fn bytes(&self) -> &[u8] {
        self.mmap.as_deref().unwrap_or(&[])
    }
}

#[cfg(unix)]
fn advise_random(mmap: &Mmap, path: &Path) {
    if let Err(e) = mmap.advise(memmap2::Advice::Random) {
        tracing::warn!(path = %path.display(), "madvise(RANDOM) failed: {}", e);
    }
}

#[cfg(not(unix))]
fn advise_random(_mmap: &Mmap, _path: &Path) {}

// ── LookupId ───────────────────────────────────────────────────────

/// Integer types accepted as an id by [`IndexReader::get`].
///
/// Every implementor widens losslessly to `i128`, so a negative id is
/// reported as `OutOfRange` rather than wrapping to a huge index.
pub trait LookupId: Copy {
    fn to_i128(self) -> i128;
}

macro_rules! impl_lookup_id {
    ($($t:ty),*) => {
        $(
            impl LookupId for $t {
                #[inline]
                fn to_i128(self) -> i128 {
                    self as i128
                }
            }
        )*
    };
}

impl_lookup_id!(u8, u16, u32, u64, usize, i8, i16, i32, i64, isize, i128);

// ── IndexReader ────────────────────────────────────────────────────

#[derive(Debug)]
struct Mapped {
    jump: Region,
    data: Region,
}

/// O(1) random-access reader over a built index pair.
#[derive(Debug, Clone)]
pub struct IndexReader {
    inner: Arc<Mapped>,
    /// Number of entries (N).
    len: u64,
}

impl IndexReader {
    /// Open and map `jmp_path` and `dat_path`.
    ///
    /// Fails with `LoadError::Io` if either file cannot be opened or mapped,
    /// and with `LoadError::Corrupt` if the jump file size is not a multiple
    /// of `RECORD_WIDTH`. A jump mapping established before a failure is
    /// released on return.
    pub fn open(jmp_path: &Path, dat_path: &Path) -> LoadResult<Self> {
        let jump = Region::open(jmp_path)?;

        let jump_len = jump.bytes().len() as u64;
        let len = format::record_count(jump_len).ok_or_else(|| {
            LoadError::Corrupt(format!(
                "jump file {} has {} bytes, not a multiple of {}",
                jmp_path.display(),
                jump_len,
                RECORD_WIDTH
            ))
        })?;

        let data = Region::open(dat_path)?;

        tracing::debug!(
            jump = %jmp_path.display(),
            entries = len,
            data_bytes = data.bytes().len(),
            "opened index"
        );

        Ok(Self {
            inner: Arc::new(Mapped { jump, data }),
            len,
        })
    }

    /// Open `<dir>/<name>.jmp` and `<dir>/<name>.dat`.
    pub fn open_dir(dir: &Path, name: &str) -> LoadResult<Self> {
        Self::open(&format::jump_path(dir, name), &format::data_path(dir, name))
    }

    /// Open the pair named by a config, verifying it if requested.
    pub fn open_config(config: &IndexConfig) -> LoadResult<Self> {
        let reader = Self::open(&config.jump_path(), &config.data_path())?;
        if config.verify_on_open {
            reader.verify()?;
        }
        Ok(reader)
    }

    /// Number of entries.
    pub fn len(&self) -> u64 {
        self.len
    }

    /// Whether the index holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Size of the data file in bytes.
    pub fn data_len(&self) -> u64 {
        self.data_bytes().len() as u64
    }

    pub fn jump_path(&self) -> &Path {
        &self.inner.jump.path
    }

    pub fn data_path(&self) -> &Path {
        &self.inner.data.path
    }

    /// Look up the value stored under `id`.
    ///
    /// The returned slice borrows the data mapping. Negative ids and ids
    /// `>= len()` give `OutOfRange`; a record pointing past the end of the
    /// data file gives `Corrupt`.
    pub fn get<I: LookupId>(&self, id: I) -> LookupResult<&[u8]> {
        let index = self.check_range(id.to_i128())?;
        let record = self.read_record(index)?;
        self.slice(index, record)
    }

    /// Decoded jump record for `id`, without touching the data file.
    pub fn record<I: LookupId>(&self, id: I) -> LookupResult<JumpRecord> {
        let index = self.check_range(id.to_i128())?;
        self.read_record(index)
    }

    /// All entries in id order.
    pub fn iter(&self) -> impl Iterator<Item = (u64, LookupResult<&[u8]>)> + '_ {
        (0..self.len).map(move |id| (id, self.get(id)))
    }

    /// Look up many ids in parallel. Results are in the order of `ids`.
    pub fn get_many(&self, ids: &[u64]) -> Vec<LookupResult<&[u8]>> {
        ids.par_iter().map(|&id| self.get(id)).collect()
    }

    /// Check the whole jump table against the data file: the first offset is
    /// 0, every record starts where the previous one ends, and the last one
    /// ends exactly at the end of the data file.
    pub fn verify(&self) -> LoadResult<()> {
        let result = self.find_violation();
        if let Err(LoadError::Corrupt(reason)) = &result {
            tracing::warn!(
                jump = %self.jump_path().display(),
                "index verification failed: {}",
                reason
            );
        }
        result
    }

    /// Release this handle on the mappings.
    pub fn close(self) {
        tracing::debug!(jump = %self.jump_path().display(), "closing index");
    }

    // ── Internal Helpers ───────────────────────────────────────────

    fn jump_bytes(&self) -> &[u8] {
        self.inner.jump.bytes()
    }

    fn data_bytes(&self) -> &[u8] {
        self.inner.data.bytes()
    }

    fn check_range(&self, id: i128) -> LookupResult<u64> {
        u64::try_from(id)
            .ok()
            .filter(|&index| index < self.len)
            .ok_or(LookupError::OutOfRange { id, len: self.len })
    }

    /// Decode the record at an index already checked against `len`.
    fn read_record(&self, index: u64) -> LookupResult<JumpRecord> {
        usize::try_from(index)
            .ok()
            .and_then(|i| JumpRecord::read_at(self.jump_bytes(), i))
            .ok_or(LookupError::OutOfRange {
                id: i128::from(index),
                len: self.len,
            })
    }

    fn slice(&self, id: u64, record: JumpRecord) -> LookupResult<&[u8]> {
        let data = self.data_bytes();
        let corrupt = || LookupError::Corrupt {
            id,
            offset: record.offset,
            length: record.length,
            data_len: data.len() as u64,
        };

        let start = usize::try_from(record.offset).map_err(|_| corrupt())?;
        let end = start
            .checked_add(usize::from(record.length))
            .ok_or_else(corrupt)?;
        data.get(start..end).ok_or_else(corrupt)
    }

    fn find_violation(&self) -> LoadResult<()> {
        let corrupt = |reason: String| LoadError::Corrupt(reason);
        let data_len = self.data_len();

        if self.len == 0 {
            if data_len != 0 {
                return Err(corrupt(format!(
                    "index is empty but data file has {} bytes",
                    data_len
                )));
            }
            return Ok(());
        }

        let record = |id: u64| self.record(id).map_err(|e| corrupt(e.to_string()));

        let first = record(0)?;
        if first.offset != 0 {
            return Err(corrupt(format!(
                "entry 0 starts at offset {}, expected 0",
                first.offset
            )));
        }

        let broken = (0..self.len - 1).into_par_iter().find_first(|&id| {
            match (self.record(id), self.record(id + 1)) {
                (Ok(a), Ok(b)) => a.end() != Some(b.offset),
                _ => true,
            }
        });
        if let Some(id) = broken {
            let a = record(id)?;
            let b = record(id + 1)?;
            return Err(corrupt(format!(
                "entry {} ends at {:?} but entry {} starts at {}",
                id,
                a.end(),
                id + 1,
                b.offset
            )));
        }

        let last = record(self.len - 1)?;
        if last.end() != Some(data_len) {
            return Err(corrupt(format!(
                "last entry ends at {:?} but data file has {} bytes",
                last.end(),
                data_len
            )));
        }

        Ok(())
    }
}

// ── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::IndexBuilder;
    use std::fs;
    use tempfile::TempDir;

    fn build(dir: &Path, name: &str, values: &[&str]) -> IndexReader {
        IndexBuilder::build_from_entries(
            dir,
            name,
            values.iter().enumerate().map(|(i, v)| (i as u64, v.as_bytes())),
        )
        .unwrap();
        IndexReader::open_dir(dir, name).unwrap()
    }

    #[test]
    fn test_get_values() {
        let dir = TempDir::new().unwrap();
        let reader = build(dir.path(), "animals", &["cat", "dog", ""]);

        assert_eq!(reader.len(), 3);
        assert_eq!(reader.get(0).unwrap(), b"cat");
        assert_eq!(reader.get(1).unwrap(), b"dog");
        assert_eq!(reader.get(2).unwrap(), b"");
        assert_eq!(reader.data_len(), 6);
    }

    #[test]
    fn test_out_of_range() {
        let dir = TempDir::new().unwrap();
        let reader = build(dir.path(), "three", &["a", "b", "c"]);

        assert_eq!(
            reader.get(3u64).unwrap_err(),
            LookupError::OutOfRange { id: 3, len: 3 }
        );
        assert_eq!(
            reader.get(-1i64).unwrap_err(),
            LookupError::OutOfRange { id: -1, len: 3 }
        );
        assert!(matches!(
            reader.get(u64::MAX),
            Err(LookupError::OutOfRange { .. })
        ));

        // A failed lookup leaves the reader usable.
        assert_eq!(reader.get(2).unwrap(), b"c");
    }

    #[test]
    fn test_pointer_sized_ids() {
        let dir = TempDir::new().unwrap();
        let reader = build(dir.path(), "words", &["Haus", "Hof"]);

        let values: Vec<&[u8]> = (0..2usize).map(|i| reader.get(i).unwrap()).collect();
        assert_eq!(values, vec![&b"Haus"[..], &b"Hof"[..]]);
        assert_eq!(reader.record(1usize).unwrap(), JumpRecord::new(4, 3));
        assert_eq!(
            reader.get(-2isize).unwrap_err(),
            LookupError::OutOfRange { id: -2, len: 2 }
        );
        assert!(matches!(
            reader.get(i128::MAX),
            Err(LookupError::OutOfRange { .. })
        ));
    }

    #[test]
    fn test_record() {
        let dir = TempDir::new().unwrap();
        let reader = build(dir.path(), "rec", &["ab", "cde"]);
        assert_eq!(reader.record(0).unwrap(), JumpRecord::new(0, 2));
        assert_eq!(reader.record(1).unwrap(), JumpRecord::new(2, 3));
        assert!(reader.record(2).is_err());
    }

    #[test]
    fn test_empty_index() {
        let dir = TempDir::new().unwrap();
        let reader = build(dir.path(), "empty", &[]);
        assert!(reader.is_empty());
        assert_eq!(reader.data_len(), 0);
        assert!(reader.get(0).is_err());
        assert_eq!(reader.iter().count(), 0);
        reader.verify().unwrap();
    }

    #[test]
    fn test_all_empty_values() {
        let dir = TempDir::new().unwrap();
        let reader = build(dir.path(), "blank", &["", "", ""]);
        assert_eq!(reader.len(), 3);
        assert_eq!(reader.data_len(), 0);
        for (_, value) in reader.iter() {
            assert_eq!(value.unwrap(), b"");
        }
        reader.verify().unwrap();
    }

    #[test]
    fn test_open_missing_file() {
        let dir = TempDir::new().unwrap();
        let err = IndexReader::open_dir(dir.path(), "missing").unwrap_err();
        match err {
            LoadError::Io { path, .. } => assert!(path.ends_with("missing.jmp")),
            other => panic!("expected Io, got {:?}", other),
        }
    }

    #[test]
    fn test_open_missing_data_file() {
        let dir = TempDir::new().unwrap();
        build(dir.path(), "half", &["x"]);
        fs::remove_file(format::data_path(dir.path(), "half")).unwrap();

        let err = IndexReader::open_dir(dir.path(), "half").unwrap_err();
        assert!(matches!(err, LoadError::Io { .. }), "unexpected: {}", err);
    }

    #[test]
    fn test_open_bad_jump_size() {
        let dir = TempDir::new().unwrap();
        fs::write(format::jump_path(dir.path(), "bad"), vec![0u8; RECORD_WIDTH + 3]).unwrap();
        fs::write(format::data_path(dir.path(), "bad"), b"").unwrap();

        let err = IndexReader::open_dir(dir.path(), "bad").unwrap_err();
        assert!(
            err.to_string().contains("not a multiple of 10"),
            "unexpected error: {}",
            err
        );
    }

    #[test]
    fn test_truncated_data_is_corrupt() {
        let dir = TempDir::new().unwrap();
        build(dir.path(), "trunc", &["hello", "world"]);
        fs::write(format::data_path(dir.path(), "trunc"), b"hellowo").unwrap();

        let reader = IndexReader::open_dir(dir.path(), "trunc").unwrap();
        assert_eq!(reader.get(0).unwrap(), b"hello");
        assert_eq!(
            reader.get(1).unwrap_err(),
            LookupError::Corrupt {
                id: 1,
                offset: 5,
                length: 5,
                data_len: 7
            }
        );

        let err = reader.verify().unwrap_err();
        assert!(matches!(err, LoadError::Corrupt(_)));
    }

    #[test]
    fn test_verify_detects_gap() {
        let dir = TempDir::new().unwrap();
        let mut jump = Vec::new();
        JumpRecord::new(0, 2).write_to(&mut jump).unwrap();
        JumpRecord::new(3, 1).write_to(&mut jump).unwrap();
        fs::write(format::jump_path(dir.path(), "gap"), &jump).unwrap();
        fs::write(format::data_path(dir.path(), "gap"), b"abcd").unwrap();

        let reader = IndexReader::open_dir(dir.path(), "gap").unwrap();
        // Lookups stay in bounds even though the layout is wrong.
        assert_eq!(reader.get(1).unwrap(), b"d");

        let err = reader.verify().unwrap_err();
        assert!(
            err.to_string().contains("entry 0 ends at Some(2) but entry 1 starts at 3"),
            "unexpected error: {}",
            err
        );
    }

    #[test]
    fn test_verify_detects_trailing_data() {
        let dir = TempDir::new().unwrap();
        build(dir.path(), "tail", &["ab"]);
        fs::write(format::data_path(dir.path(), "tail"), b"abc").unwrap();

        let reader = IndexReader::open_dir(dir.path(), "tail").unwrap();
        let err = reader.verify().unwrap_err();
        assert!(err.to_string().contains("last entry"), "unexpected error: {}", err);
    }

    #[test]
    fn test_offset_overflow_is_corrupt() {
        let dir = TempDir::new().unwrap();
        let mut jump = Vec::new();
        JumpRecord::new(u64::MAX, 2).write_to(&mut jump).unwrap();
        fs::write(format::jump_path(dir.path(), "ovf"), &jump).unwrap();
        fs::write(format::data_path(dir.path(), "ovf"), b"ab").unwrap();

        let reader = IndexReader::open_dir(dir.path(), "ovf").unwrap();
        assert!(matches!(reader.get(0), Err(LookupError::Corrupt { id: 0, .. })));
        assert!(reader.verify().is_err());
    }

    #[test]
    fn test_get_many_preserves_order() {
        let dir = TempDir::new().unwrap();
        let reader = build(dir.path(), "many", &["null", "eins", "zwei"]);

        let results = reader.get_many(&[2, 0, 7, 1]);
        assert_eq!(results.len(), 4);
        assert_eq!(results[0].as_deref().unwrap(), b"zwei");
        assert_eq!(results[1].as_deref().unwrap(), b"null");
        assert!(matches!(results[2], Err(LookupError::OutOfRange { id: 7, len: 3 })));
        assert_eq!(results[3].as_deref().unwrap(), b"eins");
    }

    #[test]
    fn test_clone_outlives_original() {
        let dir = TempDir::new().unwrap();
        let reader = build(dir.path(), "shared", &["Wort"]);
        let clone = reader.clone();
        reader.close();
        assert_eq!(clone.get(0).unwrap(), b"Wort");
    }
}
