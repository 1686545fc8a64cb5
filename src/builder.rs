//! Index builder.
//!
//! Consumes `(id, value)` pairs in strictly increasing, gap-free id order
//! starting at 0 and writes the jump table and data blob in one pass.
//!
//! ```text
//! entry i:  jump[i] = (cursor, len(value))
//!           data   += value
//!           cursor += len(value)
//! ```
//!
//! A failed build leaves whatever was written so far. That output is not a
//! valid index: discard it (see [`IndexBuilder::abort`]) and never open it
//! with a reader. After an I/O error the sinks may hold a partial entry, so
//! every later `add` or `finish` fails with `BuildError::Failed`.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Cursor, Write};
use std::path::{Path, PathBuf};

use crate::error::{BuildError, BuildResult};
use crate::format::{self, JumpRecord, RECORD_WIDTH};
use crate::table::TableEntries;

// ── Sinks ──────────────────────────────────────────────────────────

/// Output stream of a builder.
///
/// `commit` runs once when the build finishes: it must flush buffered bytes
/// and, for files, make them durable.
pub trait IndexSink: Write {
    fn commit(&mut self) -> io::Result<()> {
        self.flush()
    }
}

impl IndexSink for Vec<u8> {}

impl<T> IndexSink for Cursor<T> where Cursor<T>: Write {}

impl<S: IndexSink + ?Sized> IndexSink for &mut S {
    fn commit(&mut self) -> io::Result<()> {
        (**self).commit()
    }
}

impl IndexSink for File {
    fn commit(&mut self) -> io::Result<()> {
        self.flush()?;
        self.sync_all()
    }
}

impl<W: IndexSink> IndexSink for BufWriter<W> {
    fn commit(&mut self) -> io::Result<()> {
        self.flush()?;
        self.get_mut().commit()
    }
}

// ── BuildStats ─────────────────────────────────────────────────────

/// Summary of a finished build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildStats {
    /// Number of entries written (N).
    pub entries: u64,
    /// Size of the data file in bytes.
    pub data_bytes: u64,
    /// Size of the jump file in bytes (`N * RECORD_WIDTH`).
    pub jump_bytes: u64,
}

// ── IndexBuilder ───────────────────────────────────────────────────

/// Paths of a file-backed build, kept so `abort` can remove them.
#[derive(Debug, Clone)]
struct OutputPaths {
    jump: PathBuf,
    data: PathBuf,
}

/// Single-pass writer of a jump-table/data-file pair.
///
/// All state (expected id, data cursor, sinks) belongs to this instance, so
/// independent builds may run side by side as long as they target different
/// files.
pub struct IndexBuilder<J = BufWriter<File>, D = BufWriter<File>>
where
    J: IndexSink,
    D: IndexSink,
{
    jump: J,
    data: D,
    /// Id the next entry must carry; equals the number of entries written.
    next_id: u64,
    /// Offset in the data file where the next value starts.
    cursor: u64,
    /// Set once a write hit an I/O error; only `abort` is allowed after that.
    failed: bool,
    paths: Option<OutputPaths>,
}

impl<J: IndexSink, D: IndexSink> IndexBuilder<J, D> {
    /// Create a builder writing to arbitrary sinks.
    pub fn new(jump: J, data: D) -> Self {
        Self {
            jump,
            data,
            next_id: 0,
            cursor: 0,
            failed: false,
            paths: None,
        }
    }

    /// Append one entry.
    ///
    /// Fails with `Sequence` if `id` is not the next expected id and with
    /// `ValueTooLarge` if the value does not fit a 16-bit length. In both
    /// cases nothing is written for this entry. An I/O error fails the whole
    /// build.
    pub fn add(&mut self, id: u64, value: &[u8]) -> BuildResult<()> {
        self.check_usable()?;
        if id != self.next_id {
            return Err(BuildError::Sequence {
                expected: self.next_id,
                got: id,
            });
        }

        let length = u16::try_from(value.len()).map_err(|_| BuildError::ValueTooLarge {
            id,
            length: value.len(),
        })?;

        let record = JumpRecord::new(self.cursor, length);
        if let Err(e) = record
            .write_to(&mut self.jump)
            .and_then(|()| self.data.write_all(value))
        {
            self.failed = true;
            return Err(e.into());
        }

        self.cursor += u64::from(length);
        self.next_id += 1;
        Ok(())
    }

    /// Append every entry of an ordered sequence, stopping at the first error.
    pub fn extend<I, V>(&mut self, entries: I) -> BuildResult<()>
    where
        I: IntoIterator<Item = (u64, V)>,
        V: AsRef<[u8]>,
    {
        for (id, value) in entries {
            self.add(id, value.as_ref())?;
        }
        Ok(())
    }

    /// Number of entries written so far.
    pub fn len(&self) -> u64 {
        self.next_id
    }

    /// Whether no entry has been written yet.
    pub fn is_empty(&self) -> bool {
        self.next_id == 0
    }

    /// Bytes written to the data sink so far.
    pub fn data_len(&self) -> u64 {
        self.cursor
    }

    /// Flush and commit both sinks. Consumes the builder.
    pub fn finish(mut self) -> BuildResult<BuildStats> {
        self.check_usable()?;
        self.jump.commit()?;
        self.data.commit()?;

        let stats = BuildStats {
            entries: self.next_id,
            data_bytes: self.cursor,
            jump_bytes: self.next_id * RECORD_WIDTH as u64,
        };

        match &self.paths {
            Some(paths) => tracing::info!(
                jump = %paths.jump.display(),
                entries = stats.entries,
                data_bytes = stats.data_bytes,
                "index build finished"
            ),
            None => tracing::debug!(
                entries = stats.entries,
                data_bytes = stats.data_bytes,
                "index build finished"
            ),
        }

        Ok(stats)
    }

    /// Abandon the build. For file-backed builders both output files are
    /// removed; for other sinks the written bytes are simply dropped.
    pub fn abort(self) -> BuildResult<()> {
        let Self {
            jump,
            data,
            next_id,
            paths,
            ..
        } = self;
        drop(jump);
        drop(data);

        if let Some(paths) = paths {
            tracing::warn!(
                jump = %paths.jump.display(),
                entries_written = next_id,
                "aborting index build, removing partial output"
            );
            remove_if_exists(&paths.jump)?;
            remove_if_exists(&paths.data)?;
        }
        Ok(())
    }

    fn check_usable(&self) -> BuildResult<()> {
        if self.failed {
            return Err(BuildError::Failed {
                entries: self.next_id,
            });
        }
        Ok(())
    }
}

impl IndexBuilder<BufWriter<File>, BufWriter<File>> {
    /// Create `<dir>/<name>.jmp` and `<dir>/<name>.dat`, truncating existing
    /// files, and return a builder writing to them.
    pub fn create(dir: &Path, name: &str) -> BuildResult<Self> {
        let jump_path = format::jump_path(dir, name);
        let data_path = format::data_path(dir, name);

        let jump = create_truncated(&jump_path)?;
        let data = create_truncated(&data_path)?;

        tracing::debug!(
            jump = %jump_path.display(),
            data = %data_path.display(),
            "creating index"
        );

        let mut builder = Self::new(BufWriter::new(jump), BufWriter::new(data));
        builder.paths = Some(OutputPaths {
            jump: jump_path,
            data: data_path,
        });
        Ok(builder)
    }

    /// Build `<dir>/<name>.{jmp,dat}` from an in-memory ordered sequence.
    pub fn build_from_entries<I, V>(dir: &Path, name: &str, entries: I) -> BuildResult<BuildStats>
    where
        I: IntoIterator<Item = (u64, V)>,
        V: AsRef<[u8]>,
    {
        let mut builder = Self::create(dir, name)?;
        builder.extend(entries)?;
        builder.finish()
    }

    /// Build `<dir>/<name>.{jmp,dat}` from a legacy `"<id>\t<value>\n"`
    /// table file.
    pub fn build_from_table(table: &Path, dir: &Path, name: &str) -> BuildResult<BuildStats> {
        let entries = TableEntries::open(table)?;
        let mut builder = Self::create(dir, name)?;
        for entry in entries {
            let (id, value) = entry?;
            builder.add(id, &value)?;
        }
        builder.finish()
    }
}

fn create_truncated(path: &Path) -> io::Result<File> {
    OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)
}

fn remove_if_exists(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

// ── Tests ──────────────────────────────────────────────────────────
