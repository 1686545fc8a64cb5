//! Legacy table ingestion.
//!
//! Upstream table generation emits one entry per line:
//!
//! ```text
//! <decimal-id>\t<raw-value>\n
//! ```
//!
//! The value is taken as raw bytes and may hold anything except tab and
//! newline. The last line may omit its newline.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::error::{BuildError, BuildResult};

/// Streaming parser over a legacy table, yielding `(id, value)` pairs in
/// file order. Ordering is not checked here; the builder does that.
pub struct TableEntries<R: BufRead> {
    reader: R,
    line: u64,
    buf: Vec<u8>,
    done: bool,
}

impl TableEntries<BufReader<File>> {
    /// Open a table file for streaming.
    pub fn open(path: &Path) -> BuildResult<Self> {
        let file = File::open(path)?;
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<R: BufRead> TableEntries<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line: 0,
            buf: Vec::with_capacity(256),
            done: false,
        }
    }

    fn read_entry(&mut self) -> BuildResult<Option<(u64, Vec<u8>)>> {
        self.buf.clear();
        let n = self.reader.read_until(b'\n', &mut self.buf)?;
        if n == 0 {
            return Ok(None);
        }
        self.line += 1;

        if self.buf.last() == Some(&b'\n') {
            self.buf.pop();
        }

        parse_line(&self.buf, self.line).map(Some)
    }
}

impl<R: BufRead> Iterator for TableEntries<R> {
    type Item = BuildResult<(u64, Vec<u8>)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.read_entry() {
            Ok(Some(entry)) => Some(Ok(entry)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                // Stop after the first error; the input position is no
                // longer meaningful.
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

/// Split one newline-stripped line into id and value.
fn parse_line(line: &[u8], line_no: u64) -> BuildResult<(u64, Vec<u8>)> {
    let malformed = |reason: &str| BuildError::MalformedLine {
        line: line_no,
        reason: reason.to_string(),
    };

    let tab = line
        .iter()
        .position(|&b| b == b'\t')
        .ok_or_else(|| malformed("missing tab separator"))?;

    let (id_bytes, rest) = line.split_at(tab);
    let value = &rest[1..];
    if value.contains(&b'\t') {
        return Err(malformed("value contains a tab"));
    }

    let id = std::str::from_utf8(id_bytes)
        .ok()
        .filter(|s| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()))
        .and_then(|s| s.parse::<u64>().ok())
        .ok_or_else(|| {
            malformed(&format!(
                "invalid id {:?}",
                String::from_utf8_lossy(id_bytes)
            ))
        })?;

    Ok((id, value.to_vec()))
}
