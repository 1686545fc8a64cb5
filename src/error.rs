//! Error types for building, opening and querying an index pair

use std::path::PathBuf;

use thiserror::Error;

pub type BuildResult<T> = std::result::Result<T, BuildError>;
pub type LoadResult<T> = std::result::Result<T, LoadError>;
pub type LookupResult<T> = std::result::Result<T, LookupError>;

/// Failures while writing a jump-table/data-file pair. All of them abort the
/// build; output written so far must not be served.
#[derive(Error, Debug)]
pub enum BuildError {
    #[error("Sequence error: expected id {expected}, got {got}")]
    Sequence { expected: u64, got: u64 },

    #[error("Value too large: id {id} has {length} bytes (max 65535)")]
    ValueTooLarge { id: u64, length: usize },

    #[error("Malformed table line {line}: {reason}")]
    MalformedLine { line: u64, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Build already failed on an I/O error after {entries} entries")]
    Failed { entries: u64 },
}

/// Failures while opening an index pair.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Corrupt index: {0}")]
    Corrupt(String),

    #[error("Config error: {0}")]
    Config(#[from] serde_json::Error),
}

impl LoadError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        LoadError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Failures of a single lookup. They never invalidate the reader.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LookupError {
    #[error("Id {id} out of range (index has {len} entries)")]
    OutOfRange { id: i128, len: u64 },

    #[error("Corrupt entry {id}: [{offset}, +{length}) exceeds data size {data_len}")]
    Corrupt {
        id: u64,
        offset: u64,
        length: u16,
        data_len: u64,
    },
}
