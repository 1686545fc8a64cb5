//! wpindex: dense-ID positional index store
//!
//! Variable-length byte records keyed by a dense, zero-based integer id,
//! stored as a pair of files:
//!
//! - `<name>.jmp`: fixed-width jump table, one `(offset, length)` record per id
//! - `<name>.dat`: the values concatenated in id order
//!
//! [`IndexBuilder`] writes a pair once per data snapshot;
//! [`IndexReader`] memory-maps it and answers `get(id)` in O(1).
//!
//! ```no_run
//! use std::path::Path;
//! use wpindex::{IndexBuilder, IndexReader};
//!
//! let dir = Path::new("/srv/wp");
//! IndexBuilder::build_from_entries(dir, "sentences", [(0u64, "Der Mann."), (1, "Die Frau.")])?;
//!
//! let reader = IndexReader::open_dir(dir, "sentences")?;
//! assert_eq!(reader.get(1)?, b"Die Frau.");
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod builder;
pub mod config;
pub mod error;
pub mod format;
pub mod reader;
pub mod table;

pub use builder::{BuildStats, IndexBuilder, IndexSink};
pub use config::IndexConfig;
pub use error::{BuildError, LoadError, LookupError};
pub use format::{JumpRecord, MAX_VALUE_LEN, RECORD_WIDTH};
pub use reader::{IndexReader, LookupId};
pub use table::TableEntries;
