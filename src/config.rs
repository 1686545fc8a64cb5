//! Persistent description of where an index pair lives.
//!
//! ```json
//! { "dir": "/srv/wp/index", "name": "sentences", "verify_on_open": false }
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{LoadError, LoadResult};
use crate::format;

/// Location and open options of one index pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Directory holding `<name>.jmp` and `<name>.dat`.
    pub dir: PathBuf,
    /// Base name of the pair.
    pub name: String,
    /// Run a full structural check when a reader opens the pair.
    #[serde(default)]
    pub verify_on_open: bool,
}

impl IndexConfig {
    pub fn new(dir: impl Into<PathBuf>, name: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            name: name.into(),
            verify_on_open: false,
        }
    }

    /// Read a config from a JSON file.
    pub fn read_from(path: &Path) -> LoadResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| LoadError::io(path, e))?;
        let config: Self = serde_json::from_str(&contents)?;
        Ok(config)
    }

    /// Write the config as pretty-printed JSON.
    pub fn write_to(&self, path: &Path) -> LoadResult<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).map_err(|e| LoadError::io(path, e))?;
        Ok(())
    }

    pub fn jump_path(&self) -> PathBuf {
        format::jump_path(&self.dir, &self.name)
    }

    pub fn data_path(&self) -> PathBuf {
        format::data_path(&self.dir, &self.name)
    }
}
