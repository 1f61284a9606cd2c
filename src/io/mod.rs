//! Storage collaborators
//!
//! The pipeline only sees two seams: a [`RecordSource`] that turns a logical
//! location into a [`Table`], and a [`TableSink`] that persists a table to a
//! logical location. Local filesystem and in-memory implementations live here.

pub mod glob;
pub mod reader;
pub mod writer;
pub mod memory;

use crate::error::Result;
use crate::table::Table;

pub use glob::GlobPattern;
pub use reader::JsonDirectorySource;
pub use writer::ParquetDirectorySink;
pub use memory::{MemorySink, MemorySource, WrittenTable};

/// Reads a collection of JSON records from a logical location
pub trait RecordSource: Send + Sync {
    /// Load every record matching `pattern` into one table whose columns are
    /// the union of all fields present
    fn read_json(&self, pattern: &str) -> Result<Table>;
}

/// Persists tables to logical locations
pub trait TableSink: Send + Sync {
    fn write(&self, table: &Table, location: &str, options: &WriteOptions) -> Result<()>;
}

/// What to do when the destination already holds data
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SaveMode {
    /// Replace whatever is at the destination
    #[default]
    Overwrite,
    /// Fail if the destination exists
    ErrorIfExists,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteOptions {
    pub partition_by: Vec<String>,
    pub mode: SaveMode,
}

impl WriteOptions {
    pub fn overwrite() -> Self {
        WriteOptions::default()
    }

    pub fn partitioned_by(mut self, columns: &[&str]) -> Self {
        self.partition_by = columns.iter().map(|c| c.to_string()).collect();
        self
    }

    pub fn with_mode(mut self, mode: SaveMode) -> Self {
        self.mode = mode;
        self
    }
}
