//! In-memory collaborators for tests and embedding

use crate::error::{EtlError, Result};
use crate::io::{RecordSource, SaveMode, TableSink, WriteOptions};
use crate::table::Table;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

/// Serves pre-loaded records keyed by the exact pattern string
#[derive(Debug, Default)]
pub struct MemorySource {
    datasets: HashMap<String, Vec<Value>>,
}

impl MemorySource {
    pub fn new() -> Self {
        MemorySource::default()
    }

    pub fn with_records(mut self, pattern: impl Into<String>, records: Vec<Value>) -> Self {
        self.datasets.insert(pattern.into(), records);
        self
    }
}

impl RecordSource for MemorySource {
    fn read_json(&self, pattern: &str) -> Result<Table> {
        let records = self
            .datasets
            .get(pattern)
            .ok_or_else(|| EtlError::source_read(pattern, "no dataset registered"))?;
        Table::from_json_records(pattern, records)
    }
}

/// A table as it was handed to a sink
#[derive(Debug, Clone, PartialEq)]
pub struct WrittenTable {
    pub table: Table,
    pub options: WriteOptions,
}

/// Keeps every written table in memory, keyed by location
#[derive(Debug, Default)]
pub struct MemorySink {
    tables: Mutex<BTreeMap<String, WrittenTable>>,
}

impl MemorySink {
    pub fn new() -> Self {
        MemorySink::default()
    }

    pub fn get(&self, location: &str) -> Option<WrittenTable> {
        self.lock().get(location).cloned()
    }

    pub fn locations(&self) -> Vec<String> {
        self.lock().keys().cloned().collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, WrittenTable>> {
        // A panic while holding the lock cannot leave the map half-updated
        self.tables.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl TableSink for MemorySink {
    fn write(&self, table: &Table, location: &str, options: &WriteOptions) -> Result<()> {
        for column in &options.partition_by {
            table.column_index(column)?;
        }

        let mut tables = self.lock();
        if options.mode == SaveMode::ErrorIfExists && tables.contains_key(location) {
            return Err(EtlError::write(location, "destination already exists"));
        }
        tables.insert(
            location.to_string(),
            WrittenTable {
                table: table.clone(),
                options: options.clone(),
            },
        );
        Ok(())
    }
}
