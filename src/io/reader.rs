use crate::config::Credentials;
use crate::error::{EtlError, Result};
use crate::io::glob::GlobPattern;
use crate::io::RecordSource;
use crate::table::Table;
use serde_json::Value;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

/// Reads JSON records from files under a local directory root.
///
/// A file may hold a single JSON document, a JSON array of records, or
/// newline-delimited records. Files are visited in lexicographic path order
/// so the resulting row order is stable across runs.
#[derive(Debug, Clone)]
pub struct JsonDirectorySource {
    root: PathBuf,
    /// Held for object-store backends; local filesystem access ignores it
    credentials: Option<Credentials>,
}

impl JsonDirectorySource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        JsonDirectorySource {
            root: root.into(),
            credentials: None,
        }
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        debug!(
            "Using access key {} for source at {}",
            credentials.access_key_id,
            self.root.display()
        );
        self.credentials = Some(credentials);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn credentials(&self) -> Option<&Credentials> {
        self.credentials.as_ref()
    }

    /// Every data file matching the pattern, sorted by path
    pub fn resolve(&self, pattern: &str) -> Result<Vec<PathBuf>> {
        let glob = GlobPattern::new(pattern)?;
        let base = self.root.join(glob.literal_prefix());
        if !base.exists() {
            return Err(EtlError::source_read(
                pattern,
                format!("path does not exist: {}", base.display()),
            ));
        }

        let mut files = Vec::new();
        for entry in WalkDir::new(&base).follow_links(true).sort_by_file_name() {
            let entry = entry.map_err(|e| EtlError::source_read(pattern, e))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let Ok(relative) = entry.path().strip_prefix(&self.root) else {
                continue;
            };
            if is_hidden(relative) {
                continue;
            }
            if glob.is_match(&slash_path(relative)) {
                files.push(entry.into_path());
            }
        }
        Ok(files)
    }
}

impl RecordSource for JsonDirectorySource {
    fn read_json(&self, pattern: &str) -> Result<Table> {
        let files = self.resolve(pattern)?;
        if files.is_empty() {
            return Err(EtlError::source_read(pattern, "no files match"));
        }

        let mut records = Vec::new();
        for file in &files {
            let before = records.len();
            read_records(file, &mut records)?;
            debug!("Read {} records from {}", records.len() - before, file.display());
        }

        let table = Table::from_json_records(pattern, &records)?;
        info!(
            "Loaded {} records with {} columns from {} files matching {}",
            table.len(),
            table.schema().len(),
            files.len(),
            pattern
        );
        Ok(table)
    }
}

/// Parse one file, appending its records.
///
/// Whole-document parsing goes through simd-json first; content that is not a
/// single document falls back to a serde_json stream for NDJSON.
fn read_records(path: &Path, records: &mut Vec<Value>) -> Result<()> {
    let location = path.display().to_string();
    let content = std::fs::read(path).map_err(|e| EtlError::source_read(location.as_str(), e))?;
    if content.iter().all(u8::is_ascii_whitespace) {
        return Ok(());
    }

    // simd-json parses in place, so give it a scratch copy
    let mut scratch = content.clone();
    match simd_json::serde::from_slice::<Value>(&mut scratch) {
        Ok(Value::Array(items)) => records.extend(items),
        Ok(value) => records.push(value),
        Err(_) => {
            let stream = serde_json::Deserializer::from_slice(&content).into_iter::<Value>();
            for value in stream {
                let value = value.map_err(|e| EtlError::source_read(location.as_str(), e))?;
                records.push(value);
            }
        }
    }
    Ok(())
}

/// Files and directories starting with `.` or `_` are metadata, not data
fn is_hidden(relative: &Path) -> bool {
    relative.components().any(|c| match c {
        Component::Normal(name) => {
            let name = name.to_string_lossy();
            name.starts_with('.') || name.starts_with('_')
        }
        _ => false,
    })
}

fn slash_path(relative: &Path) -> String {
    relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(name) => Some(name.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}
