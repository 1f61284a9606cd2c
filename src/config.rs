//! Run configuration
//!
//! Credentials and storage roots are loaded from a TOML file and handed to
//! the source and sink at construction. Nothing is exported to the process
//! environment.

use crate::error::{EtlError, Result};
use clap::ValueEnum;
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_PATH: &str = "dl.toml";
pub const DEFAULT_INPUT_ROOT: &str = "data/input";
pub const DEFAULT_OUTPUT_ROOT: &str = "data/output";
pub const DEFAULT_SONG_DATA: &str = "song_data/*/*/*/*.json";
pub const DEFAULT_LOG_DATA: &str = "log_data/*/*/*.json";

/// Storage access key pair
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
}

impl Credentials {
    pub fn new(access_key_id: impl Into<String>, secret_access_key: impl Into<String>) -> Self {
        Credentials {
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
        }
    }

    fn validate(&self) -> Result<()> {
        if self.access_key_id.trim().is_empty() {
            return Err(EtlError::Config("aws.access_key_id is empty".to_string()));
        }
        if self.secret_access_key.trim().is_empty() {
            return Err(EtlError::Config("aws.secret_access_key is empty".to_string()));
        }
        Ok(())
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .finish()
    }
}

/// How event artist names are compared with song metadata artist names
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum JoinKeyMode {
    /// Byte-for-byte equality of the display name
    #[default]
    Exact,
    /// Trimmed, whitespace-collapsed, lowercased names
    Normalized,
}

impl JoinKeyMode {
    pub fn key(self, artist_name: &str) -> String {
        match self {
            JoinKeyMode::Exact => artist_name.to_string(),
            JoinKeyMode::Normalized => artist_name
                .split_whitespace()
                .collect::<Vec<_>>()
                .join(" ")
                .to_lowercase(),
        }
    }
}

/// Parquet page compression
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    #[default]
    Snappy,
    Zstd,
    Uncompressed,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    aws: Option<Credentials>,
    #[serde(default)]
    paths: PathsSection,
    #[serde(default)]
    pipeline: PipelineSection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct PathsSection {
    input: Option<PathBuf>,
    output: Option<PathBuf>,
    song_data: Option<String>,
    log_data: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct PipelineSection {
    join_key: Option<JoinKeyMode>,
    compression: Option<Compression>,
}

/// Everything a run needs besides its collaborators
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub credentials: Credentials,
    pub input_root: PathBuf,
    pub output_root: PathBuf,
    /// Pattern for song metadata files, relative to `input_root`
    pub song_data: String,
    /// Pattern for event log files, relative to `input_root`
    pub log_data: String,
    pub join_key: JoinKeyMode,
    pub compression: Compression,
}

impl PipelineConfig {
    /// Configuration with default locations for the given credentials
    pub fn new(credentials: Credentials) -> Self {
        PipelineConfig {
            credentials,
            input_root: PathBuf::from(DEFAULT_INPUT_ROOT),
            output_root: PathBuf::from(DEFAULT_OUTPUT_ROOT),
            song_data: DEFAULT_SONG_DATA.to_string(),
            log_data: DEFAULT_LOG_DATA.to_string(),
            join_key: JoinKeyMode::default(),
            compression: Compression::default(),
        }
    }

    /// Load from a TOML file; the `[aws]` section is mandatory
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            EtlError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
            .map_err(|e| EtlError::Config(format!("{}: {}", path.display(), config_message(e))))
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let file: FileConfig = toml::from_str(content)
            .map_err(|e| EtlError::Config(format!("invalid TOML: {}", e.message())))?;

        let credentials = file
            .aws
            .ok_or_else(|| EtlError::Config("missing [aws] section".to_string()))?;
        credentials.validate()?;

        let mut config = PipelineConfig::new(credentials);
        if let Some(input) = file.paths.input {
            config.input_root = input;
        }
        if let Some(output) = file.paths.output {
            config.output_root = output;
        }
        if let Some(song_data) = file.paths.song_data {
            config.song_data = song_data;
        }
        if let Some(log_data) = file.paths.log_data {
            config.log_data = log_data;
        }
        if let Some(join_key) = file.pipeline.join_key {
            config.join_key = join_key;
        }
        if let Some(compression) = file.pipeline.compression {
            config.compression = compression;
        }
        Ok(config)
    }
}

fn config_message(err: EtlError) -> String {
    match err {
        EtlError::Config(message) => message,
        other => other.to_string(),
    }
}
