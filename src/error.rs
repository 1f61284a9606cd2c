//! Error kinds for a pipeline run
//!
//! Every variant is fatal: the run stops at the first error and must be
//! re-executed from the beginning. Unmatched joins are not errors.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, EtlError>;

#[derive(Error, Debug)]
pub enum EtlError {
    /// Input location missing, unreadable, or holding malformed records
    #[error("failed to read source '{location}': {message}")]
    SourceRead { location: String, message: String },

    /// A column a stage depends on is absent from its input table
    #[error("table '{table}' is missing required column '{column}'")]
    MissingColumn { table: String, column: String },

    /// An event timestamp that cannot be turned into a calendar instant
    #[error("invalid timestamp {value}: {reason}")]
    InvalidTimestamp { value: String, reason: String },

    /// Destination unwritable or encoding failure
    #[error("failed to write '{location}': {message}")]
    Write { location: String, message: String },

    #[error("configuration error: {0}")]
    Config(String),
}

impl EtlError {
    pub fn source_read(location: impl Into<String>, message: impl ToString) -> Self {
        EtlError::SourceRead {
            location: location.into(),
            message: message.to_string(),
        }
    }

    pub fn write(location: impl Into<String>, message: impl ToString) -> Self {
        EtlError::Write {
            location: location.into(),
            message: message.to_string(),
        }
    }

    pub fn missing_column(table: impl Into<String>, column: impl Into<String>) -> Self {
        EtlError::MissingColumn {
            table: table.into(),
            column: column.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_location() {
        let err = EtlError::source_read("log_data/*.json", "no files matched");
        assert_eq!(
            err.to_string(),
            "failed to read source 'log_data/*.json': no files matched"
        );

        let err = EtlError::missing_column("log_data", "ts");
        assert!(err.to_string().contains("'ts'"));
    }
}
