//! # Starmelt - JSON to star-schema batch ETL
//!
//! Reads raw song metadata and user activity logs as JSON records and
//! rebuilds five analytics tables as partitioned Parquet directories.
//!
//! ## Modules
//!
//! - **table**: In-memory typed tables with projection, filtering and dedup
//! - **schema**: Column inference over heterogeneous JSON records
//! - **io**: JSON sources and Parquet sinks, plus in-memory test doubles
//! - **pipeline**: The songs, artists, users, time and songplays builds
//! - **config**: TOML run configuration and credentials
//!
//! ## Quick Start
//!
//! ```rust
//! use starmelt::io::{MemorySink, MemorySource};
//! use starmelt::Pipeline;
//! use serde_json::json;
//!
//! # fn main() -> starmelt::Result<()> {
//! let source = MemorySource::new()
//!     .with_records("songs", vec![json!({
//!         "song_id": "S1", "title": "Creep", "artist_id": "A1", "year": 1992,
//!         "duration": 238.6, "artist_name": "Radiohead",
//!         "artist_location": "Oxford", "artist_latitude": null, "artist_longitude": null
//!     })])
//!     .with_records("events", vec![json!({
//!         "page": "NextSong", "ts": 1542069000000_i64, "userId": "10",
//!         "firstName": "Jacob", "lastName": "Klein", "gender": "M", "level": "paid",
//!         "sessionId": 954, "location": "Tampa, FL", "userAgent": "Mozilla/5.0",
//!         "artist": "Radiohead"
//!     })]);
//!
//! let pipeline = Pipeline::new(source, MemorySink::new())
//!     .with_song_data("songs")
//!     .with_log_data("events");
//! let summary = pipeline.run()?;
//! assert_eq!(summary.matched_songplays, 1);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod io;
pub mod pipeline;
pub mod schema;
pub mod table;

// Re-export commonly used types for convenience
pub use config::{Compression, Credentials, JoinKeyMode, PipelineConfig};
pub use error::{EtlError, Result};
pub use io::{JsonDirectorySource, ParquetDirectorySink, RecordSource, TableSink, WriteOptions};
pub use pipeline::{build_star_schema, Pipeline, RunSummary, StarSchema};
pub use table::{Cell, ColumnType, Field, Schema, Table};
