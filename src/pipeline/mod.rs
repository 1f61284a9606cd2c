//! Star-schema build
//!
//! A run reads both raw datasets, builds every table in memory, and only
//! then writes. Read, schema and timestamp errors therefore abort before any
//! output is touched. Write errors can leave earlier tables already replaced.
//!
//! ## Stages
//!
//! - **songs**: `songs` and `artists` dimensions from song metadata
//! - **events**: play filter, `users` and `time` dimensions from event logs
//! - **facts**: `songplays`, joining plays to raw song metadata
//!
//! The songs and events stages share no data and run concurrently.

pub mod keys;
pub mod time;
pub mod songs;
pub mod events;
pub mod facts;

pub use keys::SurrogateKeys;
pub use time::{TimeParts, epoch_millis, epoch_seconds, time_parts};

use crate::config::{JoinKeyMode, PipelineConfig, DEFAULT_LOG_DATA, DEFAULT_SONG_DATA};
use crate::error::Result;
use crate::io::{RecordSource, TableSink, WriteOptions};
use crate::table::Table;
use std::time::Instant;
use tracing::info;

/// Row counts of one completed run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub songs: usize,
    pub artists: usize,
    pub users: usize,
    pub time: usize,
    pub songplays: usize,
    /// Songplays with non-null song and artist keys
    pub matched_songplays: usize,
}

/// All five tables of one run, before writing
#[derive(Debug, Clone)]
pub struct StarSchema {
    pub songs: Table,
    pub artists: Table,
    pub users: Table,
    pub time: Table,
    pub songplays: Table,
    pub matched_songplays: usize,
}

impl StarSchema {
    pub fn summary(&self) -> RunSummary {
        RunSummary {
            songs: self.songs.len(),
            artists: self.artists.len(),
            users: self.users.len(),
            time: self.time.len(),
            songplays: self.songplays.len(),
            matched_songplays: self.matched_songplays,
        }
    }
}

/// Build the star schema from raw song metadata and raw event logs
pub fn build_star_schema(song_data: &Table, log_data: &Table, join_key: JoinKeyMode) -> Result<StarSchema> {
    let (song_dims, event_dims) = rayon::join(|| songs::extract(song_data), || events::build(log_data));
    let song_dims = song_dims?;
    let event_dims = event_dims?;

    let keys = SurrogateKeys::new();
    let songplays = facts::build(&event_dims.plays, song_data, join_key, &keys)?;

    Ok(StarSchema {
        songs: song_dims.songs,
        artists: song_dims.artists,
        users: event_dims.users,
        time: event_dims.time,
        songplays: songplays.table,
        matched_songplays: songplays.matched,
    })
}

/// One full rebuild against a source and a sink
pub struct Pipeline<S: RecordSource, W: TableSink> {
    source: S,
    sink: W,
    song_data: String,
    log_data: String,
    join_key: JoinKeyMode,
}

impl<S: RecordSource, W: TableSink> Pipeline<S, W> {
    pub fn new(source: S, sink: W) -> Self {
        Pipeline {
            source,
            sink,
            song_data: DEFAULT_SONG_DATA.to_string(),
            log_data: DEFAULT_LOG_DATA.to_string(),
            join_key: JoinKeyMode::default(),
        }
    }

    pub fn from_config(source: S, sink: W, config: &PipelineConfig) -> Self {
        Pipeline::new(source, sink)
            .with_song_data(config.song_data.clone())
            .with_log_data(config.log_data.clone())
            .with_join_key(config.join_key)
    }

    pub fn with_song_data(mut self, pattern: impl Into<String>) -> Self {
        self.song_data = pattern.into();
        self
    }

    pub fn with_log_data(mut self, pattern: impl Into<String>) -> Self {
        self.log_data = pattern.into();
        self
    }

    pub fn with_join_key(mut self, join_key: JoinKeyMode) -> Self {
        self.join_key = join_key;
        self
    }

    pub fn sink(&self) -> &W {
        &self.sink
    }

    pub fn run(&self) -> Result<RunSummary> {
        let started = Instant::now();

        let (song_data, log_data) = rayon::join(
            || self.source.read_json(&self.song_data),
            || self.source.read_json(&self.log_data),
        );
        let song_data = song_data?;
        let log_data = log_data?;

        let star = build_star_schema(&song_data, &log_data, self.join_key)?;
        self.write(&star)?;

        let summary = star.summary();
        info!(
            "Run finished in {:.2?}: {} songs, {} artists, {} users, {} time rows, {} songplays ({} matched)",
            started.elapsed(),
            summary.songs,
            summary.artists,
            summary.users,
            summary.time,
            summary.songplays,
            summary.matched_songplays
        );
        Ok(summary)
    }

    fn write(&self, star: &StarSchema) -> Result<()> {
        let overwrite = WriteOptions::overwrite();
        self.sink.write(
            &star.songs,
            songs::SONGS_TABLE,
            &WriteOptions::overwrite().partitioned_by(&songs::SONGS_PARTITION_COLUMNS),
        )?;
        self.sink.write(&star.artists, songs::ARTISTS_TABLE, &overwrite)?;
        self.sink.write(&star.users, events::USERS_TABLE, &overwrite)?;
        self.sink.write(&star.time, events::TIME_TABLE, &overwrite)?;
        self.sink.write(&star.songplays, facts::SONGPLAYS_TABLE, &overwrite)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EtlError;
    use crate::io::{MemorySink, MemorySource};
    use crate::table::Cell;
    use serde_json::{json, Value};

    const SONG_DATA: &str = "song_data";
    const LOG_DATA: &str = "log_data";

    fn songs() -> Vec<Value> {
        vec![json!({
            "num_songs": 1,
            "artist_id": "A1",
            "artist_latitude": 51.75,
            "artist_longitude": -1.25,
            "artist_location": "Oxford, England",
            "artist_name": "Radiohead",
            "song_id": "S1",
            "title": "Creep",
            "duration": 238.64,
            "year": 1992
        })]
    }

    fn events() -> Vec<Value> {
        let base = json!({
            "artist": "Radiohead",
            "firstName": "Jacob",
            "gender": "M",
            "lastName": "Klein",
            "level": "paid",
            "location": "Tampa-St. Petersburg-Clearwater, FL",
            "page": "NextSong",
            "sessionId": 954,
            "ts": 1542069000000_i64,
            "userAgent": "Mozilla/5.0",
            "userId": "10"
        });
        let mut login = base.clone();
        login["page"] = json!("Login");
        login["artist"] = json!(null);
        login["userId"] = json!("99");
        let mut unmatched = base.clone();
        unmatched["artist"] = json!("Radiohead ");
        unmatched["ts"] = json!(1542069060000_i64);
        vec![base, login, unmatched]
    }

    fn pipeline(songs: Vec<Value>, events: Vec<Value>) -> Pipeline<MemorySource, MemorySink> {
        let source = MemorySource::new()
            .with_records(SONG_DATA, songs)
            .with_records(LOG_DATA, events);
        Pipeline::new(source, MemorySink::new())
            .with_song_data(SONG_DATA)
            .with_log_data(LOG_DATA)
    }

    #[test]
    fn test_run_writes_all_tables() {
        let pipeline = pipeline(songs(), events());
        let summary = pipeline.run().unwrap();

        assert_eq!(
            summary,
            RunSummary {
                songs: 1,
                artists: 1,
                users: 1,
                time: 2,
                songplays: 2,
                matched_songplays: 1,
            }
        );
        assert_eq!(
            pipeline.sink().locations(),
            vec!["artists", "songplays", "songs", "time", "users"]
        );

        let songs = pipeline.sink().get("songs").unwrap();
        assert_eq!(songs.options.partition_by, vec!["year", "artist_id"]);

        let facts = pipeline.sink().get("songplays").unwrap().table;
        assert_eq!(facts.rows()[0][4], Cell::from("S1"));
        assert_eq!(facts.rows()[1][4], Cell::Null);
        assert_eq!(facts.rows()[0][2], Cell::from("10"));
    }

    #[test]
    fn test_rerun_is_identical() {
        let pipeline = pipeline(songs(), events());
        pipeline.run().unwrap();
        let first: Vec<_> = pipeline
            .sink()
            .locations()
            .iter()
            .map(|l| pipeline.sink().get(l).unwrap())
            .collect();

        pipeline.run().unwrap();
        let second: Vec<_> = pipeline
            .sink()
            .locations()
            .iter()
            .map(|l| pipeline.sink().get(l).unwrap())
            .collect();

        assert_eq!(first, second);
    }

    #[test]
    fn test_source_error_aborts_before_any_write() {
        let source = MemorySource::new().with_records(LOG_DATA, events());
        let pipeline = Pipeline::new(source, MemorySink::new())
            .with_song_data(SONG_DATA)
            .with_log_data(LOG_DATA);

        let err = pipeline.run().unwrap_err();
        assert!(matches!(err, EtlError::SourceRead { .. }));
        assert!(pipeline.sink().locations().is_empty());
    }

    #[test]
    fn test_timestamp_error_aborts_before_any_write() {
        let mut events = events();
        events[0]["ts"] = json!("13 Nov 2018");
        let pipeline = pipeline(songs(), events);

        let err = pipeline.run().unwrap_err();
        assert!(matches!(err, EtlError::InvalidTimestamp { .. }));
        assert!(pipeline.sink().locations().is_empty());
    }

    #[test]
    fn test_normalized_join_from_config() {
        let mut config = PipelineConfig::new(crate::config::Credentials::new("id", "secret"));
        config.song_data = SONG_DATA.to_string();
        config.log_data = LOG_DATA.to_string();
        config.join_key = JoinKeyMode::Normalized;

        let source = MemorySource::new()
            .with_records(SONG_DATA, songs())
            .with_records(LOG_DATA, events());
        let summary = Pipeline::from_config(source, MemorySink::new(), &config)
            .run()
            .unwrap();
        assert_eq!(summary.matched_songplays, 2);
    }
}
