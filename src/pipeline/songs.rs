//! Song and artist dimensions from song metadata
//!
//! Both tables are full-row deduplicated projections of the same raw
//! metadata. A song_id whose title, year or duration differs between files
//! keeps one row per distinct variant.

use crate::error::Result;
use crate::table::{ColumnSpec, ColumnType, Table};
use tracing::info;

pub const SONGS_TABLE: &str = "songs";
pub const ARTISTS_TABLE: &str = "artists";

/// Partition layout of the songs table
pub const SONGS_PARTITION_COLUMNS: [&str; 2] = ["year", "artist_id"];

pub const SONG_COLUMNS: [ColumnSpec<'static>; 5] = [
    ColumnSpec::new("song_id", ColumnType::Utf8),
    ColumnSpec::new("title", ColumnType::Utf8),
    ColumnSpec::new("artist_id", ColumnType::Utf8),
    ColumnSpec::new("year", ColumnType::Int64),
    ColumnSpec::new("duration", ColumnType::Float64),
];

pub const ARTIST_COLUMNS: [ColumnSpec<'static>; 5] = [
    ColumnSpec::new("artist_id", ColumnType::Utf8),
    ColumnSpec::new("artist_name", ColumnType::Utf8),
    ColumnSpec::new("artist_location", ColumnType::Utf8),
    ColumnSpec::new("artist_latitude", ColumnType::Float64),
    ColumnSpec::new("artist_longitude", ColumnType::Float64),
];

#[derive(Debug, Clone)]
pub struct SongDimensions {
    pub songs: Table,
    pub artists: Table,
}

pub fn songs_table(song_data: &Table) -> Result<Table> {
    Ok(song_data.select(&SONG_COLUMNS)?.distinct().renamed(SONGS_TABLE))
}

pub fn artists_table(song_data: &Table) -> Result<Table> {
    Ok(song_data.select(&ARTIST_COLUMNS)?.distinct().renamed(ARTISTS_TABLE))
}

/// Build both dimensions; fails before producing either if a column is missing
pub fn extract(song_data: &Table) -> Result<SongDimensions> {
    let songs = songs_table(song_data)?;
    let artists = artists_table(song_data)?;
    info!(
        "Extracted {} songs and {} artists from {} metadata records",
        songs.len(),
        artists.len(),
        song_data.len()
    );
    Ok(SongDimensions { songs, artists })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EtlError;
    use crate::table::Cell;
    use serde_json::{json, Value};
    use std::collections::HashSet;

    fn song(song_id: &str, artist_id: &str, duration: f64) -> Value {
        json!({
            "num_songs": 1,
            "song_id": song_id,
            "title": "Der Kleine Dompfaff",
            "artist_id": artist_id,
            "year": 0,
            "duration": duration,
            "artist_name": "Jimmy Wakely",
            "artist_location": "Mineola, TX",
            "artist_latitude": null,
            "artist_longitude": null
        })
    }

    #[test]
    fn test_exact_duplicates_collapse() {
        let raw = Table::from_json_records(
            "song_data",
            &[
                song("SOBAYLL12A8C138AF9", "ARDR4AC1187FB371A1", 152.92036),
                song("SOBAYLL12A8C138AF9", "ARDR4AC1187FB371A1", 152.92036),
                song("SOOLYAZ12A6701F4A6", "ARDR4AC1187FB371A1", 218.93179),
            ],
        )
        .unwrap();

        let dims = extract(&raw).unwrap();
        assert_eq!(dims.songs.len(), 2);
        assert_eq!(dims.artists.len(), 1);
        assert_eq!(dims.songs.name(), SONGS_TABLE);

        let distinct: HashSet<_> = dims.songs.rows().iter().collect();
        assert_eq!(distinct.len(), dims.songs.len());
    }

    #[test]
    fn test_dedup_is_by_full_row_not_key() {
        let raw = Table::from_json_records(
            "song_data",
            &[
                song("SOBAYLL12A8C138AF9", "ARDR4AC1187FB371A1", 152.92036),
                song("SOBAYLL12A8C138AF9", "ARDR4AC1187FB371A1", 153.0),
            ],
        )
        .unwrap();

        let songs = songs_table(&raw).unwrap();
        assert_eq!(songs.len(), 2);
    }

    #[test]
    fn test_declared_column_types() {
        let raw = Table::from_json_records(
            "song_data",
            &[json!({
                "song_id": "S1", "title": "Creep", "artist_id": "A1",
                "year": 1992, "duration": 238,
                "artist_name": "Radiohead", "artist_location": "Oxford",
                "artist_latitude": null, "artist_longitude": null
            })],
        )
        .unwrap();

        let songs = songs_table(&raw).unwrap();
        let names: Vec<&str> = songs.schema().names().collect();
        assert_eq!(names, vec!["song_id", "title", "artist_id", "year", "duration"]);
        assert_eq!(songs.rows()[0][4], Cell::Float(238.0));

        let artists = artists_table(&raw).unwrap();
        assert_eq!(artists.schema().fields()[3].data_type, ColumnType::Float64);
        assert_eq!(artists.rows()[0][3], Cell::Null);
    }

    #[test]
    fn test_missing_column_fails() {
        let raw = Table::from_json_records("song_data", &[json!({"song_id": "S1"})]).unwrap();
        let err = extract(&raw).unwrap_err();
        assert!(matches!(err, EtlError::MissingColumn { .. }));
    }
}
