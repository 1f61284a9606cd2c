//! Songplay fact table
//!
//! Each play is matched to song metadata by artist display name, not by
//! artist id. Names that differ in case, spacing or punctuation do not match
//! in exact mode; such plays keep null song and artist keys. The first
//! metadata row for a name wins so every play yields exactly one fact row.

use crate::config::JoinKeyMode;
use crate::error::Result;
use crate::pipeline::keys::SurrogateKeys;
use crate::pipeline::time::epoch_millis;
use crate::table::{Cell, ColumnType, Field, Schema, Table};
use tracing::{info, warn};

pub const SONGPLAYS_TABLE: &str = "songplays";

/// Event columns read by the fact builder
pub const PLAY_COLUMNS: [&str; 7] = ["ts", "userId", "level", "sessionId", "location", "userAgent", "artist"];

/// Song metadata columns read by the fact builder
pub const SONG_JOIN_COLUMNS: [&str; 3] = ["artist_name", "song_id", "artist_id"];

#[derive(Debug, Clone)]
pub struct Songplays {
    pub table: Table,
    /// Plays that found a metadata row
    pub matched: usize,
}

pub fn songplays_schema() -> Schema {
    Schema::new(vec![
        Field::new("songplay_id", ColumnType::Int64, false),
        Field::new("start_time", ColumnType::Timestamp, false),
        Field::new("user_id", ColumnType::Utf8, true),
        Field::new("level", ColumnType::Utf8, true),
        Field::new("song_id", ColumnType::Utf8, true),
        Field::new("artist_id", ColumnType::Utf8, true),
        Field::new("session_id", ColumnType::Int64, true),
        Field::new("location", ColumnType::Utf8, true),
        Field::new("user_agent", ColumnType::Utf8, true),
    ])
}

/// Join plays to raw song metadata and assign surrogate keys in play order
pub fn build(
    plays: &Table,
    song_data: &Table,
    join_key: JoinKeyMode,
    keys: &SurrogateKeys,
) -> Result<Songplays> {
    plays.require_columns(&PLAY_COLUMNS)?;
    song_data.require_columns(&SONG_JOIN_COLUMNS)?;

    let ts = plays.column_index("ts")?;
    let user_id = plays.column_index("userId")?;
    let level = plays.column_index("level")?;
    let session_id = plays.column_index("sessionId")?;
    let location = plays.column_index("location")?;
    let user_agent = plays.column_index("userAgent")?;
    let artist = plays.column_index("artist")?;
    let song_id = song_data.column_index("song_id")?;
    let artist_id = song_data.column_index("artist_id")?;

    let index = song_data.index_first_by("artist_name", |name| join_key.key(name))?;

    let mut matched = 0;
    let table = plays.derive(SONGPLAYS_TABLE, songplays_schema(), |row| {
        let start_time = epoch_millis(&row[ts])?;
        let song = row[artist]
            .as_str()
            .and_then(|name| index.get(&join_key.key(name)))
            .map(|&pos| &song_data.rows()[pos]);

        let (song_key, artist_key) = match song {
            Some(song) => {
                matched += 1;
                (
                    song[song_id].clone().cast(ColumnType::Utf8),
                    song[artist_id].clone().cast(ColumnType::Utf8),
                )
            }
            None => (Cell::Null, Cell::Null),
        };

        Ok(vec![
            Cell::Int(keys.next_key()),
            Cell::Timestamp(start_time),
            row[user_id].clone().cast(ColumnType::Utf8),
            row[level].clone().cast(ColumnType::Utf8),
            song_key,
            artist_key,
            row[session_id].clone().cast(ColumnType::Int64),
            row[location].clone().cast(ColumnType::Utf8),
            row[user_agent].clone().cast(ColumnType::Utf8),
        ])
    })?;

    if !table.is_empty() && matched == 0 {
        warn!(
            "None of {} plays matched song metadata by artist name; songplays has only null song keys",
            table.len()
        );
    } else {
        info!("Matched {} of {} plays to song metadata", matched, table.len());
    }

    Ok(Songplays { table, matched })
}
