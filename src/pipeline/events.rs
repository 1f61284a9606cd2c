//! Song plays, users and time from the event log
//!
//! Only `NextSong` events are plays. Logins, logouts and page navigation are
//! dropped here and never reach a dimension or the fact table.

use crate::error::Result;
use crate::pipeline::time::{epoch_millis, time_parts};
use crate::table::{Cell, ColumnSpec, ColumnType, Field, Schema, Table};
use tracing::info;

pub const USERS_TABLE: &str = "users";
pub const TIME_TABLE: &str = "time";
pub const NEXT_SONG: &str = "NextSong";

pub const USER_COLUMNS: [ColumnSpec<'static>; 5] = [
    ColumnSpec::new("userId", ColumnType::Utf8),
    ColumnSpec::new("firstName", ColumnType::Utf8),
    ColumnSpec::new("lastName", ColumnType::Utf8),
    ColumnSpec::new("gender", ColumnType::Utf8),
    ColumnSpec::new("level", ColumnType::Utf8),
];

#[derive(Debug, Clone)]
pub struct EventDimensions {
    /// Raw events narrowed to plays, all source columns kept
    pub plays: Table,
    pub users: Table,
    pub time: Table,
}

/// Keep only `NextSong` events
pub fn song_plays(log_data: &Table) -> Result<Table> {
    log_data.require_columns(&["page", "ts"])?;
    let page = log_data.column_index("page")?;
    Ok(log_data.filter(|row| row[page].as_str() == Some(NEXT_SONG)))
}

/// Distinct user rows. A user whose level changed keeps one row per level.
pub fn users_table(plays: &Table) -> Result<Table> {
    Ok(plays.select(&USER_COLUMNS)?.distinct().renamed(USERS_TABLE))
}

pub fn time_schema() -> Schema {
    Schema::new(vec![
        Field::new("timestamp", ColumnType::Int64, false),
        Field::new("hour", ColumnType::Int64, false),
        Field::new("day", ColumnType::Int64, false),
        Field::new("week", ColumnType::Int64, false),
        Field::new("month", ColumnType::Int64, false),
        Field::new("year", ColumnType::Int64, false),
        Field::new("weekday", ColumnType::Utf8, false),
    ])
}

/// One row per play, in play order. Plays in the same second repeat rows.
pub fn time_table(plays: &Table) -> Result<Table> {
    let ts = plays.column_index("ts")?;
    plays.derive(TIME_TABLE, time_schema(), |row| {
        let parts = time_parts(epoch_millis(&row[ts])?)?;
        Ok(vec![
            Cell::Int(parts.seconds),
            Cell::Int(parts.hour.into()),
            Cell::Int(parts.day.into()),
            Cell::Int(parts.week.into()),
            Cell::Int(parts.month.into()),
            Cell::Int(parts.year.into()),
            Cell::Str(parts.weekday),
        ])
    })
}

pub fn build(log_data: &Table) -> Result<EventDimensions> {
    let plays = song_plays(log_data)?;
    let users = users_table(&plays)?;
    let time = time_table(&plays)?;
    info!(
        "Kept {} of {} events as plays: {} user rows, {} time rows",
        plays.len(),
        log_data.len(),
        users.len(),
        time.len()
    );
    Ok(EventDimensions { plays, users, time })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EtlError;
    use serde_json::{json, Value};

    fn event(user_id: &str, page: &str, level: &str, ts: i64) -> Value {
        json!({
            "artist": "Radiohead",
            "auth": "Logged In",
            "firstName": "Kaylee",
            "gender": "F",
            "lastName": "Summers",
            "level": level,
            "location": "Phoenix-Mesa-Scottsdale, AZ",
            "page": page,
            "sessionId": 139,
            "ts": ts,
            "userAgent": "Mozilla/5.0",
            "userId": user_id
        })
    }

    fn log_data(events: &[Value]) -> Table {
        Table::from_json_records("log_data", events).unwrap()
    }

    #[test]
    fn test_only_next_song_events_are_plays() {
        let raw = log_data(&[
            event("8", "NextSong", "free", 1_542_069_000_000),
            event("8", "Home", "free", 1_542_069_001_000),
            event("9", "Logout", "free", 1_542_069_002_000),
            event("8", "nextsong", "free", 1_542_069_003_000),
        ]);
        let dims = build(&raw).unwrap();

        assert_eq!(dims.plays.len(), 1);
        assert_eq!(dims.time.len(), 1);

        // User 9 only logged out
        let user_ids = dims.users.column_values("userId").unwrap();
        assert_eq!(user_ids, vec![&Cell::from("8")]);
    }

    #[test]
    fn test_level_change_keeps_both_user_rows() {
        let raw = log_data(&[
            event("8", "NextSong", "free", 1_542_069_000_000),
            event("8", "NextSong", "free", 1_542_069_100_000),
            event("8", "NextSong", "paid", 1_542_069_200_000),
        ]);
        let users = users_table(&song_plays(&raw).unwrap()).unwrap();
        assert_eq!(users.len(), 2);
        assert_eq!(users.rows()[1][4], Cell::from("paid"));
    }

    #[test]
    fn test_time_rows_follow_each_play() {
        let raw = log_data(&[
            event("8", "NextSong", "free", 1_542_069_000_000),
            event("9", "NextSong", "free", 1_542_069_000_400),
        ]);
        let time = time_table(&song_plays(&raw).unwrap()).unwrap();

        // Same second, not deduplicated
        assert_eq!(time.len(), 2);
        assert_eq!(time.rows()[0], time.rows()[1]);
        assert_eq!(
            time.rows()[0],
            vec![
                Cell::Int(1_542_069_000),
                Cell::Int(0),
                Cell::Int(13),
                Cell::Int(46),
                Cell::Int(11),
                Cell::Int(2018),
                Cell::from("Tuesday"),
            ]
        );
    }

    #[test]
    fn test_bad_ts_on_play_is_fatal() {
        let mut bad = event("8", "NextSong", "free", 0);
        bad["ts"] = json!("not-a-number");
        let raw = log_data(&[event("8", "NextSong", "free", 1_542_069_000_000), bad]);
        let err = build(&raw).unwrap_err();
        assert!(matches!(err, EtlError::InvalidTimestamp { .. }));
    }

    #[test]
    fn test_bad_ts_on_non_play_is_ignored() {
        let mut bad = event("8", "Home", "free", 0);
        bad["ts"] = json!(null);
        let raw = log_data(&[event("8", "NextSong", "free", 1_542_069_000_000), bad]);
        assert_eq!(build(&raw).unwrap().time.len(), 1);
    }

    #[test]
    fn test_missing_page_column_is_schema_error() {
        let raw = log_data(&[json!({"ts": 1_542_069_000_000_i64, "userId": "8"})]);
        let err = build(&raw).unwrap_err();
        match err {
            EtlError::MissingColumn { column, .. } => assert_eq!(column, "page"),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
