//! Calendar attributes of event timestamps
//!
//! Event logs carry epoch milliseconds. All calendar fields are computed in
//! UTC from the whole second `floor(ts / 1000)`.

use crate::error::{EtlError, Result};
use crate::table::Cell;
use chrono::{DateTime, Datelike, Timelike, Utc};

/// Calendar decomposition of one epoch second
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeParts {
    pub seconds: i64,
    pub hour: u32,
    pub day: u32,
    /// ISO 8601 week of year
    pub week: u32,
    pub month: u32,
    pub year: i32,
    /// English day name, e.g. "Tuesday"
    pub weekday: String,
}

/// Epoch milliseconds held by a `ts` cell.
///
/// Integers are taken as is, floats are floored, numeric strings are parsed.
/// Anything else is an invalid timestamp.
pub fn epoch_millis(cell: &Cell) -> Result<i64> {
    match cell {
        Cell::Int(ms) => Ok(*ms),
        Cell::Float(ms) => float_millis(*ms, cell),
        Cell::Str(s) => {
            let s = s.trim();
            match s.parse::<i64>() {
                Ok(ms) => Ok(ms),
                Err(_) => match s.parse::<f64>() {
                    Ok(ms) => float_millis(ms, cell),
                    Err(_) => Err(invalid(cell, "not numeric")),
                },
            }
        }
        Cell::Null => Err(invalid(cell, "missing")),
        _ => Err(invalid(cell, "not numeric")),
    }
}

fn float_millis(ms: f64, cell: &Cell) -> Result<i64> {
    let floored = ms.floor();
    if floored.is_finite() && floored >= i64::MIN as f64 && floored < i64::MAX as f64 {
        Ok(floored as i64)
    } else {
        Err(invalid(cell, "out of range"))
    }
}

/// Whole seconds, rounding toward negative infinity
pub fn epoch_seconds(millis: i64) -> i64 {
    millis.div_euclid(1000)
}

pub fn time_parts(millis: i64) -> Result<TimeParts> {
    let seconds = epoch_seconds(millis);
    let datetime: DateTime<Utc> = DateTime::from_timestamp(seconds, 0)
        .ok_or_else(|| invalid(&Cell::Int(millis), "out of range"))?;

    Ok(TimeParts {
        seconds,
        hour: datetime.hour(),
        day: datetime.day(),
        week: datetime.iso_week().week(),
        month: datetime.month(),
        year: datetime.year(),
        weekday: datetime.format("%A").to_string(),
    })
}

fn invalid(cell: &Cell, reason: &str) -> EtlError {
    EtlError::InvalidTimestamp {
        value: cell.to_text().unwrap_or_else(|| "null".to_string()),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_utc_date() {
        let parts = time_parts(1_542_069_000_000).unwrap();
        assert_eq!(
            parts,
            TimeParts {
                seconds: 1_542_069_000,
                hour: 0,
                day: 13,
                week: 46,
                month: 11,
                year: 2018,
                weekday: "Tuesday".to_string(),
            }
        );
    }

    #[test]
    fn test_seconds_are_floored() {
        assert_eq!(epoch_seconds(1_542_069_637_796), 1_542_069_637);
        assert_eq!(epoch_seconds(-1), -1);
        assert_eq!(time_parts(1_542_069_637_796).unwrap().seconds, 1_542_069_637);
    }

    #[test]
    fn test_iso_week_crosses_year_boundary() {
        // 2018-12-31 is in ISO week 1 of 2019
        let parts = time_parts(1_546_214_400_000).unwrap();
        assert_eq!((parts.year, parts.month, parts.day), (2018, 12, 31));
        assert_eq!(parts.week, 1);
        assert_eq!(parts.weekday, "Monday");
    }

    #[test]
    fn test_epoch_millis_accepts_numeric_forms() {
        assert_eq!(epoch_millis(&Cell::Int(1_542_069_000_000)).unwrap(), 1_542_069_000_000);
        assert_eq!(epoch_millis(&Cell::Float(1_542_069_000_000.7)).unwrap(), 1_542_069_000_000);
        assert_eq!(epoch_millis(&Cell::from(" 1542069000000 ")).unwrap(), 1_542_069_000_000);
    }

    #[test]
    fn test_invalid_timestamps_are_errors() {
        let err = epoch_millis(&Cell::from("yesterday")).unwrap_err();
        assert!(matches!(err, EtlError::InvalidTimestamp { .. }));
        assert!(epoch_millis(&Cell::Null).is_err());
        assert!(epoch_millis(&Cell::Float(f64::NAN)).is_err());
        assert!(epoch_millis(&Cell::Bool(true)).is_err());
        assert!(time_parts(i64::MAX).is_err());
    }
}
