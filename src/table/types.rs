use chrono::{DateTime, SecondsFormat};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::hash::{Hash, Hasher};

/// Logical column type of a table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColumnType {
    Boolean,
    Int64,
    Float64,
    Utf8,
    /// UTC instant with millisecond precision
    Timestamp,
}

impl ColumnType {
    pub fn as_str(self) -> &'static str {
        match self {
            ColumnType::Boolean => "boolean",
            ColumnType::Int64 => "int64",
            ColumnType::Float64 => "float64",
            ColumnType::Utf8 => "utf8",
            ColumnType::Timestamp => "timestamp",
        }
    }
}

/// A named, typed column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub data_type: ColumnType,
    pub nullable: bool,
}

impl Field {
    pub fn new(name: impl Into<String>, data_type: ColumnType, nullable: bool) -> Self {
        Field {
            name: name.into(),
            data_type,
            nullable,
        }
    }
}

/// Ordered column set of a table
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    fields: Vec<Field>,
}

impl Schema {
    pub fn new(fields: Vec<Field>) -> Self {
        Schema { fields }
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }
}

/// A single value in a row.
///
/// Equality and hashing are total so rows can be deduplicated exactly:
/// nulls are equal to each other and floats compare by bit pattern.
#[derive(Debug, Clone)]
pub enum Cell {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    /// Milliseconds since the Unix epoch, UTC
    Timestamp(i64),
}

pub type Row = Vec<Cell>;

impl Cell {
    pub fn is_null(&self) -> bool {
        matches!(self, Cell::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Cell::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Cell::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::Float(f) => Some(*f),
            Cell::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Convert a JSON value into a cell of the given column type
    pub fn from_json(value: &Value, data_type: ColumnType) -> Cell {
        let natural = match value {
            Value::Null => Cell::Null,
            Value::Bool(b) => Cell::Bool(*b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Cell::Int(i),
                None => n.as_f64().map(Cell::Float).unwrap_or(Cell::Null),
            },
            Value::String(s) => Cell::Str(s.clone()),
            other => Cell::Str(other.to_string()),
        };
        natural.cast(data_type)
    }

    /// Cast to another column type.
    ///
    /// Values that cannot be represented in the target type become null.
    /// Floats narrow to integers by truncation.
    pub fn cast(self, data_type: ColumnType) -> Cell {
        match (self, data_type) {
            (Cell::Null, _) => Cell::Null,

            (Cell::Int(i), ColumnType::Int64) => Cell::Int(i),
            (Cell::Float(f), ColumnType::Int64) => truncate(f),
            (Cell::Bool(b), ColumnType::Int64) => Cell::Int(b as i64),
            (Cell::Timestamp(ms), ColumnType::Int64) => Cell::Int(ms.div_euclid(1000)),
            (Cell::Str(s), ColumnType::Int64) => {
                let s = s.trim();
                match s.parse::<i64>() {
                    Ok(i) => Cell::Int(i),
                    Err(_) => s.parse::<f64>().map(truncate).unwrap_or(Cell::Null),
                }
            }

            (Cell::Float(f), ColumnType::Float64) => Cell::Float(f),
            (Cell::Int(i), ColumnType::Float64) => Cell::Float(i as f64),
            (Cell::Bool(b), ColumnType::Float64) => Cell::Float(if b { 1.0 } else { 0.0 }),
            (Cell::Timestamp(ms), ColumnType::Float64) => Cell::Float(ms as f64 / 1000.0),
            (Cell::Str(s), ColumnType::Float64) => {
                s.trim().parse::<f64>().map(Cell::Float).unwrap_or(Cell::Null)
            }

            (Cell::Str(s), ColumnType::Utf8) => Cell::Str(s),
            (other, ColumnType::Utf8) => other.to_text().map(Cell::Str).unwrap_or(Cell::Null),

            (Cell::Bool(b), ColumnType::Boolean) => Cell::Bool(b),
            (Cell::Int(i), ColumnType::Boolean) => Cell::Bool(i != 0),
            (Cell::Str(s), ColumnType::Boolean) => match s.trim().to_ascii_lowercase().as_str() {
                "true" => Cell::Bool(true),
                "false" => Cell::Bool(false),
                _ => Cell::Null,
            },
            (_, ColumnType::Boolean) => Cell::Null,

            (Cell::Timestamp(ms), ColumnType::Timestamp) => Cell::Timestamp(ms),
            (Cell::Int(secs), ColumnType::Timestamp) => {
                secs.checked_mul(1000).map(Cell::Timestamp).unwrap_or(Cell::Null)
            }
            (Cell::Float(secs), ColumnType::Timestamp) => {
                let ms = (secs * 1000.0).floor();
                if ms.is_finite() && ms >= i64::MIN as f64 && ms <= i64::MAX as f64 {
                    Cell::Timestamp(ms as i64)
                } else {
                    Cell::Null
                }
            }
            (_, ColumnType::Timestamp) => Cell::Null,
        }
    }

    /// Text rendering used for string casts and partition directory names
    pub fn to_text(&self) -> Option<String> {
        match self {
            Cell::Null => None,
            Cell::Bool(b) => Some(b.to_string()),
            Cell::Int(i) => Some(i.to_string()),
            Cell::Float(f) => Some(f.to_string()),
            Cell::Str(s) => Some(s.clone()),
            Cell::Timestamp(ms) => DateTime::from_timestamp_millis(*ms)
                .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Millis, true)),
        }
    }
}

fn truncate(f: f64) -> Cell {
    let t = f.trunc();
    if t.is_finite() && t >= i64::MIN as f64 && t <= i64::MAX as f64 {
        Cell::Int(t as i64)
    } else {
        Cell::Null
    }
}

impl PartialEq for Cell {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Cell::Null, Cell::Null) => true,
            (Cell::Bool(a), Cell::Bool(b)) => a == b,
            (Cell::Int(a), Cell::Int(b)) => a == b,
            (Cell::Float(a), Cell::Float(b)) => a.to_bits() == b.to_bits(),
            (Cell::Str(a), Cell::Str(b)) => a == b,
            (Cell::Timestamp(a), Cell::Timestamp(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Cell {}

impl Hash for Cell {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Cell::Null => {}
            Cell::Bool(b) => b.hash(state),
            Cell::Int(i) => i.hash(state),
            Cell::Float(f) => f.to_bits().hash(state),
            Cell::Str(s) => s.hash(state),
            Cell::Timestamp(ms) => ms.hash(state),
        }
    }
}

impl From<&str> for Cell {
    fn from(s: &str) -> Self {
        Cell::Str(s.to_string())
    }
}

impl From<String> for Cell {
    fn from(s: String) -> Self {
        Cell::Str(s)
    }
}

impl From<i64> for Cell {
    fn from(i: i64) -> Self {
        Cell::Int(i)
    }
}

impl From<f64> for Cell {
    fn from(f: f64) -> Self {
        Cell::Float(f)
    }
}

impl<T: Into<Cell>> From<Option<T>> for Cell {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Cell::Null)
    }
}
