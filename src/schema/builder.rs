//! Streaming column inference for JSON records
//!
//! Statistics are accumulated per field while records stream past and the
//! table schema is built once at the end. The resulting column set is the
//! union of every field seen, sorted by name.

use crate::table::{ColumnType, Field, Schema};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Type identifier for JSON values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum JsonType {
    Null,
    Boolean,
    Integer,
    Number,
    String,
    Array,
    Object,
}

impl JsonType {
    fn from_value(value: &Value) -> Self {
        match value {
            Value::Null => JsonType::Null,
            Value::Bool(_) => JsonType::Boolean,
            Value::Number(n) => {
                if n.is_i64() {
                    JsonType::Integer
                } else {
                    JsonType::Number
                }
            }
            Value::String(_) => JsonType::String,
            Value::Array(_) => JsonType::Array,
            Value::Object(_) => JsonType::Object,
        }
    }
}

/// Statistics for a single field across all records
#[derive(Debug, Default)]
struct FieldStats {
    type_counts: HashMap<JsonType, usize>,
    // Records where the field was present and not null
    non_null_count: usize,
}

impl FieldStats {
    fn add_value(&mut self, value: &Value) {
        let json_type = JsonType::from_value(value);
        *self.type_counts.entry(json_type).or_insert(0) += 1;
        if json_type != JsonType::Null {
            self.non_null_count += 1;
        }
    }

    fn has(&self, json_type: JsonType) -> bool {
        self.type_counts.contains_key(&json_type)
    }

    /// Unify every non-null type seen into one column type
    fn column_type(&self) -> ColumnType {
        let textual = self.has(JsonType::String) || self.has(JsonType::Array) || self.has(JsonType::Object);
        let numeric = self.has(JsonType::Integer) || self.has(JsonType::Number);
        let boolean = self.has(JsonType::Boolean);

        if textual || (boolean && numeric) {
            ColumnType::Utf8
        } else if boolean {
            ColumnType::Boolean
        } else if self.has(JsonType::Number) {
            ColumnType::Float64
        } else if self.has(JsonType::Integer) {
            ColumnType::Int64
        } else {
            // Only nulls seen
            ColumnType::Utf8
        }
    }
}

/// Accumulates statistics over JSON records and builds a table schema
#[derive(Debug, Default)]
pub struct SchemaBuilder {
    fields: HashMap<String, FieldStats>,
    record_count: usize,
}

impl SchemaBuilder {
    /// Create a new empty schema builder
    pub fn new() -> Self {
        SchemaBuilder::default()
    }

    /// Add one record's fields to the accumulated statistics
    pub fn add_record(&mut self, record: &Map<String, Value>) {
        self.record_count += 1;
        for (key, value) in record.iter() {
            self.fields
                .entry(key.clone())
                .or_default()
                .add_value(value);
        }
    }

    /// Build the final schema.
    ///
    /// A column is nullable unless it was present and non-null in every record.
    pub fn build(self) -> Schema {
        let record_count = self.record_count;
        let mut fields: Vec<Field> = self
            .fields
            .into_iter()
            .map(|(name, stats)| {
                let nullable = stats.non_null_count < record_count;
                Field::new(name, stats.column_type(), nullable)
            })
            .collect();
        fields.sort_by(|a, b| a.name.cmp(&b.name));
        Schema::new(fields)
    }
}

/// Infer a table schema from JSON object records; non-objects are skipped
pub fn infer_schema(records: &[Value]) -> Schema {
    let mut builder = SchemaBuilder::new();

    for record in records {
        if let Value::Object(obj) = record {
            builder.add_record(obj);
        }
    }

    builder.build()
}
