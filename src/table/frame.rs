use crate::error::{EtlError, Result};
use crate::schema::SchemaBuilder;
use crate::table::types::{Cell, ColumnType, Field, Row, Schema};
use serde_json::Value;
use std::collections::{HashMap, HashSet};

/// Projection of one source column into an output column of a declared type
#[derive(Debug, Clone, Copy)]
pub struct ColumnSpec<'a> {
    pub source: &'a str,
    pub alias: &'a str,
    pub data_type: ColumnType,
}

impl<'a> ColumnSpec<'a> {
    pub const fn new(source: &'a str, data_type: ColumnType) -> Self {
        ColumnSpec {
            source,
            alias: source,
            data_type,
        }
    }

    pub const fn alias(self, alias: &'a str) -> Self {
        ColumnSpec {
            source: self.source,
            alias,
            data_type: self.data_type,
        }
    }
}

/// An immutable, ordered sequence of rows sharing one schema
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    name: String,
    schema: Schema,
    rows: Vec<Row>,
}

impl Table {
    pub fn new(name: impl Into<String>, schema: Schema, rows: Vec<Row>) -> Self {
        debug_assert!(rows.iter().all(|r| r.len() == schema.len()));
        Table {
            name: name.into(),
            schema,
            rows,
        }
    }

    /// Build a table from JSON object records, inferring the column set.
    ///
    /// Fields missing from a record become nulls. A record that is not a
    /// JSON object is a read error.
    pub fn from_json_records(name: impl Into<String>, records: &[Value]) -> Result<Self> {
        let name = name.into();
        let mut builder = SchemaBuilder::new();
        for (idx, record) in records.iter().enumerate() {
            match record {
                Value::Object(obj) => builder.add_record(obj),
                other => {
                    return Err(EtlError::source_read(
                        name.as_str(),
                        format!("record {} is not a JSON object: {}", idx, type_name(other)),
                    ));
                }
            }
        }
        let schema = builder.build();

        let rows = records
            .iter()
            .filter_map(Value::as_object)
            .map(|obj| {
                schema
                    .fields()
                    .iter()
                    .map(|f| match obj.get(&f.name) {
                        Some(value) => Cell::from_json(value, f.data_type),
                        None => Cell::Null,
                    })
                    .collect()
            })
            .collect();

        Ok(Table::new(name, schema, rows))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn renamed(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn column_index(&self, column: &str) -> Result<usize> {
        self.schema
            .index_of(column)
            .ok_or_else(|| EtlError::missing_column(self.name.as_str(), column))
    }

    /// Fail with a schema error naming the first absent column
    pub fn require_columns(&self, columns: &[&str]) -> Result<()> {
        for column in columns {
            self.column_index(column)?;
        }
        Ok(())
    }

    pub fn column_values(&self, column: &str) -> Result<Vec<&Cell>> {
        let idx = self.column_index(column)?;
        Ok(self.rows.iter().map(|row| &row[idx]).collect())
    }

    /// Keep the rows matching the predicate, preserving order
    pub fn filter<F>(&self, predicate: F) -> Table
    where
        F: Fn(&Row) -> bool,
    {
        let rows = self.rows.iter().filter(|row| predicate(row)).cloned().collect();
        Table::new(self.name.clone(), self.schema.clone(), rows)
    }

    /// Project to the given columns, renaming and casting each one
    pub fn select(&self, columns: &[ColumnSpec<'_>]) -> Result<Table> {
        let mut indices = Vec::with_capacity(columns.len());
        let mut fields = Vec::with_capacity(columns.len());
        for spec in columns {
            let idx = self.column_index(spec.source)?;
            let source = &self.schema.fields()[idx];
            let nullable = source.nullable || source.data_type != spec.data_type;
            fields.push(Field::new(spec.alias, spec.data_type, nullable));
            indices.push(idx);
        }

        let rows = self
            .rows
            .iter()
            .map(|row| {
                indices
                    .iter()
                    .zip(columns)
                    .map(|(&idx, spec)| row[idx].clone().cast(spec.data_type))
                    .collect()
            })
            .collect();

        Ok(Table::new(self.name.clone(), Schema::new(fields), rows))
    }

    /// Remove exact-duplicate rows, keeping the first occurrence of each
    pub fn distinct(&self) -> Table {
        let mut seen: HashSet<&Row> = HashSet::with_capacity(self.rows.len());
        let rows = self
            .rows
            .iter()
            .filter(|row| seen.insert(*row))
            .cloned()
            .collect();
        Table::new(self.name.clone(), self.schema.clone(), rows)
    }

    /// Map every row into a new schema; the first error aborts the whole table
    pub fn derive<F>(&self, name: impl Into<String>, schema: Schema, mut f: F) -> Result<Table>
    where
        F: FnMut(&Row) -> Result<Row>,
    {
        let rows = self.rows.iter().map(&mut f).collect::<Result<Vec<Row>>>()?;
        Ok(Table::new(name, schema, rows))
    }

    /// Hash index from a text column to the first row holding each key.
    ///
    /// Null and non-text values are not indexed.
    pub fn index_first_by<F>(&self, column: &str, key: F) -> Result<HashMap<String, usize>>
    where
        F: Fn(&str) -> String,
    {
        let idx = self.column_index(column)?;
        let mut index = HashMap::new();
        for (pos, row) in self.rows.iter().enumerate() {
            if let Some(value) = row[idx].as_str() {
                index.entry(key(value)).or_insert(pos);
            }
        }
        Ok(index)
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
