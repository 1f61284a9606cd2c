use crate::config::{Compression, Credentials};
use crate::error::{EtlError, Result};
use crate::io::{SaveMode, TableSink, WriteOptions};
use crate::table::{Cell, ColumnType, Field, Row, Table};
use arrow::array::{
    ArrayRef, BooleanArray, Float64Array, Int64Array, StringArray, TimestampMillisecondArray,
};
use arrow::datatypes::{DataType, Field as ArrowField, Schema as ArrowSchema, TimeUnit};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use parquet::basic::{Compression as ParquetCompression, ZstdLevel};
use parquet::file::properties::WriterProperties;
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Directory name used for null or empty partition values
pub const DEFAULT_PARTITION_NAME: &str = "__HIVE_DEFAULT_PARTITION__";
pub const SUCCESS_MARKER: &str = "_SUCCESS";
const PART_FILE: &str = "part-00000.parquet";

/// Writes each table as a directory of Parquet files under a local root.
///
/// Partitioned tables use the `column=value/` directory layout and leave the
/// partition columns out of the file bodies. Writes are not atomic across
/// partitions: a failure can leave some partitions written.
#[derive(Debug, Clone)]
pub struct ParquetDirectorySink {
    root: PathBuf,
    compression: Compression,
    /// Held for object-store backends; local filesystem access ignores it
    credentials: Option<Credentials>,
}

impl ParquetDirectorySink {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        ParquetDirectorySink {
            root: root.into(),
            compression: Compression::default(),
            credentials: None,
        }
    }

    pub fn with_compression(mut self, compression: Compression) -> Self {
        self.compression = compression;
        self
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        debug!(
            "Using access key {} for sink at {}",
            credentials.access_key_id,
            self.root.display()
        );
        self.credentials = Some(credentials);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn credentials(&self) -> Option<&Credentials> {
        self.credentials.as_ref()
    }

    fn properties(&self) -> WriterProperties {
        let compression = match self.compression {
            Compression::Snappy => ParquetCompression::SNAPPY,
            Compression::Zstd => ParquetCompression::ZSTD(ZstdLevel::default()),
            Compression::Uncompressed => ParquetCompression::UNCOMPRESSED,
        };
        WriterProperties::builder().set_compression(compression).build()
    }

    fn write_file(&self, path: &Path, batch: &RecordBatch) -> Result<()> {
        let location = path.display().to_string();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| EtlError::write(location.as_str(), e))?;
        }

        let file = File::create(path).map_err(|e| EtlError::write(location.as_str(), e))?;
        let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(self.properties()))
            .map_err(|e| EtlError::write(location.as_str(), e))?;
        writer
            .write(batch)
            .map_err(|e| EtlError::write(location.as_str(), e))?;
        writer
            .close()
            .map_err(|e| EtlError::write(location.as_str(), e))?;

        debug!("Wrote {} rows to {}", batch.num_rows(), location);
        Ok(())
    }
}

impl TableSink for ParquetDirectorySink {
    fn write(&self, table: &Table, location: &str, options: &WriteOptions) -> Result<()> {
        let target = self.root.join(location);

        // Everything that can reject the table happens before the target is touched
        let files = if options.partition_by.is_empty() {
            let batch = record_batch(table.schema().fields(), table.rows())
                .map_err(|e| EtlError::write(location, e))?;
            vec![(PathBuf::from(PART_FILE), batch)]
        } else {
            let partitions = partition(table, &options.partition_by)?;
            partitions
                .groups
                .into_iter()
                .map(|(dir, rows)| {
                    record_batch(&partitions.data_fields, &rows)
                        .map(|batch| (dir.join(PART_FILE), batch))
                        .map_err(|e| EtlError::write(location, e))
                })
                .collect::<Result<Vec<_>>>()?
        };

        prepare_target(&target, options.mode)?;
        for (relative, batch) in &files {
            self.write_file(&target.join(relative), batch)?;
        }
        if !options.partition_by.is_empty() {
            debug!("Wrote {} partitions for {}", files.len(), location);
        }

        let marker = target.join(SUCCESS_MARKER);
        File::create(&marker).map_err(|e| EtlError::write(marker.display().to_string(), e))?;

        info!("Wrote table {} ({} rows) to {}", table.name(), table.len(), target.display());
        Ok(())
    }
}

fn prepare_target(target: &Path, mode: SaveMode) -> Result<()> {
    let location = target.display().to_string();
    if target.exists() {
        match mode {
            SaveMode::ErrorIfExists => {
                return Err(EtlError::write(location, "destination already exists"));
            }
            SaveMode::Overwrite => {
                let removed = if target.is_dir() {
                    fs::remove_dir_all(target)
                } else {
                    fs::remove_file(target)
                };
                removed.map_err(|e| EtlError::write(location.as_str(), e))?;
            }
        }
    }
    fs::create_dir_all(target).map_err(|e| EtlError::write(location, e))
}

struct Partitions {
    data_fields: Vec<Field>,
    /// Relative partition directory to the rows it holds, in directory order
    groups: BTreeMap<PathBuf, Vec<Row>>,
}

fn partition(table: &Table, columns: &[String]) -> Result<Partitions> {
    let key_indices = columns
        .iter()
        .map(|c| table.column_index(c))
        .collect::<Result<Vec<usize>>>()?;
    let data_indices: Vec<usize> = (0..table.schema().len())
        .filter(|i| !key_indices.contains(i))
        .collect();
    let data_fields = data_indices
        .iter()
        .map(|&i| table.schema().fields()[i].clone())
        .collect();

    let mut groups: BTreeMap<PathBuf, Vec<Row>> = BTreeMap::new();
    for row in table.rows() {
        let dir: PathBuf = key_indices
            .iter()
            .zip(columns)
            .map(|(&i, name)| format!("{}={}", name, partition_value(&row[i])))
            .collect();
        let data_row = data_indices.iter().map(|&i| row[i].clone()).collect();
        groups.entry(dir).or_default().push(data_row);
    }

    Ok(Partitions { data_fields, groups })
}

/// Directory-safe rendering of a partition value
pub fn partition_value(cell: &Cell) -> String {
    match cell.to_text() {
        Some(text) if !text.is_empty() => escape_path_name(&text),
        _ => DEFAULT_PARTITION_NAME.to_string(),
    }
}

fn escape_path_name(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        let needs_escape = c.is_ascii_control()
            || matches!(c, '"' | '#' | '%' | '\'' | '*' | '/' | ':' | '=' | '?' | '\\' | '{' | '[' | ']' | '^');
        if needs_escape {
            out.push_str(&format!("%{:02X}", c as u32));
        } else {
            out.push(c);
        }
    }
    out
}

fn arrow_type(data_type: ColumnType) -> DataType {
    match data_type {
        ColumnType::Boolean => DataType::Boolean,
        ColumnType::Int64 => DataType::Int64,
        ColumnType::Float64 => DataType::Float64,
        ColumnType::Utf8 => DataType::Utf8,
        ColumnType::Timestamp => DataType::Timestamp(TimeUnit::Millisecond, Some("UTC".into())),
    }
}

/// Convert rows to an Arrow batch; a cell that disagrees with its column type is an error
pub fn record_batch(fields: &[Field], rows: &[Row]) -> std::result::Result<RecordBatch, String> {
    let arrow_fields: Vec<ArrowField> = fields
        .iter()
        .map(|f| ArrowField::new(f.name.as_str(), arrow_type(f.data_type), f.nullable))
        .collect();
    let schema = Arc::new(ArrowSchema::new(arrow_fields));

    let columns = fields
        .iter()
        .enumerate()
        .map(|(idx, field)| column_array(field, rows.iter().map(|row| &row[idx])))
        .collect::<std::result::Result<Vec<ArrayRef>, String>>()?;

    RecordBatch::try_new(schema, columns).map_err(|e| e.to_string())
}

fn column_array<'a>(
    field: &Field,
    cells: impl Iterator<Item = &'a Cell>,
) -> std::result::Result<ArrayRef, String> {
    let mismatch = |cell: &Cell| {
        format!(
            "column '{}' of type {} holds {:?}",
            field.name,
            field.data_type.as_str(),
            cell
        )
    };

    let array: ArrayRef = match field.data_type {
        ColumnType::Boolean => {
            let values = cells
                .map(|cell| match cell {
                    Cell::Null => Ok(None),
                    Cell::Bool(b) => Ok(Some(*b)),
                    other => Err(mismatch(other)),
                })
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Arc::new(BooleanArray::from(values))
        }
        ColumnType::Int64 => {
            let values = cells
                .map(|cell| match cell {
                    Cell::Null => Ok(None),
                    Cell::Int(i) => Ok(Some(*i)),
                    other => Err(mismatch(other)),
                })
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Arc::new(Int64Array::from(values))
        }
        ColumnType::Float64 => {
            let values = cells
                .map(|cell| match cell {
                    Cell::Null => Ok(None),
                    Cell::Float(f) => Ok(Some(*f)),
                    other => Err(mismatch(other)),
                })
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Arc::new(Float64Array::from(values))
        }
        ColumnType::Utf8 => {
            let values = cells
                .map(|cell| match cell {
                    Cell::Null => Ok(None),
                    Cell::Str(s) => Ok(Some(s.as_str())),
                    other => Err(mismatch(other)),
                })
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Arc::new(StringArray::from(values))
        }
        ColumnType::Timestamp => {
            let values = cells
                .map(|cell| match cell {
                    Cell::Null => Ok(None),
                    Cell::Timestamp(ms) => Ok(Some(*ms)),
                    other => Err(mismatch(other)),
                })
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Arc::new(TimestampMillisecondArray::from(values).with_timezone("UTC"))
        }
    };
    Ok(array)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Schema;
    use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
    use tempfile::TempDir;

    fn songs() -> Table {
        Table::new(
            "songs",
            Schema::new(vec![
                Field::new("song_id", ColumnType::Utf8, false),
                Field::new("year", ColumnType::Int64, false),
                Field::new("artist_id", ColumnType::Utf8, true),
                Field::new("duration", ColumnType::Float64, false),
            ]),
            vec![
                vec![Cell::from("S1"), Cell::Int(2001), Cell::from("A1"), Cell::Float(218.9)],
                vec![Cell::from("S2"), Cell::Int(0), Cell::from("A/2"), Cell::Float(152.9)],
                vec![Cell::from("S3"), Cell::Int(2001), Cell::from("A1"), Cell::Float(99.0)],
                vec![Cell::from("S4"), Cell::Int(2001), Cell::Null, Cell::Float(1.0)],
            ],
        )
    }

    fn read_rows(path: &Path) -> usize {
        let file = File::open(path).unwrap();
        let reader = ParquetRecordBatchReaderBuilder::try_new(file).unwrap().build().unwrap();
        reader.map(|batch| batch.unwrap().num_rows()).sum()
    }

    #[test]
    fn test_unpartitioned_write() {
        let dir = TempDir::new().unwrap();
        let sink = ParquetDirectorySink::new(dir.path());
        sink.write(&songs(), "songs", &WriteOptions::overwrite()).unwrap();

        assert_eq!(read_rows(&dir.path().join("songs").join(PART_FILE)), 4);
        assert!(dir.path().join("songs").join(SUCCESS_MARKER).exists());
    }

    #[test]
    fn test_partitioned_write_layout() {
        let dir = TempDir::new().unwrap();
        let sink = ParquetDirectorySink::new(dir.path()).with_compression(Compression::Zstd);
        let options = WriteOptions::overwrite().partitioned_by(&["year", "artist_id"]);
        sink.write(&songs(), "songs", &options).unwrap();

        let base = dir.path().join("songs");
        assert_eq!(read_rows(&base.join("year=2001/artist_id=A1").join(PART_FILE)), 2);
        assert_eq!(read_rows(&base.join("year=0/artist_id=A%2F2").join(PART_FILE)), 1);
        assert_eq!(
            read_rows(&base.join(format!("year=2001/artist_id={}", DEFAULT_PARTITION_NAME)).join(PART_FILE)),
            1
        );

        // Partition columns are not repeated inside the files
        let file = File::open(base.join("year=2001/artist_id=A1").join(PART_FILE)).unwrap();
        let builder = ParquetRecordBatchReaderBuilder::try_new(file).unwrap();
        let names: Vec<String> = builder.schema().fields().iter().map(|f| f.name().clone()).collect();
        assert_eq!(names, vec!["song_id", "duration"]);
    }

    #[test]
    fn test_overwrite_replaces_previous_output() {
        let dir = TempDir::new().unwrap();
        let sink = ParquetDirectorySink::new(dir.path());
        let stale = dir.path().join("songs/year=1999/part-00000.parquet");
        fs::create_dir_all(stale.parent().unwrap()).unwrap();
        fs::write(&stale, b"stale").unwrap();

        sink.write(&songs(), "songs", &WriteOptions::overwrite()).unwrap();
        assert!(!stale.exists());
    }

    #[test]
    fn test_error_if_exists() {
        let dir = TempDir::new().unwrap();
        let sink = ParquetDirectorySink::new(dir.path());
        let options = WriteOptions::overwrite().with_mode(SaveMode::ErrorIfExists);
        sink.write(&songs(), "songs", &options).unwrap();
        let err = sink.write(&songs(), "songs", &options).unwrap_err();
        assert!(matches!(err, EtlError::Write { .. }));
    }

    #[test]
    fn test_unknown_partition_column_is_schema_error() {
        let dir = TempDir::new().unwrap();
        let sink = ParquetDirectorySink::new(dir.path());
        let options = WriteOptions::overwrite().partitioned_by(&["month"]);
        let err = sink.write(&songs(), "songs", &options).unwrap_err();
        assert!(matches!(err, EtlError::MissingColumn { .. }));
    }

    #[test]
    fn test_rejected_write_keeps_previous_output() {
        let dir = TempDir::new().unwrap();
        let sink = ParquetDirectorySink::new(dir.path());
        sink.write(&songs(), "songs", &WriteOptions::overwrite()).unwrap();
        let previous = dir.path().join("songs").join(PART_FILE);

        let options = WriteOptions::overwrite().partitioned_by(&["month"]);
        let err = sink.write(&songs(), "songs", &options).unwrap_err();
        assert!(matches!(err, EtlError::MissingColumn { .. }));
        assert_eq!(read_rows(&previous), 4);

        let mut mistyped = songs().rows().to_vec();
        mistyped[0][1] = Cell::from("2001");
        let mistyped = Table::new("songs", songs().schema().clone(), mistyped);
        let err = sink.write(&mistyped, "songs", &WriteOptions::overwrite()).unwrap_err();
        assert!(matches!(err, EtlError::Write { .. }));
        assert_eq!(read_rows(&previous), 4);
    }

    #[test]
    fn test_type_mismatch_is_reported() {
        let fields = vec![Field::new("year", ColumnType::Int64, false)];
        let err = record_batch(&fields, &[vec![Cell::from("2001")]]).unwrap_err();
        assert!(err.contains("'year'"));
    }

    #[test]
    fn test_partition_value_escaping() {
        assert_eq!(partition_value(&Cell::from("AC/DC")), "AC%2FDC");
        assert_eq!(partition_value(&Cell::from("")), DEFAULT_PARTITION_NAME);
        assert_eq!(partition_value(&Cell::Int(2018)), "2018");
    }

    #[test]
    fn test_credentials_are_held_but_not_printed() {
        let sink = ParquetDirectorySink::new("data/output").with_credentials(Credentials::new("AKIAEXAMPLE", "very-secret"));
        assert_eq!(sink.credentials().unwrap().access_key_id, "AKIAEXAMPLE");
        assert!(!format!("{:?}", sink).contains("very-secret"));
    }
}
