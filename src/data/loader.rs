use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use arrow::array::{Array, ArrayRef, AsArray};
use arrow::compute::cast;
use arrow::datatypes::{DataType, Float64Type, Int64Type};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde_json::Value as JsonValue;

use super::model::{CellValue, Column, RawTable};
use crate::error::PipelineError;
use crate::store::BlobStore;

// ---------------------------------------------------------------------------
// DatasetLoader – cached fetch + parse
// ---------------------------------------------------------------------------

/// Fetches objects from one bucket and keeps every parsed table until it is
/// invalidated. A cache miss costs exactly one `get_object` round trip.
pub struct DatasetLoader<S> {
    store: S,
    bucket: String,
    cache: HashMap<String, Arc<RawTable>>,
}

impl<S: BlobStore> DatasetLoader<S> {
    pub fn new(store: S, bucket: impl Into<String>) -> Self {
        Self {
            store,
            bucket: bucket.into(),
            cache: HashMap::new(),
        }
    }

    /// Load `object`, serving it from the cache when possible.
    ///
    /// A missing bucket or unreachable store is [`PipelineError::StoreUnavailable`];
    /// any other fetch or parse failure is [`PipelineError::Load`]. Failures are
    /// never cached.
    pub fn load(&mut self, object: &str) -> crate::error::Result<Arc<RawTable>> {
        if let Some(table) = self.cache.get(object) {
            log::debug!("Cache hit for '{object}'");
            return Ok(Arc::clone(table));
        }

        log::info!("Fetching '{}/{object}'", self.bucket);
        let bytes = self
            .store
            .get_object(&self.bucket, object)
            .map_err(|e| PipelineError::from_fetch(object, e))?;

        let table = parse_object(object, &bytes).map_err(|e| PipelineError::Load {
            object: object.to_string(),
            cause: format!("{e:#}"),
        })?;
        log::info!(
            "Loaded '{object}' ({} bytes): {} rows × {} columns",
            bytes.len(),
            table.n_rows(),
            table.n_cols()
        );

        let table = Arc::new(table);
        self.cache.insert(object.to_string(), Arc::clone(&table));
        Ok(table)
    }

    pub fn is_cached(&self, object: &str) -> bool {
        self.cache.contains_key(object)
    }

    /// Drop one cached table. Returns whether it was cached.
    pub fn invalidate(&mut self, object: &str) -> bool {
        self.cache.remove(object).is_some()
    }

    pub fn clear(&mut self) {
        self.cache.clear();
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }
}

// ---------------------------------------------------------------------------
// Public parse entry-point
// ---------------------------------------------------------------------------

/// Parse raw object bytes into a table. Dispatch by extension.
///
/// Supported formats:
/// * `.csv`     – header row required (the HMNIST and HAM10000 releases)
/// * `.json`    – `[{ "col": value, ... }, ...]`
/// * `.parquet` – flat columns of strings / integers / floats / booleans
pub fn parse_object(name: &str, bytes: &[u8]) -> Result<RawTable> {
    let ext = name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "csv" => parse_csv(bytes),
        "json" => parse_json(bytes),
        "parquet" | "pq" => parse_parquet(bytes),
        "" => bail!("Object '{name}' has no extension"),
        other => bail!("Unsupported file extension: .{other}"),
    }
}

// ---------------------------------------------------------------------------
// CSV
// ---------------------------------------------------------------------------

/// CSV layout: header row with column names, one record per row.
/// Cell types are guessed per value (see [`CellValue::parse`]).
pub fn parse_csv(bytes: &[u8]) -> Result<RawTable> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(bytes);

    let header: Vec<String> = reader
        .headers()
        .context("reading CSV headers")?
        .iter()
        .map(|h| h.to_string())
        .collect();
    if header.is_empty() || header.iter().all(|h| h.is_empty()) {
        bail!("CSV has no header row");
    }

    let mut rows = Vec::new();
    for (row_no, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("CSV row {row_no}"))?;
        rows.push(record.iter().map(CellValue::parse).collect());
    }

    Ok(RawTable::from_rows(header, rows)?)
}

// ---------------------------------------------------------------------------
// JSON
// ---------------------------------------------------------------------------

/// Records-oriented JSON (`df.to_json(orient='records')`). Columns are the
/// union of all record keys; keys missing from a record become nulls.
pub fn parse_json(bytes: &[u8]) -> Result<RawTable> {
    let root: JsonValue = serde_json::from_slice(bytes).context("parsing JSON")?;
    let records = root.as_array().context("Expected top-level JSON array")?;

    let mut header: Vec<String> = Vec::new();
    for (i, rec) in records.iter().enumerate() {
        let obj = rec
            .as_object()
            .with_context(|| format!("Row {i} is not a JSON object"))?;
        for key in obj.keys() {
            if !header.contains(key) {
                header.push(key.clone());
            }
        }
    }

    let rows = records
        .iter()
        .filter_map(|rec| rec.as_object())
        .map(|obj| {
            header
                .iter()
                .map(|key| obj.get(key).map_or(CellValue::Null, json_to_cell))
                .collect()
        })
        .collect();

    Ok(RawTable::from_rows(header, rows)?)
}

fn json_to_cell(val: &JsonValue) -> CellValue {
    match val {
        JsonValue::String(s) => CellValue::String(s.clone()),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                CellValue::Integer(i)
            } else if let Some(f) = n.as_f64() {
                CellValue::Float(f)
            } else {
                CellValue::String(n.to_string())
            }
        }
        JsonValue::Bool(b) => CellValue::Integer(i64::from(*b)),
        JsonValue::Null => CellValue::Null,
        other => CellValue::String(other.to_string()),
    }
}

// ---------------------------------------------------------------------------
// Parquet
// ---------------------------------------------------------------------------

/// Parquet object written by Pandas (`df.to_parquet()`) or Polars.
pub fn parse_parquet(bytes: &[u8]) -> Result<RawTable> {
    let data = bytes::Bytes::copy_from_slice(bytes);
    let builder = ParquetRecordBatchReaderBuilder::try_new(data)
        .context("reading parquet metadata")?;
    let header: Vec<String> = builder
        .schema()
        .fields()
        .iter()
        .map(|f| f.name().clone())
        .collect();
    let reader = builder.build().context("building parquet reader")?;

    let mut columns: Vec<Column> = header
        .iter()
        .map(|name| Column::new(name.clone(), Vec::new()))
        .collect();

    for batch_result in reader {
        let batch = batch_result.context("reading parquet record batch")?;
        for (col_idx, column) in columns.iter_mut().enumerate() {
            let values = arrow_to_cells(batch.column(col_idx))
                .with_context(|| format!("column '{}'", column.name))?;
            column.values.extend(values);
        }
    }

    Ok(RawTable::new(columns)?)
}

/// Convert one Arrow column to cells by casting to Int64 / Float64 / Utf8.
fn arrow_to_cells(col: &ArrayRef) -> Result<Vec<CellValue>> {
    let n = col.len();
    let cells = match col.data_type() {
        DataType::Int8
        | DataType::Int16
        | DataType::Int32
        | DataType::Int64
        | DataType::UInt8
        | DataType::UInt16
        | DataType::UInt32
        | DataType::Boolean => {
            let cast_col = cast(col, &DataType::Int64).context("casting to Int64")?;
            let arr = cast_col.as_primitive::<Int64Type>();
            (0..n)
                .map(|i| {
                    if arr.is_null(i) {
                        CellValue::Null
                    } else {
                        CellValue::Integer(arr.value(i))
                    }
                })
                .collect()
        }
        DataType::UInt64 | DataType::Float16 | DataType::Float32 | DataType::Float64 => {
            let cast_col = cast(col, &DataType::Float64).context("casting to Float64")?;
            let arr = cast_col.as_primitive::<Float64Type>();
            (0..n)
                .map(|i| {
                    if arr.is_null(i) {
                        CellValue::Null
                    } else {
                        CellValue::Float(arr.value(i))
                    }
                })
                .collect()
        }
        other => {
            let cast_col = cast(col, &DataType::Utf8)
                .with_context(|| format!("unsupported column type {other:?}"))?;
            let arr = cast_col.as_string::<i32>();
            (0..n)
                .map(|i| {
                    if arr.is_null(i) {
                        CellValue::Null
                    } else {
                        CellValue::String(arr.value(i).to_string())
                    }
                })
                .collect()
        }
    };
    Ok(cells)
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::sync::Arc as StdArc;

    use arrow::array::{Float64Array, Int64Array, StringArray};
    use arrow::datatypes::{Field, Schema};
    use arrow::record_batch::RecordBatch;
    use parquet::arrow::ArrowWriter;

    use super::*;
    use crate::store::{MemoryStore, StoreError};

    /// Counts `get_object` calls on an inner store.
    struct CountingStore {
        inner: MemoryStore,
        gets: Cell<usize>,
    }

    impl BlobStore for CountingStore {
        fn list_buckets(&self) -> Result<Vec<String>, StoreError> {
            self.inner.list_buckets()
        }
        fn bucket_exists(&self, bucket: &str) -> Result<bool, StoreError> {
            self.inner.bucket_exists(bucket)
        }
        fn make_bucket(&self, bucket: &str) -> Result<(), StoreError> {
            self.inner.make_bucket(bucket)
        }
        fn get_object(&self, bucket: &str, object: &str) -> Result<Vec<u8>, StoreError> {
            self.gets.set(self.gets.get() + 1);
            self.inner.get_object(bucket, object)
        }
        fn put_object(&self, bucket: &str, object: &str, data: &[u8]) -> Result<(), StoreError> {
            self.inner.put_object(bucket, object, data)
        }
    }

    const PIXELS: &str = "label,pixel0000,pixel0001\n2,0,255\n4,128,64\n";

    fn counting(store: MemoryStore) -> CountingStore {
        CountingStore {
            inner: store,
            gets: Cell::new(0),
        }
    }

    #[test]
    fn repeated_load_hits_cache() {
        let store = counting(MemoryStore::new().with_object("datasets", "p.csv", PIXELS));
        let mut loader = DatasetLoader::new(store, "datasets");

        let first = loader.load("p.csv").unwrap();
        let second = loader.load("p.csv").unwrap();

        assert_eq!(*first, *second);
        assert_eq!(loader.store().gets.get(), 1);
        assert!(loader.is_cached("p.csv"));
    }

    #[test]
    fn invalidation_forces_refetch() {
        let store = counting(MemoryStore::new().with_object("datasets", "p.csv", PIXELS));
        let mut loader = DatasetLoader::new(store, "datasets");

        loader.load("p.csv").unwrap();
        assert!(loader.invalidate("p.csv"));
        assert!(!loader.invalidate("p.csv"));
        loader.load("p.csv").unwrap();
        assert_eq!(loader.store().gets.get(), 2);
    }

    #[test]
    fn missing_bucket_is_store_unavailable() {
        let mut loader = DatasetLoader::new(MemoryStore::new(), "datasets");
        let err = loader.load("p.csv").unwrap_err();
        assert!(matches!(err, PipelineError::StoreUnavailable(_)));
        assert!(err.is_recoverable());
    }

    #[test]
    fn failures_are_not_cached() {
        let store = counting(MemoryStore::new().with_object("datasets", "bad.csv", "a,b\n1\n"));
        let mut loader = DatasetLoader::new(store, "datasets");

        let err = loader.load("bad.csv").unwrap_err();
        assert!(matches!(err, PipelineError::Load { .. }));
        assert!(!loader.is_cached("bad.csv"));
        let _ = loader.load("bad.csv");
        assert_eq!(loader.store().gets.get(), 2);
    }

    #[test]
    fn missing_object_is_load_error() {
        let store = MemoryStore::new();
        store.make_bucket("datasets").unwrap();
        let mut loader = DatasetLoader::new(store, "datasets");
        assert!(matches!(
            loader.load("nope.csv").unwrap_err(),
            PipelineError::Load { .. }
        ));
    }

    #[test]
    fn parses_csv_with_spaced_header() {
        let table = parse_csv(b"label, pixel0, pixel1\n1, 3, 4\n").unwrap();
        let names: Vec<&str> = table.column_names().collect();
        assert_eq!(names, ["label", "pixel0", "pixel1"]);
        assert_eq!(table.column("pixel1").unwrap().values[0], CellValue::Integer(4));
    }

    #[test]
    fn parses_metadata_csv_with_missing_age() {
        let csv = "lesion_id,image_id,dx,dx_type,age,sex,localization\n\
                   HAM_0000118,ISIC_0027419,bkl,histo,80.0,male,scalp\n\
                   HAM_0000119,ISIC_0027420,nv,follow_up,,female,back\n";
        let table = parse_csv(csv.as_bytes()).unwrap();
        assert_eq!(table.shape(), (2, 7));
        let age = table.column("age").unwrap();
        assert_eq!(age.values[0], CellValue::Float(80.0));
        assert!(age.values[1].is_null());
    }

    #[test]
    fn rejects_unknown_extension() {
        assert!(parse_object("model.h5", b"").is_err());
        assert!(parse_object("noext", b"").is_err());
    }

    #[test]
    fn parses_json_records() {
        let json = br#"[{"dx":"nv","age":45},{"dx":"mel","sex":"male"}]"#;
        let table = parse_object("m.json", json).unwrap();
        assert_eq!(table.n_rows(), 2);
        assert!(table.column("sex").unwrap().values[0].is_null());
        assert_eq!(table.column("age").unwrap().values[0], CellValue::Integer(45));
    }

    #[test]
    fn parses_parquet_object() {
        let schema = StdArc::new(Schema::new(vec![
            Field::new("dx", DataType::Utf8, true),
            Field::new("age", DataType::Float64, true),
            Field::new("label", DataType::Int64, false),
        ]));
        let batch = RecordBatch::try_new(
            schema.clone(),
            vec![
                StdArc::new(StringArray::from(vec![Some("nv"), None])),
                StdArc::new(Float64Array::from(vec![Some(45.0), None])),
                StdArc::new(Int64Array::from(vec![3, 5])),
            ],
        )
        .unwrap();
        let mut buf = Vec::new();
        let mut writer = ArrowWriter::try_new(&mut buf, schema, None).unwrap();
        writer.write(&batch).unwrap();
        writer.close().unwrap();

        let table = parse_object("m.parquet", &buf).unwrap();
        assert_eq!(table.shape(), (2, 3));
        assert_eq!(table.column("dx").unwrap().values[0], CellValue::String("nv".into()));
        assert!(table.column("dx").unwrap().values[1].is_null());
        assert_eq!(table.column("label").unwrap().values[1], CellValue::Integer(5));
    }
}
