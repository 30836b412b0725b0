use std::fmt;

use crate::error::{PipelineError, Result};

// ---------------------------------------------------------------------------
// CellValue – a single cell in a column
// ---------------------------------------------------------------------------

/// A dynamically-typed cell mirroring the dtypes a CSV reader infers.
/// `Ord` so values can key `BTreeMap`/`BTreeSet` (value counts, class sets).
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    String(String),
    Integer(i64),
    Float(f64),
    Null,
}

// -- Manual Eq/Ord so we can put CellValue in BTreeSet --

impl Eq for CellValue {}

impl PartialOrd for CellValue {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for CellValue {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        use CellValue::*;
        fn discriminant(v: &CellValue) -> u8 {
            match v {
                Null => 0,
                Integer(_) => 1,
                Float(_) => 2,
                String(_) => 3,
            }
        }
        let da = discriminant(self);
        let db = discriminant(other);
        if da != db {
            return da.cmp(&db);
        }
        match (self, other) {
            (Integer(a), Integer(b)) => a.cmp(b),
            (Float(a), Float(b)) => a.total_cmp(b),
            (String(a), String(b)) => a.cmp(b),
            _ => std::cmp::Ordering::Equal,
        }
    }
}

impl std::hash::Hash for CellValue {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            CellValue::String(s) => s.hash(state),
            CellValue::Integer(i) => i.hash(state),
            CellValue::Float(f) => f.to_bits().hash(state),
            CellValue::Null => {}
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::String(s) => write!(f, "{s}"),
            CellValue::Integer(i) => write!(f, "{i}"),
            CellValue::Float(v) => write!(f, "{v:.4}"),
            CellValue::Null => write!(f, "<null>"),
        }
    }
}

impl CellValue {
    /// Guess the type of a raw text cell: empty → Null, then integer, float, string.
    pub fn parse(s: &str) -> Self {
        let s = s.trim();
        if s.is_empty() {
            return CellValue::Null;
        }
        if let Ok(i) = s.parse::<i64>() {
            return CellValue::Integer(i);
        }
        if let Ok(f) = s.parse::<f64>() {
            return CellValue::Float(f);
        }
        CellValue::String(s.to_string())
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CellValue::Float(v) => Some(*v),
            CellValue::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Integral numeric value (floats only when they carry no fraction).
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            CellValue::Integer(i) => Some(*i),
            CellValue::Float(v) if v.fract() == 0.0 && v.is_finite() => Some(*v as i64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            CellValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::String(s.to_string())
    }
}

impl From<i64> for CellValue {
    fn from(i: i64) -> Self {
        CellValue::Integer(i)
    }
}

impl From<f64> for CellValue {
    fn from(v: f64) -> Self {
        CellValue::Float(v)
    }
}

// ---------------------------------------------------------------------------
// Column / RawTable
// ---------------------------------------------------------------------------

/// A named, ordered sequence of cells.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub values: Vec<CellValue>,
}

impl Column {
    pub fn new(name: impl Into<String>, values: Vec<CellValue>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }

    /// True when every non-null cell is numeric and at least one is present.
    pub fn is_numeric(&self) -> bool {
        let mut any = false;
        for v in &self.values {
            match v {
                CellValue::Integer(_) | CellValue::Float(_) => any = true,
                CellValue::Null => {}
                CellValue::String(_) => return false,
            }
        }
        any
    }

    pub fn null_count(&self) -> usize {
        self.values.iter().filter(|v| v.is_null()).count()
    }
}

/// Ordered columns sharing one row count. Immutable once built.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawTable {
    columns: Vec<Column>,
    n_rows: usize,
}

impl RawTable {
    /// Build a table, checking that every column has the same length.
    pub fn new(columns: Vec<Column>) -> Result<Self> {
        let n_rows = columns.first().map_or(0, |c| c.values.len());
        if let Some(bad) = columns.iter().find(|c| c.values.len() != n_rows) {
            return Err(PipelineError::Table(format!(
                "column '{}' has {} rows, expected {n_rows}",
                bad.name,
                bad.values.len()
            )));
        }
        Ok(Self { columns, n_rows })
    }

    /// Build a table from a header and row-major records.
    pub fn from_rows(header: Vec<String>, rows: Vec<Vec<CellValue>>) -> Result<Self> {
        let mut columns: Vec<Column> = header
            .into_iter()
            .map(|name| Column::new(name, Vec::with_capacity(rows.len())))
            .collect();
        for (i, row) in rows.into_iter().enumerate() {
            if row.len() != columns.len() {
                return Err(PipelineError::Table(format!(
                    "row {i} has {} fields, expected {}",
                    row.len(),
                    columns.len()
                )));
            }
            for (col, value) in columns.iter_mut().zip(row) {
                col.values.push(value);
            }
        }
        Self::new(columns)
    }

    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    pub fn n_cols(&self) -> usize {
        self.columns.len()
    }

    /// (rows, columns), like a DataFrame shape.
    pub fn shape(&self) -> (usize, usize) {
        (self.n_rows, self.columns.len())
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    /// First `n` rows as a new table.
    pub fn head(&self, n: usize) -> RawTable {
        let n = n.min(self.n_rows);
        RawTable {
            columns: self
                .columns
                .iter()
                .map(|c| Column::new(c.name.clone(), c.values[..n].to_vec()))
                .collect(),
            n_rows: n,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.n_rows == 0
    }

    /// New table with every column transformed by `f`, which must keep lengths.
    pub(crate) fn map_columns(&self, f: impl FnMut(&Column) -> Column) -> RawTable {
        let columns: Vec<Column> = self.columns.iter().map(f).collect();
        debug_assert!(columns.iter().all(|c| c.values.len() == self.n_rows));
        RawTable {
            columns,
            n_rows: self.n_rows,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_cell_types() {
        assert_eq!(CellValue::parse(""), CellValue::Null);
        assert_eq!(CellValue::parse("42"), CellValue::Integer(42));
        assert_eq!(CellValue::parse("4.5"), CellValue::Float(4.5));
        assert_eq!(CellValue::parse("nv"), CellValue::String("nv".into()));
    }

    #[test]
    fn rejects_ragged_columns() {
        let err = RawTable::new(vec![
            Column::new("a", vec![1i64.into(), 2i64.into()]),
            Column::new("b", vec![1i64.into()]),
        ])
        .unwrap_err();
        assert!(matches!(err, PipelineError::Table(_)));
    }

    #[test]
    fn builds_from_rows_and_slices_head() {
        let table = RawTable::from_rows(
            vec!["label".into(), "pixel0".into()],
            vec![
                vec![0i64.into(), 10i64.into()],
                vec![1i64.into(), 20i64.into()],
                vec![1i64.into(), 30i64.into()],
            ],
        )
        .unwrap();
        assert_eq!(table.shape(), (3, 2));
        let head = table.head(2);
        assert_eq!(head.shape(), (2, 2));
        assert_eq!(head.column("pixel0").unwrap().values[1], CellValue::Integer(20));
        assert_eq!(table.head(10), table);
    }

    #[test]
    fn numeric_column_detection_ignores_nulls() {
        let col = Column::new("age", vec![CellValue::Null, 45i64.into(), 50.5.into()]);
        assert!(col.is_numeric());
        assert_eq!(col.null_count(), 1);
        assert!(!Column::new("sex", vec!["male".into()]).is_numeric());
        assert!(!Column::new("empty", vec![CellValue::Null]).is_numeric());
    }

    #[test]
    fn integral_floats_convert_to_labels() {
        assert_eq!(CellValue::Float(3.0).as_i64(), Some(3));
        assert_eq!(CellValue::Float(3.5).as_i64(), None);
    }
}
