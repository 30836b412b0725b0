use std::collections::BTreeMap;

use super::model::{CellValue, RawTable};
use super::schema::LABEL_COLUMN;

// ---------------------------------------------------------------------------
// describe()
// ---------------------------------------------------------------------------

/// Summary of one numeric column, mirroring `DataFrame.describe()`.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnSummary {
    pub name: String,
    pub count: usize,
    pub mean: f64,
    /// Sample standard deviation (NaN for a single value).
    pub std: f64,
    pub min: f64,
    pub q25: f64,
    pub median: f64,
    pub q75: f64,
    pub max: f64,
}

/// Summaries for every numeric column, in table order.
pub fn describe(table: &RawTable) -> Vec<ColumnSummary> {
    table
        .columns()
        .iter()
        .filter(|c| c.is_numeric())
        .filter_map(|c| {
            let mut values: Vec<f64> = c.values.iter().filter_map(CellValue::as_f64).collect();
            if values.is_empty() {
                return None;
            }
            values.sort_by(f64::total_cmp);
            let count = values.len();
            let mean = values.iter().sum::<f64>() / count as f64;
            let std = if count > 1 {
                let ss: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
                (ss / (count - 1) as f64).sqrt()
            } else {
                f64::NAN
            };
            Some(ColumnSummary {
                name: c.name.clone(),
                count,
                mean,
                std,
                min: values[0],
                q25: quantile(&values, 0.25),
                median: quantile(&values, 0.5),
                q75: quantile(&values, 0.75),
                max: values[count - 1],
            })
        })
        .collect()
}

/// Linear-interpolated quantile of sorted, non-empty `values`.
fn quantile(values: &[f64], q: f64) -> f64 {
    let pos = q * (values.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    values[lo] + (values[hi] - values[lo]) * (pos - lo as f64)
}

// ---------------------------------------------------------------------------
// Counts
// ---------------------------------------------------------------------------

/// Occurrences of each non-null value of `column`. `None` if the column is absent.
pub fn value_counts(table: &RawTable, column: &str) -> Option<BTreeMap<CellValue, usize>> {
    let col = table.column(column)?;
    let mut counts = BTreeMap::new();
    for v in col.values.iter().filter(|v| !v.is_null()) {
        *counts.entry(v.clone()).or_insert(0) += 1;
    }
    Some(counts)
}

/// Columns with at least one null, with their null counts.
pub fn missing_values(table: &RawTable) -> Vec<(String, usize)> {
    table
        .columns()
        .iter()
        .map(|c| (c.name.clone(), c.null_count()))
        .filter(|(_, n)| *n > 0)
        .collect()
}

// ---------------------------------------------------------------------------
// Pixel statistics
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct Histogram {
    /// `bins + 1` ascending bin edges.
    pub edges: Vec<f64>,
    pub counts: Vec<usize>,
}

impl Histogram {
    /// Equal-width histogram; the last bin is closed on the right.
    pub fn new(values: &[f64], bins: usize) -> Self {
        let bins = bins.max(1);
        let (min, max) = values
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
        if values.is_empty() {
            return Self {
                edges: Vec::new(),
                counts: Vec::new(),
            };
        }
        let (min, max) = if (max - min).abs() < f64::EPSILON {
            (min - 0.5, max + 0.5)
        } else {
            (min, max)
        };
        let width = (max - min) / bins as f64;
        let edges = (0..=bins).map(|i| min + width * i as f64).collect();
        let mut counts = vec![0; bins];
        for &v in values {
            let idx = (((v - min) / width) as usize).min(bins - 1);
            counts[idx] += 1;
        }
        Self { edges, counts }
    }

    pub fn total(&self) -> usize {
        self.counts.iter().sum()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PixelSummary {
    /// Mean of the per-column means (0–255 scale).
    pub mean: f64,
    pub histogram: Histogram,
}

/// Statistics over every non-label column, for image-pixel tables.
pub fn pixel_summary(table: &RawTable, bins: usize) -> Option<PixelSummary> {
    let pixel_cols: Vec<_> = table
        .columns()
        .iter()
        .filter(|c| c.name != LABEL_COLUMN)
        .collect();
    if pixel_cols.is_empty() || table.is_empty() {
        return None;
    }

    let mut all = Vec::with_capacity(pixel_cols.len() * table.n_rows());
    let mut mean_sum = 0.0;
    let mut mean_count = 0usize;
    for col in &pixel_cols {
        let values: Vec<f64> = col.values.iter().filter_map(CellValue::as_f64).collect();
        if !values.is_empty() {
            mean_sum += values.iter().sum::<f64>() / values.len() as f64;
            mean_count += 1;
        }
        all.extend(values);
    }
    if mean_count == 0 {
        return None;
    }

    Some(PixelSummary {
        mean: mean_sum / mean_count as f64,
        histogram: Histogram::new(&all, bins),
    })
}

// ---------------------------------------------------------------------------
// Correlation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct CorrelationMatrix {
    pub columns: Vec<String>,
    /// Row-major `columns.len()²` Pearson coefficients.
    pub values: Vec<f64>,
}

impl CorrelationMatrix {
    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.values[i * self.columns.len() + j]
    }
}

/// Pearson correlation between numeric columns, skipping rows where either
/// value is missing. Undefined coefficients are NaN.
pub fn correlation(table: &RawTable) -> CorrelationMatrix {
    let numeric: Vec<_> = table.columns().iter().filter(|c| c.is_numeric()).collect();
    let n = numeric.len();
    let mut values = vec![f64::NAN; n * n];

    for i in 0..n {
        for j in i..n {
            let pairs: Vec<(f64, f64)> = numeric[i]
                .values
                .iter()
                .zip(&numeric[j].values)
                .filter_map(|(a, b)| Some((a.as_f64()?, b.as_f64()?)))
                .collect();
            let r = pearson(&pairs);
            values[i * n + j] = r;
            values[j * n + i] = r;
        }
    }

    CorrelationMatrix {
        columns: numeric.iter().map(|c| c.name.clone()).collect(),
        values,
    }
}

fn pearson(pairs: &[(f64, f64)]) -> f64 {
    if pairs.len() < 2 {
        return f64::NAN;
    }
    let n = pairs.len() as f64;
    let mx = pairs.iter().map(|p| p.0).sum::<f64>() / n;
    let my = pairs.iter().map(|p| p.1).sum::<f64>() / n;
    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for &(x, y) in pairs {
        sxy += (x - mx) * (y - my);
        sxx += (x - mx).powi(2);
        syy += (y - my).powi(2);
    }
    if sxx == 0.0 || syy == 0.0 {
        return f64::NAN;
    }
    sxy / (sxx.sqrt() * syy.sqrt())
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;
    use crate::data::model::Column;

    fn numbers(name: &str, values: &[f64]) -> Column {
        Column::new(name, values.iter().map(|&v| CellValue::Float(v)).collect())
    }

    #[test]
    fn describe_matches_pandas() {
        let table = RawTable::new(vec![
            numbers("age", &[1.0, 2.0, 3.0, 4.0]),
            Column::new("sex", vec!["m".into(), "f".into(), "m".into(), "f".into()]),
        ])
        .unwrap();
        let summary = describe(&table);
        assert_eq!(summary.len(), 1);
        let s = &summary[0];
        assert_eq!(s.count, 4);
        assert_relative_eq!(s.mean, 2.5);
        assert_relative_eq!(s.std, 1.2909944487358056, epsilon = 1e-12);
        assert_relative_eq!(s.q25, 1.75);
        assert_relative_eq!(s.median, 2.5);
        assert_relative_eq!(s.q75, 3.25);
        assert_relative_eq!(s.max, 4.0);
    }

    #[test]
    fn counts_labels_and_missing_values() {
        let table = RawTable::new(vec![
            Column::new("label", vec![0i64.into(), 1i64.into(), 1i64.into()]),
            Column::new("age", vec![CellValue::Null, 3.0.into(), CellValue::Null]),
        ])
        .unwrap();
        let counts = value_counts(&table, "label").unwrap();
        assert_eq!(counts[&CellValue::Integer(1)], 2);
        assert!(value_counts(&table, "dx").is_none());
        assert_eq!(missing_values(&table), vec![("age".to_string(), 2)]);
    }

    #[test]
    fn pixel_summary_ignores_label() {
        let table = RawTable::new(vec![
            Column::new("label", vec![6i64.into(), 6i64.into()]),
            numbers("pixel0000", &[0.0, 255.0]),
            numbers("pixel0001", &[100.0, 100.0]),
        ])
        .unwrap();
        let s = pixel_summary(&table, 5).unwrap();
        assert_relative_eq!(s.mean, (127.5 + 100.0) / 2.0);
        assert_eq!(s.histogram.total(), 4);
        assert_eq!(s.histogram.counts.len(), 5);
        assert_eq!(s.histogram.counts[4], 1);
    }

    #[test]
    fn histogram_handles_constant_values() {
        let h = Histogram::new(&[7.0, 7.0, 7.0], 4);
        assert_eq!(h.total(), 3);
        assert!(Histogram::new(&[], 4).counts.is_empty());
    }

    #[test]
    fn correlation_is_symmetric_with_unit_diagonal() {
        let table = RawTable::new(vec![
            numbers("a", &[1.0, 2.0, 3.0, 4.0]),
            numbers("b", &[2.0, 4.0, 6.0, 8.0]),
            numbers("c", &[4.0, 3.0, 2.0, 1.0]),
            numbers("k", &[5.0, 5.0, 5.0, 5.0]),
        ])
        .unwrap();
        let m = correlation(&table);
        assert_eq!(m.columns.len(), 4);
        assert_relative_eq!(m.get(0, 0), 1.0, epsilon = 1e-12);
        assert_relative_eq!(m.get(0, 1), 1.0, epsilon = 1e-12);
        assert_relative_eq!(m.get(2, 0), -1.0, epsilon = 1e-12);
        assert_eq!(m.get(0, 2), m.get(2, 0));
        assert!(m.get(3, 0).is_nan());
    }
}
