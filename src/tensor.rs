use std::collections::BTreeSet;
use std::fmt;

use ndarray::{Array2, Array4};
use serde::{Deserialize, Serialize};

use crate::data::model::RawTable;
use crate::data::schema::LABEL_COLUMN;
use crate::error::{PipelineError, Result};

/// Largest raw pixel intensity; cells are scaled by it into `[0, 1]`.
const MAX_INTENSITY: f64 = 255.0;

/// Spatial geometry of one image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageShape {
    pub height: usize,
    pub width: usize,
    pub channels: usize,
}

impl ImageShape {
    pub const fn new(height: usize, width: usize, channels: usize) -> Self {
        Self {
            height,
            width,
            channels,
        }
    }

    pub fn pixels(&self) -> usize {
        self.height * self.width * self.channels
    }

    /// Geometry for a flattened pixel count.
    ///
    /// The four HMNIST sizes map to their known shapes; anything else must be a
    /// perfect square and is read as single-channel.
    pub fn infer(columns: usize) -> Result<Self> {
        let shape = match columns {
            64 => Self::new(8, 8, 1),
            784 => Self::new(28, 28, 1),
            192 => Self::new(8, 8, 3),
            2352 => Self::new(28, 28, 3),
            0 => return Err(PipelineError::Shape { columns }),
            n => {
                let side = isqrt(n);
                if side * side != n {
                    return Err(PipelineError::Shape { columns });
                }
                Self::new(side, side, 1)
            }
        };
        Ok(shape)
    }
}

impl fmt::Display for ImageShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}×{}×{}", self.height, self.width, self.channels)
    }
}

fn isqrt(n: usize) -> usize {
    let mut side = (n as f64).sqrt() as usize;
    while side * side > n {
        side -= 1;
    }
    while (side + 1) * (side + 1) <= n {
        side += 1;
    }
    side
}

/// Order of channel values within a flattened row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelLayout {
    /// `(row, col, channel)` with channel fastest: `r g b r g b …`.
    #[default]
    Interleaved,
    /// One full plane per channel: `r r … g g … b b …`.
    Planar,
}

/// `(N, H, W, C)` pixel values scaled to `[0, 1]`.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageTensor {
    pub data: Array4<f32>,
}

impl ImageTensor {
    pub fn shape(&self) -> ImageShape {
        let (_, h, w, c) = self.data.dim();
        ImageShape::new(h, w, c)
    }

    pub fn len(&self) -> usize {
        self.data.dim().0
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Integer-encoded labels. `indices[i]` points into `classes`, the sorted
/// distinct label values of the source table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelVector {
    pub indices: Vec<usize>,
    pub classes: Vec<i64>,
}

impl LabelVector {
    /// Encode raw label values by their rank among the distinct values.
    pub fn encode(values: &[i64]) -> Self {
        let classes: Vec<i64> = values
            .iter()
            .copied()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let indices = values
            .iter()
            .map(|v| classes.binary_search(v).unwrap_or_default())
            .collect();
        Self { indices, classes }
    }

    pub fn num_classes(&self) -> usize {
        self.classes.len()
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// `(N, numClasses)` one-hot matrix.
    pub fn one_hot(&self) -> Array2<f32> {
        let mut out = Array2::zeros((self.indices.len(), self.classes.len()));
        for (row, &class) in self.indices.iter().enumerate() {
            out[[row, class]] = 1.0;
        }
        out
    }

    /// Original label value of an encoded index.
    pub fn decode(&self, index: usize) -> Option<i64> {
        self.classes.get(index).copied()
    }
}

/// Output of [`prepare`]: model-ready images, their labels and the class count.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedImages {
    pub images: ImageTensor,
    pub labels: LabelVector,
    pub num_classes: usize,
}

/// Convert an image-pixel table into a normalised tensor with interleaved channels.
pub fn prepare(table: &RawTable) -> Result<PreparedImages> {
    prepare_with_layout(table, ChannelLayout::Interleaved)
}

/// Convert an image-pixel table into a normalised tensor.
///
/// `label` becomes the label vector; every other column, in table order, is a
/// pixel intensity on the 0–255 scale. Cells outside that range, NaN included,
/// are `InvalidValue`.
pub fn prepare_with_layout(table: &RawTable, layout: ChannelLayout) -> Result<PreparedImages> {
    let label_col = table
        .column(LABEL_COLUMN)
        .ok_or_else(|| PipelineError::MissingColumn(LABEL_COLUMN.to_string()))?;
    let pixel_cols: Vec<_> = table
        .columns()
        .iter()
        .filter(|c| c.name != LABEL_COLUMN)
        .collect();
    let shape = ImageShape::infer(pixel_cols.len())?;

    let raw_labels = label_col
        .values
        .iter()
        .enumerate()
        .map(|(row, v)| {
            v.as_i64().ok_or_else(|| PipelineError::InvalidValue {
                row,
                column: LABEL_COLUMN.to_string(),
                value: v.to_string(),
            })
        })
        .collect::<Result<Vec<i64>>>()?;
    let labels = LabelVector::encode(&raw_labels);

    let n = table.n_rows();
    let per_image = shape.pixels();
    let mut data = vec![0f32; n * per_image];
    for (src, col) in pixel_cols.iter().enumerate() {
        let dst = destination(src, shape, layout);
        for (row, value) in col.values.iter().enumerate() {
            let v = value
                .as_f64()
                .filter(|v| (0.0..=MAX_INTENSITY).contains(v))
                .ok_or_else(|| PipelineError::InvalidValue {
                    row,
                    column: col.name.clone(),
                    value: value.to_string(),
                })?;
            data[row * per_image + dst] = (v / MAX_INTENSITY) as f32;
        }
    }

    let data = Array4::from_shape_vec((n, shape.height, shape.width, shape.channels), data)?;
    log::debug!(
        "Prepared {n} images of {shape} with {} classes",
        labels.num_classes()
    );

    Ok(PreparedImages {
        num_classes: labels.num_classes(),
        images: ImageTensor { data },
        labels,
    })
}

/// Offset inside one `(H, W, C)` image of the `src`-th pixel column.
fn destination(src: usize, shape: ImageShape, layout: ChannelLayout) -> usize {
    match layout {
        ChannelLayout::Interleaved => src,
        ChannelLayout::Planar => {
            let plane = shape.height * shape.width;
            let channel = src / plane;
            let pos = src % plane;
            pos * shape.channels + channel
        }
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;
    use crate::data::model::{CellValue, Column};

    fn pixel_table(rows: usize, pixels: usize, label: impl Fn(usize) -> i64) -> RawTable {
        let mut columns = vec![Column::new(
            "label",
            (0..rows).map(|r| CellValue::Integer(label(r))).collect(),
        )];
        for p in 0..pixels {
            columns.push(Column::new(
                format!("pixel{p:04}"),
                (0..rows)
                    .map(|r| CellValue::Integer(((r * 31 + p * 7) % 256) as i64))
                    .collect(),
            ));
        }
        RawTable::new(columns).unwrap()
    }

    #[test]
    fn prepares_28x28_grayscale() {
        let table = pixel_table(10, 784, |r| (r % 7) as i64);
        let prepared = prepare(&table).unwrap();
        assert_eq!(prepared.images.data.dim(), (10, 28, 28, 1));
        assert_eq!(prepared.num_classes, 7);
        assert_eq!(prepared.labels.len(), 10);
    }

    #[test]
    fn values_are_scaled_into_unit_range() {
        let prepared = prepare(&pixel_table(6, 192, |r| (r % 2) as i64)).unwrap();
        assert!(prepared.images.data.iter().all(|&v| (0.0..=1.0).contains(&v)));
        assert_eq!(prepared.images.shape(), ImageShape::new(8, 8, 3));
        assert_eq!(prepared.images.shape().pixels(), 192);
    }

    #[test]
    fn square_fallback_and_shape_error() {
        let ok = prepare(&pixel_table(3, 100, |r| r as i64)).unwrap();
        assert_eq!(ok.images.data.dim(), (3, 10, 10, 1));

        let err = prepare(&pixel_table(3, 101, |r| r as i64)).unwrap_err();
        assert!(matches!(err, PipelineError::Shape { columns: 101 }));
    }

    #[test]
    fn known_geometries() {
        assert_eq!(ImageShape::infer(64).unwrap(), ImageShape::new(8, 8, 1));
        assert_eq!(ImageShape::infer(784).unwrap(), ImageShape::new(28, 28, 1));
        assert_eq!(ImageShape::infer(192).unwrap(), ImageShape::new(8, 8, 3));
        assert_eq!(ImageShape::infer(2352).unwrap(), ImageShape::new(28, 28, 3));
        assert!(ImageShape::infer(0).is_err());
        assert_eq!(ImageShape::infer(1).unwrap(), ImageShape::new(1, 1, 1));
    }

    #[test]
    fn interleaved_rgb_round_trip() {
        // One 8×8 RGB image whose channel c at (y, x) holds y*20 + x*2 + c.
        let mut columns = vec![Column::new("label", vec![CellValue::Integer(0)])];
        for y in 0..8 {
            for x in 0..8 {
                for c in 0..3 {
                    let v = (y * 20 + x * 2 + c) as f64;
                    columns.push(Column::new(
                        format!("pixel{}", columns.len() - 1),
                        vec![CellValue::Float(v)],
                    ));
                }
            }
        }
        let table = RawTable::new(columns).unwrap();
        let data = prepare(&table).unwrap().images.data;
        assert_relative_eq!(data[[0, 3, 5, 2]] * 255.0, 72.0, epsilon = 1e-3);
        assert_relative_eq!(data[[0, 7, 0, 1]] * 255.0, 141.0, epsilon = 1e-3);
    }

    #[test]
    fn planar_layout_reorders_channels() {
        // Planar 2×2×3 stored as r r r r g g g g b b b b (not a known size, so
        // exercise the mapping directly).
        let shape = ImageShape::new(2, 2, 3);
        assert_eq!(destination(0, shape, ChannelLayout::Planar), 0);
        assert_eq!(destination(1, shape, ChannelLayout::Planar), 3);
        assert_eq!(destination(4, shape, ChannelLayout::Planar), 1);
        assert_eq!(destination(11, shape, ChannelLayout::Planar), 11);
        assert_eq!(destination(5, shape, ChannelLayout::Interleaved), 5);
    }

    #[test]
    fn non_contiguous_labels_are_reindexed() {
        let labels = LabelVector::encode(&[5, 2, 5, 9]);
        assert_eq!(labels.classes, vec![2, 5, 9]);
        assert_eq!(labels.indices, vec![1, 0, 1, 2]);
        assert_eq!(labels.decode(2), Some(9));
        let one_hot = labels.one_hot();
        assert_eq!(one_hot.dim(), (4, 3));
        assert_eq!(one_hot.row(3).to_vec(), vec![0.0, 0.0, 1.0]);
    }

    #[test]
    fn rejects_missing_label_and_bad_cells() {
        let no_label = RawTable::new(vec![Column::new("pixel0", vec![CellValue::Integer(1)])]).unwrap();
        assert!(matches!(prepare(&no_label).unwrap_err(), PipelineError::MissingColumn(_)));

        let mut table = pixel_table(2, 64, |r| r as i64).columns().to_vec();
        table[3].values[1] = CellValue::String("x".into());
        let err = prepare(&RawTable::new(table).unwrap()).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidValue { row: 1, .. }));
    }

    #[test]
    fn intensities_outside_byte_range_are_rejected() {
        for bad in [CellValue::Float(f64::NAN), CellValue::Integer(300), CellValue::Integer(-1)] {
            let mut columns = pixel_table(2, 64, |r| r as i64).columns().to_vec();
            columns[1].values[0] = bad.clone();
            let err = prepare(&RawTable::new(columns).unwrap()).unwrap_err();
            assert!(
                matches!(err, PipelineError::InvalidValue { row: 0, ref column, .. } if column == "pixel0000"),
                "{bad:?} gave {err:?}"
            );
        }

        let mut columns = pixel_table(2, 64, |r| r as i64).columns().to_vec();
        columns[1].values[0] = CellValue::Float(255.0);
        columns[2].values[0] = CellValue::Float(0.0);
        let data = prepare(&RawTable::new(columns).unwrap()).unwrap().images.data;
        assert_relative_eq!(data[[0, 0, 0, 0]], 1.0);
        assert_relative_eq!(data[[0, 0, 1, 0]], 0.0);
    }
}
