use std::fmt;

use super::model::RawTable;
use super::normalize::{DISPLAY_DX, DISPLAY_LOCALIZATION, DISPLAY_SEX};

/// Name of the class column in HMNIST tables.
pub const LABEL_COLUMN: &str = "label";

/// Pixel counts of the four HMNIST releases: 8×8×1, 28×28×1, 8×8×3, 28×28×3.
pub const KNOWN_PIXEL_COUNTS: [usize; 4] = [64, 784, 192, 2352];

/// What a loaded table looks like. Derived on demand, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DatasetKind {
    /// `label` plus one column per pixel intensity.
    ImagePixel,
    /// HAM10000-style lesion metadata.
    Metadata,
    Unknown,
}

impl fmt::Display for DatasetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatasetKind::ImagePixel => write!(f, "image pixels"),
            DatasetKind::Metadata => write!(f, "lesion metadata"),
            DatasetKind::Unknown => write!(f, "unknown"),
        }
    }
}

/// Decide what kind of dataset `table` holds.
///
/// Image tables need a `label` column and either a known pixel count or a
/// second column whose name mentions "pixel". Metadata tables need the
/// diagnosis, sex and localization columns, under their raw or display names.
pub fn classify(table: &RawTable) -> DatasetKind {
    if is_image_pixel(table) {
        DatasetKind::ImagePixel
    } else if is_metadata(table) {
        DatasetKind::Metadata
    } else {
        DatasetKind::Unknown
    }
}

fn is_image_pixel(table: &RawTable) -> bool {
    if !table.has_column(LABEL_COLUMN) {
        return false;
    }
    let pixel_columns = table.n_cols() - 1;
    let known_count = KNOWN_PIXEL_COUNTS.contains(&pixel_columns);
    let pixel_named = table
        .columns()
        .get(1)
        .is_some_and(|c| c.name.to_lowercase().contains("pixel"));
    known_count || pixel_named
}

fn is_metadata(table: &RawTable) -> bool {
    [("dx", DISPLAY_DX), ("sex", DISPLAY_SEX), ("localization", DISPLAY_LOCALIZATION)]
        .iter()
        .all(|(raw, display)| table.has_column(raw) || table.has_column(display))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::{CellValue, Column};
    use crate::data::normalize::normalize;

    fn table_with(names: &[&str]) -> RawTable {
        RawTable::new(
            names
                .iter()
                .map(|n| Column::new(*n, vec![CellValue::Integer(0)]))
                .collect(),
        )
        .unwrap()
    }

    fn pixel_table(pixels: usize, prefix: &str) -> RawTable {
        let mut names = vec!["label".to_string()];
        names.extend((0..pixels).map(|i| format!("{prefix}{i:04}")));
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();
        table_with(&refs)
    }

    #[test]
    fn known_pixel_counts_are_images() {
        for count in KNOWN_PIXEL_COUNTS {
            assert_eq!(classify(&pixel_table(count, "c")), DatasetKind::ImagePixel);
        }
    }

    #[test]
    fn pixel_named_columns_are_images_at_any_count() {
        assert_eq!(classify(&pixel_table(100, "pixel")), DatasetKind::ImagePixel);
        assert_eq!(classify(&pixel_table(100, "PIXEL")), DatasetKind::ImagePixel);
        assert_eq!(classify(&pixel_table(100, "c")), DatasetKind::Unknown);
    }

    #[test]
    fn label_is_required_for_images() {
        let mut names = vec!["target".to_string()];
        names.extend((0..64).map(|i| format!("pixel{i}")));
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();
        assert_eq!(classify(&table_with(&refs)), DatasetKind::Unknown);
    }

    #[test]
    fn unrelated_columns_are_unknown() {
        assert_eq!(classify(&table_with(&["id", "value"])), DatasetKind::Unknown);
        assert_eq!(classify(&RawTable::default()), DatasetKind::Unknown);
    }

    #[test]
    fn metadata_detected_before_and_after_normalization() {
        let raw = RawTable::new(vec![
            Column::new("lesion_id", vec!["HAM_0000118".into()]),
            Column::new("dx", vec!["nv".into()]),
            Column::new("sex", vec!["male".into()]),
            Column::new("localization", vec!["back".into()]),
        ])
        .unwrap();
        assert_eq!(classify(&raw), DatasetKind::Metadata);
        assert_eq!(classify(&normalize(&raw)), DatasetKind::Metadata);
    }

    #[test]
    fn classification_is_idempotent() {
        let t = pixel_table(784, "pixel");
        assert_eq!(classify(&t), classify(&t));
    }
}
