use std::collections::BTreeMap;

use eframe::egui::Color32;
use hmnist_lens::CellValue;
use palette::{Hsl, IntoColor, Srgb};

// ---------------------------------------------------------------------------
// Color palette generator
// ---------------------------------------------------------------------------

/// Generates `n` visually distinct colours using evenly spaced hues.
pub fn generate_palette(n: usize) -> Vec<Color32> {
    if n == 0 {
        return Vec::new();
    }
    (0..n)
        .map(|i| {
            let hue = (i as f32 / n as f32) * 360.0;
            let hsl = Hsl::new(hue, 0.75, 0.55);
            let rgb: Srgb = hsl.into_color();
            Color32::from_rgb(
                (rgb.red * 255.0) as u8,
                (rgb.green * 255.0) as u8,
                (rgb.blue * 255.0) as u8,
            )
        })
        .collect()
}

/// Blue → white → red for a correlation coefficient in `[-1, 1]`; grey for NaN.
pub fn diverging(r: f64) -> Color32 {
    if r.is_nan() {
        return Color32::DARK_GRAY;
    }
    let t = r.clamp(-1.0, 1.0) as f32;
    let hue = if t < 0.0 { 220.0 } else { 0.0 };
    let hsl = Hsl::new(hue, 0.7, 1.0 - 0.45 * t.abs());
    let rgb: Srgb = hsl.into_color();
    Color32::from_rgb(
        (rgb.red * 255.0) as u8,
        (rgb.green * 255.0) as u8,
        (rgb.blue * 255.0) as u8,
    )
}

// ---------------------------------------------------------------------------
// Color mapping: class value → Color32
// ---------------------------------------------------------------------------

/// One colour per distinct class value, stable across redraws.
#[derive(Debug, Clone)]
pub struct ColorMap {
    pub column: String,
    mapping: BTreeMap<CellValue, Color32>,
    default_color: Color32,
    labeler: fn(&CellValue) -> String,
}

impl ColorMap {
    pub fn new<'a>(column: &str, values: impl IntoIterator<Item = &'a CellValue>) -> Self {
        let values: Vec<&CellValue> = values.into_iter().collect();
        let palette = generate_palette(values.len());
        let mapping = values
            .into_iter()
            .zip(palette)
            .map(|(v, c)| (v.clone(), c))
            .collect();

        ColorMap {
            column: column.to_string(),
            mapping,
            default_color: Color32::GRAY,
            labeler: CellValue::to_string,
        }
    }

    /// Name values through `labeler` in legends and bar names.
    pub fn with_labels(mut self, labeler: fn(&CellValue) -> String) -> Self {
        self.labeler = labeler;
        self
    }

    pub fn label_for(&self, value: &CellValue) -> String {
        (self.labeler)(value)
    }

    pub fn color_for(&self, value: &CellValue) -> Color32 {
        self.mapping
            .get(value)
            .copied()
            .unwrap_or(self.default_color)
    }

    /// Legend entries (value label → colour) for the UI.
    pub fn legend_entries(&self) -> Vec<(String, Color32)> {
        self.mapping
            .iter()
            .map(|(v, c)| (self.label_for(v), *c))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use hmnist_lens::data::normalize::hmnist_label_name;

    use super::*;

    #[test]
    fn palette_colours_are_distinct() {
        let palette = generate_palette(7);
        assert_eq!(palette.len(), 7);
        for (i, a) in palette.iter().enumerate() {
            assert!(palette[i + 1..].iter().all(|b| a != b));
        }
        assert!(generate_palette(0).is_empty());
    }

    #[test]
    fn unknown_values_fall_back_to_grey() {
        let values = [CellValue::Integer(0), CellValue::Integer(1)];
        let map = ColorMap::new("label", &values);
        assert_ne!(map.color_for(&values[0]), map.color_for(&values[1]));
        assert_eq!(map.color_for(&CellValue::Integer(9)), Color32::GRAY);
        assert_eq!(map.legend_entries().len(), 2);
    }

    #[test]
    fn hmnist_labels_read_as_diagnoses() {
        let values = [CellValue::Integer(4), CellValue::Integer(6), CellValue::Integer(11)];
        let map = ColorMap::new("label", &values).with_labels(hmnist_label_name);
        let names: Vec<String> = map.legend_entries().into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, ["Nevo Melanocítico (nv)", "Melanoma (mel)", "11"]);
        assert_eq!(map.label_for(&CellValue::Integer(4)), "Nevo Melanocítico (nv)");
    }

    #[test]
    fn diverging_scale_ends() {
        assert_eq!(diverging(f64::NAN), Color32::DARK_GRAY);
        assert_ne!(diverging(1.0), diverging(-1.0));
        let white = diverging(0.0);
        assert!(white.r() > 250 && white.g() > 250 && white.b() > 250);
    }
}
