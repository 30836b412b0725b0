use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};

use hmnist_lens::data::normalize::{hmnist_label_name, DISPLAY_DX};
use hmnist_lens::data::schema::LABEL_COLUMN;
use hmnist_lens::data::stats::{
    correlation, describe, missing_values, pixel_summary, value_counts, ColumnSummary,
    CorrelationMatrix, PixelSummary,
};
use hmnist_lens::train::save_classifier;
use hmnist_lens::tensor::prepare_with_layout;
use hmnist_lens::{
    classify, normalize, BlobStore, CellValue, Config, DatasetKind, DatasetLoader, RawTable,
    Session, Trainer,
};

use crate::color::ColorMap;

/// Bins of the pixel-intensity histogram.
pub const HISTOGRAM_BINS: usize = 50;

/// Views of the central panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Tab {
    #[default]
    Preview,
    Statistics,
    Charts,
    Training,
}

// ---------------------------------------------------------------------------
// Dataset view
// ---------------------------------------------------------------------------

/// Everything the UI shows about the selected object, derived once per load.
pub struct DatasetView {
    pub object: String,
    pub kind: DatasetKind,
    /// Normalised for metadata tables, as loaded otherwise.
    pub table: Arc<RawTable>,
    pub summary: Vec<ColumnSummary>,
    pub missing: Vec<(String, usize)>,
    /// Column whose distribution is charted (`label` or the diagnosis).
    pub class_column: Option<String>,
    pub class_counts: BTreeMap<CellValue, usize>,
    pub class_colors: Option<ColorMap>,
    pub pixels: Option<PixelSummary>,
    pub correlation: Option<CorrelationMatrix>,
}

impl DatasetView {
    fn build(object: &str, raw: Arc<RawTable>) -> Self {
        let kind = classify(&raw);
        let table = match kind {
            DatasetKind::Metadata => Arc::new(normalize(&raw)),
            _ => raw,
        };

        let class_column = match kind {
            DatasetKind::ImagePixel => Some(LABEL_COLUMN.to_string()),
            DatasetKind::Metadata => Some(DISPLAY_DX.to_string()),
            DatasetKind::Unknown => None,
        };
        let class_counts = class_column
            .as_deref()
            .and_then(|col| value_counts(&table, col))
            .unwrap_or_default();
        let class_colors = class_column.as_deref().map(|col| {
            let colors = ColorMap::new(col, class_counts.keys());
            match kind {
                DatasetKind::ImagePixel => colors.with_labels(hmnist_label_name),
                _ => colors,
            }
        });

        // Pixel tables skip the column summary and correlation: thousands of
        // near-identical columns are not worth rendering.
        let (summary, pixels, correlation) = match kind {
            DatasetKind::ImagePixel => (Vec::new(), pixel_summary(&table, HISTOGRAM_BINS), None),
            DatasetKind::Metadata => (describe(&table), None, Some(correlation(&table))),
            DatasetKind::Unknown => (describe(&table), None, None),
        };

        Self {
            object: object.to_string(),
            kind,
            missing: missing_values(&table),
            table,
            summary,
            class_column,
            class_counts,
            class_colors,
            pixels,
            correlation,
        }
    }
}

// ---------------------------------------------------------------------------
// Application state
// ---------------------------------------------------------------------------

/// A message in the top bar.
#[derive(Debug, Clone, PartialEq)]
pub struct Status {
    pub text: String,
    pub is_error: bool,
}

/// The full UI state, independent of rendering.
pub struct AppState {
    pub config: Config,
    pub loader: DatasetLoader<Box<dyn BlobStore>>,

    /// Object name chosen in the dataset selector.
    pub selected: Option<String>,

    /// Derived view of the selected object (None until it loads).
    pub view: Option<DatasetView>,

    pub trainer: Trainer,

    /// Holds the model trained in this run of the application.
    pub session: Session,

    pub tab: Tab,

    /// Status / error message shown in the UI.
    pub status: Option<Status>,
}

impl AppState {
    pub fn new(config: Config, store: Box<dyn BlobStore>) -> Self {
        let loader = DatasetLoader::new(store, config.dataset_bucket.clone());
        let trainer = Trainer::new(config.training.clone());
        Self {
            config,
            loader,
            selected: None,
            view: None,
            trainer,
            session: Session::new(),
            tab: Tab::default(),
            status: None,
        }
    }

    fn info(&mut self, text: impl Into<String>) {
        self.status = Some(Status {
            text: text.into(),
            is_error: false,
        });
    }

    fn error(&mut self, text: impl Into<String>) {
        let text = text.into();
        log::error!("{text}");
        self.status = Some(Status {
            text,
            is_error: true,
        });
    }

    /// Load `object` (from cache when possible) and rebuild the view.
    pub fn select(&mut self, object: &str) {
        self.selected = Some(object.to_string());
        match self.loader.load(object) {
            Ok(raw) => {
                let view = DatasetView::build(object, raw);
                log::info!(
                    "Selected {object}: {} rows × {} columns ({})",
                    view.table.n_rows(),
                    view.table.n_cols(),
                    view.kind
                );
                if view.kind == DatasetKind::Unknown {
                    self.info(format!("{object}: unrecognised layout, charts skipped"));
                } else {
                    self.status = None;
                }
                if view.kind != DatasetKind::ImagePixel && self.tab == Tab::Training {
                    self.tab = Tab::Preview;
                }
                self.view = Some(view);
            }
            Err(e) => {
                self.view = None;
                let hint = if e.is_recoverable() {
                    " (press Reload to retry)"
                } else {
                    ""
                };
                self.error(format!("{e}{hint}"));
            }
        }
    }

    /// Drop the cached copy of the selected object and fetch it again.
    pub fn reload(&mut self) {
        if let Some(object) = self.selected.clone() {
            self.loader.invalidate(&object);
            self.select(&object);
        }
    }

    pub fn can_train(&self) -> bool {
        self.view
            .as_ref()
            .is_some_and(|v| v.kind == DatasetKind::ImagePixel)
    }

    /// Train on the selected image table. Blocks until training finishes.
    pub fn train(&mut self) {
        let Some(view) = &self.view else {
            return;
        };
        let object = view.object.clone();
        let table = Arc::clone(&view.table);

        self.trainer.set_config(self.config.training.clone());
        let result = prepare_with_layout(&table, self.config.pixel_layout).and_then(|prepared| {
            self.trainer
                .train_into(&mut self.session, &object, &prepared)
                .map(|model| model.test_accuracy)
        });
        match result {
            Ok(accuracy) => {
                self.info(format!(
                    "Model trained on {object}: test accuracy {:.1}%",
                    accuracy * 100.0
                ));
                self.tab = Tab::Training;
            }
            Err(e) => self.error(format!("Training failed: {e}")),
        }
    }

    /// Upload the session's model to the model bucket.
    pub fn save_model(&mut self) {
        let Some(model) = self.session.model() else {
            return;
        };
        let bucket = &self.config.model_bucket;
        let object = &self.config.model_object;
        match save_classifier(self.loader.store(), bucket, object, model) {
            Ok(()) => {
                let text = format!("Model saved to {bucket}/{object}");
                self.info(text);
            }
            Err(e) => self.error(e.to_string()),
        }
    }

    /// Copy a local file into the dataset bucket and select it.
    pub fn upload_file(&mut self, path: &Path) {
        match self.try_upload(path) {
            Ok(object) => {
                if !self.config.datasets.contains(&object) {
                    self.config.datasets.push(object.clone());
                }
                self.loader.invalidate(&object);
                self.select(&object);
                if self.status.is_none() {
                    self.info(format!("Uploaded {object}"));
                }
            }
            Err(e) => self.error(format!("Upload failed: {e:#}")),
        }
    }

    fn try_upload(&self, path: &Path) -> Result<String> {
        let object = path
            .file_name()
            .and_then(|n| n.to_str())
            .context("file name is not valid UTF-8")?
            .to_string();
        let bytes = std::fs::read(path)
            .with_context(|| format!("Failed to read file: {}", path.display()))?;
        let store = self.loader.store();
        let bucket = self.loader.bucket();
        store
            .ensure_bucket(bucket)
            .with_context(|| format!("Failed to create bucket '{bucket}'"))?;
        store
            .put_object(bucket, &object, &bytes)
            .with_context(|| format!("Failed to upload {object}"))?;
        log::info!("Uploaded {} ({} bytes) to {bucket}", path.display(), bytes.len());
        Ok(object)
    }
}

#[cfg(test)]
mod tests {
    use hmnist_lens::Column;

    use super::*;

    #[test]
    fn pixel_tables_chart_labels_as_diagnoses() {
        let mut columns: Vec<Column> = (0..64)
            .map(|p| Column::new(format!("pixel{p:04}"), vec![CellValue::Integer(10), CellValue::Integer(20)]))
            .collect();
        columns.push(Column::new("label", vec![CellValue::Integer(4), CellValue::Integer(6)]));
        let view = DatasetView::build("hmnist_8_8_L.csv", Arc::new(RawTable::new(columns).unwrap()));

        assert_eq!(view.kind, DatasetKind::ImagePixel);
        let colors = view.class_colors.expect("label colours");
        let names: Vec<String> = colors.legend_entries().into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, ["Nevo Melanocítico (nv)", "Melanoma (mel)"]);
    }
}
