use eframe::egui::{self, Color32, RichText, ScrollArea, Ui};

use hmnist_lens::DatasetKind;

use crate::state::AppState;

// ---------------------------------------------------------------------------
// Left side panel – dataset facts and training controls
// ---------------------------------------------------------------------------

/// Render the left side panel.
pub fn side_panel(ui: &mut Ui, state: &mut AppState) {
    ui.heading("Dataset");
    ui.separator();

    let Some(view) = &state.view else {
        ui.label("No dataset loaded.");
        return;
    };

    egui::Grid::new("dataset_facts")
        .num_columns(2)
        .striped(true)
        .show(ui, |ui: &mut Ui| {
            ui.label("Object");
            ui.label(view.object.as_str());
            ui.end_row();
            ui.label("Kind");
            ui.label(view.kind.to_string());
            ui.end_row();
            ui.label("Rows");
            ui.label(view.table.n_rows().to_string());
            ui.end_row();
            ui.label("Columns");
            ui.label(view.table.n_cols().to_string());
            ui.end_row();
            if let Some(pixels) = &view.pixels {
                ui.label("Mean pixel");
                ui.label(format!("{:.2}", pixels.mean));
                ui.end_row();
            }
        });

    ui.add_space(8.0);
    ui.strong("Missing values");
    if view.missing.is_empty() {
        ui.label("None");
    } else {
        ScrollArea::vertical()
            .id_salt("missing_values")
            .max_height(120.0)
            .show(ui, |ui: &mut Ui| {
                for (column, count) in &view.missing {
                    ui.label(format!("{column}: {count}"));
                }
            });
    }

    if view.kind == DatasetKind::ImagePixel {
        ui.add_space(8.0);
        training_controls(ui, state);
    }
}

fn training_controls(ui: &mut Ui, state: &mut AppState) {
    ui.heading("Model");
    ui.separator();

    let training = &mut state.config.training;
    egui::Grid::new("training_params")
        .num_columns(2)
        .show(ui, |ui: &mut Ui| {
            ui.label("Epochs");
            ui.add(egui::DragValue::new(&mut training.epochs).range(1..=50));
            ui.end_row();
            ui.label("Batch size");
            ui.add(egui::DragValue::new(&mut training.batch_size).range(1..=512));
            ui.end_row();
        });

    if ui
        .add_enabled(state.can_train(), egui::Button::new("Train CNN"))
        .on_hover_text("Blocks the window until every epoch has run")
        .clicked()
    {
        state.train();
    }

    if let Some(model) = state.session.model() {
        let source = state.session.source().unwrap_or("?");
        ui.label(format!(
            "Trained on {source}: {:.1}% test accuracy",
            model.test_accuracy * 100.0
        ));
    }

    let save_label = format!(
        "Save to {}/{}",
        state.config.model_bucket, state.config.model_object
    );
    if ui
        .add_enabled(state.session.is_ready(), egui::Button::new(save_label))
        .clicked()
    {
        state.save_model();
    }
}

// ---------------------------------------------------------------------------
// Top bar
// ---------------------------------------------------------------------------

/// Render the top menu / toolbar.
pub fn top_bar(ui: &mut Ui, state: &mut AppState) {
    egui::menu::bar(ui, |ui: &mut Ui| {
        ui.menu_button("File", |ui: &mut Ui| {
            if ui.button("Upload to bucket…").clicked() {
                upload_file_dialog(state);
                ui.close_menu();
            }
        });

        ui.separator();

        // Dataset selector; loading happens after the combo box closes.
        let mut choice = None;
        let current = state.selected.clone().unwrap_or_default();
        egui::ComboBox::from_id_salt("dataset")
            .selected_text(&current)
            .width(220.0)
            .show_ui(ui, |ui: &mut Ui| {
                for name in &state.config.datasets {
                    if ui.selectable_label(current == *name, name).clicked() {
                        choice = Some(name.clone());
                    }
                }
            });
        if let Some(object) = choice {
            state.select(&object);
        }

        if ui
            .add_enabled(state.selected.is_some(), egui::Button::new("⟳ Reload"))
            .on_hover_text("Fetch the object again, bypassing the cache")
            .clicked()
        {
            state.reload();
        }

        ui.separator();
        ui.label(format!("bucket: {}", state.loader.bucket()));

        if let Some(status) = &state.status {
            ui.separator();
            let color = if status.is_error {
                Color32::RED
            } else {
                Color32::LIGHT_GREEN
            };
            ui.label(RichText::new(&status.text).color(color));
        }
    });
}

// ---------------------------------------------------------------------------
// File dialog
// ---------------------------------------------------------------------------

pub fn upload_file_dialog(state: &mut AppState) {
    let file = rfd::FileDialog::new()
        .set_title("Upload a dataset to the object store")
        .add_filter("Supported files", &["csv", "json", "parquet", "pq"])
        .add_filter("CSV", &["csv"])
        .add_filter("JSON", &["json"])
        .add_filter("Parquet", &["parquet", "pq"])
        .pick_file();

    if let Some(path) = file {
        state.upload_file(&path);
    }
}
