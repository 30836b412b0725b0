use eframe::egui::{self, Color32, RichText, ScrollArea, Ui};
use egui_extras::{Column as TableColumn, TableBuilder};
use egui_plot::{Bar, BarChart, Legend, Line, Plot, PlotPoints};

use hmnist_lens::{DatasetKind, RawTable};

use crate::color::diverging;
use crate::state::{AppState, DatasetView, Tab};

/// Rows shown in the preview table.
const PREVIEW_ROWS: usize = 20;
/// Wide pixel tables only show their first columns.
const PREVIEW_COLUMNS: usize = 24;

// ---------------------------------------------------------------------------
// Central panel
// ---------------------------------------------------------------------------

/// Render the tab strip and the active tab.
pub fn central_panel(ui: &mut Ui, state: &mut AppState) {
    let Some(view) = &state.view else {
        ui.centered_and_justified(|ui: &mut Ui| {
            ui.heading("Pick a dataset in the top bar, or upload one (File → Upload…)");
        });
        return;
    };

    ui.horizontal(|ui: &mut Ui| {
        ui.selectable_value(&mut state.tab, Tab::Preview, "Preview");
        ui.selectable_value(&mut state.tab, Tab::Statistics, "Statistics");
        ui.selectable_value(&mut state.tab, Tab::Charts, "Charts");
        if view.kind == DatasetKind::ImagePixel {
            ui.selectable_value(&mut state.tab, Tab::Training, "Training");
        }
    });
    ui.separator();

    match state.tab {
        Tab::Preview => preview_table(ui, &view.table),
        Tab::Statistics => statistics(ui, view),
        Tab::Charts => charts(ui, view),
        Tab::Training => training_history(ui, state),
    }
}

// ---------------------------------------------------------------------------
// Tables
// ---------------------------------------------------------------------------

fn preview_table(ui: &mut Ui, table: &RawTable) {
    let head = table.head(PREVIEW_ROWS);
    let columns = &head.columns()[..head.n_cols().min(PREVIEW_COLUMNS)];
    if columns.len() < table.n_cols() {
        ui.label(format!(
            "Showing {} of {} columns",
            columns.len(),
            table.n_cols()
        ));
    }

    ScrollArea::horizontal().show(ui, |ui: &mut Ui| {
        TableBuilder::new(ui)
            .striped(true)
            .resizable(true)
            .columns(TableColumn::auto().at_least(60.0), columns.len())
            .header(20.0, |mut header| {
                for column in columns {
                    header.col(|ui: &mut Ui| {
                        ui.strong(&column.name);
                    });
                }
            })
            .body(|body| {
                body.rows(18.0, head.n_rows(), |mut row| {
                    let i = row.index();
                    for column in columns {
                        row.col(|ui: &mut Ui| {
                            ui.label(column.values[i].to_string());
                        });
                    }
                });
            });
    });
}

fn statistics(ui: &mut Ui, view: &DatasetView) {
    if view.summary.is_empty() {
        ui.label("No numeric columns to describe.");
        return;
    }
    let headers = ["column", "count", "mean", "std", "min", "25%", "50%", "75%", "max"];

    TableBuilder::new(ui)
        .striped(true)
        .resizable(true)
        .columns(TableColumn::auto().at_least(70.0), headers.len())
        .header(20.0, |mut header| {
            for h in headers {
                header.col(|ui: &mut Ui| {
                    ui.strong(h);
                });
            }
        })
        .body(|body| {
            body.rows(18.0, view.summary.len(), |mut row| {
                let s = &view.summary[row.index()];
                row.col(|ui: &mut Ui| {
                    ui.label(&s.name);
                });
                row.col(|ui: &mut Ui| {
                    ui.label(s.count.to_string());
                });
                for v in [s.mean, s.std, s.min, s.q25, s.median, s.q75, s.max] {
                    row.col(|ui: &mut Ui| {
                        ui.label(format!("{v:.3}"));
                    });
                }
            });
        });
}

// ---------------------------------------------------------------------------
// Charts
// ---------------------------------------------------------------------------

fn charts(ui: &mut Ui, view: &DatasetView) {
    if view.kind == DatasetKind::Unknown {
        ui.label("Unrecognised dataset layout: no charts available.");
        return;
    }

    ScrollArea::vertical().show(ui, |ui: &mut Ui| {
        class_distribution(ui, view);

        if let Some(pixels) = &view.pixels {
            ui.add_space(12.0);
            ui.strong(format!("Pixel intensities (mean {:.2})", pixels.mean));
            let h = &pixels.histogram;
            let bars: Vec<Bar> = h
                .counts
                .iter()
                .enumerate()
                .map(|(i, &count)| {
                    let center = (h.edges[i] + h.edges[i + 1]) / 2.0;
                    Bar::new(center, count as f64).width(h.edges[i + 1] - h.edges[i])
                })
                .collect();
            Plot::new("pixel_histogram")
                .height(220.0)
                .x_axis_label("Intensity")
                .y_axis_label("Count")
                .show(ui, |plot_ui| {
                    plot_ui.bar_chart(BarChart::new(bars).color(Color32::LIGHT_BLUE));
                });
        }

        if let Some(corr) = &view.correlation {
            ui.add_space(12.0);
            ui.strong("Correlation (numeric columns)");
            correlation_grid(ui, corr);
        }
    });
}

fn class_distribution(ui: &mut Ui, view: &DatasetView) {
    let Some(column) = &view.class_column else {
        return;
    };
    ui.strong(format!("Distribution of {column}"));

    let bars: Vec<Bar> = view
        .class_counts
        .iter()
        .enumerate()
        .map(|(i, (value, &count))| {
            let (color, name) = match &view.class_colors {
                Some(cm) => (cm.color_for(value), cm.label_for(value)),
                None => (Color32::LIGHT_BLUE, value.to_string()),
            };
            Bar::new(i as f64, count as f64)
                .name(name)
                .fill(color)
                .width(0.8)
        })
        .collect();

    Plot::new("class_distribution")
        .height(240.0)
        .legend(Legend::default())
        .y_axis_label("Rows")
        .show(ui, |plot_ui| {
            plot_ui.bar_chart(BarChart::new(bars));
        });

    if let Some(cm) = &view.class_colors {
        ui.horizontal_wrapped(|ui: &mut Ui| {
            for (label, color) in cm.legend_entries() {
                ui.label(RichText::new(format!("■ {label}")).color(color));
            }
        });
    }
}

fn correlation_grid(ui: &mut Ui, corr: &hmnist_lens::data::stats::CorrelationMatrix) {
    if corr.columns.is_empty() {
        ui.label("No numeric columns.");
        return;
    }
    egui::Grid::new("correlation").show(ui, |ui: &mut Ui| {
        ui.label("");
        for name in &corr.columns {
            ui.strong(name);
        }
        ui.end_row();
        for (i, name) in corr.columns.iter().enumerate() {
            ui.strong(name);
            for j in 0..corr.columns.len() {
                let r = corr.get(i, j);
                let text = if r.is_nan() {
                    "n/a".to_string()
                } else {
                    format!("{r:.2}")
                };
                ui.label(
                    RichText::new(text)
                        .background_color(diverging(r))
                        .color(Color32::BLACK),
                );
            }
            ui.end_row();
        }
    });
}

// ---------------------------------------------------------------------------
// Training
// ---------------------------------------------------------------------------

fn training_history(ui: &mut Ui, state: &AppState) {
    let Some(model) = state.session.model() else {
        ui.label("No model trained yet. Use \"Train CNN\" in the side panel.");
        return;
    };

    ui.label(format!(
        "Input {} → {} classes, test accuracy {:.1}%",
        model.input_shape(),
        model.num_classes(),
        model.test_accuracy * 100.0
    ));

    let series = |f: fn(&hmnist_lens::train::EpochMetrics) -> Option<f32>| -> PlotPoints {
        model
            .history
            .iter()
            .filter_map(|m| f(m).map(|v| [m.epoch as f64, v as f64]))
            .collect()
    };

    Plot::new("training_history")
        .legend(Legend::default())
        .x_axis_label("Epoch")
        .include_y(0.0)
        .include_y(1.0)
        .show(ui, |plot_ui| {
            plot_ui.line(Line::new(series(|m| Some(m.loss))).name("loss"));
            plot_ui.line(Line::new(series(|m| Some(m.train_accuracy))).name("accuracy"));
            plot_ui.line(Line::new(series(|m| m.validation_accuracy)).name("val_accuracy"));
        });
}
