use eframe::egui;

use hmnist_lens::{BlobStore, Config};

use crate::state::AppState;
use crate::ui::{panels, plot};

// ---------------------------------------------------------------------------
// eframe App implementation
// ---------------------------------------------------------------------------

pub struct HmnistLensApp {
    pub state: AppState,
}

impl HmnistLensApp {
    /// Build the app and load the first configured dataset, as the selector
    /// starts on it.
    pub fn new(config: Config, store: Box<dyn BlobStore>) -> Self {
        let first = config.datasets.first().cloned();
        let mut state = AppState::new(config, store);
        if let Some(object) = first {
            state.select(&object);
        }
        Self { state }
    }
}

impl eframe::App for HmnistLensApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // ---- Top panel: menu bar and dataset selector ----
        egui::TopBottomPanel::top("top_bar").show(ctx, |ui| {
            panels::top_bar(ui, &mut self.state);
        });

        // ---- Left side panel: dataset facts and training ----
        egui::SidePanel::left("side_panel")
            .default_width(240.0)
            .resizable(true)
            .show(ctx, |ui| {
                panels::side_panel(ui, &mut self.state);
            });

        // ---- Central panel: tables and charts ----
        egui::CentralPanel::default().show(ctx, |ui| {
            plot::central_panel(ui, &mut self.state);
        });
    }
}
