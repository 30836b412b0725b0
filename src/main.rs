mod app;
mod color;
mod state;
mod ui;

use anyhow::{Context, Result};
use app::HmnistLensApp;
use eframe::egui;
use hmnist_lens::Config;

fn main() -> Result<()> {
    dotenv::dotenv().ok();
    env_logger::init();

    // Bad configuration or credentials are the only fatal errors.
    let config = Config::load().context("Invalid configuration")?;
    let store = config
        .store
        .connect()
        .context("Failed to open the object store")?;
    log::info!(
        "Datasets from bucket '{}' at {}",
        config.dataset_bucket,
        config.store.describe()
    );

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1280.0, 820.0])
            .with_min_inner_size([640.0, 420.0]),
        ..Default::default()
    };

    eframe::run_native(
        "HMNIST Lens – Skin Lesion Dataset Explorer",
        options,
        Box::new(|_cc| Ok(Box::new(HmnistLensApp::new(config, store)))),
    )
    .map_err(|e| anyhow::anyhow!("UI error: {e}"))
}
