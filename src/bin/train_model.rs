//! Headless job: fetch one HMNIST table, train the CNN, upload the model.

use anyhow::{Context, Result};
use clap::Parser;

use hmnist_lens::tensor::prepare_with_layout;
use hmnist_lens::train::save_classifier;
use hmnist_lens::{classify, Config, DatasetKind, DatasetLoader, Session, Trainer};

#[derive(Parser, Debug)]
#[command(
    name = "train_model",
    about = "Train the HMNIST CNN on a dataset from the object store and upload it."
)]
struct Args {
    /// Dataset object in the dataset bucket.
    #[arg(default_value = "hmnist_28_28_RGB.csv")]
    object: String,

    /// Overrides `training.epochs`.
    #[arg(long)]
    epochs: Option<usize>,

    /// Overrides `training.batch_size`.
    #[arg(long)]
    batch_size: Option<usize>,

    /// Train and report without uploading the model.
    #[arg(long)]
    no_upload: bool,
}

fn main() -> Result<()> {
    dotenv::dotenv().ok();
    env_logger::init();
    let args = Args::parse();

    let mut config = Config::load().context("Invalid configuration")?;
    if let Some(epochs) = args.epochs {
        config.training.epochs = epochs;
    }
    if let Some(batch) = args.batch_size {
        config.training.batch_size = batch;
    }
    config.training.validate()?;

    let store = config.store.connect().context("Failed to open the object store")?;
    let mut loader = DatasetLoader::new(store, config.dataset_bucket.clone());

    log::info!("Downloading {}/{}", config.dataset_bucket, args.object);
    let table = loader.load(&args.object)?;
    log::info!("Dataset shape: {:?}", table.shape());

    let kind = classify(&table);
    if kind != DatasetKind::ImagePixel {
        anyhow::bail!("{} holds {kind}, not an image-pixel table", args.object);
    }

    let prepared = prepare_with_layout(&table, config.pixel_layout)?;
    log::info!(
        "Prepared {} images of {} with {} classes",
        prepared.images.len(),
        prepared.images.shape(),
        prepared.num_classes
    );

    let trainer = Trainer::new(config.training.clone());
    let mut session = Session::new();
    let model = trainer.train_into(&mut session, &args.object, &prepared)?;
    println!(
        "Trained on {}: test accuracy {:.2}%",
        args.object,
        model.test_accuracy * 100.0
    );

    if args.no_upload {
        return Ok(());
    }
    save_classifier(
        loader.store(),
        &config.model_bucket,
        &config.model_object,
        model,
    )?;
    println!(
        "Uploaded model to {}/{}",
        config.model_bucket, config.model_object
    );
    Ok(())
}
