//! Upload local files into a bucket once the object store is up.

use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;

use hmnist_lens::{BlobStore, Config};

const READY_ATTEMPTS: usize = 10;
const READY_DELAY: Duration = Duration::from_secs(2);

#[derive(Parser, Debug)]
#[command(
    name = "seed_store",
    about = "Wait for the object store, create the bucket if needed and upload files."
)]
struct Args {
    /// Files to upload; each object is named after its file name.
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Target bucket (defaults to the configured dataset bucket).
    #[arg(long)]
    bucket: Option<String>,
}

fn wait_until_ready(store: &dyn BlobStore) -> Result<()> {
    for attempt in 1..=READY_ATTEMPTS {
        match store.list_buckets() {
            Ok(_) => return Ok(()),
            Err(e) => {
                log::warn!("Object store not ready ({attempt}/{READY_ATTEMPTS}): {e}");
                if attempt < READY_ATTEMPTS {
                    thread::sleep(READY_DELAY);
                }
            }
        }
    }
    bail!("object store still unreachable after {READY_ATTEMPTS} attempts")
}

fn main() -> Result<()> {
    dotenv::dotenv().ok();
    env_logger::init();
    let args = Args::parse();

    let config = Config::load().context("Invalid configuration")?;
    let bucket = args.bucket.unwrap_or(config.dataset_bucket);
    let store = config.store.connect().context("Failed to open the object store")?;

    wait_until_ready(&*store)?;
    if store.ensure_bucket(&bucket)? {
        println!("Created bucket '{bucket}'");
    }

    for path in &args.files {
        let object = path
            .file_name()
            .and_then(|n| n.to_str())
            .with_context(|| format!("Not a file name: {}", path.display()))?;
        let bytes = std::fs::read(path)
            .with_context(|| format!("Failed to read file: {}", path.display()))?;
        store
            .put_object(&bucket, object, &bytes)
            .with_context(|| format!("Failed to upload {object}"))?;
        println!("Uploaded {} → {bucket}/{object} ({} bytes)", path.display(), bytes.len());
    }
    Ok(())
}
