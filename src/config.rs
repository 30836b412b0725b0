use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::store::{BlobStore, FsStore, MemoryStore, S3Store, StoreError};
use crate::tensor::ChannelLayout;
use crate::train::TrainingConfig;

/// Environment variable naming an optional JSON config file.
pub const CONFIG_ENV: &str = "HMNIST_CONFIG";

/// The objects the dashboard offers, in selector order.
pub const DEFAULT_DATASETS: [&str; 5] = [
    "hmnist_8_8_L.csv",
    "hmnist_8_8_RGB.csv",
    "hmnist_28_28_L.csv",
    "hmnist_28_28_RGB.csv",
    "HAM10000_metadata.csv",
];

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    S3,
    Filesystem,
    Memory,
}

impl FromStr for StoreBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "s3" | "minio" => Ok(Self::S3),
            "filesystem" | "fs" => Ok(Self::Filesystem),
            "memory" => Ok(Self::Memory),
            other => bail!("unknown store backend '{other}' (expected s3, filesystem or memory)"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    /// `host:port` of the S3 endpoint, plain HTTP.
    pub endpoint: String,
    pub access_key: String,
    pub secret_key: String,
    pub region: String,
    /// Root directory of the filesystem backend.
    pub root: PathBuf,
    pub timeout_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::S3,
            endpoint: "minio:9000".into(),
            access_key: "admin".into(),
            secret_key: "password".into(),
            region: "us-east-1".into(),
            root: PathBuf::from("./store"),
            timeout_secs: 30,
        }
    }
}

impl StoreConfig {
    /// Open the configured backend.
    pub fn connect(&self) -> Result<Box<dyn BlobStore>, StoreError> {
        let store: Box<dyn BlobStore> = match self.backend {
            StoreBackend::S3 => Box::new(S3Store::new(
                &self.endpoint,
                &self.access_key,
                &self.secret_key,
                &self.region,
                Duration::from_secs(self.timeout_secs),
            )?),
            StoreBackend::Filesystem => Box::new(FsStore::new(&self.root)),
            StoreBackend::Memory => Box::new(MemoryStore::new()),
        };
        log::info!("Using {:?} object store ({})", self.backend, self.describe());
        Ok(store)
    }

    /// Where the store lives, for log and status lines.
    pub fn describe(&self) -> String {
        match self.backend {
            StoreBackend::S3 => format!("http://{}", self.endpoint.trim_start_matches("http://")),
            StoreBackend::Filesystem => self.root.display().to_string(),
            StoreBackend::Memory => "in-memory".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub store: StoreConfig,
    pub dataset_bucket: String,
    pub model_bucket: String,
    pub model_object: String,
    pub datasets: Vec<String>,
    pub pixel_layout: ChannelLayout,
    pub training: TrainingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store: StoreConfig::default(),
            dataset_bucket: "datasets".into(),
            model_bucket: "models".into(),
            model_object: "cnn_hmnist.json".into(),
            datasets: DEFAULT_DATASETS.iter().map(|s| s.to_string()).collect(),
            pixel_layout: ChannelLayout::Interleaved,
            training: TrainingConfig::default(),
        }
    }
}

impl Config {
    /// Defaults, then the JSON file named by `HMNIST_CONFIG`, then
    /// `HMNIST_*` environment overrides.
    pub fn load() -> Result<Self> {
        let mut config = match std::env::var_os(CONFIG_ENV) {
            Some(path) => Self::from_file(Path::new(&path))?,
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Self = serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        config
            .training
            .validate()
            .with_context(|| format!("Invalid config file: {}", path.display()))?;
        log::info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Apply `HMNIST_*` overrides looked up through `var`.
    pub fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) -> Result<()> {
        let text = |key: &str, target: &mut String| {
            if let Some(value) = var(key) {
                *target = value;
            }
        };
        text("HMNIST_STORE_ENDPOINT", &mut self.store.endpoint);
        text("HMNIST_STORE_ACCESS_KEY", &mut self.store.access_key);
        text("HMNIST_STORE_SECRET_KEY", &mut self.store.secret_key);
        text("HMNIST_STORE_REGION", &mut self.store.region);
        text("HMNIST_DATASET_BUCKET", &mut self.dataset_bucket);
        text("HMNIST_MODEL_BUCKET", &mut self.model_bucket);
        text("HMNIST_MODEL_OBJECT", &mut self.model_object);

        if let Some(root) = var("HMNIST_STORE_ROOT") {
            self.store.root = PathBuf::from(root);
        }
        if let Some(backend) = var("HMNIST_STORE_BACKEND") {
            self.store.backend = backend.parse().context("HMNIST_STORE_BACKEND")?;
        }
        if let Some(epochs) = parsed::<usize>(&var, "HMNIST_EPOCHS")? {
            if epochs == 0 {
                bail!("HMNIST_EPOCHS must be at least 1");
            }
            self.training.epochs = epochs;
        }
        if let Some(batch) = parsed::<usize>(&var, "HMNIST_BATCH_SIZE")? {
            if batch == 0 {
                bail!("HMNIST_BATCH_SIZE must be at least 1");
            }
            self.training.batch_size = batch;
        }
        if let Some(seed) = parsed::<u64>(&var, "HMNIST_SEED")? {
            self.training.seed = seed;
        }
        self.training.validate()?;
        Ok(())
    }
}

fn parsed<T>(var: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    var(key)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .with_context(|| format!("{key}: invalid value '{raw}'"))
        })
        .transpose()
}
