//! Training orchestration for the HMNIST image tables.
//!
//! ```text
//!  PreparedImages ──► stratified 80/20 split ──► stratified 10% validation
//!                                                     │
//!  Trainer (lazy ModelBuilder) ──► SmallCnn (burn) ──► Adam epochs ──► TrainedClassifier
//!                                                     │
//!                                   Session (caller owned) / save_classifier
//! ```

pub mod artifact;
pub mod cnn;
pub mod split;

use std::cell::OnceCell;
use std::sync::Mutex;

use burn::module::{AutodiffModule, Module};
use burn::nn::loss::CrossEntropyLossConfig;
use burn::optim::{AdamConfig, GradientsParams, Optimizer};
use burn::tensor::backend::Backend;
use burn::tensor::{ElementConversion, Int, Tensor, TensorData};
use ndarray::Axis;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};
use crate::tensor::{ImageShape, ImageTensor, LabelVector, PreparedImages};

pub use artifact::{load_classifier, save_classifier};
use cnn::{argmax, device, InferenceBackend, SmallCnn, TrainingBackend};
use split::{stratified_split, Split};

const EVAL_BATCH: usize = 256;

/// The backend RNG is process-wide; seeding and parameter initialisation
/// happen under this lock.
static INIT_LOCK: Mutex<()> = Mutex::new(());

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub epochs: usize,
    pub batch_size: usize,
    /// Share of rows held out for the final evaluation.
    pub test_fraction: f64,
    /// Share of the training partition held out for per-epoch validation.
    pub validation_fraction: f64,
    pub learning_rate: f32,
    pub seed: u64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            epochs: 5,
            batch_size: 32,
            test_fraction: 0.2,
            validation_fraction: 0.1,
            learning_rate: 0.001,
            seed: 42,
        }
    }
}

impl TrainingConfig {
    /// Reject settings that would return an untrained or unusable model.
    pub fn validate(&self) -> Result<()> {
        let problem = if self.epochs == 0 {
            "epochs must be at least 1"
        } else if self.batch_size == 0 {
            "batch_size must be at least 1"
        } else if !self.learning_rate.is_finite() || self.learning_rate <= 0.0 {
            "learning_rate must be positive"
        } else if !(0.0..1.0).contains(&self.test_fraction) {
            "test_fraction must lie in [0, 1)"
        } else if !(0.0..1.0).contains(&self.validation_fraction) {
            "validation_fraction must lie in [0, 1)"
        } else {
            return Ok(());
        };
        Err(PipelineError::InvalidConfig(problem.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EpochMetrics {
    /// 1-based.
    pub epoch: usize,
    pub loss: f32,
    pub train_accuracy: f32,
    pub validation_accuracy: Option<f32>,
}

/// A trained network together with what is needed to interpret its output.
#[derive(Debug, Clone)]
pub struct TrainedClassifier {
    pub network: SmallCnn<InferenceBackend>,
    /// Original label value of each output index.
    pub classes: Vec<i64>,
    pub history: Vec<EpochMetrics>,
    /// Accuracy on the held-out test partition.
    pub test_accuracy: f32,
}

impl TrainedClassifier {
    pub fn input_shape(&self) -> ImageShape {
        self.network.input_shape()
    }

    pub fn num_classes(&self) -> usize {
        self.classes.len()
    }

    /// Predicted original label value for every image.
    pub fn predict(&self, images: &ImageTensor) -> Result<Vec<i64>> {
        let device = device();
        let mut out = Vec::with_capacity(images.len());
        for start in (0..images.len()).step_by(EVAL_BATCH) {
            let end = (start + EVAL_BATCH).min(images.len());
            let batch = images.data.slice(ndarray::s![start..end, .., .., ..]);
            for index in self.network.predict_indices(batch, &device)? {
                let class = self
                    .classes
                    .get(index)
                    .copied()
                    .ok_or(PipelineError::InvalidLabelSpace {
                        classes: self.classes.len(),
                    })?;
                out.push(class);
            }
        }
        Ok(out)
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// Holds the most recent model for the lifetime of a user session.
///
/// Owned by the caller and handed to [`Trainer::train_into`]; nothing here is
/// global.
#[derive(Debug, Default)]
pub struct Session {
    model: Option<TrainedClassifier>,
    source: Option<String>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn model(&self) -> Option<&TrainedClassifier> {
        self.model.as_ref()
    }

    /// Object name the current model was trained on.
    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    pub fn is_ready(&self) -> bool {
        self.model.is_some()
    }

    /// Replace the held model, returning the previous one.
    pub fn store(
        &mut self,
        model: TrainedClassifier,
        source: impl Into<String>,
    ) -> Option<TrainedClassifier> {
        self.source = Some(source.into());
        self.model.replace(model)
    }

    pub fn take(&mut self) -> Option<TrainedClassifier> {
        self.source = None;
        self.model.take()
    }

    pub fn clear(&mut self) {
        self.take();
    }
}

// ---------------------------------------------------------------------------
// Trainer
// ---------------------------------------------------------------------------

/// Creates freshly initialised networks for a given input geometry.
#[derive(Debug)]
pub struct ModelBuilder {
    seed: u64,
}

impl ModelBuilder {
    fn new(seed: u64) -> Self {
        log::info!("Initialising CNN model builder (seed {seed})");
        Self { seed }
    }

    /// A seeded network plus the RNG that drives splitting and shuffling.
    fn build(&self, input: ImageShape, num_classes: usize) -> (SmallCnn<TrainingBackend>, ChaCha8Rng) {
        let device = device();
        let network = {
            let _guard = INIT_LOCK.lock().unwrap_or_else(|e| e.into_inner());
            TrainingBackend::seed(self.seed);
            let network = SmallCnn::<TrainingBackend>::new(input, num_classes, &device);
            // Parameters initialise lazily; touch them while the seed is held.
            let warmup = Tensor::zeros([1, input.channels, input.height, input.width], &device);
            let _ = network.forward(warmup);
            network
        };
        log::debug!(
            "Built SmallCnn for {input} → {num_classes} classes ({} parameters)",
            network.num_params()
        );
        (network, ChaCha8Rng::seed_from_u64(self.seed))
    }
}

#[derive(Debug, Default)]
pub struct Trainer {
    config: TrainingConfig,
    builder: OnceCell<ModelBuilder>,
}

impl Trainer {
    pub fn new(config: TrainingConfig) -> Self {
        Self {
            config,
            builder: OnceCell::new(),
        }
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    /// Change the hyper-parameters used by the next run. The model builder is
    /// rebuilt on the following `train` if the seed changed.
    pub fn set_config(&mut self, config: TrainingConfig) {
        if config.seed != self.config.seed {
            self.builder = OnceCell::new();
        }
        self.config = config;
    }

    /// Whether a `train` call has created the model builder yet.
    pub fn is_initialised(&self) -> bool {
        self.builder.get().is_some()
    }

    pub fn train_prepared(&self, prepared: &PreparedImages) -> Result<TrainedClassifier> {
        self.train(&prepared.images, &prepared.labels, prepared.num_classes)
    }

    /// Train on `prepared` and keep the result in `session`.
    pub fn train_into<'s>(
        &self,
        session: &'s mut Session,
        source: &str,
        prepared: &PreparedImages,
    ) -> Result<&'s TrainedClassifier> {
        let model = self.train_prepared(prepared)?;
        session.store(model, source);
        session
            .model()
            .ok_or_else(|| PipelineError::InsufficientData("session lost the trained model".into()))
    }

    /// Fit a fresh network and evaluate it on a held-out partition.
    ///
    /// Blocks until every epoch has run.
    pub fn train(
        &self,
        images: &ImageTensor,
        labels: &LabelVector,
        num_classes: usize,
    ) -> Result<TrainedClassifier> {
        if num_classes < 2 {
            return Err(PipelineError::InvalidLabelSpace {
                classes: num_classes,
            });
        }
        self.config.validate()?;
        if images.len() != labels.len() {
            return Err(PipelineError::Table(format!(
                "{} images but {} labels",
                images.len(),
                labels.len()
            )));
        }
        if labels.indices.iter().any(|&i| i >= num_classes) {
            return Err(PipelineError::InvalidLabelSpace {
                classes: num_classes,
            });
        }

        let cfg = &self.config;
        let builder = self.builder.get_or_init(|| ModelBuilder::new(cfg.seed));
        let (mut network, mut rng) = builder.build(images.shape(), num_classes);

        let rows: Vec<usize> = (0..images.len()).collect();
        let Split {
            train: fit_rows,
            held_out: test,
        } = stratified_split(&rows, &labels.indices, cfg.test_fraction, &mut rng);
        if test.is_empty() {
            return Err(PipelineError::InsufficientData(format!(
                "{} rows leave no held-out test rows",
                rows.len()
            )));
        }
        let Split {
            train: mut train_rows,
            held_out: validation,
        } = stratified_split(&fit_rows, &labels.indices, cfg.validation_fraction, &mut rng);
        if train_rows.is_empty() {
            return Err(PipelineError::InsufficientData("no rows left to train on".into()));
        }

        log::info!(
            "Training on {} rows ({} validation, {} test), {} epochs, batch {}",
            train_rows.len(),
            validation.len(),
            test.len(),
            cfg.epochs,
            cfg.batch_size
        );

        let device = device();
        let loss_fn = CrossEntropyLossConfig::new().init::<TrainingBackend>(&device);
        let mut optimizer = AdamConfig::new()
            .with_epsilon(1e-7)
            .init::<TrainingBackend, SmallCnn<TrainingBackend>>();
        let mut history = Vec::with_capacity(cfg.epochs);
        for epoch in 1..=cfg.epochs {
            train_rows.shuffle(&mut rng);
            let mut loss_sum = 0.0;
            let mut correct = 0usize;

            for batch in train_rows.chunks(cfg.batch_size) {
                let x = network.to_input(images.data.select(Axis(0), batch).view(), &device)?;
                let targets: Vec<i64> = batch.iter().map(|&r| labels.indices[r] as i64).collect();
                let y = Tensor::<TrainingBackend, 1, Int>::from_data(
                    TensorData::new(targets.clone(), [batch.len()]),
                    &device,
                );

                let logits = network.forward(x);
                let loss = loss_fn.forward(logits.clone(), y);
                let batch_loss: f32 = loss.clone().into_scalar().elem();
                loss_sum += batch_loss * batch.len() as f32;
                correct += argmax(logits)
                    .iter()
                    .zip(&targets)
                    .filter(|(p, t)| **p as i64 == **t)
                    .count();

                let grads = GradientsParams::from_grads(loss.backward(), &network);
                network = optimizer.step(f64::from(cfg.learning_rate), network, grads);
            }

            let validation_accuracy = if validation.is_empty() {
                None
            } else {
                Some(accuracy(&network.valid(), images, labels, &validation)?)
            };
            let metrics = EpochMetrics {
                epoch,
                loss: loss_sum / train_rows.len() as f32,
                train_accuracy: correct as f32 / train_rows.len() as f32,
                validation_accuracy,
            };
            log::info!(
                "Epoch {}/{}: loss {:.4}, accuracy {:.3}, validation {}",
                epoch,
                cfg.epochs,
                metrics.loss,
                metrics.train_accuracy,
                metrics
                    .validation_accuracy
                    .map_or_else(|| "n/a".to_string(), |a| format!("{a:.3}"))
            );
            history.push(metrics);
        }

        let network = network.valid();
        let test_accuracy = accuracy(&network, images, labels, &test)?;
        log::info!("Test accuracy: {test_accuracy:.3}");

        Ok(TrainedClassifier {
            network,
            classes: labels.classes.clone(),
            history,
            test_accuracy,
        })
    }
}

/// Fraction of `rows` whose predicted index matches the label.
fn accuracy(
    network: &SmallCnn<InferenceBackend>,
    images: &ImageTensor,
    labels: &LabelVector,
    rows: &[usize],
) -> Result<f32> {
    let device = device();
    let mut correct = 0usize;
    for chunk in rows.chunks(EVAL_BATCH) {
        correct += network
            .predict_indices(images.data.select(Axis(0), chunk).view(), &device)?
            .iter()
            .zip(chunk)
            .filter(|(p, &r)| **p == labels.indices[r])
            .count();
    }
    Ok(correct as f32 / rows.len().max(1) as f32)
}
