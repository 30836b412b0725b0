use burn::module::Module;
use burn::record::{BinBytesRecorder, FullPrecisionSettings, Recorder};
use serde::{Deserialize, Serialize};

use super::cnn::{device, InferenceBackend, SmallCnn};
use super::{EpochMetrics, TrainedClassifier};
use crate::error::{PipelineError, Result};
use crate::store::BlobStore;
use crate::tensor::ImageShape;

type WeightsRecorder = BinBytesRecorder<FullPrecisionSettings>;

/// The stored form of a [`TrainedClassifier`]: JSON around the burn record.
#[derive(Serialize, Deserialize)]
struct ClassifierFile {
    input: ImageShape,
    classes: Vec<i64>,
    history: Vec<EpochMetrics>,
    test_accuracy: f32,
    weights: Vec<u8>,
}

fn persist_error(e: impl std::fmt::Display) -> PipelineError {
    PipelineError::Persist(e.to_string())
}

/// Upload `model`, creating `bucket` first if needed.
pub fn save_classifier<S: BlobStore + ?Sized>(
    store: &S,
    bucket: &str,
    object: &str,
    model: &TrainedClassifier,
) -> Result<()> {
    let weights = Recorder::<InferenceBackend>::record(
        &WeightsRecorder::default(),
        model.network.clone().into_record(),
        (),
    )
    .map_err(persist_error)?;
    let file = ClassifierFile {
        input: model.input_shape(),
        classes: model.classes.clone(),
        history: model.history.clone(),
        test_accuracy: model.test_accuracy,
        weights,
    };
    let bytes = serde_json::to_vec(&file).map_err(persist_error)?;

    if store.ensure_bucket(bucket).map_err(persist_error)? {
        log::info!("Created bucket '{bucket}'");
    }
    store
        .put_object(bucket, object, &bytes)
        .map_err(persist_error)?;
    log::info!("Saved model to {bucket}/{object} ({} bytes)", bytes.len());
    Ok(())
}

pub fn load_classifier<S: BlobStore + ?Sized>(
    store: &S,
    bucket: &str,
    object: &str,
) -> Result<TrainedClassifier> {
    let load_error = |cause: String| PipelineError::Load {
        object: object.to_string(),
        cause,
    };
    let bytes = store
        .get_object(bucket, object)
        .map_err(|e| PipelineError::from_fetch(object, e))?;
    let file: ClassifierFile =
        serde_json::from_slice(&bytes).map_err(|e| load_error(e.to_string()))?;

    let device = device();
    let record = Recorder::<InferenceBackend>::load(&WeightsRecorder::default(), file.weights, &device)
        .map_err(|e| load_error(e.to_string()))?;
    let network = SmallCnn::<InferenceBackend>::new(file.input, file.classes.len(), &device)
        .load_record(record);

    Ok(TrainedClassifier {
        network,
        classes: file.classes,
        history: file.history,
        test_accuracy: file.test_accuracy,
    })
}
