use thiserror::Error;

use crate::store::StoreError;

/// Result alias used throughout the pipeline.
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Everything that can go wrong between fetching an object and saving a model.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The store or the dataset bucket is not reachable. Retry by re-selecting.
    #[error("object store unavailable: {0}")]
    StoreUnavailable(String),

    /// Fetching or parsing an object failed. Retry by re-selecting.
    #[error("failed to load '{object}': {cause}")]
    Load { object: String, cause: String },

    /// The pixel columns do not form any image geometry.
    #[error("{columns} pixel columns do not form a known image geometry")]
    Shape { columns: usize },

    /// Training needs at least two distinct labels.
    #[error("training needs at least two classes, found {classes}")]
    InvalidLabelSpace { classes: usize },

    #[error("missing column '{0}'")]
    MissingColumn(String),

    #[error("row {row}, column '{column}': '{value}' is not a valid number")]
    InvalidValue {
        row: usize,
        column: String,
        value: String,
    },

    #[error("malformed table: {0}")]
    Table(String),

    #[error("not enough data: {0}")]
    InsufficientData(String),

    /// Hyper-parameters that cannot produce a trained model.
    #[error("invalid training configuration: {0}")]
    InvalidConfig(String),

    #[error("tensor shape error: {0}")]
    Tensor(#[from] ndarray::ShapeError),

    #[error("failed to persist model: {0}")]
    Persist(String),
}

impl PipelineError {
    /// Whether the user can recover by retrying the triggering action.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::StoreUnavailable(_) | Self::Load { .. })
    }

    /// Classify a store failure raised while fetching `object`.
    pub(crate) fn from_fetch(object: &str, err: StoreError) -> Self {
        match err {
            StoreError::NoSuchBucket(bucket) => {
                Self::StoreUnavailable(format!("bucket '{bucket}' does not exist yet"))
            }
            StoreError::Unreachable(msg) => Self::StoreUnavailable(msg),
            other => Self::Load {
                object: object.to_string(),
                cause: other.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_bucket_is_store_unavailable() {
        let err = PipelineError::from_fetch("a.csv", StoreError::NoSuchBucket("datasets".into()));
        assert!(matches!(err, PipelineError::StoreUnavailable(_)));
        assert!(err.is_recoverable());
    }

    #[test]
    fn missing_object_is_load_error() {
        let err = PipelineError::from_fetch(
            "a.csv",
            StoreError::NoSuchObject {
                bucket: "datasets".into(),
                object: "a.csv".into(),
            },
        );
        assert!(matches!(err, PipelineError::Load { ref object, .. } if object == "a.csv"));
    }

    #[test]
    fn shape_and_label_errors_are_fatal() {
        assert!(!PipelineError::Shape { columns: 101 }.is_recoverable());
        assert!(!PipelineError::InvalidLabelSpace { classes: 1 }.is_recoverable());
        assert!(!PipelineError::InvalidConfig("epochs must be at least 1".into()).is_recoverable());
    }
}
