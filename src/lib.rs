//! Dataset pipeline for the HMNIST / HAM10000 explorer.
//!
//! ```text
//!   BlobStore ──► DatasetLoader ──► classify ─┬─► normalize ──► stats
//!                 (cached RawTable)           │
//!                                             └─► prepare ──► Trainer ──► TrainedClassifier ──► BlobStore
//! ```

pub mod config;
pub mod data;
pub mod error;
pub mod store;
pub mod tensor;
pub mod train;

pub use config::Config;
pub use data::loader::DatasetLoader;
pub use data::model::{CellValue, Column, RawTable};
pub use data::normalize::normalize;
pub use data::schema::{classify, DatasetKind};
pub use error::{PipelineError, Result};
pub use store::{BlobStore, StoreError};
pub use tensor::{prepare, ChannelLayout, ImageShape, ImageTensor, LabelVector, PreparedImages};
pub use train::{Session, TrainedClassifier, Trainer, TrainingConfig};
