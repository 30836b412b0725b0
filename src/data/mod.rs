/// Data layer: table model, loading, classification, normalization, statistics.
///
/// Architecture:
/// ```text
///  BlobStore object (.csv / .json / .parquet)
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  fetch + parse → RawTable, cached per object name
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  schema   │  RawTable → DatasetKind (ImagePixel / Metadata / Unknown)
///   └──────────┘
///        │
///        ▼
///   ┌───────────┐
///   │ normalize  │  categorical codes → display labels, columns renamed
///   └───────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  stats    │  describe, value counts, missing values, correlation
///   └──────────┘
/// ```

pub mod loader;
pub mod model;
pub mod normalize;
pub mod schema;
pub mod stats;
