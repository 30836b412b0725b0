/// Object storage addressed by (bucket, object name).
///
/// ```text
///   MemoryStore   in-process map (tests, offline demo)
///   FsStore       <root>/<bucket>/<object>
///   S3Store       path-style S3 over HTTP (MinIO), SigV4 signed
/// ```

pub mod fs;
pub mod memory;
pub mod s3;

use thiserror::Error;

pub use fs::FsStore;
pub use memory::MemoryStore;
pub use s3::S3Store;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("bucket '{0}' does not exist")]
    NoSuchBucket(String),

    #[error("object '{bucket}/{object}' does not exist")]
    NoSuchObject { bucket: String, object: String },

    #[error("store unreachable: {0}")]
    Unreachable(String),

    #[error("invalid object or bucket name '{0}'")]
    InvalidName(String),

    #[error("store responded with HTTP {status}: {message}")]
    Backend { status: u16, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid store configuration: {0}")]
    Config(String),
}

/// Minimal key-value blob service the pipeline depends on.
pub trait BlobStore {
    fn list_buckets(&self) -> Result<Vec<String>, StoreError>;

    fn bucket_exists(&self, bucket: &str) -> Result<bool, StoreError>;

    fn make_bucket(&self, bucket: &str) -> Result<(), StoreError>;

    fn get_object(&self, bucket: &str, object: &str) -> Result<Vec<u8>, StoreError>;

    fn put_object(&self, bucket: &str, object: &str, data: &[u8]) -> Result<(), StoreError>;

    /// Create `bucket` unless it already exists. Returns whether it was created.
    fn ensure_bucket(&self, bucket: &str) -> Result<bool, StoreError> {
        if self.bucket_exists(bucket)? {
            return Ok(false);
        }
        log::info!("Creating bucket '{bucket}'");
        self.make_bucket(bucket)?;
        Ok(true)
    }
}

impl<T: BlobStore + ?Sized> BlobStore for &T {
    fn list_buckets(&self) -> Result<Vec<String>, StoreError> {
        (**self).list_buckets()
    }
    fn bucket_exists(&self, bucket: &str) -> Result<bool, StoreError> {
        (**self).bucket_exists(bucket)
    }
    fn make_bucket(&self, bucket: &str) -> Result<(), StoreError> {
        (**self).make_bucket(bucket)
    }
    fn get_object(&self, bucket: &str, object: &str) -> Result<Vec<u8>, StoreError> {
        (**self).get_object(bucket, object)
    }
    fn put_object(&self, bucket: &str, object: &str, data: &[u8]) -> Result<(), StoreError> {
        (**self).put_object(bucket, object, data)
    }
}

impl<T: BlobStore + ?Sized> BlobStore for Box<T> {
    fn list_buckets(&self) -> Result<Vec<String>, StoreError> {
        (**self).list_buckets()
    }
    fn bucket_exists(&self, bucket: &str) -> Result<bool, StoreError> {
        (**self).bucket_exists(bucket)
    }
    fn make_bucket(&self, bucket: &str) -> Result<(), StoreError> {
        (**self).make_bucket(bucket)
    }
    fn get_object(&self, bucket: &str, object: &str) -> Result<Vec<u8>, StoreError> {
        (**self).get_object(bucket, object)
    }
    fn put_object(&self, bucket: &str, object: &str, data: &[u8]) -> Result<(), StoreError> {
        (**self).put_object(bucket, object, data)
    }
}

/// Reject names that would escape a bucket when mapped onto a path.
pub(crate) fn validate_name(name: &str) -> Result<(), StoreError> {
    let bad = name.is_empty()
        || name.starts_with('/')
        || name.contains('\\')
        || name.split('/').any(|seg| seg.is_empty() || seg == "." || seg == "..");
    if bad {
        return Err(StoreError::InvalidName(name.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validates_names() {
        assert!(validate_name("hmnist_8_8_L.csv").is_ok());
        assert!(validate_name("nested/dir/file.csv").is_ok());
        assert!(validate_name("../etc/passwd").is_err());
        assert!(validate_name("/abs").is_err());
        assert!(validate_name("a//b").is_err());
        assert!(validate_name("").is_err());
    }

    #[test]
    fn ensure_bucket_creates_once() {
        let store = MemoryStore::new();
        assert!(store.ensure_bucket("models").unwrap());
        assert!(!store.ensure_bucket("models").unwrap());
        assert!(store.bucket_exists("models").unwrap());
    }
}
