use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use super::{validate_name, BlobStore, StoreError};

type Buckets = BTreeMap<String, BTreeMap<String, Vec<u8>>>;

/// In-process object store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    buckets: Mutex<Buckets>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Convenience for seeding: creates the bucket if needed, then stores the object.
    pub fn with_object(self, bucket: &str, object: &str, data: impl Into<Vec<u8>>) -> Self {
        self.lock()
            .entry(bucket.to_string())
            .or_default()
            .insert(object.to_string(), data.into());
        self
    }

    fn lock(&self) -> MutexGuard<'_, Buckets> {
        // A poisoned map is still structurally valid.
        self.buckets.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl BlobStore for MemoryStore {
    fn list_buckets(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.lock().keys().cloned().collect())
    }

    fn bucket_exists(&self, bucket: &str) -> Result<bool, StoreError> {
        Ok(self.lock().contains_key(bucket))
    }

    fn make_bucket(&self, bucket: &str) -> Result<(), StoreError> {
        validate_name(bucket)?;
        self.lock().entry(bucket.to_string()).or_default();
        Ok(())
    }

    fn get_object(&self, bucket: &str, object: &str) -> Result<Vec<u8>, StoreError> {
        let buckets = self.lock();
        let objects = buckets
            .get(bucket)
            .ok_or_else(|| StoreError::NoSuchBucket(bucket.to_string()))?;
        objects
            .get(object)
            .cloned()
            .ok_or_else(|| StoreError::NoSuchObject {
                bucket: bucket.to_string(),
                object: object.to_string(),
            })
    }

    fn put_object(&self, bucket: &str, object: &str, data: &[u8]) -> Result<(), StoreError> {
        validate_name(object)?;
        let mut buckets = self.lock();
        let objects = buckets
            .get_mut(bucket)
            .ok_or_else(|| StoreError::NoSuchBucket(bucket.to_string()))?;
        objects.insert(object.to_string(), data.to_vec());
        Ok(())
    }
}
