use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use super::{validate_name, BlobStore, StoreError};

/// Directory-backed store: `<root>/<bucket>/<object>`.
#[derive(Debug, Clone)]
pub struct FsStore {
    root: PathBuf,
}

impl FsStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn bucket_path(&self, bucket: &str) -> Result<PathBuf, StoreError> {
        validate_name(bucket)?;
        if bucket.contains('/') {
            return Err(StoreError::InvalidName(bucket.to_string()));
        }
        Ok(self.root.join(bucket))
    }
}

impl BlobStore for FsStore {
    fn list_buckets(&self) -> Result<Vec<String>, StoreError> {
        let entries = std::fs::read_dir(&self.root).map_err(|e| {
            StoreError::Unreachable(format!("cannot read store root '{}': {e}", self.root.display()))
        })?;
        let mut names = Vec::new();
        for entry in entries {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();
        Ok(names)
    }

    fn bucket_exists(&self, bucket: &str) -> Result<bool, StoreError> {
        Ok(self.bucket_path(bucket)?.is_dir())
    }

    fn make_bucket(&self, bucket: &str) -> Result<(), StoreError> {
        std::fs::create_dir_all(self.bucket_path(bucket)?)?;
        Ok(())
    }

    fn get_object(&self, bucket: &str, object: &str) -> Result<Vec<u8>, StoreError> {
        let dir = self.bucket_path(bucket)?;
        validate_name(object)?;
        if !dir.is_dir() {
            return Err(StoreError::NoSuchBucket(bucket.to_string()));
        }
        match std::fs::read(dir.join(object)) {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(StoreError::NoSuchObject {
                bucket: bucket.to_string(),
                object: object.to_string(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    fn put_object(&self, bucket: &str, object: &str, data: &[u8]) -> Result<(), StoreError> {
        let dir = self.bucket_path(bucket)?;
        validate_name(object)?;
        if !dir.is_dir() {
            return Err(StoreError::NoSuchBucket(bucket.to_string()));
        }
        let path = dir.join(object);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, data)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn round_trips_nested_objects() {
        let dir = tempdir().unwrap();
        let store = FsStore::new(dir.path());

        assert!(!store.bucket_exists("datasets").unwrap());
        store.make_bucket("datasets").unwrap();
        store.put_object("datasets", "raw/a.csv", b"label\n1\n").unwrap();

        assert_eq!(store.get_object("datasets", "raw/a.csv").unwrap(), b"label\n1\n");
        assert_eq!(store.list_buckets().unwrap(), vec!["datasets".to_string()]);
    }

    #[test]
    fn distinguishes_missing_bucket_and_object() {
        let dir = tempdir().unwrap();
        let store = FsStore::new(dir.path());

        let err = store.get_object("datasets", "a.csv").unwrap_err();
        assert!(matches!(err, StoreError::NoSuchBucket(_)));

        store.make_bucket("datasets").unwrap();
        let err = store.get_object("datasets", "a.csv").unwrap_err();
        assert!(matches!(err, StoreError::NoSuchObject { .. }));
    }

    #[test]
    fn rejects_escaping_names() {
        let dir = tempdir().unwrap();
        let store = FsStore::new(dir.path());
        store.make_bucket("datasets").unwrap();
        assert!(matches!(
            store.put_object("datasets", "../x", b"").unwrap_err(),
            StoreError::InvalidName(_)
        ));
        assert!(store.make_bucket("a/b").is_err());
    }

    #[test]
    fn missing_root_is_unreachable() {
        let store = FsStore::new("/definitely/not/here/hmnist-store");
        assert!(matches!(store.list_buckets().unwrap_err(), StoreError::Unreachable(_)));
    }
}
