//! Blob storage collaborator for the raw upload bytes.
//!
//! The pipeline only needs put/get/delete; the production object store (S3 or
//! similar) binds this trait outside the crate. [`MemoryBlobStore`] backs
//! tests, [`LocalBlobStore`] backs single-machine deployments.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::RwLock;

use crate::error::{ReportError, Result};

pub trait BlobStore: Send + Sync {
    /// Store `bytes` under `key` and return the URL a later `get` resolves.
    fn put(&self, key: &str, bytes: &[u8]) -> Result<String>;

    fn get(&self, url: &str) -> Result<Vec<u8>>;

    /// Remove the blob. Deleting a key that is already gone is not an error.
    fn delete(&self, key: &str) -> Result<()>;
}

#[derive(Default)]
pub struct MemoryBlobStore {
    blobs: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

const MEMORY_URL_PREFIX: &str = "memory://";

impl BlobStore for MemoryBlobStore {
    fn put(&self, key: &str, bytes: &[u8]) -> Result<String> {
        self.blobs
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key.to_string(), bytes.to_vec());
        Ok(format!("{}{}", MEMORY_URL_PREFIX, key))
    }

    fn get(&self, url: &str) -> Result<Vec<u8>> {
        let key = url.strip_prefix(MEMORY_URL_PREFIX).unwrap_or(url);
        self.blobs
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
            .cloned()
            .ok_or_else(|| ReportError::Storage(format!("no blob at {}", url)))
    }

    fn delete(&self, key: &str) -> Result<()> {
        self.blobs
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(key);
        Ok(())
    }
}

/// Directory-backed blob store. Keys map to paths below `root`; the returned
/// URL is the absolute file path.
pub struct LocalBlobStore {
    root: PathBuf,
}

impl LocalBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }
}

impl BlobStore for LocalBlobStore {
    fn put(&self, key: &str, bytes: &[u8]) -> Result<String> {
        let path = self.path_for(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, bytes)?;
        Ok(path.to_string_lossy().to_string())
    }

    fn get(&self, url: &str) -> Result<Vec<u8>> {
        fs::read(url).map_err(|e| ReportError::Storage(format!("{}: {}", url, e)))
    }

    fn delete(&self, key: &str) -> Result<()> {
        let path = self.path_for(key);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ReportError::Storage(format!("{}: {}", path.display(), e))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_round_trip() {
        let store = MemoryBlobStore::new();
        let url = store.put("reports/a.csv", b"A,B\n1,2\n").unwrap();
        assert!(url.starts_with("memory://"));

        let bytes = store.get(&url).unwrap();
        assert_eq!(bytes, b"A,B\n1,2\n");

        store.delete("reports/a.csv").unwrap();
        assert!(store.get(&url).is_err());
        // Double delete stays quiet.
        store.delete("reports/a.csv").unwrap();
    }

    #[test]
    fn test_memory_missing_blob_is_storage_error() {
        let store = MemoryBlobStore::new();
        let err = store.get("memory://reports/ghost.xlsx").unwrap_err();
        assert!(matches!(err, ReportError::Storage(_)));
    }

    #[test]
    fn test_local_round_trip() {
        let root = std::env::temp_dir().join("report-analyzer-blob-test");
        let store = LocalBlobStore::new(&root);

        let url = store.put("nested/q1.csv", b"x").unwrap();
        assert_eq!(store.get(&url).unwrap(), b"x");

        store.delete("nested/q1.csv").unwrap();
        assert!(store.get(&url).is_err());
        store.delete("nested/q1.csv").unwrap();

        let _ = fs::remove_dir_all(&root);
    }
}
