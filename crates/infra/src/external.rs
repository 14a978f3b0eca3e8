//! External collaborators the core talks to but does not implement.

use std::collections::HashSet;
use std::sync::Mutex;

use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StorageError {
    #[error("upload failed: {0}")]
    UploadFailed(String),

    #[error("remove failed: {0}")]
    RemoveFailed(String),
}

/// Image storage. Takes a local file path, returns a public URL.
pub trait ObjectStorage: Send + Sync {
    fn upload(&self, path: &str) -> Result<String, StorageError>;

    /// Delete a previously uploaded object by its public URL.
    fn remove(&self, url: &str) -> Result<(), StorageError>;
}

/// Best-effort removal of uploads whose write was never recorded. Failures
/// are logged, not returned.
pub fn discard_uploads(storage: &dyn ObjectStorage, urls: &[String]) {
    for url in urls {
        if let Err(err) = storage.remove(url) {
            warn!(url, error = %err, "orphaned upload left in storage");
        }
    }
}

/// Deterministic stand-in: URLs are `{base_url}/{file name}`. Individual paths
/// can be marked as failing.
#[derive(Debug)]
pub struct InMemoryObjectStorage {
    base_url: String,
    failing: Mutex<HashSet<String>>,
    uploaded: Mutex<Vec<String>>,
}

impl InMemoryObjectStorage {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            failing: Mutex::new(HashSet::new()),
            uploaded: Mutex::new(Vec::new()),
        }
    }

    pub fn fail_on(&self, path: impl Into<String>) {
        if let Ok(mut failing) = self.failing.lock() {
            failing.insert(path.into());
        }
    }

    pub fn uploaded(&self) -> Vec<String> {
        self.uploaded.lock().map(|u| u.clone()).unwrap_or_default()
    }
}

impl Default for InMemoryObjectStorage {
    fn default() -> Self {
        Self::new("https://cdn.storefront.test")
    }
}

impl ObjectStorage for InMemoryObjectStorage {
    fn upload(&self, path: &str) -> Result<String, StorageError> {
        let should_fail = self
            .failing
            .lock()
            .map_err(|_| StorageError::UploadFailed("storage lock poisoned".to_string()))?
            .contains(path);
        if should_fail {
            return Err(StorageError::UploadFailed(path.to_string()));
        }

        let file_name = path.rsplit(['/', '\\']).next().unwrap_or(path);
        if file_name.is_empty() {
            return Err(StorageError::UploadFailed(format!("no file name in '{path}'")));
        }

        let url = format!("{}/{}", self.base_url, file_name);
        if let Ok(mut uploaded) = self.uploaded.lock() {
            uploaded.push(url.clone());
        }
        Ok(url)
    }

    fn remove(&self, url: &str) -> Result<(), StorageError> {
        let mut uploaded = self
            .uploaded
            .lock()
            .map_err(|_| StorageError::RemoveFailed("storage lock poisoned".to_string()))?;
        match uploaded.iter().position(|u| u == url) {
            Some(i) => {
                uploaded.remove(i);
                Ok(())
            }
            None => Err(StorageError::RemoveFailed(url.to_string())),
        }
    }
}
