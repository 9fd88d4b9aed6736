use std::collections::HashMap as StdHashMap;
use std::path::{Path, PathBuf};

use super::StoreError;

/// Blob sink for uploaded artwork images.
pub trait ObjectStore: Send + Sync {
    /// Persist `bytes` under `key` and return the key it was stored as.
    fn put(&self, key: &str, bytes: &[u8]) -> Result<String, StoreError>;
}

fn sanitize_key(s: &str) -> String {
    s.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

/// Objects as files under a root folder.
#[derive(Debug, Clone)]
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    pub fn new(root: impl AsRef<Path>) -> Result<Self, StoreError> {
        let root = root.as_ref().to_path_buf();
        std::fs::create_dir_all(&root).map_err(|e| StoreError::io(&root, e))?;
        Ok(Self { root })
    }

    pub fn root_path(&self) -> &Path { &self.root }
}

impl ObjectStore for FsObjectStore {
    fn put(&self, key: &str, bytes: &[u8]) -> Result<String, StoreError> {
        let stored = sanitize_key(key);
        let path = self.root.join(&stored);
        let tmp = self.root.join(format!(".{}.tmp", stored));
        std::fs::write(&tmp, bytes).map_err(|e| StoreError::io(&tmp, e))?;
        std::fs::rename(&tmp, &path).map_err(|e| StoreError::io(&path, e))?;
        Ok(stored)
    }
}

/// Objects kept in a map; used when no data folder is configured and in tests.
#[derive(Default)]
pub struct MemoryObjectStore {
    objects: parking_lot::RwLock<StdHashMap<String, Vec<u8>>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self { Self::default() }

    pub fn get(&self, key: &str) -> Option<Vec<u8>> { self.objects.read().get(key).cloned() }

    pub fn len(&self) -> usize { self.objects.read().len() }

    pub fn is_empty(&self) -> bool { self.objects.read().is_empty() }
}

impl ObjectStore for MemoryObjectStore {
    fn put(&self, key: &str, bytes: &[u8]) -> Result<String, StoreError> {
        let stored = sanitize_key(key);
        self.objects.write().insert(stored.clone(), bytes.to_vec());
        Ok(stored)
    }
}
