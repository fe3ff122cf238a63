use std::io;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use tokio::fs;
use tracing::debug;

use super::schema::random_suffix;
use crate::error::{ContentError, Result};

/// Out-of-band storage for uploaded binary payloads.
///
/// The ledger only ever keeps the key returned by [`BlobStore::put`].
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store `data` under `folder` and return its key,
    /// `{folder}/{unix_millis}-{random}.{ext}`.
    async fn put(&self, folder: &str, filename: &str, data: &[u8], content_type: &str) -> Result<String>;

    async fn get(&self, key: &str) -> Result<Vec<u8>>;

    /// Remove a blob. Deleting a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<()>;
}

/// Blob store on the local filesystem.
#[derive(Debug, Clone)]
pub struct LocalBlobStore {
    base_dir: PathBuf,
}

impl LocalBlobStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    /// Absolute path for a key. Keys that would escape the base directory are
    /// rejected.
    pub fn absolute_path(&self, key: &str) -> Result<PathBuf> {
        let rel = Path::new(key);
        let safe = !key.is_empty() && rel.components().all(|c| matches!(c, Component::Normal(_)));
        if !safe {
            return Err(ContentError::validation(format!("invalid blob key: {key:?}")));
        }
        Ok(self.base_dir.join(rel))
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn put(&self, folder: &str, filename: &str, data: &[u8], content_type: &str) -> Result<String> {
        let ext = Path::new(filename)
            .extension()
            .and_then(|e| e.to_str())
            .filter(|e| !e.is_empty() && e.chars().all(|c| c.is_ascii_alphanumeric()))
            .unwrap_or("bin")
            .to_ascii_lowercase();
        let key = format!(
            "{folder}/{}-{}.{ext}",
            Utc::now().timestamp_millis(),
            random_suffix()
        );

        let abs_path = self.absolute_path(&key)?;
        if let Some(dir) = abs_path.parent() {
            fs::create_dir_all(dir)
                .await
                .map_err(|e| ContentError::blob(&key, e))?;
        }
        fs::write(&abs_path, data)
            .await
            .map_err(|e| ContentError::blob(&key, e))?;

        debug!(key = %key, bytes = data.len(), content_type, "Stored blob");
        Ok(key)
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        let abs_path = self.absolute_path(key)?;
        fs::read(&abs_path).await.map_err(|e| ContentError::blob(key, e))
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let abs_path = self.absolute_path(key)?;
        match fs::remove_file(&abs_path).await {
            Ok(()) => {
                debug!(key, "Deleted blob");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ContentError::blob(key, e)),
        }
    }
}
