use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::schema::FileRecord;
use crate::error::{ContentError, Result};

/// Records returned by [`Ledger::get_all`] when no usable limit is given.
pub const DEFAULT_LIST_LIMIT: usize = 50;

/// Durable ledger of uploaded files, backed by one JSON document.
///
/// Every operation reloads the whole document before acting and mutations
/// rewrite it in full. Clones share one writer lock, so all mutations issued
/// through one handle are serialized. Two ledgers opened independently on the
/// same path are NOT coordinated: overlapping mutations are last-writer-wins
/// and one of them can be lost. Open the ledger once per process and pass the
/// handle around.
#[derive(Debug, Clone)]
pub struct Ledger {
    path: Arc<PathBuf>,
    writer: Arc<Mutex<()>>,
}

impl Ledger {
    /// Open (or prepare) the ledger at `path`.
    ///
    /// A missing file is a fresh, empty ledger. A file that exists but cannot
    /// be read or parsed fails here rather than being treated as empty.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| ContentError::persistence(parent, e))?;
        }

        let ledger = Self {
            path: Arc::new(path),
            writer: Arc::new(Mutex::new(())),
        };
        let records = ledger.load().await?.len();
        info!(path = %ledger.path.display(), records, "Opened file ledger");
        Ok(ledger)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append a record and persist.
    ///
    /// Ids are not required to be unique; a colliding id is kept and logged.
    pub async fn add(&self, record: FileRecord) -> Result<()> {
        record.validate()?;

        let _writer = self.writer.lock().await;
        let mut records = self.load().await?;
        if records.iter().any(|r| r.id == record.id) {
            warn!(id = %record.id, "Ledger already holds a record with this id, keeping both");
        }
        records.push(record);
        self.persist(&records).await?;
        debug!(total = records.len(), "File record added");
        Ok(())
    }

    /// The `limit` most recently added records, newest first.
    /// `None` and `Some(0)` fall back to [`DEFAULT_LIST_LIMIT`].
    pub async fn get_all(&self, limit: Option<usize>) -> Result<Vec<FileRecord>> {
        let limit = effective_limit(limit);
        let records = self.load().await?;
        debug!(total = records.len(), limit, "Listing file records");
        Ok(records.into_iter().rev().take(limit).collect())
    }

    /// Every record in the order it was added, oldest first.
    pub async fn all(&self) -> Result<Vec<FileRecord>> {
        self.load().await
    }

    pub async fn get_by_id(&self, id: &str) -> Result<Option<FileRecord>> {
        let records = self.load().await?;
        Ok(records.into_iter().find(|r| r.id == id))
    }

    /// Remove the first record with `id`. Returns whether one was found.
    pub async fn delete(&self, id: &str) -> Result<bool> {
        Ok(self.take(id).await?.is_some())
    }

    /// Remove the first record with `id` and hand it back.
    /// The backing file is only rewritten when something was removed.
    pub async fn take(&self, id: &str) -> Result<Option<FileRecord>> {
        let _writer = self.writer.lock().await;
        let mut records = self.load().await?;
        let Some(pos) = records.iter().position(|r| r.id == id) else {
            return Ok(None);
        };
        let removed = records.remove(pos);
        self.persist(&records).await?;
        debug!(id, remaining = records.len(), "File record deleted");
        Ok(Some(removed))
    }

    pub async fn len(&self) -> Result<usize> {
        Ok(self.load().await?.len())
    }

    pub async fn is_empty(&self) -> Result<bool> {
        Ok(self.len().await? == 0)
    }

    async fn load(&self) -> Result<Vec<FileRecord>> {
        let raw = match fs::read(self.path.as_path()).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(ContentError::persistence(&self.path, e)),
        };
        if raw.iter().all(u8::is_ascii_whitespace) {
            return Ok(Vec::new());
        }
        serde_json::from_slice(&raw).map_err(|source| ContentError::Corrupt {
            path: self.path.to_path_buf(),
            source,
        })
    }

    /// Write to a uniquely named sibling, then rename over the ledger file.
    async fn persist(&self, records: &[FileRecord]) -> Result<()> {
        let body = serde_json::to_vec_pretty(records).map_err(ContentError::Encode)?;
        let staging = staging_path(&self.path);

        if let Err(e) = fs::write(&staging, &body).await {
            return Err(ContentError::persistence(&staging, e));
        }
        if let Err(e) = fs::rename(&staging, self.path.as_path()).await {
            let _ = fs::remove_file(&staging).await;
            return Err(ContentError::persistence(&self.path, e));
        }
        Ok(())
    }
}

fn effective_limit(limit: Option<usize>) -> usize {
    match limit {
        Some(n) if n > 0 => n,
        _ => DEFAULT_LIST_LIMIT,
    }
}

fn staging_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "ledger".to_string());
    path.with_file_name(format!(".{name}.{}.tmp", Uuid::new_v4().simple()))
}
