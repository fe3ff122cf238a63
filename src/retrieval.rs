//! Upload and question-answering flows over the content index.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::content::describe::{self, NO_FILES_ANSWER};
use crate::content::extract::{extract_text, guess_mime_type, sniff_image_mime};
use crate::content::schema::new_record_id;
use crate::content::{
    BlobStore, ContentType, FileRecord, Ledger, QueryMatch, VectorIndex, VectorRecord,
};
use crate::error::{ContentError, Result};
use crate::providers::{AnswerGenerator, ContentDescriber, EmbeddingProvider, ProviderError};

const DEFAULT_TOP_K: usize = 5;

/// One uploaded file, as received from a client.
#[derive(Debug, Clone)]
pub struct Upload {
    pub kind: ContentType,
    pub filename: String,
    /// MIME type reported by the client, if any.
    pub content_type: Option<String>,
    pub data: Vec<u8>,
}

/// Answer to a question together with the documents it was built from.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Answer {
    pub query: String,
    pub answer: String,
    pub files_analyzed: usize,
    pub sources: Vec<QueryMatch>,
}

/// Owns handles to the ledger, the vector index, blob storage and the model
/// providers. Cheap to clone; construct once at startup and share.
#[derive(Clone)]
pub struct ContentService {
    ledger: Ledger,
    index: VectorIndex,
    blobs: Arc<dyn BlobStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    describer: Arc<dyn ContentDescriber>,
    answerer: Arc<dyn AnswerGenerator>,
    top_k: usize,
    /// Serializes ledger+index mutations against a rebuild of the index.
    index_lock: Arc<Mutex<()>>,
}

impl ContentService {
    pub fn new(
        ledger: Ledger,
        index: VectorIndex,
        blobs: Arc<dyn BlobStore>,
        embedder: Arc<dyn EmbeddingProvider>,
        describer: Arc<dyn ContentDescriber>,
        answerer: Arc<dyn AnswerGenerator>,
    ) -> Self {
        Self {
            ledger,
            index,
            blobs,
            embedder,
            describer,
            answerer,
            top_k: DEFAULT_TOP_K,
            index_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k.max(1);
        self
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn index(&self) -> &VectorIndex {
        &self.index
    }

    /// Store, describe, embed and index an upload.
    ///
    /// Provider calls happen before the ledger or index is touched, so a
    /// failing provider leaves both unchanged. A blob written for a failed
    /// upload is removed again.
    pub async fn ingest(&self, upload: Upload) -> Result<FileRecord> {
        if upload.filename.trim().is_empty() {
            return Err(ContentError::validation("No file name provided"));
        }

        let Some(folder) = upload.kind.blob_folder() else {
            return self.ingest_text(upload).await;
        };

        let mime = self.upload_mime(&upload);
        let key = self
            .blobs
            .put(folder, &upload.filename, &upload.data, &mime)
            .await?;

        let outcome = self.ingest_media(&upload, &key).await;
        if outcome.is_err() {
            if let Err(e) = self.blobs.delete(&key).await {
                warn!(key = %key, error = %e, "Failed to remove blob of a failed upload");
            }
        }
        outcome
    }

    async fn ingest_text(&self, upload: Upload) -> Result<FileRecord> {
        if std::str::from_utf8(&upload.data).is_err() {
            return Err(ContentError::validation("Text upload is not valid UTF-8"));
        }
        // A text upload declared with a media type is still read as plain text.
        let mime = self.upload_mime(&upload);
        let text = extract_text(&upload.data, &mime)
            .or_else(|| extract_text(&upload.data, "text/plain"))
            .ok_or_else(|| ContentError::validation("Text upload is empty"))?;
        let document = self.describer.describe_text(ContentType::Text, &text).await?;
        let embedding = self.embed(&document).await?;

        let timestamp = Utc::now();
        let record = FileRecord {
            id: new_record_id(ContentType::Text, timestamp),
            kind: ContentType::Text,
            filename: upload.filename,
            media_url: None,
            text_content: Some(text),
            timestamp,
        };
        self.commit(record, embedding, document).await
    }

    async fn ingest_media(&self, upload: &Upload, key: &str) -> Result<FileRecord> {
        let timestamp = Utc::now();
        let document = self
            .describe_media(upload.kind, &upload.filename, &upload.data, timestamp)
            .await?;
        let embedding = self.embed(&document).await?;

        let record = FileRecord {
            id: new_record_id(upload.kind, timestamp),
            kind: upload.kind,
            filename: upload.filename.clone(),
            media_url: Some(key.to_string()),
            text_content: None,
            timestamp,
        };
        self.commit(record, embedding, document).await
    }

    async fn describe_media(
        &self,
        kind: ContentType,
        filename: &str,
        data: &[u8],
        uploaded_at: DateTime<Utc>,
    ) -> Result<String> {
        let document = match kind {
            ContentType::Image => self.describer.describe_image(data).await?,
            ContentType::Pdf => match extract_text(data, "application/pdf") {
                Some(text) => self.describer.describe_text(ContentType::Pdf, &text).await?,
                None => describe::synthetic_description(kind, filename, data.len(), uploaded_at),
            },
            ContentType::Video | ContentType::Text => {
                describe::synthetic_description(kind, filename, data.len(), uploaded_at)
            }
        };
        Ok(document)
    }

    /// Persist to the ledger, then index. An index rejection after the ledger
    /// write rolls the ledger entry back.
    async fn commit(&self, record: FileRecord, embedding: Vec<f32>, document: String) -> Result<FileRecord> {
        self.index.check_embedding(&embedding)?;
        let _guard = self.index_lock.lock().await;
        self.ledger.add(record.clone()).await?;

        if let Err(e) = self
            .index
            .insert(VectorRecord::for_file(&record, embedding, document))
        {
            if let Err(rollback) = self.ledger.delete(&record.id).await {
                warn!(id = %record.id, error = %rollback, "Failed to roll back ledger entry");
            }
            return Err(e);
        }

        info!(id = %record.id, kind = %record.kind, filename = %record.filename, "File ingested");
        Ok(record)
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let embedding = self.embedder.embed(text).await?;
        if embedding.is_empty() || embedding.iter().any(|v| !v.is_finite()) {
            return Err(ProviderError::InvalidResponse {
                model: "embedding provider".to_string(),
                reason: "returned an empty or non-finite embedding".to_string(),
            }
            .into());
        }
        Ok(embedding)
    }

    fn upload_mime(&self, upload: &Upload) -> String {
        if let Some(mime) = upload.content_type.as_deref().filter(|m| !m.is_empty()) {
            return mime.to_string();
        }
        if upload.kind == ContentType::Image {
            if let Some(mime) = sniff_image_mime(&upload.data) {
                return mime.to_string();
            }
        }
        guess_mime_type(&upload.filename).to_string()
    }

    /// Answer `query` from the `k` most similar indexed documents
    /// (the configured default when `None` or zero).
    pub async fn ask(&self, query: &str, k: Option<usize>) -> Result<Answer> {
        let query = query.trim();
        if query.is_empty() {
            return Err(ContentError::validation("No query provided"));
        }

        if self.index.is_empty() {
            if self.ledger.is_empty().await? {
                return Ok(Answer {
                    query: query.to_string(),
                    answer: NO_FILES_ANSWER.to_string(),
                    files_analyzed: 0,
                    sources: Vec::new(),
                });
            }
            self.reindex().await?;
        }

        let k = k.filter(|k| *k > 0).unwrap_or(self.top_k);
        let embedding = self.embed(query).await?;
        let sources = self.index.query(&embedding, k);
        let context = describe::answer_context(&sources);
        let answer = self.answerer.answer(query, &context).await?;

        info!(sources = sources.len(), "Answered question");
        Ok(Answer {
            query: query.to_string(),
            answer,
            files_analyzed: sources.len(),
            sources,
        })
    }

    /// Delete a file everywhere: ledger entry, index entries and stored blob.
    /// Returns whether the ledger held it.
    pub async fn remove(&self, id: &str) -> Result<bool> {
        let _guard = self.index_lock.lock().await;
        let Some(record) = self.ledger.take(id).await? else {
            return Ok(false);
        };

        let unindexed = self.index.remove(id);
        if record.has_blob_key() {
            if let Some(key) = record.media_url.as_deref() {
                if let Err(e) = self.blobs.delete(key).await {
                    warn!(id, key, error = %e, "Failed to delete blob of removed file");
                }
            }
        }
        info!(id, unindexed, "File removed");
        Ok(true)
    }

    /// Rebuild the vector index from the ledger.
    ///
    /// Every file the index does not hold yet is described and embedded again:
    /// text from its stored content, media from its blob. A file that cannot
    /// be restored is logged and skipped. Returns how many were indexed.
    pub async fn reindex(&self) -> Result<usize> {
        let _guard = self.index_lock.lock().await;
        let records = self.ledger.all().await?;
        let mut restored = 0;
        for record in &records {
            if self.index.contains(&record.id) {
                continue;
            }
            match self.restore(record).await {
                Ok(()) => restored += 1,
                Err(e) => warn!(id = %record.id, error = %e, "Failed to re-index file"),
            }
        }
        info!(restored, files = records.len(), "Vector index rebuilt from ledger");
        Ok(restored)
    }

    async fn restore(&self, record: &FileRecord) -> Result<()> {
        let document = match (&record.text_content, record.media_url.as_deref()) {
            (Some(text), _) => self.describer.describe_text(record.kind, text).await?,
            (None, Some(key)) if record.has_blob_key() => {
                let data = self.blobs.get(key).await?;
                self.describe_media(record.kind, &record.filename, &data, record.timestamp)
                    .await?
            }
            // Remote media is not fetched back; describe it from what the ledger knows.
            (None, Some(_)) => describe::synthetic_description(
                record.kind,
                &record.filename,
                0,
                record.timestamp,
            ),
            (None, None) => {
                return Err(ContentError::validation(format!(
                    "file record {} has neither content nor media",
                    record.id
                )))
            }
        };
        let embedding = self.embed(&document).await?;
        self.index
            .insert(VectorRecord::for_file(record, embedding, document))
    }

    pub async fn recent_files(&self, limit: Option<usize>) -> Result<Vec<FileRecord>> {
        self.ledger.get_all(limit).await
    }

    pub fn recent_documents(&self, limit: Option<usize>) -> Vec<VectorRecord> {
        self.index.get_all(limit)
    }
}
