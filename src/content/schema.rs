use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ContentError, Result};

/// Characters of the document kept in [`VectorMetadata::preview`].
pub const PREVIEW_CHARS: usize = 200;

const ID_SUFFIX_LEN: usize = 9;
const BASE36: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Kind of uploaded content. Decides where the payload lives: inline text for
/// `Text`, a blob reference for everything else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Text,
    Image,
    Video,
    Pdf,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Text => "text",
            ContentType::Image => "image",
            ContentType::Video => "video",
            ContentType::Pdf => "pdf",
        }
    }

    /// Human label used in prompts and answer context.
    pub fn label(&self) -> &'static str {
        match self {
            ContentType::Text => "Text",
            ContentType::Image => "Image",
            ContentType::Video => "Video",
            ContentType::Pdf => "PDF",
        }
    }

    /// Blob store folder for payloads of this kind; `None` for inline text.
    pub fn blob_folder(&self) -> Option<&'static str> {
        match self {
            ContentType::Text => None,
            ContentType::Image => Some("images"),
            ContentType::Video => Some("videos"),
            ContentType::Pdf => Some("documents"),
        }
    }

    pub fn is_inline(&self) -> bool {
        self.blob_folder().is_none()
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentType {
    type Err = ContentError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(ContentType::Text),
            "image" => Ok(ContentType::Image),
            "video" => Ok(ContentType::Video),
            "pdf" => Ok(ContentType::Pdf),
            other => Err(ContentError::validation(format!(
                "Invalid file type: {other:?}"
            ))),
        }
    }
}

/// A ledger entry for one uploaded file.
///
/// Serialized with the camelCase field names of the ledger document
/// (`type`, `mediaUrl`, `textContent`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRecord {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: ContentType,
    pub filename: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_content: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl FileRecord {
    /// Record for an inline text upload, stamped now.
    pub fn text(filename: impl Into<String>, content: impl Into<String>) -> Self {
        let timestamp = Utc::now();
        Self {
            id: new_record_id(ContentType::Text, timestamp),
            kind: ContentType::Text,
            filename: filename.into(),
            media_url: None,
            text_content: Some(content.into()),
            timestamp,
        }
    }

    /// Record for a payload held in the blob store under `media_url`.
    pub fn media(kind: ContentType, filename: impl Into<String>, media_url: impl Into<String>) -> Self {
        let timestamp = Utc::now();
        Self {
            id: new_record_id(kind, timestamp),
            kind,
            filename: filename.into(),
            media_url: Some(media_url.into()),
            text_content: None,
            timestamp,
        }
    }

    /// Check the record invariants: non-empty id and filename, and exactly
    /// one of `media_url` / `text_content` populated as the kind dictates.
    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(ContentError::validation("file record id is empty"));
        }
        if self.filename.trim().is_empty() {
            return Err(ContentError::validation("file record filename is empty"));
        }
        match (self.kind.is_inline(), &self.media_url, &self.text_content) {
            (true, None, Some(_)) => Ok(()),
            (false, Some(url), None) if !url.trim().is_empty() => Ok(()),
            (true, _, _) => Err(ContentError::validation(format!(
                "{} record {} must carry textContent and no mediaUrl",
                self.kind, self.id
            ))),
            (false, _, _) => Err(ContentError::validation(format!(
                "{} record {} must carry a mediaUrl and no textContent",
                self.kind, self.id
            ))),
        }
    }

    /// True when `media_url` is a blob store key rather than a full URL.
    pub fn has_blob_key(&self) -> bool {
        self.media_url
            .as_deref()
            .is_some_and(|url| !url.starts_with("http://") && !url.starts_with("https://"))
    }
}

/// Denormalized view of a file stored next to its embedding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorMetadata {
    #[serde(rename = "type")]
    pub kind: ContentType,
    pub filename: String,
    pub timestamp: DateTime<Utc>,
    pub preview: String,
}

/// An embedded document held by the vector index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorRecord {
    pub id: String,
    pub embedding: Vec<f32>,
    pub document: String,
    pub metadata: VectorMetadata,
}

impl VectorRecord {
    pub fn for_file(record: &FileRecord, embedding: Vec<f32>, document: impl Into<String>) -> Self {
        let document = document.into();
        Self {
            id: record.id.clone(),
            embedding,
            metadata: VectorMetadata {
                kind: record.kind,
                filename: record.filename.clone(),
                timestamp: record.timestamp,
                preview: preview(&document, PREVIEW_CHARS),
            },
            document,
        }
    }
}

/// One ranked hit from [`super::VectorIndex::query`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryMatch {
    pub id: String,
    pub document: String,
    pub metadata: VectorMetadata,
    /// `1 - cosine similarity`; 0 is an identical direction.
    pub distance: f32,
}

impl QueryMatch {
    pub fn similarity(&self) -> f32 {
        1.0 - self.distance
    }
}

/// Build a record id of the form `{type}-{unix_millis}-{suffix}` where the
/// suffix is nine random base36 characters.
pub fn new_record_id(kind: ContentType, at: DateTime<Utc>) -> String {
    format!("{}-{}-{}", kind, at.timestamp_millis(), random_suffix())
}

pub(crate) fn random_suffix() -> String {
    // The low 48 bits of a v4 UUID are all random.
    let mut n = Uuid::new_v4().as_u128();
    (0..ID_SUFFIX_LEN)
        .map(|_| {
            let c = BASE36[(n % 36) as usize] as char;
            n /= 36;
            c
        })
        .collect()
}

/// First `max_chars` characters of `text`, never splitting a code point.
pub fn preview(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}
