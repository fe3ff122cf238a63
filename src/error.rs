use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::providers::ProviderError;

pub type Result<T> = std::result::Result<T, ContentError>;

/// Errors raised by the content index and the flows built on top of it.
///
/// Empty results are never errors: an empty ledger or index answers with an
/// empty collection.
#[derive(Debug, Error)]
pub enum ContentError {
    #[error("record not found: {id}")]
    NotFound { id: String },

    #[error("{0}")]
    Validation(String),

    #[error("ledger file {path} could not be accessed: {source}")]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("ledger file {path} is malformed: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to encode ledger: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("blob {key} could not be accessed: {source}")]
    Blob {
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("upstream provider failed: {0}")]
    Upstream(#[from] ProviderError),
}

impl ContentError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub(crate) fn persistence(path: &Path, source: std::io::Error) -> Self {
        Self::Persistence {
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn blob(key: impl Into<String>, source: std::io::Error) -> Self {
        Self::Blob {
            key: key.into(),
            source,
        }
    }
}
