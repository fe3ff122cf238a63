//! External model collaborators: embeddings, descriptions and answers.
//!
//! The core only sees these traits; [`workers_ai::WorkersAiClient`] is the
//! HTTP implementation used by the binary.

pub mod workers_ai;

#[cfg(test)]
pub(crate) mod testing;

use async_trait::async_trait;
use thiserror::Error;

use crate::content::ContentType;

pub use workers_ai::WorkersAiClient;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("provider credentials are not configured: {0} is missing")]
    MissingCredentials(&'static str),

    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("request to {model} failed: {source}")]
    Transport {
        model: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{model} returned HTTP {status}: {body}")]
    Status {
        model: String,
        status: u16,
        body: String,
    },

    #[error("{model} reported failure: {errors}")]
    Rejected { model: String, errors: String },

    #[error("{model} returned an unexpected payload: {reason}")]
    InvalidResponse { model: String, reason: String },
}

/// Turns text into a fixed-dimension vector.
///
/// Failures must surface as errors; an implementation never returns an empty
/// or partial vector in place of one.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError>;
}

/// Produces the natural-language surrogate stored as a document's text.
#[async_trait]
pub trait ContentDescriber: Send + Sync {
    async fn describe_text(&self, kind: ContentType, content: &str) -> Result<String, ProviderError>;

    async fn describe_image(&self, data: &[u8]) -> Result<String, ProviderError>;
}

/// Answers a question from ranked document context.
#[async_trait]
pub trait AnswerGenerator: Send + Sync {
    async fn answer(&self, query: &str, context: &str) -> Result<String, ProviderError>;
}
