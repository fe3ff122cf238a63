//! In-process providers for tests.

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{AnswerGenerator, ContentDescriber, EmbeddingProvider, ProviderError};
use crate::content::ContentType;

const KEYWORDS: [&str; 4] = ["cat", "car", "sea", "tree"];

/// Embeds by counting a few keywords, so similarity follows vocabulary.
pub struct KeywordEmbedder;

#[async_trait]
impl EmbeddingProvider for KeywordEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        let lower = text.to_lowercase();
        Ok(KEYWORDS
            .iter()
            .map(|k| lower.matches(k).count() as f32 + 0.01)
            .collect())
    }
}

pub struct FailingEmbedder;

#[async_trait]
impl EmbeddingProvider for FailingEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>, ProviderError> {
        Err(ProviderError::Rejected {
            model: "test".into(),
            errors: "quota exceeded".into(),
        })
    }
}

/// Never answers within a request timeout.
pub struct SlowEmbedder;

#[async_trait]
impl EmbeddingProvider for SlowEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>, ProviderError> {
        tokio::time::sleep(std::time::Duration::from_secs(30)).await;
        Ok(vec![1.0])
    }
}

pub struct EmptyEmbedder;

#[async_trait]
impl EmbeddingProvider for EmptyEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>, ProviderError> {
        Ok(Vec::new())
    }
}

/// Describes text as `"{kind}: {content}"` and every image as a cat photo.
pub struct EchoDescriber;

#[async_trait]
impl ContentDescriber for EchoDescriber {
    async fn describe_text(&self, kind: ContentType, content: &str) -> Result<String, ProviderError> {
        Ok(format!("{kind}: {content}"))
    }

    async fn describe_image(&self, _data: &[u8]) -> Result<String, ProviderError> {
        Ok("a photo of a cat".to_string())
    }
}

/// Answers `"answer to {query}"` and keeps every context it was given.
#[derive(Default)]
pub struct RecordingAnswerer {
    pub contexts: Mutex<Vec<String>>,
}

#[async_trait]
impl AnswerGenerator for RecordingAnswerer {
    async fn answer(&self, query: &str, context: &str) -> Result<String, ProviderError> {
        self.contexts.lock().push(context.to_string());
        Ok(format!("answer to {query}"))
    }
}
