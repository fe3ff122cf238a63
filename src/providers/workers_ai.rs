use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use super::{AnswerGenerator, ContentDescriber, EmbeddingProvider, ProviderError};
use crate::config::ProviderConfig;
use crate::content::describe::{analysis_prompt, answer_prompt, ANSWER_INSTRUCTIONS, IMAGE_PROMPT};
use crate::content::ContentType;

/// Bytes of an error body kept in [`ProviderError::Status`].
const ERROR_BODY_LIMIT: usize = 500;

/// Cloudflare Workers AI client implementing all three provider traits.
pub struct WorkersAiClient {
    http: reqwest::Client,
    base_url: String,
    account_id: Option<String>,
    api_token: Option<String>,
    text_model: String,
    vision_model: String,
    embedding_model: String,
}

/// Workers AI response envelope.
#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    errors: Vec<Value>,
    #[serde(default)]
    result: Option<RunResult>,
}

#[derive(Debug, Default, Deserialize)]
struct RunResult {
    response: Option<String>,
    description: Option<String>,
    data: Option<Vec<Vec<f32>>>,
}

impl WorkersAiClient {
    pub fn new(config: &ProviderConfig) -> Result<Self, ProviderError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(ProviderError::Client)?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            account_id: config.account_id.clone(),
            api_token: config.api_token.clone(),
            text_model: config.text_model.clone(),
            vision_model: config.vision_model.clone(),
            embedding_model: config.embedding_model.clone(),
        })
    }

    pub fn has_credentials(&self) -> bool {
        self.account_id.is_some() && self.api_token.is_some()
    }

    async fn run(&self, model: &str, payload: Value) -> Result<RunResult, ProviderError> {
        let account_id = self
            .account_id
            .as_deref()
            .ok_or(ProviderError::MissingCredentials("CLOUDFLARE_ACCOUNT_ID"))?;
        let api_token = self
            .api_token
            .as_deref()
            .ok_or(ProviderError::MissingCredentials("CLOUDFLARE_API_TOKEN"))?;

        let url = format!("{}/accounts/{account_id}/ai/run/{model}", self.base_url);
        debug!(model, "Calling Workers AI");

        let transport = |source| ProviderError::Transport {
            model: model.to_string(),
            source,
        };
        let response = self
            .http
            .post(&url)
            .bearer_auth(api_token)
            .json(&payload)
            .send()
            .await
            .map_err(transport)?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(transport)?;

        parse_envelope(model, status, &body)
    }
}

/// Decode a Workers AI reply, turning HTTP and envelope failures into errors.
fn parse_envelope(model: &str, status: u16, body: &str) -> Result<RunResult, ProviderError> {
    if !(200..300).contains(&status) {
        warn!(model, status, "Workers AI request failed");
        return Err(ProviderError::Status {
            model: model.to_string(),
            status,
            body: body.chars().take(ERROR_BODY_LIMIT).collect(),
        });
    }

    let envelope: Envelope =
        serde_json::from_str(body).map_err(|e| ProviderError::InvalidResponse {
            model: model.to_string(),
            reason: e.to_string(),
        })?;
    if !envelope.success {
        return Err(ProviderError::Rejected {
            model: model.to_string(),
            errors: Value::Array(envelope.errors).to_string(),
        });
    }
    Ok(envelope.result.unwrap_or_default())
}

fn invalid(model: &str, reason: &str) -> ProviderError {
    ProviderError::InvalidResponse {
        model: model.to_string(),
        reason: reason.to_string(),
    }
}

/// First embedding row of a result, rejecting empty or non-finite vectors.
fn first_embedding(model: &str, result: RunResult) -> Result<Vec<f32>, ProviderError> {
    let embedding = result
        .data
        .and_then(|rows| rows.into_iter().next())
        .ok_or_else(|| invalid(model, "no embedding in result.data"))?;
    if embedding.is_empty() {
        return Err(invalid(model, "embedding is empty"));
    }
    if embedding.iter().any(|v| !v.is_finite()) {
        return Err(invalid(model, "embedding contains non-finite values"));
    }
    Ok(embedding)
}

#[async_trait]
impl EmbeddingProvider for WorkersAiClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        let result = self.run(&self.embedding_model, json!({ "text": text })).await?;
        first_embedding(&self.embedding_model, result)
    }
}

#[async_trait]
impl ContentDescriber for WorkersAiClient {
    async fn describe_text(&self, kind: ContentType, content: &str) -> Result<String, ProviderError> {
        let payload = json!({
            "messages": [{ "role": "user", "content": analysis_prompt(kind, content) }]
        });
        let result = self.run(&self.text_model, payload).await?;
        result
            .response
            .ok_or_else(|| invalid(&self.text_model, "missing result.response"))
    }

    async fn describe_image(&self, data: &[u8]) -> Result<String, ProviderError> {
        let payload = json!({ "prompt": IMAGE_PROMPT, "image": data });
        let result = self.run(&self.vision_model, payload).await?;
        // LLaVA answers in `description`, other vision models in `response`.
        result
            .description
            .or(result.response)
            .ok_or_else(|| invalid(&self.vision_model, "missing result.description"))
    }
}

#[async_trait]
impl AnswerGenerator for WorkersAiClient {
    async fn answer(&self, query: &str, context: &str) -> Result<String, ProviderError> {
        let payload = json!({
            "messages": [
                { "role": "system", "content": ANSWER_INSTRUCTIONS },
                { "role": "user", "content": answer_prompt(query, context) },
            ]
        });
        let result = self.run(&self.text_model, payload).await?;
        result
            .response
            .ok_or_else(|| invalid(&self.text_model, "missing result.response"))
    }
}
