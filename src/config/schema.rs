use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Top-level configuration, read from `config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct Config {
    /// Directory holding the ledger file and stored blobs.
    /// Defaults to the platform data directory. `~` is expanded.
    pub data_dir: Option<String>,

    /// Default tracing filter when `RUST_LOG` is unset.
    pub log_level: String,

    pub gateway: GatewayConfig,
    pub index: IndexConfig,
    pub provider: ProviderConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: None,
            log_level: "info".to_string(),
            gateway: GatewayConfig::default(),
            index: IndexConfig::default(),
            provider: ProviderConfig::default(),
        }
    }
}

/// HTTP gateway settings.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
    /// Largest accepted request body, uploads included.
    pub max_upload_bytes: usize,
    pub request_timeout_secs: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            max_upload_bytes: 50 * 1024 * 1024,
            request_timeout_secs: 120,
        }
    }
}

/// Retrieval settings.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct IndexConfig {
    /// Documents handed to the answer generator per question.
    pub top_k: usize,
    /// Page size for file and result listings.
    pub list_limit: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            top_k: 5,
            list_limit: crate::content::DEFAULT_LIST_LIMIT,
        }
    }
}

/// Cloudflare Workers AI settings. Credentials may also come from
/// `CLOUDFLARE_ACCOUNT_ID` and `CLOUDFLARE_API_TOKEN`.
#[derive(Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct ProviderConfig {
    pub account_id: Option<String>,
    pub api_token: Option<String>,
    pub base_url: String,
    pub text_model: String,
    pub vision_model: String,
    pub embedding_model: String,
    pub timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            account_id: None,
            api_token: None,
            base_url: "https://api.cloudflare.com/client/v4".to_string(),
            text_model: "@cf/meta/llama-4-scout-17b-16e-instruct".to_string(),
            vision_model: "@cf/llava-hf/llava-1.5-7b-hf".to_string(),
            embedding_model: "@cf/baai/bge-base-en-v1.5".to_string(),
            timeout_secs: 60,
        }
    }
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("account_id", &self.account_id)
            .field("api_token", &self.api_token.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .field("text_model", &self.text_model)
            .field("vision_model", &self.vision_model)
            .field("embedding_model", &self.embedding_model)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}
