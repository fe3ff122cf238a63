//! Configuration loading: TOML file, then environment overrides.

mod schema;

pub use schema::{Config, GatewayConfig, IndexConfig, ProviderConfig};

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use directories::ProjectDirs;

/// Name of the ledger document inside the data directory.
pub const LEDGER_FILE: &str = "files.json";
/// Blob subdirectory inside the data directory.
pub const BLOB_DIR: &str = "blobs";

const CONFIG_FILE: &str = "config.toml";
const FALLBACK_DATA_DIR: &str = ".vector-store";

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("dev", "mediarag", "mediarag")
}

/// Platform config file location, e.g. `~/.config/mediarag/config.toml`.
pub fn default_config_path() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.config_dir().join(CONFIG_FILE))
}

impl Config {
    /// Load from `path`, or the platform default location when `None`.
    ///
    /// An explicit path must exist; a missing default file yields defaults.
    /// Environment overrides are applied afterwards.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => match default_config_path() {
                Some(path) if path.exists() => Self::from_file(&path)?,
                _ => Self::default(),
            },
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_toml(&raw).with_context(|| format!("Invalid config file {}", path.display()))
    }

    pub fn from_toml(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    /// Apply `CLOUDFLARE_ACCOUNT_ID`, `CLOUDFLARE_API_TOKEN` and
    /// `MEDIARAG_DATA_DIR` from `lookup`. Empty values are ignored.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if let Some(account) = get("CLOUDFLARE_ACCOUNT_ID") {
            self.provider.account_id = Some(account);
        }
        if let Some(token) = get("CLOUDFLARE_API_TOKEN") {
            self.provider.api_token = Some(token);
        }
        if let Some(dir) = get("MEDIARAG_DATA_DIR") {
            self.data_dir = Some(dir);
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.index.top_k == 0 {
            bail!("index.top_k must be greater than zero");
        }
        if self.index.list_limit == 0 {
            bail!("index.list_limit must be greater than zero");
        }
        if self.gateway.max_upload_bytes == 0 {
            bail!("gateway.max_upload_bytes must be greater than zero");
        }
        if self.gateway.request_timeout_secs == 0 {
            bail!("gateway.request_timeout_secs must be greater than zero");
        }
        Ok(())
    }

    /// Resolved data directory, with `~` expanded.
    pub fn data_dir(&self) -> PathBuf {
        match &self.data_dir {
            Some(dir) => PathBuf::from(shellexpand::tilde(dir).into_owned()),
            None => project_dirs()
                .map(|dirs| dirs.data_dir().to_path_buf())
                .unwrap_or_else(|| PathBuf::from(FALLBACK_DATA_DIR)),
        }
    }

    pub fn ledger_path(&self) -> PathBuf {
        self.data_dir().join(LEDGER_FILE)
    }

    pub fn blob_dir(&self) -> PathBuf {
        self.data_dir().join(BLOB_DIR)
    }

    /// JSON Schema of the config file, pretty-printed.
    pub fn json_schema() -> Result<String> {
        let schema = schemars::schema_for!(Config);
        Ok(serde_json::to_string_pretty(&schema)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn empty_file_gives_defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config.gateway.port, 3000);
        assert_eq!(config.index.top_k, 5);
        assert_eq!(config.index.list_limit, 50);
        assert_eq!(config.provider.embedding_model, "@cf/baai/bge-base-en-v1.5");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = Config::from_toml(
            r#"
            data_dir = "/srv/mediarag"

            [gateway]
            port = 8080

            [provider]
            account_id = "acct"
            "#,
        )
        .unwrap();
        assert_eq!(config.gateway.port, 8080);
        assert_eq!(config.gateway.host, "127.0.0.1");
        assert_eq!(config.provider.account_id.as_deref(), Some("acct"));
        assert_eq!(config.ledger_path(), PathBuf::from("/srv/mediarag/files.json"));
        assert_eq!(config.blob_dir(), PathBuf::from("/srv/mediarag/blobs"));
    }

    #[test]
    fn env_overrides_win_and_ignore_blanks() {
        let mut config = Config::from_toml("[provider]\napi_token = \"from-file\"").unwrap();
        let env: HashMap<&str, &str> = HashMap::from([
            ("CLOUDFLARE_API_TOKEN", "from-env"),
            ("CLOUDFLARE_ACCOUNT_ID", "  "),
            ("MEDIARAG_DATA_DIR", "/data"),
        ]);
        config.apply_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.provider.api_token.as_deref(), Some("from-env"));
        assert_eq!(config.provider.account_id, None);
        assert_eq!(config.data_dir(), PathBuf::from("/data"));
    }

    #[test]
    fn tilde_is_expanded() {
        let config = Config {
            data_dir: Some("~/media".into()),
            ..Config::default()
        };
        assert!(!config.data_dir().to_string_lossy().starts_with('~'));
    }

    #[test]
    fn zero_top_k_is_rejected() {
        let config = Config::from_toml("[index]\ntop_k = 0").unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn token_is_redacted_in_debug_output() {
        let mut config = Config::default();
        config.provider.api_token = Some("secret-token".into());
        let debug = format!("{config:?}");
        assert!(!debug.contains("secret-token"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn schema_describes_sections() {
        let schema = Config::json_schema().unwrap();
        assert!(schema.contains("gateway"));
        assert!(schema.contains("embedding_model"));
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        assert!(Config::load(Some(Path::new("/definitely/not/here.toml"))).is_err());
    }
}
