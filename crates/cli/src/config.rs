use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

pub const DEFAULT_CONFIG_FILE: &str = "insight.toml";
pub const CONFIG_PATH_ENV: &str = "INSIGHT_CONFIG";
pub const MODEL_KEY_ENV: &str = "GOOGLE_API_KEY";
pub const SHEETS_TOKEN_ENV: &str = "SHEETS_ACCESS_TOKEN";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    ReadFailed {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    ParseFailed(#[from] toml::de::Error),
    #[error("missing credential: {0}")]
    MissingCredential(String),
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    Sheets,
    Sqlite,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: Backend,
    pub spreadsheet_id: Option<String>,
    pub sheet_name: String,
    pub access_token: Option<String>,
    pub access_token_command: Option<String>,
    /// Header labels of the sheet when they differ from the column names
    pub headers: Option<Vec<String>>,
    pub base_url: String,
    pub sqlite_path: String,
    pub timeout_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: Backend::Sheets,
            spreadsheet_id: None,
            sheet_name: "Sheet1".to_string(),
            access_token: None,
            access_token_command: None,
            headers: None,
            base_url: sheets_adapter::DEFAULT_BASE_URL.to_string(),
            sqlite_path: "insights.db".to_string(),
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub name: String,
    pub api_key: Option<String>,
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            name: gemini_adapter::DEFAULT_MODEL.to_string(),
            api_key: None,
            base_url: gemini_adapter::DEFAULT_BASE_URL.to_string(),
            timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: insight_core::retrieval::DEFAULT_TOP_K,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub store: StoreConfig,
    pub model: ModelConfig,
    pub retrieval: RetrievalConfig,
}

impl AppConfig {
    /// Loads the config file, then applies environment overrides.
    ///
    /// An explicit path must exist. Without one, `INSIGHT_CONFIG` is tried,
    /// then `insight.toml` in the working directory; if neither exists the
    /// defaults are used.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match explicit {
            Some(path) => Some(path.to_path_buf()),
            None => env::var(CONFIG_PATH_ENV)
                .ok()
                .map(PathBuf::from)
                .or_else(|| {
                    let default = PathBuf::from(DEFAULT_CONFIG_FILE);
                    default.exists().then_some(default)
                }),
        };

        let mut config = match path {
            Some(path) => Self::from_file(&path)?,
            None => Self::default(),
        };
        config.apply_env(|key| env::var(key).ok());
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::ReadFailed {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&raw)
    }

    pub fn from_toml(raw: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(raw)?)
    }

    /// Environment values win over the file; empty values are ignored
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if let Some(key) = get(MODEL_KEY_ENV) {
            self.model.api_key = Some(key);
        }
        if let Some(token) = get(SHEETS_TOKEN_ENV) {
            self.store.access_token = Some(token);
        }
    }

    /// Checks that every credential the configured backends need is present
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.model.api_key.is_none() {
            return Err(ConfigError::MissingCredential(format!(
                "model API key (set {MODEL_KEY_ENV} or model.api_key)"
            )));
        }

        if self.store.backend == Backend::Sheets {
            if self.store.spreadsheet_id.is_none() {
                return Err(ConfigError::MissingCredential(
                    "store.spreadsheet_id".to_string(),
                ));
            }
            if self.store.access_token.is_none() && self.store.access_token_command.is_none() {
                return Err(ConfigError::MissingCredential(format!(
                    "sheets access token (set {SHEETS_TOKEN_ENV}, store.access_token or store.access_token_command)"
                )));
            }
            if let Some(headers) = &self.store.headers {
                let expected = insight_core::domain::COLUMNS.len();
                if headers.len() != expected {
                    return Err(ConfigError::Invalid(format!(
                        "store.headers needs {expected} labels, got {}",
                        headers.len()
                    )));
                }
            }
        }

        if self.retrieval.top_k == 0 {
            return Err(ConfigError::Invalid("retrieval.top_k must be at least 1".to_string()));
        }
        Ok(())
    }
}
