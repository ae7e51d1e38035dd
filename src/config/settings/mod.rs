
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::embeddings::chunking::DEFAULT_CHUNK_SIZE;
use crate::embeddings::gemini::{DEFAULT_EMBEDDING_DIMENSION, DEFAULT_EMBEDDING_MODEL};
use crate::generation::DEFAULT_GENERATION_MODEL;
use crate::http::DEFAULT_TIMEOUT_SECONDS;
use crate::pipeline::DEFAULT_TOP_K;

pub const GEMINI_API_KEY_VARIABLE: &str = "GEMINI_API_KEY";
pub const QDRANT_API_KEY_VARIABLE: &str = "QDRANT_API_KEY";
pub const QDRANT_URL_VARIABLE: &str = "QDRANT_URL";
pub const QDRANT_COLLECTION_VARIABLE: &str = "QDRANT_COLLECTION";

pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_DOCUMENT_PATH: &str = "document.txt";
const CONFIG_FILE_NAME: &str = "config.toml";

/// Process-wide configuration, built once at startup and passed to each client.
///
/// Credentials, the Qdrant host and the collection name only ever come from the
/// environment; everything else may be tuned in `config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub gemini: GeminiConfig,
    #[serde(default)]
    pub qdrant: QdrantConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GeminiConfig {
    #[serde(skip)]
    pub api_key: ApiKey,
    pub base_url: String,
    pub embedding_model: String,
    pub generation_model: String,
    pub timeout_seconds: u64,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: ApiKey::default(),
            base_url: DEFAULT_GEMINI_BASE_URL.to_string(),
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            generation_model: DEFAULT_GENERATION_MODEL.to_string(),
            timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct QdrantConfig {
    #[serde(skip)]
    pub api_key: ApiKey,
    #[serde(skip)]
    pub url: String,
    #[serde(skip)]
    pub collection: String,
    pub dimension: usize,
    pub timeout_seconds: u64,
}

impl Default for QdrantConfig {
    fn default() -> Self {
        Self {
            api_key: ApiKey::default(),
            url: String::new(),
            collection: String::new(),
            dimension: DEFAULT_EMBEDDING_DIMENSION,
            timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetrievalConfig {
    pub chunk_size: usize,
    pub top_k: usize,
    pub document_path: PathBuf,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            top_k: DEFAULT_TOP_K,
            document_path: PathBuf::from(DEFAULT_DOCUMENT_PATH),
        }
    }
}

/// An API credential that never shows up in `Debug` output
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    #[inline]
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    #[inline]
    pub fn expose(&self) -> &str {
        &self.0
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            f.write_str("ApiKey(<unset>)")
        } else {
            f.write_str("ApiKey(<redacted>)")
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration directory not found or could not be created")]
    DirectoryError,
    #[error("Missing required environment variables: {}", .0.iter().join(", "))]
    MissingVariables(Vec<&'static str>),
    #[error("Invalid URL format: {0} (must be an http or https URL)")]
    InvalidUrl(String),
    #[error("Invalid model name: {0:?} (cannot be empty)")]
    InvalidModel(String),
    #[error("Invalid collection name: {0:?} (cannot be empty or contain '/')")]
    InvalidCollection(String),
    #[error("Invalid chunk size: {0} (must be between 1 and 100000)")]
    InvalidChunkSize(usize),
    #[error("Invalid top_k: {0} (must be between 1 and 100)")]
    InvalidTopK(usize),
    #[error("Invalid embedding dimension: {0} (must be between 1 and 65536)")]
    InvalidDimension(usize),
    #[error("Invalid timeout: {0} (must be between 1 and 600 seconds)")]
    InvalidTimeout(u64),
    #[error("Failed to read config file {}: {source}", .path.display())]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),
}

impl Config {
    /// Load configuration from the default config directory and the process environment
    #[inline]
    pub fn load() -> Result<Self, ConfigError> {
        let lookup = |name: &str| std::env::var(name).ok();
        let config_dir = super::config_dir_from(lookup)?;
        Self::load_from(config_dir, lookup)
    }

    /// Load configuration from `config_dir` with secrets resolved through `lookup`
    #[inline]
    pub fn load_from<P, F>(config_dir: P, lookup: F) -> Result<Self, ConfigError>
    where
        P: AsRef<Path>,
        F: Fn(&str) -> Option<String>,
    {
        let config_path = config_dir.as_ref().join(CONFIG_FILE_NAME);

        let mut config = if config_path.exists() {
            debug!("Loading settings from {}", config_path.display());
            let content =
                fs::read_to_string(&config_path).map_err(|source| ConfigError::ReadFile {
                    path: config_path.clone(),
                    source,
                })?;
            Self::from_toml(&content)?
        } else {
            debug!(
                "No settings file at {}, using defaults",
                config_path.display()
            );
            Self::default()
        };

        config.apply_environment(lookup)?;
        config.validate()?;

        Ok(config)
    }

    /// Parse the tunable settings; credentials are never read from the file
    #[inline]
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Fill in the required values, reporting every missing variable at once
    #[inline]
    pub fn apply_environment<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut missing = Vec::new();
        let mut required = |name: &'static str| {
            let value = lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty());
            if value.is_none() {
                missing.push(name);
            }
            value.unwrap_or_default()
        };

        let gemini_key = required(GEMINI_API_KEY_VARIABLE);
        let qdrant_key = required(QDRANT_API_KEY_VARIABLE);
        let qdrant_url = required(QDRANT_URL_VARIABLE);
        let collection = required(QDRANT_COLLECTION_VARIABLE);

        if !missing.is_empty() {
            return Err(ConfigError::MissingVariables(missing));
        }

        self.gemini.api_key = ApiKey::new(gemini_key);
        self.qdrant.api_key = ApiKey::new(qdrant_key);
        self.qdrant.url = qdrant_url;
        self.qdrant.collection = collection;
        Ok(())
    }

    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.gemini.validate()?;
        self.qdrant.validate()?;
        self.retrieval.validate()?;
        Ok(())
    }
}

impl GeminiConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        parse_http_url(&self.base_url)?;

        if self.embedding_model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(self.embedding_model.clone()));
        }

        if self.generation_model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(self.generation_model.clone()));
        }

        validate_timeout(self.timeout_seconds)
    }

    pub fn base_url(&self) -> Result<Url, ConfigError> {
        parse_http_url(&self.base_url)
    }
}

impl QdrantConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        parse_http_url(&self.url)?;

        if self.collection.trim().is_empty() || self.collection.contains('/') {
            return Err(ConfigError::InvalidCollection(self.collection.clone()));
        }

        if !(1..=65_536).contains(&self.dimension) {
            return Err(ConfigError::InvalidDimension(self.dimension));
        }

        validate_timeout(self.timeout_seconds)
    }

    pub fn base_url(&self) -> Result<Url, ConfigError> {
        parse_http_url(&self.url)
    }
}

impl RetrievalConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=100_000).contains(&self.chunk_size) {
            return Err(ConfigError::InvalidChunkSize(self.chunk_size));
        }

        if !(1..=100).contains(&self.top_k) {
            return Err(ConfigError::InvalidTopK(self.top_k));
        }

        Ok(())
    }
}

fn parse_http_url(value: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(value.trim()).map_err(|_| ConfigError::InvalidUrl(value.to_string()))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(value.to_string()));
    }

    Ok(url)
}

fn validate_timeout(seconds: u64) -> Result<(), ConfigError> {
    if !(1..=600).contains(&seconds) {
        return Err(ConfigError::InvalidTimeout(seconds));
    }
    Ok(())
}
