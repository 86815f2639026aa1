
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use url::Url;

/// Environment variable that relocates the application directory
pub const HOME_ENV_VAR: &str = "MOVIE_CHAT_HOME";

const DEFAULT_CHAT_DEPLOYMENT: &str = "gpt-4o-mini";
const DEFAULT_EMBEDDING_DEPLOYMENT: &str = "text-embedding-ada-002";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub azure: AzureConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub dataset: DatasetConfig,
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(skip)]
    pub base_dir: PathBuf,
}

/// Connection settings for the hosted embedding and chat deployments
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AzureConfig {
    pub endpoint: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub embedding_deployment: String,
    pub chat_deployment: String,
    pub embedding_api_version: String,
    pub chat_api_version: String,
    /// Number of texts sent per embedding request
    pub batch_size: u32,
    pub timeout_seconds: u64,
}

impl Default for AzureConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            api_key: None,
            embedding_deployment: DEFAULT_EMBEDDING_DEPLOYMENT.to_string(),
            chat_deployment: DEFAULT_CHAT_DEPLOYMENT.to_string(),
            embedding_api_version: "2024-03-01-preview".to_string(),
            chat_api_version: "2024-09-01-preview".to_string(),
            batch_size: 16,
            timeout_seconds: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RetrievalConfig {
    pub index_name: String,
    /// Number of documents retrieved per question
    pub k: usize,
    pub schema_file: String,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            index_name: "movieindex".to_string(),
            k: 10,
            schema_file: "index_schema.toml".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DatasetConfig {
    pub file_name: String,
    pub export_file_name: String,
    /// Movies released in or before this year are skipped
    pub min_year: i32,
    pub origins: Vec<String>,
    /// Plots with this many tokens or more are skipped
    pub max_tokens: usize,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            file_name: "wiki_movie_plots_deduped.csv".to_string(),
            export_file_name: "movie_list.csv".to_string(),
            min_year: 1970,
            origins: vec![
                "American".to_string(),
                "British".to_string(),
                "Canadian".to_string(),
            ],
            max_tokens: 8192,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ChatConfig {
    pub debug: bool,
    pub truncate_length: usize,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            debug: false,
            truncate_length: 200,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8501,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration directory not found or could not be created")]
    DirectoryError,
    #[error("Resource endpoint is not set (use RESOURCE_ENDPOINT or 'movie-chat config')")]
    MissingEndpoint,
    #[error("API key is not set (use API_KEY or 'movie-chat config')")]
    MissingApiKey,
    #[error("Invalid URL format: {0}")]
    InvalidUrl(String),
    #[error("Invalid deployment name: {0} (cannot be empty)")]
    InvalidDeployment(String),
    #[error("Invalid API version: {0} (cannot be empty)")]
    InvalidApiVersion(String),
    #[error("Invalid batch size: {0} (must be between 1 and 2048)")]
    InvalidBatchSize(u32),
    #[error("Invalid timeout: {0} (must be between 1 and 600 seconds)")]
    InvalidTimeout(u64),
    #[error("Invalid retrieval count: {0} (must be between 1 and 100)")]
    InvalidRetrievalCount(usize),
    #[error("Invalid index name: {0} (cannot be empty)")]
    InvalidIndexName(String),
    #[error("Invalid truncate length: {0} (must be at least 1)")]
    InvalidTruncateLength(usize),
    #[error("Invalid port: {0} (must be between 1 and 65535)")]
    InvalidPort(u16),
    #[error("Invalid max token count: {0} (must be at least 1)")]
    InvalidMaxTokens(usize),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

impl Config {
    /// Application directory: `$MOVIE_CHAT_HOME`, or `movie-chat` under the user config dir
    #[inline]
    pub fn config_dir() -> Result<PathBuf, ConfigError> {
        if let Some(home) = std::env::var_os(HOME_ENV_VAR).filter(|v| !v.is_empty()) {
            return Ok(PathBuf::from(home));
        }

        dirs::config_dir()
            .map(|dir| dir.join("movie-chat"))
            .ok_or(ConfigError::DirectoryError)
    }

    /// Load from the default directory, then apply `.env` and process environment overrides
    #[inline]
    pub fn load_default() -> Result<Self> {
        let config_dir = Self::config_dir().context("Failed to locate configuration directory")?;
        let mut config = Self::load(&config_dir)?;
        config.apply_env_overrides();
        Ok(config)
    }

    #[inline]
    pub fn load<P: AsRef<Path>>(config_dir: P) -> Result<Self> {
        let config_path = config_dir.as_ref().join("config.toml");

        if !config_path.exists() {
            return Ok(Self {
                base_dir: config_dir.as_ref().to_path_buf(),
                ..Self::default()
            });
        }

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let mut config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))?;
        config.base_dir = config_dir.as_ref().to_path_buf();

        config
            .validate_settings()
            .with_context(|| "Configuration validation failed")?;

        Ok(config)
    }

    #[inline]
    pub fn save(&self) -> Result<()> {
        self.validate_settings()
            .context("Configuration validation failed before saving")?;

        let config_dir = self.get_base_dir();

        fs::create_dir_all(config_dir).with_context(|| {
            format!(
                "Failed to create config directory: {}",
                config_dir.display()
            )
        })?;

        let config_path = self.config_file_path();
        let content = toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;

        fs::write(&config_path, content)
            .with_context(|| format!("Failed to write config file: {}", config_path.display()))?;

        Ok(())
    }

    /// Apply overrides from `.env` and the process environment
    #[inline]
    pub fn apply_env_overrides(&mut self) {
        // A missing .env file is normal
        let _ = dotenvy::dotenv();
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides using the given variable lookup
    #[inline]
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(api_key) = lookup("API_KEY") {
            self.azure.api_key = Some(api_key);
        }
        if let Some(endpoint) = lookup("RESOURCE_ENDPOINT") {
            self.azure.endpoint = endpoint;
        }
        if let Some(deployment) = lookup("DEPLOYMENT_NAME") {
            self.azure.embedding_deployment = deployment;
        }
        if let Some(model) = lookup("MODEL_NAME") {
            self.azure.chat_deployment = model;
        }
        if lookup("DEBUG").is_some() {
            self.chat.debug = true;
        }
    }

    /// Get the base directory for the application
    #[inline]
    pub fn get_base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Validate everything, including the connection settings needed to call the services
    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.azure.validate()?;
        self.validate_settings()
    }

    /// Validate the settings that must hold even before credentials are supplied
    #[inline]
    pub fn validate_settings(&self) -> Result<(), ConfigError> {
        self.azure.validate_tuning()?;
        self.retrieval.validate()?;

        if self.dataset.max_tokens == 0 {
            return Err(ConfigError::InvalidMaxTokens(self.dataset.max_tokens));
        }

        if self.chat.truncate_length == 0 {
            return Err(ConfigError::InvalidTruncateLength(self.chat.truncate_length));
        }

        if self.server.port == 0 {
            return Err(ConfigError::InvalidPort(self.server.port));
        }

        Ok(())
    }

    #[inline]
    pub fn config_file_path(&self) -> PathBuf {
        self.get_base_dir().join("config.toml")
    }

    /// Get the path for the vector database directory
    #[inline]
    pub fn vector_database_path(&self) -> PathBuf {
        self.get_base_dir().join("vectors")
    }

    /// Get the path of the persisted index schema
    #[inline]
    pub fn schema_path(&self) -> PathBuf {
        self.get_base_dir().join(&self.retrieval.schema_file)
    }

    #[inline]
    pub fn resource_url(&self) -> Result<Url, ConfigError> {
        self.azure.resource_url()
    }
}

impl AzureConfig {
    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.resource_url()?;

        if self.api_key.as_deref().is_none_or(|key| key.trim().is_empty()) {
            return Err(ConfigError::MissingApiKey);
        }

        self.validate_tuning()
    }

    fn validate_tuning(&self) -> Result<(), ConfigError> {
        if self.embedding_deployment.trim().is_empty() {
            return Err(ConfigError::InvalidDeployment(
                self.embedding_deployment.clone(),
            ));
        }

        if self.chat_deployment.trim().is_empty() {
            return Err(ConfigError::InvalidDeployment(self.chat_deployment.clone()));
        }

        if self.embedding_api_version.trim().is_empty() {
            return Err(ConfigError::InvalidApiVersion(
                self.embedding_api_version.clone(),
            ));
        }

        if self.chat_api_version.trim().is_empty() {
            return Err(ConfigError::InvalidApiVersion(self.chat_api_version.clone()));
        }

        if self.batch_size == 0 || self.batch_size > 2048 {
            return Err(ConfigError::InvalidBatchSize(self.batch_size));
        }

        if !(1..=600).contains(&self.timeout_seconds) {
            return Err(ConfigError::InvalidTimeout(self.timeout_seconds));
        }

        Ok(())
    }

    /// The resource endpoint as a URL with a trailing slash, ready for `Url::join`
    #[inline]
    pub fn resource_url(&self) -> Result<Url, ConfigError> {
        let endpoint = self.endpoint.trim();
        if endpoint.is_empty() {
            return Err(ConfigError::MissingEndpoint);
        }

        let with_scheme = if endpoint.contains("://") {
            endpoint.to_string()
        } else {
            format!("https://{}", endpoint)
        };

        let mut url =
            Url::parse(&with_scheme).map_err(|_| ConfigError::InvalidUrl(endpoint.to_string()))?;

        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(ConfigError::InvalidUrl(endpoint.to_string()));
        }

        if url.host_str().is_none_or(str::is_empty) {
            return Err(ConfigError::InvalidUrl(endpoint.to_string()));
        }

        if !url.path().ends_with('/') {
            let path = format!("{}/", url.path());
            url.set_path(&path);
        }

        Ok(url)
    }

    /// API key with all but the last four characters hidden
    #[inline]
    pub fn masked_api_key(&self) -> String {
        let Some(key) = self.api_key.as_deref() else {
            return "(not set)".to_string();
        };

        let count = key.chars().count();
        if count <= 4 {
            return "*".repeat(count);
        }

        let visible: String = key.chars().skip(count - 4).collect();
        format!("{}{}", "*".repeat(count - 4), visible)
    }

    #[inline]
    pub fn set_endpoint(&mut self, endpoint: String) -> Result<(), ConfigError> {
        let temp_config = AzureConfig {
            endpoint: endpoint.clone(),
            ..self.clone()
        };
        temp_config.resource_url()?;
        self.endpoint = endpoint;
        Ok(())
    }

    #[inline]
    pub fn set_api_key(&mut self, api_key: String) -> Result<(), ConfigError> {
        if api_key.trim().is_empty() {
            return Err(ConfigError::MissingApiKey);
        }
        self.api_key = Some(api_key);
        Ok(())
    }

    #[inline]
    pub fn set_embedding_deployment(&mut self, deployment: String) -> Result<(), ConfigError> {
        if deployment.trim().is_empty() {
            return Err(ConfigError::InvalidDeployment(deployment));
        }
        self.embedding_deployment = deployment;
        Ok(())
    }

    #[inline]
    pub fn set_chat_deployment(&mut self, deployment: String) -> Result<(), ConfigError> {
        if deployment.trim().is_empty() {
            return Err(ConfigError::InvalidDeployment(deployment));
        }
        self.chat_deployment = deployment;
        Ok(())
    }

    #[inline]
    pub fn set_batch_size(&mut self, batch_size: u32) -> Result<(), ConfigError> {
        if batch_size == 0 || batch_size > 2048 {
            return Err(ConfigError::InvalidBatchSize(batch_size));
        }
        self.batch_size = batch_size;
        Ok(())
    }
}

impl RetrievalConfig {
    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.index_name.trim().is_empty() {
            return Err(ConfigError::InvalidIndexName(self.index_name.clone()));
        }

        if !(1..=100).contains(&self.k) {
            return Err(ConfigError::InvalidRetrievalCount(self.k));
        }

        Ok(())
    }

    #[inline]
    pub fn set_k(&mut self, k: usize) -> Result<(), ConfigError> {
        if !(1..=100).contains(&k) {
            return Err(ConfigError::InvalidRetrievalCount(k));
        }
        self.k = k;
        Ok(())
    }
}
