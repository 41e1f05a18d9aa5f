use serde::Deserialize;
use std::env;
use std::sync::OnceLock;
use thiserror::Error;

/// Errors encountered while loading configuration from environment variables.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Required environment variable was not provided.
    #[error("Missing environment variable: {0}")]
    MissingVariable(String),
    /// Environment variable contained a value that could not be parsed.
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
}

/// Runtime configuration for the study mentor backend.
#[derive(Debug, Deserialize)]
pub struct Config {
    /// Base URL of the Qdrant instance that stores chunk embeddings.
    pub qdrant_url: String,
    /// Name of the Qdrant collection used for document chunks.
    pub qdrant_collection_name: String,
    /// Optional API key required to access Qdrant.
    pub qdrant_api_key: Option<String>,
    /// Embedding provider used to generate vector representations.
    pub embedding_provider: EmbeddingProvider,
    /// Embedding model identifier passed to the provider.
    pub embedding_model: String,
    /// Dimensionality of the produced vectors.
    pub embedding_dimension: usize,
    /// API key for the hosted embeddings API (required when the provider is `openai`).
    pub openai_api_key: Option<String>,
    /// Optional override for the hosted embeddings API base URL.
    pub openai_api_url: Option<String>,
    /// Optional base URL of a local Ollama runtime.
    pub ollama_url: Option<String>,
    /// API key for the chat completion model.
    pub gemini_api_key: String,
    /// Chat completion model identifier.
    pub chat_model: String,
    /// Optional override for the chat completion API base URL.
    pub gemini_api_url: Option<String>,
    /// Upper bound applied to outbound chat model calls, in seconds.
    pub chat_timeout_secs: u64,
    /// Base URL of the document database holding file and chat metadata.
    pub couchdb_url: String,
    /// Database name for file records and chat messages.
    pub couchdb_database: String,
    /// Optional basic-auth username for the document database.
    pub couchdb_username: Option<String>,
    /// Optional basic-auth password for the document database.
    pub couchdb_password: Option<String>,
    /// Window size used when splitting extracted text, in characters.
    pub chunk_size: usize,
    /// Characters repeated between adjacent chunks. Must stay below `chunk_size`.
    pub chunk_overlap: usize,
    /// Optional override for the HTTP server port.
    pub server_port: Option<u16>,
}

/// Supported embedding backends for the ingestion pipeline.
#[derive(Clone, Copy, Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    /// Local Ollama runtime.
    Ollama,
    /// Hosted OpenAI embeddings API.
    OpenAI,
}

const DEFAULT_CHAT_MODEL: &str = "gemini-2.0-flash";
const DEFAULT_CHAT_TIMEOUT_SECS: u64 = 40;
const DEFAULT_CHUNK_SIZE: usize = 500;
const DEFAULT_CHUNK_OVERLAP: usize = 100;

impl Config {
    /// Load configuration from environment variables, performing validation along the way.
    pub fn from_env() -> Result<Self, ConfigError> {
        let embedding_provider: EmbeddingProvider = load_env("EMBEDDING_PROVIDER")?
            .parse()
            .map_err(|()| ConfigError::InvalidValue("EMBEDDING_PROVIDER".to_string()))?;
        let openai_api_key = load_env_optional("OPENAI_API_KEY");
        if matches!(embedding_provider, EmbeddingProvider::OpenAI) && openai_api_key.is_none() {
            return Err(ConfigError::MissingVariable("OPENAI_API_KEY".to_string()));
        }

        let chunk_size = parse_env_or("CHUNK_SIZE", DEFAULT_CHUNK_SIZE)?;
        let chunk_overlap = parse_env_or("CHUNK_OVERLAP", DEFAULT_CHUNK_OVERLAP)?;
        if chunk_size == 0 {
            return Err(ConfigError::InvalidValue("CHUNK_SIZE".to_string()));
        }
        if chunk_overlap >= chunk_size {
            // A window that never advances would loop forever during ingestion.
            return Err(ConfigError::InvalidValue("CHUNK_OVERLAP".to_string()));
        }

        Ok(Self {
            qdrant_url: load_env("QDRANT_URL")?,
            qdrant_collection_name: load_env("QDRANT_COLLECTION_NAME")?,
            qdrant_api_key: load_env_optional("QDRANT_API_KEY"),
            embedding_provider,
            embedding_model: load_env("EMBEDDING_MODEL")?,
            embedding_dimension: load_env("EMBEDDING_DIMENSION")?
                .parse()
                .map_err(|_| ConfigError::InvalidValue("EMBEDDING_DIMENSION".to_string()))?,
            openai_api_key,
            openai_api_url: load_env_optional("OPENAI_API_URL"),
            ollama_url: load_env_optional("OLLAMA_URL"),
            gemini_api_key: load_env("GEMINI_API_KEY")?,
            chat_model: load_env_optional("CHAT_MODEL")
                .unwrap_or_else(|| DEFAULT_CHAT_MODEL.to_string()),
            gemini_api_url: load_env_optional("GEMINI_API_URL"),
            chat_timeout_secs: parse_env_or("CHAT_TIMEOUT_SECS", DEFAULT_CHAT_TIMEOUT_SECS)?,
            couchdb_url: load_env("COUCHDB_URL")?,
            couchdb_database: load_env("COUCHDB_DATABASE")?,
            couchdb_username: load_env_optional("COUCHDB_USERNAME"),
            couchdb_password: load_env_optional("COUCHDB_PASSWORD"),
            chunk_size,
            chunk_overlap,
            server_port: load_env_optional("SERVER_PORT")
                .map(|value| {
                    value
                        .parse()
                        .map_err(|_| ConfigError::InvalidValue("SERVER_PORT".into()))
                })
                .transpose()?,
        })
    }
}

fn load_env(key: &str) -> Result<String, ConfigError> {
    env::var(key)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| ConfigError::MissingVariable(key.to_string()))
}

fn load_env_optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_env_or<T: std::str::FromStr>(key: &str, default: T) -> Result<T, ConfigError> {
    load_env_optional(key)
        .map(|value| {
            value
                .parse::<T>()
                .map_err(|_| ConfigError::InvalidValue(key.to_string()))
        })
        .transpose()
        .map(|parsed| parsed.unwrap_or(default))
}

impl std::str::FromStr for EmbeddingProvider {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ollama" => Ok(Self::Ollama),
            "openai" => Ok(Self::OpenAI),
            _ => Err(()),
        }
    }
}

/// Global configuration cache populated during process start.
pub static CONFIG: OnceLock<Config> = OnceLock::new();

/// Retrieve the loaded configuration, panicking if initialization has not occurred.
pub fn get_config() -> &'static Config {
    CONFIG.get().expect("Config not initialized")
}

/// Load configuration from the environment and install it in the global cache.
///
/// Missing or invalid credentials abort the process here, before the first
/// request is accepted.
pub fn init_config() {
    dotenvy::dotenv().ok();
    let config = Config::from_env().expect("Failed to load config from environment");
    tracing::debug!(
        qdrant_url = %config.qdrant_url,
        collection = %config.qdrant_collection_name,
        metadata_db = %config.couchdb_database,
        embedding_provider = ?config.embedding_provider,
        chat_model = %config.chat_model,
        server_port = ?config.server_port,
        "Loaded configuration"
    );
    CONFIG.set(config).expect("Failed to set config");
}
