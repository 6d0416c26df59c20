//! Process-wide settings
//!
//! Loaded once at startup from the environment (with `.env` support) and
//! shared read-only afterwards.

use std::path::PathBuf;
use std::str::FromStr;

use crate::error::{Error, Result};

pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";
pub const DEFAULT_NEO4J_URI: &str = "bolt://localhost:7687";
pub const DEFAULT_APP_NAME: &str = "Knowledge Graph Query Assistant";
pub const DEFAULT_CHUNK_SIZE: usize = 1000;
pub const DEFAULT_CHUNK_OVERLAP: usize = 200;
pub const DEFAULT_TOP_K: usize = 3;

/// Which embedding implementation backs the vector index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbeddingBackend {
    /// Remote OpenAI embeddings
    OpenAI,
    /// Deterministic hashed bag-of-words, no network
    Local,
}

impl FromStr for EmbeddingBackend {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "openai" => Ok(EmbeddingBackend::OpenAI),
            "local" => Ok(EmbeddingBackend::Local),
            other => Err(Error::ConfigError(format!(
                "EMBEDDING_BACKEND must be 'openai' or 'local', got '{}'",
                other
            ))),
        }
    }
}

/// Immutable application settings.
#[derive(Debug, Clone)]
pub struct Settings {
    pub openai_api_key: String,
    pub openai_model: String,
    pub openai_temperature: f32,
    pub openai_max_tokens: u32,
    pub openai_base_url: String,

    pub neo4j_uri: String,
    pub neo4j_user: String,
    pub neo4j_password: String,

    pub embedding_model: String,
    pub embedding_backend: EmbeddingBackend,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub top_k_results: usize,
    pub persist_directory: PathBuf,

    pub app_name: String,
    pub bind_addr: String,
    pub relations_dir: PathBuf,
}

impl Settings {
    /// Load settings from `.env` and the process environment.
    pub fn from_env() -> Result<Self> {
        Self::load_dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load .env file into environment variables using dotenvy
    fn load_dotenv() {
        // Try to load from current directory first, then parent
        if dotenvy::dotenv().is_err() {
            let _ = dotenvy::from_filename("../.env");
        }
    }

    /// Build settings from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let openai_api_key = get("OPENAI_API_KEY")
            .ok_or_else(|| Error::ConfigError("OPENAI_API_KEY not set".to_string()))?;

        let chunk_size: usize = parse_or(get("CHUNK_SIZE"), "CHUNK_SIZE", DEFAULT_CHUNK_SIZE)?;
        let chunk_size = chunk_size.max(1);
        let chunk_overlap: usize =
            parse_or(get("CHUNK_OVERLAP"), "CHUNK_OVERLAP", DEFAULT_CHUNK_OVERLAP)?;

        Ok(Self {
            openai_api_key,
            openai_model: get("OPENAI_MODEL").unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_string()),
            openai_temperature: parse_or(get("OPENAI_TEMPERATURE"), "OPENAI_TEMPERATURE", 0.7)?,
            openai_max_tokens: parse_or(get("OPENAI_MAX_TOKENS"), "OPENAI_MAX_TOKENS", 1000)?,
            openai_base_url: get("OPENAI_BASE_URL")
                .unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string()),
            neo4j_uri: get("NEO4J_URI").unwrap_or_else(|| DEFAULT_NEO4J_URI.to_string()),
            neo4j_user: get("NEO4J_USER").unwrap_or_else(|| "neo4j".to_string()),
            neo4j_password: get("NEO4J_PASSWORD").unwrap_or_else(|| "password".to_string()),
            embedding_model: get("EMBEDDING_MODEL")
                .unwrap_or_else(|| DEFAULT_EMBEDDING_MODEL.to_string()),
            embedding_backend: match get("EMBEDDING_BACKEND") {
                Some(v) => v.parse()?,
                None => EmbeddingBackend::OpenAI,
            },
            chunk_size,
            chunk_overlap: chunk_overlap.min(chunk_size.saturating_sub(1)),
            top_k_results: parse_or(get("TOP_K_RESULTS"), "TOP_K_RESULTS", DEFAULT_TOP_K)?,
            persist_directory: get("PERSIST_DIRECTORY")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./vector_store")),
            app_name: get("APP_NAME").unwrap_or_else(|| DEFAULT_APP_NAME.to_string()),
            bind_addr: get("BIND_ADDR").unwrap_or_else(|| "0.0.0.0:8000".to_string()),
            relations_dir: get("RELATIONS_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./relations")),
        })
    }
}

fn parse_or<T: FromStr>(value: Option<String>, key: &str, default: T) -> Result<T> {
    match value {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| Error::ConfigError(format!("{} has invalid value '{}'", key, raw))),
    }
}
