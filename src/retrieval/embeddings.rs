//! Embedding backends

use std::sync::Arc;

use async_openai::{
    config::OpenAIConfig,
    types::{CreateEmbeddingRequestArgs, EmbeddingInput},
    Client as OpenAIClient,
};
use async_trait::async_trait;
use tracing::{debug, info};

use crate::config::{EmbeddingBackend, Settings};
use crate::error::{Error, Result};

/// Default dimension of the local hashed embedder.
pub const LOCAL_EMBEDDING_DIM: usize = 256;

/// Longest input (in characters) sent to the embedding API.
const MAX_INPUT_CHARS: usize = 8000;

/// Turns text into fixed-size vectors.
///
/// The vector length is whatever the backend returns; the index learns it
/// from the first embedding it computes.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a batch; the output has one vector per input, in order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Embed a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_batch(&[text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| Error::VectorIndexError("No embedding returned".to_string()))
    }
}

/// Build the embedder selected in settings.
pub fn from_settings(settings: &Settings) -> Arc<dyn Embedder> {
    match settings.embedding_backend {
        EmbeddingBackend::OpenAI => {
            info!("Using OpenAI embeddings ({})", settings.embedding_model);
            Arc::new(OpenAIEmbedder::new(
                &settings.openai_api_key,
                &settings.openai_base_url,
                &settings.embedding_model,
            ))
        }
        EmbeddingBackend::Local => {
            info!("Using local hashed embeddings");
            Arc::new(LocalEmbedder::new(LOCAL_EMBEDDING_DIM))
        }
    }
}

/// Remote embeddings through the OpenAI API
pub struct OpenAIEmbedder {
    client: OpenAIClient<OpenAIConfig>,
    model: String,
}

impl OpenAIEmbedder {
    pub fn new(api_key: &str, base_url: &str, model: impl Into<String>) -> Self {
        let config = OpenAIConfig::new()
            .with_api_key(api_key)
            .with_api_base(base_url.trim_end_matches('/'));

        Self {
            client: OpenAIClient::with_config(config),
            model: model.into(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[async_trait]
impl Embedder for OpenAIEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!("Generating embeddings for {} texts", texts.len());

        let inputs: Vec<String> = texts
            .iter()
            .map(|t| truncate_chars(t.trim(), MAX_INPUT_CHARS).to_string())
            .collect();

        let request = CreateEmbeddingRequestArgs::default()
            .model(&self.model)
            .input(EmbeddingInput::StringArray(inputs))
            .build()
            .map_err(|e| Error::OpenAiError(e.to_string()))?;

        let response = self
            .client
            .embeddings()
            .create(request)
            .await
            .map_err(|e| Error::OpenAiError(e.to_string()))?;

        debug!(
            "Generated {} embeddings, tokens used: {}",
            response.data.len(),
            response.usage.total_tokens
        );

        if response.data.len() != texts.len() {
            return Err(Error::OpenAiError(format!(
                "Expected {} embeddings, got {}",
                texts.len(),
                response.data.len()
            )));
        }

        let mut data = response.data;
        data.sort_by_key(|e| e.index);
        Ok(data.into_iter().map(|e| e.embedding).collect())
    }
}

/// Deterministic, offline embedding: hashed bag of lowercase words.
#[derive(Debug, Clone)]
pub struct LocalEmbedder {
    dim: usize,
}

impl LocalEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { dim: dim.max(8) }
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut vec = vec![0.0f32; self.dim];
        for token in text.split_whitespace() {
            let bucket = fnv1a(token.to_lowercase().as_bytes()) % self.dim as u64;
            vec[bucket as usize] += 1.0;
        }

        normalize(&mut vec);
        vec
    }
}

impl Default for LocalEmbedder {
    fn default() -> Self {
        Self::new(LOCAL_EMBEDDING_DIM)
    }
}

#[async_trait]
impl Embedder for LocalEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_text(t)).collect())
    }
}

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// 64-bit FNV-1a. Stable across builds, so persisted local vectors keep
/// matching after a toolchain upgrade.
fn fnv1a(bytes: &[u8]) -> u64 {
    bytes.iter().fold(FNV_OFFSET, |hash, b| {
        (hash ^ u64::from(*b)).wrapping_mul(FNV_PRIME)
    })
}

fn normalize(vec: &mut [f32]) {
    let norm: f32 = vec.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for v in vec.iter_mut() {
            *v /= norm;
        }
    }
}
