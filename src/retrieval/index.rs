//! Persistent nearest-neighbour document index.
//!
//! Construction is two-phase: [`VectorIndex::create`] only records settings,
//! and the first call that needs the data runs [`VectorIndex::ensure_ready`],
//! which loads `<dir>/index.json` or seeds a fresh index with the sentinel
//! chunk. The initialisation runs once even under concurrent first requests.
//!
//! Scores are squared L2 distances between normalized embeddings, so lower is
//! closer and an exact match scores 0.

use std::cmp::Ordering;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::{OnceCell, RwLock};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::embeddings::Embedder;
use super::splitter::TextSplitter;
use crate::config::Settings;
use crate::error::{Error, Result};

/// Text of the placeholder chunk that keeps the index non-empty.
pub const SENTINEL_CONTENT: &str = "Initial setup document";

const INDEX_FILE: &str = "index.json";
const PREVIEW_CHARS: usize = 200;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct IndexedChunk {
    content: String,
    metadata: Map<String, Value>,
    embedding: Vec<f32>,
}

impl IndexedChunk {
    fn is_sentinel(&self) -> bool {
        self.metadata.get("type").and_then(Value::as_str) == Some("system")
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct IndexStore {
    dimension: usize,
    chunks: Vec<IndexedChunk>,
}

impl IndexStore {
    /// A store holding only the sentinel chunk.
    fn seeded(sentinel_embedding: Vec<f32>) -> Self {
        let mut metadata = Map::new();
        metadata.insert("type".to_string(), Value::from("system"));

        Self {
            dimension: sentinel_embedding.len(),
            chunks: vec![IndexedChunk {
                content: SENTINEL_CONTENT.to_string(),
                metadata,
                embedding: sentinel_embedding,
            }],
        }
    }

    fn is_consistent(&self, dimension: usize) -> bool {
        self.dimension == dimension
            && self.chunks.iter().all(|c| c.embedding.len() == dimension)
    }
}

fn check_dimension(embedding: &[f32], expected: usize, what: &str) -> Result<()> {
    if embedding.len() != expected {
        return Err(Error::VectorIndexError(format!(
            "{} embedding has dimension {}, index has {}",
            what,
            embedding.len(),
            expected
        )));
    }
    Ok(())
}

/// One retrieved chunk as reported to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourcePreview {
    pub source_id: usize,
    pub content: String,
    pub score: f32,
    pub metadata: Map<String, Value>,
}

/// Concatenated context plus per-chunk previews.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RetrievedContext {
    pub context: String,
    pub sources: Vec<SourcePreview>,
}

impl RetrievedContext {
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

/// Document index over chunk embeddings.
pub struct VectorIndex {
    embedder: Arc<dyn Embedder>,
    splitter: TextSplitter,
    default_top_k: usize,
    persist_dir: PathBuf,
    store: OnceCell<RwLock<IndexStore>>,
}

impl VectorIndex {
    /// Create an index handle. Nothing is loaded or embedded yet.
    pub fn create(
        embedder: Arc<dyn Embedder>,
        splitter: TextSplitter,
        default_top_k: usize,
        persist_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            embedder,
            splitter,
            default_top_k: default_top_k.max(1),
            persist_dir: persist_dir.into(),
            store: OnceCell::new(),
        }
    }

    pub fn from_settings(settings: &Settings, embedder: Arc<dyn Embedder>) -> Self {
        Self::create(
            embedder,
            TextSplitter::new(settings.chunk_size, settings.chunk_overlap),
            settings.top_k_results,
            &settings.persist_directory,
        )
    }

    pub fn is_ready(&self) -> bool {
        self.store.initialized()
    }

    /// Load or create the index. Later calls return immediately.
    pub async fn ensure_ready(&self) -> Result<()> {
        self.store().await.map(|_| ())
    }

    async fn store(&self) -> Result<&RwLock<IndexStore>> {
        self.store
            .get_or_try_init(|| async { self.open().await.map(RwLock::new) })
            .await
    }

    fn index_path(&self) -> PathBuf {
        self.persist_dir.join(INDEX_FILE)
    }

    async fn open(&self) -> Result<IndexStore> {
        let path = self.index_path();
        let loaded = match read_store(&path).await {
            Ok(Some(store)) => Some(store),
            Ok(None) => {
                info!("No vector index at {}, creating a new one", path.display());
                None
            }
            Err(e) => {
                warn!("Failed to load vector index, creating a new one: {}", e);
                None
            }
        };

        let sentinel = self.embed_sentinel().await?;
        if let Some(store) = loaded {
            if store.is_consistent(sentinel.len()) {
                info!(
                    "Loaded vector index from {} ({} chunks)",
                    path.display(),
                    store.chunks.len()
                );
                return Ok(store);
            }
            warn!(
                "Vector index at {} has dimension {}, embedder produces {}; starting fresh",
                path.display(),
                store.dimension,
                sentinel.len()
            );
        }

        let store = IndexStore::seeded(sentinel);
        self.persist(&store).await;
        Ok(store)
    }

    /// Embedding of the sentinel text; its length fixes the index dimension.
    async fn embed_sentinel(&self) -> Result<Vec<f32>> {
        let embedding = self.embedder.embed(SENTINEL_CONTENT).await?;
        if embedding.is_empty() {
            return Err(Error::VectorIndexError(
                "Embedder returned an empty vector".to_string(),
            ));
        }
        Ok(embedding)
    }

    /// Write the index; failures are logged and otherwise ignored.
    async fn persist(&self, store: &IndexStore) {
        if let Err(e) = write_store(&self.persist_dir, &self.index_path(), store).await {
            warn!("Failed to persist vector index: {}", e);
        }
    }

    /// Chunk, embed and index a document. Returns the generated document id.
    pub async fn add_document(
        &self,
        content: &str,
        metadata: Option<Map<String, Value>>,
    ) -> Result<String> {
        let store = self.store().await?;
        let doc_id = Uuid::new_v4().to_string();

        let chunks = self.splitter.split(content);
        info!("Split document into {} chunks", chunks.len());

        let embeddings = self.embedder.embed_batch(&chunks).await?;
        if embeddings.len() != chunks.len() {
            return Err(Error::VectorIndexError(format!(
                "Expected {} embeddings, got {}",
                chunks.len(),
                embeddings.len()
            )));
        }

        let mut base = metadata.unwrap_or_default();
        base.insert("doc_id".to_string(), Value::from(doc_id.clone()));

        let mut guard = store.write().await;
        for embedding in &embeddings {
            check_dimension(embedding, guard.dimension, "Chunk")?;
        }
        for (i, (chunk, embedding)) in chunks.into_iter().zip(embeddings).enumerate() {
            let mut metadata = base.clone();
            metadata.insert("chunk_index".to_string(), Value::from(i));
            guard.chunks.push(IndexedChunk {
                content: chunk,
                metadata,
                embedding,
            });
        }
        self.persist(&guard).await;

        info!("Document {} added successfully", doc_id);
        Ok(doc_id)
    }

    /// Top-k chunks closest to `query`, sentinel removed.
    ///
    /// Never fails: any error is logged and yields an empty result.
    pub async fn retrieve_context(&self, query: &str, top_k: Option<usize>) -> RetrievedContext {
        let top_k = top_k.unwrap_or(self.default_top_k);
        match self.search(query, top_k).await {
            Ok(found) => found,
            Err(e) => {
                warn!("Error retrieving context: {}", e);
                RetrievedContext::default()
            }
        }
    }

    async fn search(&self, query: &str, top_k: usize) -> Result<RetrievedContext> {
        let store = self.store().await?;
        let preview: String = query.chars().take(50).collect();
        debug!("Retrieving top {} results for query: {}", top_k, preview);

        let query_embedding = self.embedder.embed(query).await?;
        let guard = store.read().await;

        check_dimension(&query_embedding, guard.dimension, "Query")?;

        let mut scored: Vec<(f32, &IndexedChunk)> = guard
            .chunks
            .iter()
            .map(|chunk| (squared_l2(&query_embedding, &chunk.embedding), chunk))
            .collect();
        scored.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal));

        let hits: Vec<(f32, &IndexedChunk)> = scored
            .into_iter()
            .take(top_k)
            .filter(|(_, chunk)| !chunk.is_sentinel())
            .collect();

        if hits.is_empty() {
            debug!("No relevant documents found");
            return Ok(RetrievedContext::default());
        }

        let mut parts = Vec::with_capacity(hits.len());
        let mut sources = Vec::with_capacity(hits.len());
        for (i, (score, chunk)) in hits.into_iter().enumerate() {
            parts.push(format!("[Source {}]\n{}\n", i + 1, chunk.content));
            sources.push(SourcePreview {
                source_id: i + 1,
                content: format!("{}...", chunk.content.chars().take(PREVIEW_CHARS).collect::<String>()),
                score,
                metadata: chunk.metadata.clone(),
            });
        }

        debug!("Retrieved {} relevant documents", sources.len());
        Ok(RetrievedContext {
            context: parts.join("\n"),
            sources,
        })
    }

    /// Indexed chunks, excluding the sentinel. Zero if the index cannot open.
    pub async fn document_count(&self) -> usize {
        match self.store().await {
            Ok(store) => store
                .read()
                .await
                .chunks
                .iter()
                .filter(|c| !c.is_sentinel())
                .count(),
            Err(e) => {
                warn!("Error getting document count: {}", e);
                0
            }
        }
    }

    /// Drop every document, leaving only the sentinel.
    pub async fn clear(&self) -> Result<()> {
        let store = self.store().await?;
        info!("Clearing all documents from vector index");

        let fresh = IndexStore::seeded(self.embed_sentinel().await?);
        let mut guard = store.write().await;
        *guard = fresh;
        self.persist(&guard).await;
        Ok(())
    }
}

fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

async fn read_store(path: &Path) -> Result<Option<IndexStore>> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    Ok(Some(serde_json::from_slice(&bytes)?))
}

async fn write_store(dir: &Path, path: &Path, store: &IndexStore) -> Result<()> {
    tokio::fs::create_dir_all(dir).await?;
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, serde_json::to_vec(store)?).await?;
    tokio::fs::rename(&tmp, path).await?;
    debug!("Vector index persisted to {}", path.display());
    Ok(())
}
