//! Document retrieval: splitting, embeddings and the vector index

pub mod embeddings;
pub mod index;
pub mod splitter;

pub use embeddings::{Embedder, LocalEmbedder, OpenAIEmbedder};
pub use index::{RetrievedContext, SourcePreview, VectorIndex, SENTINEL_CONTENT};
pub use splitter::TextSplitter;
