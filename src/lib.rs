//! Knowledge Graph Query Assistant
//!
//! Retrieval-augmented chat backend over an infrastructure knowledge graph:
//! - Route free-text questions to fixed Neo4j queries by keyword intent
//! - Retrieve document context from a persistent vector index
//! - Answer through the OpenAI chat API with per-conversation history
//! - Serve everything over an HTTP/JSON API with Prometheus metrics
//! - Bulk-load the graph from CSV relation files

pub mod api;
pub mod chat;
pub mod commands;
pub mod config;
pub mod conversation;
pub mod error;
pub mod graph;
pub mod integrations;
pub mod metrics;
pub mod retrieval;

// Re-export common types
pub use chat::{ChatEngine, ChatReply};
pub use config::Settings;
pub use conversation::{ConversationStore, InMemoryConversationStore};
pub use error::{Error, Result};
pub use graph::{GraphStore, MemoryGraph, Neo4jGraph};
pub use integrations::OpenAIClient;
pub use retrieval::VectorIndex;
