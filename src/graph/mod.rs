//! Knowledge graph access
//!
//! The infrastructure graph has four node labels (`Server`, `Application`,
//! `OS`, `Location`) and three relationship types:
//! - `RUNS_ON`    Server -> OS
//! - `HOSTS`      Server -> Application
//! - `LOCATED_IN` Server -> Location
//!
//! [`GraphStore`] exposes the fixed, parameterized queries the assistant
//! needs plus the idempotent merge operations used by the batch loader.
//! [`Neo4jGraph`] talks to a real database; [`MemoryGraph`] keeps everything
//! in process.

pub mod intent;
pub mod loader;
pub mod memory;
pub mod neo4j;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

pub use intent::{natural_language_query, GraphQueryResult, Intent};
pub use loader::GraphLoader;
pub use memory::MemoryGraph;
pub use neo4j::Neo4jGraph;

/// Id + display name of a node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub id: String,
    pub name: String,
}

impl NodeRecord {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// A directed edge between two node ids, as read from the relationship CSVs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeRecord {
    pub start: String,
    pub end: String,
}

impl EdgeRecord {
    pub fn new(start: impl Into<String>, end: impl Into<String>) -> Self {
        Self {
            start: start.into(),
            end: end.into(),
        }
    }
}

/// Everything known about one server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerDetails {
    pub server_id: String,
    pub server_name: String,
    pub operating_system: Option<String>,
    pub applications: Vec<String>,
    pub location: Option<String>,
}

/// An application found on a server running a given OS.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OsApplication {
    pub app_id: String,
    pub app_name: String,
    pub server_name: String,
    pub os_name: String,
}

/// A server in a given location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocatedServer {
    pub server_id: String,
    pub server_name: String,
    pub operating_system: Option<String>,
    pub applications: Vec<String>,
}

/// Node counts used as the classifier's fallback answer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphCounts {
    pub server_count: i64,
    pub app_count: i64,
    pub os_count: i64,
}

/// Node and relationship totals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphSummary {
    pub servers: i64,
    pub apps: i64,
    pub oses: i64,
    pub relationships: i64,
}

/// Relationship types the loader knows how to merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relationship {
    RunsOn,
    Hosts,
    LocatedIn,
}

impl Relationship {
    pub fn as_str(&self) -> &'static str {
        match self {
            Relationship::RunsOn => "RUNS_ON",
            Relationship::Hosts => "HOSTS",
            Relationship::LocatedIn => "LOCATED_IN",
        }
    }

    /// Label of the edge's end node (the start is always a `Server`).
    pub fn target_label(&self) -> &'static str {
        match self {
            Relationship::RunsOn => "OS",
            Relationship::Hosts => "Application",
            Relationship::LocatedIn => "Location",
        }
    }
}

/// Node labels the loader merges by id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeLabel {
    Server,
    Application,
    Os,
    Location,
}

impl NodeLabel {
    pub const ALL: [NodeLabel; 4] = [
        NodeLabel::Server,
        NodeLabel::Application,
        NodeLabel::Os,
        NodeLabel::Location,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            NodeLabel::Server => "Server",
            NodeLabel::Application => "Application",
            NodeLabel::Os => "OS",
            NodeLabel::Location => "Location",
        }
    }
}

/// Read and merge access to the infrastructure graph.
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Servers as `{id, name}`, at most `limit` rows.
    async fn servers(&self, limit: usize) -> Result<Vec<NodeRecord>>;

    /// Applications as `{id, name}`, at most `limit` rows.
    async fn applications(&self, limit: usize) -> Result<Vec<NodeRecord>>;

    /// OS, hosted applications and location of one server; `None` if unknown.
    async fn server_details(&self, server_id: &str) -> Result<Option<ServerDetails>>;

    /// Applications hosted on servers whose OS name contains `os_name`.
    async fn applications_by_os(&self, os_name: &str) -> Result<Vec<OsApplication>>;

    /// Servers located in `location_id`.
    async fn servers_by_location(&self, location_id: &str) -> Result<Vec<LocatedServer>>;

    /// Server / application / OS node counts.
    async fn counts(&self) -> Result<GraphCounts>;

    /// Node counts plus the total number of relationships.
    async fn summary(&self) -> Result<GraphSummary>;

    /// Remove every node and relationship.
    async fn clear(&self) -> Result<()>;

    /// Create uniqueness constraints on node ids (no-op where unsupported).
    async fn create_constraints(&self) -> Result<()>;

    /// Merge nodes by id, setting their name.
    async fn merge_nodes(&self, label: NodeLabel, nodes: &[NodeRecord]) -> Result<usize>;

    /// Merge edges whose endpoints both exist; returns the rows processed.
    async fn merge_edges(&self, relationship: Relationship, edges: &[EdgeRecord]) -> Result<usize>;
}
